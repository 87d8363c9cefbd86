//! `/detect`, `/health`, `/metrics` handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use pbn_core::{BacklinkSignal, DetectionItem, DetectionSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DetectRequest {
    pub domain: String,
    pub task_id: String,
    pub backlinks: Vec<BacklinkSignal>,
    #[serde(default)]
    pub summary: Option<Value>,
}

#[derive(Serialize)]
pub struct DetectResponse {
    pub domain: String,
    pub task_id: String,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<DetectionItem>,
    pub summary: DetectionSummary,
    pub meta: pbn_core::DetectionMeta,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string(), timestamp: Utc::now() })
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render_prometheus()
}

pub async fn detect(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let span = info_span!("detect", task_id = %request.task_id, domain = %request.domain);
    async move {
        let start = Instant::now();
        let now = Utc::now();

        let result = state.detector.detect(request.backlinks, now, None).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((items, summary)) => {
                record_metrics(&state, &summary, latency_ms, false);
                info!(items = items.len(), latency_ms, "detect request completed");
                Ok(Json(DetectResponse {
                    domain: request.domain,
                    task_id: request.task_id,
                    generated_at: now,
                    items,
                    summary,
                    meta: pbn_core::DetectionMeta {
                        latency_ms,
                        model_version: state.detector.model_version().to_string(),
                    },
                }))
            }
            Err(err) => {
                let failed = matches!(err, pbn_core::DetectorError::Internal(_));
                state.metrics.record_request(failed, latency_ms);
                warn!(error = %err, "detect request rejected");
                Err(ApiError::from(err))
            }
        }
    }
    .instrument(span)
    .await
}

fn record_metrics(state: &AppState, summary: &DetectionSummary, latency_ms: u64, failed: bool) {
    state.metrics.record_request(failed, latency_ms);
    state.metrics.record_item(
        summary.high_risk_count as u64,
        summary.medium_risk_count as u64,
        summary.low_risk_count as u64,
    );
}
