//! Request/response data model for backlink risk scoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timestamp;

/// A single backlink observation pointing at the target domain.
///
/// Immutable once parsed - the detector never mutates a `BacklinkSignal`,
/// only reads from it while producing a `DetectionItem`.
#[derive(Debug, Clone, Deserialize)]
pub struct BacklinkSignal {
    pub source_url: String,
    #[serde(default)]
    pub domain_from: Option<String>,
    #[serde(default)]
    pub anchor: Option<String>,
    #[serde(default)]
    pub link_type: Option<String>,
    #[serde(default)]
    pub domain_rank: Option<f64>,
    #[serde(default)]
    pub domain_age_days: Option<i64>,
    #[serde(default)]
    pub backlink_spam_score: Option<i32>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub whois_registrar: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dofollow: Option<bool>,
    #[serde(default)]
    pub links_count: Option<i64>,
    #[serde(default)]
    pub safe_browsing_status: Option<String>,
    #[serde(default)]
    pub safe_browsing_threats: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub safe_browsing_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub raw: Option<Map<String, Value>>,
}

impl BacklinkSignal {
    /// `raw.text_pre` - the only contractual field inside `raw` besides `text_post`.
    pub fn text_pre(&self) -> &str {
        self.raw
            .as_ref()
            .and_then(|r| r.get("text_pre"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn text_post(&self) -> &str {
        self.raw
            .as_ref()
            .and_then(|r| r.get("text_post"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn content_snippet(&self) -> String {
        format!("{} {}", self.text_pre(), self.text_post())
    }

    pub fn is_safe_browsing_flagged(&self) -> bool {
        self.safe_browsing_status.as_deref() == Some("flagged")
    }
}

/// Risk classification bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Per-backlink scoring output.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionItem {
    pub source_url: String,
    pub pbn_probability: f64,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
    pub signals: Map<String, Value>,
}

/// Aggregate risk-bucket counts across all items in a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionSummary {
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub low_risk_count: usize,
}

impl DetectionSummary {
    pub fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::High => self.high_risk_count += 1,
            RiskLevel::Medium => self.medium_risk_count += 1,
            RiskLevel::Low => self.low_risk_count += 1,
        }
    }

    pub fn from_items(items: &[DetectionItem]) -> Self {
        let mut summary = Self::default();
        for item in items {
            summary.record(item.risk_level);
        }
        summary
    }
}

/// Request-scoped metadata about how the detection ran.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionMeta {
    pub latency_ms: u64,
    pub model_version: String,
}
