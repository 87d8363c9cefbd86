//! Router assembly, shared between the binary entry point and integration tests.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/detect", post(handlers::detect))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
