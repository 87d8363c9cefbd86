//! Environment-variable configuration loading.
//!
//! Malformed values fall back to documented defaults with a `tracing::warn!`
//! rather than panicking the process - config loading is an ambient
//! concern, never part of the scored contract.

use pbn_core::detector::DetectorConfig;
use pbn_core::thresholds::{DEFAULT_HIGH_RISK_THRESHOLD, DEFAULT_MEDIUM_RISK_THRESHOLD};
use tracing::warn;

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, raw, "failed to parse environment variable, using default");
            default
        }),
        Err(_) => default,
    }
}

pub struct ApiConfig {
    pub bind_addr: std::net::SocketAddr,
    pub detector: DetectorConfig,
    pub classifier_model_path: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let detector = DetectorConfig {
            max_backlinks: env_parsed("PBN_MAX_BACKLINKS", 1000),
            minhash_threshold: env_parsed("MINHASH_THRESHOLD", 0.8),
            high_risk_threshold: env_parsed("HIGH_RISK_THRESHOLD", DEFAULT_HIGH_RISK_THRESHOLD),
            medium_risk_threshold: env_parsed("MEDIUM_RISK_THRESHOLD", DEFAULT_MEDIUM_RISK_THRESHOLD),
            use_ensemble: env_parsed("USE_ENSEMBLE", true),
            use_enhanced_features: env_parsed("USE_ENHANCED_FEATURES", true),
            use_parallel_processing: env_parsed("USE_PARALLEL_PROCESSING", true),
            parallel_workers: env_parsed("PARALLEL_WORKERS", 4),
            parallel_threshold: env_parsed("PARALLEL_THRESHOLD", 50),
        };

        let bind_addr = env_parsed("PBN_BIND_ADDR", "0.0.0.0:8080".to_string())
            .parse()
            .unwrap_or_else(|_| std::net::SocketAddr::from(([0, 0, 0, 0], 8080)));

        let classifier_model_path = std::env::var("CLASSIFIER_MODEL_PATH").ok();

        Self { bind_addr, detector, classifier_model_path }
    }
}
