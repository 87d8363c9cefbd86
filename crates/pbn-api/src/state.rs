//! Shared application state.

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use pbn_core::{BaseClassifier, Detector};
use pbn_metrics::MetricsCollector;
use tracing::{info, warn};

use crate::config::ApiConfig;

pub struct AppState {
    pub detector: Arc<Detector>,
    pub metrics: Arc<MetricsCollector>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &ApiConfig) -> Self {
        let classifier = load_classifier(config.classifier_model_path.as_deref());
        let detector = Arc::new(Detector::new(config.detector.clone(), classifier));
        let metrics = Arc::new(MetricsCollector::new());

        Self { detector, metrics, start_time: Instant::now() }
    }
}

fn load_classifier(path: Option<&str>) -> BaseClassifier {
    let Some(path) = path else {
        info!("no CLASSIFIER_MODEL_PATH set, using lightweight classifier");
        return BaseClassifier::Lightweight;
    };

    match fs::read_to_string(path) {
        Ok(contents) => match pbn_core::classifier::LearnedModel::from_str(&contents) {
            Some(model) => {
                info!(path, "loaded learned classifier model");
                BaseClassifier::Learned(model)
            }
            None => {
                warn!(path, "model file did not parse, falling back to lightweight classifier");
                BaseClassifier::Lightweight
            }
        },
        Err(err) => {
            warn!(path, %err, "failed to read model file, falling back to lightweight classifier");
            BaseClassifier::Lightweight
        }
    }
}
