//! Pipeline orchestration.
//!
//! `Detector::detect` runs the full scoring pipeline for one batch of
//! `BacklinkSignal`s: aggregate once, compute content similarity once,
//! then score every item against those two shared, read-only artifacts -
//! sequentially for small batches, fanned out over a bounded worker pool
//! for large ones. Per-item panics are caught and degrade to the neutral
//! fallback rather than failing the request.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::aggregator::{self, NetworkAggregate};
use crate::assembler;
use crate::classifier::BaseClassifier;
use crate::enhanced_features;
use crate::ensemble;
use crate::error::DetectorError;
use crate::features;
use crate::model::{BacklinkSignal, DetectionItem, DetectionSummary, RiskLevel};
use crate::rules;
use crate::similarity;
use crate::thresholds::{self, DomainContext, DEFAULT_HIGH_RISK_THRESHOLD, DEFAULT_MEDIUM_RISK_THRESHOLD};

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub max_backlinks: usize,
    pub minhash_threshold: f64,
    pub high_risk_threshold: f64,
    pub medium_risk_threshold: f64,
    pub use_ensemble: bool,
    pub use_enhanced_features: bool,
    pub use_parallel_processing: bool,
    pub parallel_workers: usize,
    pub parallel_threshold: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_backlinks: 1000,
            minhash_threshold: similarity::DEFAULT_SIMILARITY_THRESHOLD,
            high_risk_threshold: DEFAULT_HIGH_RISK_THRESHOLD,
            medium_risk_threshold: DEFAULT_MEDIUM_RISK_THRESHOLD,
            use_ensemble: true,
            use_enhanced_features: true,
            use_parallel_processing: true,
            parallel_workers: 4,
            parallel_threshold: 50,
        }
    }
}

pub struct Detector {
    config: DetectorConfig,
    classifier: BaseClassifier,
}

impl Detector {
    pub fn new(config: DetectorConfig, classifier: BaseClassifier) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn model_version(&self) -> &'static str {
        self.classifier.model_version()
    }

    /// Validates the envelope's `backlinks` length against the configured
    /// bounds. Callers (the HTTP handler) map this to 400.
    pub fn validate(&self, backlinks: &[BacklinkSignal]) -> Result<(), DetectorError> {
        if backlinks.is_empty() {
            return Err(DetectorError::Validation("backlinks must not be empty".to_string()));
        }
        if backlinks.len() > self.config.max_backlinks {
            return Err(DetectorError::Validation(format!(
                "backlinks length {} exceeds configured maximum {}",
                backlinks.len(),
                self.config.max_backlinks
            )));
        }
        Ok(())
    }

    /// Scores one batch. `now` is the wall-clock instant pinned for this
    /// request; passing it explicitly (rather than calling `Utc::now()`
    /// internally) keeps the pipeline pure and testable.
    pub async fn detect(
        &self,
        backlinks: Vec<BacklinkSignal>,
        now: chrono::DateTime<chrono::Utc>,
        domain_context: Option<DomainContext>,
    ) -> Result<(Vec<DetectionItem>, DetectionSummary), DetectorError> {
        self.validate(&backlinks)?;

        let agg = aggregator::aggregate(&backlinks, now);
        let content_ratio = catch_unwind(AssertUnwindSafe(|| {
            similarity::content_similarity_ratio(&backlinks, self.config.minhash_threshold)
        }))
        .unwrap_or(0.0);
        let agg = agg.with_content_similarity_ratio(content_ratio);

        let thresholds = thresholds::compute(
            backlinks.len(),
            self.config.high_risk_threshold,
            self.config.medium_risk_threshold,
            domain_context,
        );

        let items = if !self.config.use_parallel_processing
            || backlinks.len() <= self.config.parallel_threshold
        {
            self.score_sequential(&backlinks, &agg, &thresholds)
        } else {
            self.score_parallel(&backlinks, &agg, &thresholds).await
        };

        let summary = DetectionSummary::from_items(&items);
        Ok((items, summary))
    }

    fn score_sequential(
        &self,
        backlinks: &[BacklinkSignal],
        agg: &NetworkAggregate,
        thresholds: &crate::thresholds::AdaptiveThresholds,
    ) -> Vec<DetectionItem> {
        let use_ensemble = self.config.use_ensemble;
        let use_enhanced = self.config.use_enhanced_features;
        let minhash_threshold = self.config.minhash_threshold;
        backlinks
            .iter()
            .map(|b| {
                catch_unwind(AssertUnwindSafe(|| {
                    score_one(
                        b,
                        backlinks,
                        agg,
                        &self.classifier,
                        thresholds,
                        minhash_threshold,
                        use_ensemble,
                        use_enhanced,
                    )
                }))
                .unwrap_or_else(|_| neutral_item(b))
            })
            .collect()
    }

    async fn score_parallel(
        &self,
        backlinks: &[BacklinkSignal],
        agg: &NetworkAggregate,
        thresholds: &crate::thresholds::AdaptiveThresholds,
    ) -> Vec<DetectionItem> {
        let agg = Arc::new(agg.clone());
        let peers = Arc::new(backlinks.to_vec());
        let classifier = Arc::new(self.classifier.clone());
        let thresholds = *thresholds;
        let semaphore = Arc::new(Semaphore::new(self.config.parallel_workers));
        let use_ensemble = self.config.use_ensemble;
        let use_enhanced = self.config.use_enhanced_features;
        let minhash_threshold = self.config.minhash_threshold;

        let mut set = JoinSet::new();
        for (idx, backlink) in backlinks.iter().cloned().enumerate() {
            let agg = Arc::clone(&agg);
            let peers = Arc::clone(&peers);
            let classifier = Arc::clone(&classifier);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closes");
                let item = catch_unwind(AssertUnwindSafe(|| {
                    score_one(
                        &backlink,
                        &peers,
                        &agg,
                        &classifier,
                        &thresholds,
                        minhash_threshold,
                        use_ensemble,
                        use_enhanced,
                    )
                }))
                .unwrap_or_else(|_| neutral_item(&backlink));
                (idx, item)
            });
        }

        let mut results: Vec<Option<DetectionItem>> = (0..backlinks.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, item)) => results[idx] = Some(item),
                Err(join_err) => {
                    if join_err.is_panic() {
                        tracing::warn!("scoring task panicked, degrading to neutral fallback");
                    }
                }
            }
        }

        results
            .into_iter()
            .zip(backlinks.iter())
            .map(|(maybe_item, backlink)| maybe_item.unwrap_or_else(|| neutral_item(backlink)))
            .collect()
    }
}

fn score_one(
    backlink: &BacklinkSignal,
    peers: &[BacklinkSignal],
    agg: &NetworkAggregate,
    classifier: &BaseClassifier,
    thresholds: &crate::thresholds::AdaptiveThresholds,
    minhash_threshold: f64,
    use_ensemble: bool,
    use_enhanced_features: bool,
) -> DetectionItem {
    let fv = features::extract(backlink, agg);
    let rule_scores = rules::evaluate(backlink, agg);
    let mut base_probability = classifier.predict(&fv, backlink);

    if use_enhanced_features {
        let enhanced = enhanced_features::extract(backlink, peers, agg);
        base_probability = (base_probability + enhanced.boost()).min(1.0);
    }

    if use_ensemble {
        let blended = ensemble::blend(classifier, &fv, backlink, &rule_scores, base_probability);
        base_probability = blended.probability;
    }

    let assembled = assembler::assemble(
        backlink,
        base_probability,
        &rule_scores,
        agg.content_similarity_ratio(),
        minhash_threshold,
        thresholds,
    );

    DetectionItem {
        source_url: backlink.source_url.clone(),
        pbn_probability: assembled.probability,
        risk_level: assembled.risk_level,
        reasons: assembled.reasons,
        signals: build_signals(backlink, &rule_scores, agg),
    }
}

fn build_signals(
    backlink: &BacklinkSignal,
    rule_scores: &rules::RuleScores,
    agg: &NetworkAggregate,
) -> Map<String, Value> {
    let mut signals = Map::new();
    signals.insert("ip".to_string(), json_opt_string(backlink.ip.as_deref()));
    signals.insert("whois_registrar".to_string(), json_opt_string(backlink.whois_registrar.as_deref()));
    signals.insert(
        "domain_age_days".to_string(),
        backlink.domain_age_days.map(Value::from).unwrap_or(Value::Null),
    );
    signals.insert("domain_rank".to_string(), backlink.domain_rank.map(Value::from).unwrap_or(Value::Null));
    signals.insert("content_similarity".to_string(), Value::from(agg.content_similarity_ratio()));
    let rules_map: Map<String, Value> =
        rule_scores.iter().map(|(k, v)| (k.clone(), Value::from(*v))).collect();
    signals.insert("rules".to_string(), Value::Object(rules_map));
    signals.insert(
        "safe_browsing_status".to_string(),
        json_opt_string(backlink.safe_browsing_status.as_deref()),
    );
    signals.insert(
        "safe_browsing_threats".to_string(),
        backlink
            .safe_browsing_threats
            .clone()
            .map(Value::Array)
            .unwrap_or(Value::Null),
    );
    signals
}

fn json_opt_string(value: Option<&str>) -> Value {
    match value {
        Some(v) => Value::String(v.to_string()),
        None => Value::Null,
    }
}

/// The neutral fallback for an item whose scoring panicked: probability
/// 0.5, empty rule map, `reasons = ["baseline_score"]`, matching the
/// documented per-item degradation contract.
fn neutral_item(backlink: &BacklinkSignal) -> DetectionItem {
    DetectionItem {
        source_url: backlink.source_url.clone(),
        pbn_probability: 0.5,
        risk_level: RiskLevel::Medium,
        reasons: vec!["baseline_score".to_string()],
        signals: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::backlink;
    use chrono::Utc;

    fn detector() -> Detector {
        Detector::new(DetectorConfig::default(), BaseClassifier::Lightweight)
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let d = detector();
        let result = d.detect(vec![], Utc::now(), None).await;
        assert!(matches!(result, Err(DetectorError::Validation(_))));
    }

    #[tokio::test]
    async fn over_cap_batch_is_rejected() {
        let mut config = DetectorConfig::default();
        config.max_backlinks = 2;
        let d = Detector::new(config, BaseClassifier::Lightweight);
        let peers = vec![backlink().build(), backlink().build(), backlink().build()];
        let result = d.detect(peers, Utc::now(), None).await;
        assert!(matches!(result, Err(DetectorError::Validation(_))));
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let d = detector();
        let peers = vec![
            backlink().source_url("https://a.test").build(),
            backlink().source_url("https://b.test").build(),
            backlink().source_url("https://c.test").build(),
        ];
        let (items, _) = d.detect(peers, Utc::now(), None).await.unwrap();
        let urls: Vec<_> = items.iter().map(|i| i.source_url.clone()).collect();
        assert_eq!(urls, vec!["https://a.test", "https://b.test", "https://c.test"]);
    }

    #[tokio::test]
    async fn summary_counts_sum_to_batch_length() {
        let d = detector();
        let peers: Vec<_> = (0..7).map(|_| backlink().build()).collect();
        let (items, summary) = d.detect(peers, Utc::now(), None).await.unwrap();
        assert_eq!(items.len(), 7);
        assert_eq!(
            summary.high_risk_count + summary.medium_risk_count + summary.low_risk_count,
            7
        );
    }

    #[tokio::test]
    async fn every_probability_is_bounded() {
        let d = detector();
        let peers: Vec<_> = (0..5)
            .map(|i| backlink().spam_score(Some(i * 20)).domain_rank(Some(i as f64)).build())
            .collect();
        let (items, _) = d.detect(peers, Utc::now(), None).await.unwrap();
        for item in &items {
            assert!(item.pbn_probability >= 0.0 && item.pbn_probability <= 0.999);
        }
    }

    #[tokio::test]
    async fn large_batch_takes_parallel_path_and_preserves_order() {
        let mut config = DetectorConfig::default();
        config.parallel_threshold = 5;
        let d = Detector::new(config, BaseClassifier::Lightweight);
        let peers: Vec<_> = (0..20)
            .map(|i| backlink().source_url(&format!("https://site{i}.test")).build())
            .collect();
        let (items, _) = d.detect(peers, Utc::now(), None).await.unwrap();
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.source_url, format!("https://site{i}.test"));
        }
    }

    #[tokio::test]
    async fn deterministic_for_identical_input() {
        let d = detector();
        let peers: Vec<_> = (0..6)
            .map(|i| backlink().spam_score(Some(i * 10)).ip_str("5.5.5.5").build())
            .collect();
        let (items_a, _) = d.detect(peers.clone(), Utc::now(), None).await.unwrap();
        let (items_b, _) = d.detect(peers, Utc::now(), None).await.unwrap();
        for (a, b) in items_a.iter().zip(items_b.iter()) {
            assert_eq!(a.pbn_probability, b.pbn_probability);
        }
    }

    #[tokio::test]
    async fn raising_spam_score_does_not_decrease_probability() {
        let d = detector();
        let low = vec![backlink().spam_score(Some(10)).build()];
        let high = vec![backlink().spam_score(Some(90)).build()];
        let (items_low, _) = d.detect(low, Utc::now(), None).await.unwrap();
        let (items_high, _) = d.detect(high, Utc::now(), None).await.unwrap();
        assert!(items_high[0].pbn_probability >= items_low[0].pbn_probability);
    }
}
