//! Final risk assembly.
//!
//! Combines the base classifier probability, the rule-score sum and the
//! network's content-similarity ratio into one probability per backlink,
//! then classifies it against the batch's adaptive thresholds.

use crate::model::{BacklinkSignal, RiskLevel};
use crate::rules::RuleScores;
use crate::thresholds::AdaptiveThresholds;

const CONTENT_WEIGHT: f64 = 0.15;
const RULE_WEIGHT_BASE: f64 = 0.30;
const RULE_WEIGHT_HIGH_RISK: f64 = 0.40;
const SAFE_BROWSING_BOOST: f64 = 0.30;
const PROBABILITY_CEILING: f64 = 0.999;

pub struct AssembledRisk {
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
}

fn is_high_risk_signal(backlink: &BacklinkSignal) -> bool {
    backlink.backlink_spam_score.is_some_and(|s| s >= 60) || backlink.domain_rank.is_some_and(|r| r < 20.0)
}

/// Assembles the final probability for one backlink.
///
/// `base_probability` is the base classifier's (or ensemble's) output,
/// `rule_scores` the evaluated rule map, `content_similarity_ratio` the
/// network-wide content-duplication ratio shared by every item in the
/// batch, `minhash_threshold` the configured similarity cutoff a ratio must
/// meet to earn the `content_similarity_high` reason. `safe_browsing_flagged`
/// contributes a flat, monotone probability boost resolved as: add it to
/// the raw rule sum before the rule weight is applied, so its effect scales
/// the same way a rule hit would.
pub fn assemble(
    backlink: &BacklinkSignal,
    base_probability: f64,
    rule_scores: &RuleScores,
    content_similarity_ratio: f64,
    minhash_threshold: f64,
    thresholds: &AdaptiveThresholds,
) -> AssembledRisk {
    let high_risk_signal = is_high_risk_signal(backlink);
    let rule_weight = if high_risk_signal { RULE_WEIGHT_HIGH_RISK } else { RULE_WEIGHT_BASE };
    let base_weight = 1.0 - rule_weight - CONTENT_WEIGHT;

    let mut rules_sum: f64 = rule_scores.values().sum();
    let mut reasons = crate::rules::ordered_reasons(rule_scores);

    if backlink.is_safe_browsing_flagged() {
        rules_sum += SAFE_BROWSING_BOOST;
        reasons.push("safe_browsing_flagged".to_string());
    }

    let mut probability = base_probability * base_weight
        + rules_sum.min(1.0) * rule_weight
        + content_similarity_ratio * CONTENT_WEIGHT;

    if high_risk_signal && rules_sum > 0.0 {
        let has_spam_and_domain_quality = rule_scores.contains_key(crate::rules::DATAFORSEO_SPAM_SCORE)
            && rule_scores.contains_key(crate::rules::DOMAIN_QUALITY);
        if has_spam_and_domain_quality {
            probability += 0.25;
        } else if rules_sum >= 0.3 {
            probability += 0.15;
        }
    }

    if content_similarity_ratio >= minhash_threshold {
        reasons.push("content_similarity_high".to_string());
    }

    if reasons.is_empty() {
        reasons.push("baseline_score".to_string());
    }

    probability = probability.clamp(0.0, PROBABILITY_CEILING);

    AssembledRisk { probability, risk_level: thresholds.classify(probability), reasons }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::classifier::BaseClassifier;
    use crate::features::extract as extract_features;
    use crate::rules;
    use crate::similarity::DEFAULT_SIMILARITY_THRESHOLD;
    use crate::test_support::backlink;
    use crate::thresholds::{self, DEFAULT_HIGH_RISK_THRESHOLD, DEFAULT_MEDIUM_RISK_THRESHOLD};
    use chrono::Utc;

    fn default_thresholds(batch_size: usize) -> thresholds::AdaptiveThresholds {
        thresholds::compute(batch_size, DEFAULT_HIGH_RISK_THRESHOLD, DEFAULT_MEDIUM_RISK_THRESHOLD, None)
    }

    #[test]
    fn clean_isolated_link_is_low_risk_with_baseline_reason() {
        let now = Utc::now();
        let peers = vec![backlink()
            .domain_rank(Some(79.0))
            .spam_score(Some(0))
            .safe_browsing_status(Some("clean".to_string()))
            .build()];
        let agg = aggregate(&peers, now);
        let fv = extract_features(&peers[0], &agg);
        let base = BaseClassifier::Lightweight.predict(&fv, &peers[0]);
        let rule_scores = rules::evaluate(&peers[0], &agg);
        let t = default_thresholds(peers.len());
        let result = assemble(&peers[0], base, &rule_scores, 0.0, DEFAULT_SIMILARITY_THRESHOLD, &t);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.reasons, vec!["baseline_score".to_string()]);
        assert!(result.probability < 0.5);
    }

    #[test]
    fn high_spam_low_rank_triggers_domain_quality_and_spam_rules() {
        let now = Utc::now();
        let peers = vec![backlink()
            .domain_rank(Some(7.0))
            .spam_score(Some(75))
            .safe_browsing_status(Some("clean".to_string()))
            .build()];
        let agg = aggregate(&peers, now);
        let fv = extract_features(&peers[0], &agg);
        let base = BaseClassifier::Lightweight.predict(&fv, &peers[0]);
        let rule_scores = rules::evaluate(&peers[0], &agg);
        let t = default_thresholds(peers.len());
        let result = assemble(&peers[0], base, &rule_scores, 0.0, DEFAULT_SIMILARITY_THRESHOLD, &t);
        assert!(result.reasons.contains(&rules::DATAFORSEO_SPAM_SCORE.to_string()));
        assert!(result.reasons.contains(&rules::DOMAIN_QUALITY.to_string()));
        assert_ne!(result.risk_level, RiskLevel::Low);
        assert!(result.probability > 0.6);
    }

    #[test]
    fn safe_browsing_flagged_raises_probability_over_clean_otherwise_identical() {
        let now = Utc::now();
        let flagged = backlink()
            .domain_rank(Some(300.0))
            .safe_browsing_status(Some("flagged".to_string()))
            .build();
        let clean = backlink()
            .domain_rank(Some(300.0))
            .safe_browsing_status(Some("clean".to_string()))
            .build();
        let peers_f = vec![flagged.clone()];
        let peers_c = vec![clean.clone()];
        let agg_f = aggregate(&peers_f, now);
        let agg_c = aggregate(&peers_c, now);
        let base_f = BaseClassifier::Lightweight.predict(&extract_features(&flagged, &agg_f), &flagged);
        let base_c = BaseClassifier::Lightweight.predict(&extract_features(&clean, &agg_c), &clean);
        let rules_f = rules::evaluate(&flagged, &agg_f);
        let rules_c = rules::evaluate(&clean, &agg_c);
        let t = default_thresholds(1);
        let result_f = assemble(&flagged, base_f, &rules_f, 0.0, DEFAULT_SIMILARITY_THRESHOLD, &t);
        let result_c = assemble(&clean, base_c, &rules_c, 0.0, DEFAULT_SIMILARITY_THRESHOLD, &t);
        assert!(result_f.probability > result_c.probability);
        assert!(result_f.reasons.contains(&"safe_browsing_flagged".to_string()));
    }

    #[test]
    fn probability_never_exceeds_ceiling() {
        let now = Utc::now();
        let peers = vec![backlink()
            .domain_rank(Some(1.0))
            .spam_score(Some(100))
            .safe_browsing_status(Some("flagged".to_string()))
            .ip_str("6.6.6.6")
            .build()];
        let agg = aggregate(&peers, now);
        let fv = extract_features(&peers[0], &agg);
        let base = BaseClassifier::Lightweight.predict(&fv, &peers[0]);
        let rule_scores = rules::evaluate(&peers[0], &agg);
        let t = default_thresholds(1);
        let result = assemble(&peers[0], base, &rule_scores, 1.0, DEFAULT_SIMILARITY_THRESHOLD, &t);
        assert!(result.probability <= 0.999);
    }

    #[test]
    fn high_content_similarity_adds_reason() {
        let now = Utc::now();
        let peers = vec![backlink().build()];
        let agg = aggregate(&peers, now);
        let fv = extract_features(&peers[0], &agg);
        let base = BaseClassifier::Lightweight.predict(&fv, &peers[0]);
        let rule_scores = rules::evaluate(&peers[0], &agg);
        let t = default_thresholds(1);
        let result = assemble(&peers[0], base, &rule_scores, 0.9, DEFAULT_SIMILARITY_THRESHOLD, &t);
        assert!(result.reasons.contains(&"content_similarity_high".to_string()));
    }
}
