//! Base classifier: a learned linear model when available, otherwise a
//! deterministic weighted-scorecard fallback ("lightweight" classifier).
//!
//! Both variants share one signature, `predict(features, signal) -> f64`,
//! so the ensemble blender can treat them uniformly and simply drop the
//! learned arm's weight when no serialized model was loaded at startup.

use crate::features::FeatureVector;
use crate::model::BacklinkSignal;

pub const MODEL_VERSION_LEARNED: &str = "lr-1.0";
pub const MODEL_VERSION_LIGHTWEIGHT: &str = "lightweight-v1.0";

/// A pre-fit binary linear model operating on the 11-feature vector.
///
/// The wire format is a flat list of 11 weights plus a bias term; this is
/// intentionally minimal since model training is explicitly out of scope -
/// only loading and applying an already-fit model is implemented here.
#[derive(Debug, Clone)]
pub struct LearnedModel {
    weights: [f64; crate::features::FEATURE_COUNT],
    bias: f64,
}

impl LearnedModel {
    pub fn new(weights: [f64; crate::features::FEATURE_COUNT], bias: f64) -> Self {
        Self { weights, bias }
    }

    /// Loads a model serialized as whitespace-separated floats: 11 weights
    /// followed by a bias term. Returns `None` on any parse failure so
    /// startup degrades to the lightweight classifier rather than failing.
    pub fn from_str(contents: &str) -> Option<Self> {
        let values: Vec<f64> = contents
            .split_whitespace()
            .filter_map(|tok| tok.parse::<f64>().ok())
            .collect();
        if values.len() != crate::features::FEATURE_COUNT + 1 {
            return None;
        }
        let mut weights = [0.0; crate::features::FEATURE_COUNT];
        weights.copy_from_slice(&values[..crate::features::FEATURE_COUNT]);
        Some(Self { weights, bias: values[crate::features::FEATURE_COUNT] })
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        let z: f64 = self
            .weights
            .iter()
            .zip(features.0.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Behind-one-interface classifier: learned when a model artifact was
/// loaded at startup, lightweight otherwise.
#[derive(Debug, Clone)]
pub enum BaseClassifier {
    Learned(LearnedModel),
    Lightweight,
}

impl BaseClassifier {
    pub fn model_version(&self) -> &'static str {
        match self {
            BaseClassifier::Learned(_) => MODEL_VERSION_LEARNED,
            BaseClassifier::Lightweight => MODEL_VERSION_LIGHTWEIGHT,
        }
    }

    pub fn is_learned(&self) -> bool {
        matches!(self, BaseClassifier::Learned(_))
    }

    pub fn predict(&self, features: &FeatureVector, backlink: &BacklinkSignal) -> f64 {
        match self {
            BaseClassifier::Learned(model) => model.predict(features).clamp(0.0, 1.0),
            BaseClassifier::Lightweight => lightweight_predict(features, backlink),
        }
    }
}

fn banded(value: f64, thresholds: &[(f64, f64)], default: f64) -> f64 {
    for (threshold, score) in thresholds {
        if value < *threshold {
            return *score;
        }
    }
    default
}

fn lightweight_predict(features: &FeatureVector, backlink: &BacklinkSignal) -> f64 {
    let domain_rank = features.domain_rank();
    let domain_age = features.domain_age_days();
    let ip_reuse = features.ip_reuse_ratio();
    let registrar_reuse = features.registrar_reuse_ratio();
    let velocity = features.link_velocity();
    let money_anchor = features.money_anchor_score();
    let anchor_length = features.anchor_length();
    let name_suspicion = features.domain_name_suspicion();
    let hosting_pattern = features.hosting_pattern();
    let spam_norm = features.spam_score_normalized();

    let domain_rank_score = if domain_rank <= 0.0 {
        0.5
    } else {
        banded(domain_rank, &[(100.0, 0.9), (500.0, 0.6), (1000.0, 0.3)], 0.1)
    };

    let domain_age_score = if domain_age <= 0.0 {
        0.5
    } else {
        banded(domain_age, &[(365.0, 0.9), (1095.0, 0.6), (3650.0, 0.3)], 0.1)
    };

    let ip_reuse_score = if ip_reuse >= 0.3 {
        0.9
    } else if ip_reuse >= 0.2 {
        0.6
    } else if ip_reuse >= 0.1 {
        0.3
    } else {
        0.1
    };

    let registrar_reuse_score = if registrar_reuse >= 0.3 {
        0.8
    } else if registrar_reuse >= 0.2 {
        0.5
    } else if registrar_reuse >= 0.1 {
        0.3
    } else {
        0.1
    };

    let velocity_score = if velocity >= 0.5 {
        0.8
    } else if velocity >= 0.3 {
        0.5
    } else if velocity >= 0.1 {
        0.3
    } else {
        0.1
    };

    let anchor_quality_score = if money_anchor > 0.0 {
        0.9
    } else if anchor_length < 5.0 {
        0.6
    } else if anchor_length > 100.0 {
        0.4
    } else {
        0.2
    };

    let dofollow_score = if features.dofollow() > 0.0 { 0.6 } else { 0.3 };

    let safe_browsing_score = match backlink.safe_browsing_status.as_deref() {
        Some("flagged") => 0.95,
        Some("clean") => 0.1,
        _ => 0.5,
    };

    let weighted_sum = domain_rank_score * 0.14
        + domain_age_score * 0.14
        + ip_reuse_score * 0.18
        + registrar_reuse_score * 0.14
        + velocity_score * 0.13
        + anchor_quality_score * 0.12
        + dofollow_score * 0.05
        + safe_browsing_score * 0.08;

    let mut probability =
        weighted_sum + name_suspicion * 0.08 + hosting_pattern * 0.07 + spam_norm * 0.20;

    let high_risk_network = domain_rank < 500.0 && (ip_reuse > 0.3 || registrar_reuse > 0.3);
    let new_domain_cluster =
        domain_age < 365.0 && (ip_reuse > 0.2 || registrar_reuse > 0.2) && velocity > 0.4;
    let spam_network = (money_anchor > 0.5
        && (ip_reuse > 0.2 || registrar_reuse > 0.2)
        && name_suspicion > 0.5)
        || (spam_norm > 0.6 && (ip_reuse > 0.2 || registrar_reuse > 0.2))
        || spam_norm > 0.8;

    if high_risk_network {
        probability *= 1.20;
    }
    if new_domain_cluster {
        probability *= 1.15;
    }
    if spam_network {
        probability *= 1.25;
    }

    if spam_norm > 0.7 {
        probability += 0.15;
    } else if spam_norm > 0.5 {
        probability += 0.10;
    }

    if domain_rank > 0.0 && domain_rank < 10.0 {
        probability += 0.10;
    } else if domain_rank > 0.0 && domain_rank < 50.0 {
        probability += 0.05;
    }

    probability.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::features::extract;
    use crate::test_support::backlink;
    use chrono::Utc;

    #[test]
    fn clean_isolated_link_scores_low() {
        let now = Utc::now();
        let peers = vec![backlink()
            .domain_rank(Some(79.0))
            .spam_score(Some(0))
            .safe_browsing_status(Some("clean".to_string()))
            .build()];
        let agg = aggregate(&peers, now);
        let fv = extract(&peers[0], &agg);
        let p = BaseClassifier::Lightweight.predict(&fv, &peers[0]);
        assert!(p < 0.5, "expected low probability, got {p}");
    }

    #[test]
    fn flagged_safe_browsing_raises_probability_over_clean() {
        let now = Utc::now();
        let flagged = backlink()
            .domain_rank(Some(300.0))
            .safe_browsing_status(Some("flagged".to_string()))
            .build();
        let clean = backlink()
            .domain_rank(Some(300.0))
            .safe_browsing_status(Some("clean".to_string()))
            .build();
        let peers_flagged = vec![flagged.clone()];
        let peers_clean = vec![clean.clone()];
        let agg_f = aggregate(&peers_flagged, now);
        let agg_c = aggregate(&peers_clean, now);
        let p_flagged = BaseClassifier::Lightweight.predict(&extract(&flagged, &agg_f), &flagged);
        let p_clean = BaseClassifier::Lightweight.predict(&extract(&clean, &agg_c), &clean);
        assert!(p_flagged > p_clean);
    }

    #[test]
    fn learned_model_roundtrips_from_str() {
        let weights_str = "0.1 0.2 0.3 0.4 0.5 0.6 0.7 0.8 0.9 1.0 1.1 0.05";
        let model = LearnedModel::from_str(weights_str).expect("should parse");
        let fv = FeatureVector([0.0; crate::features::FEATURE_COUNT]);
        let p = model.predict(&fv);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn learned_model_rejects_wrong_length() {
        assert!(LearnedModel::from_str("0.1 0.2").is_none());
    }
}
