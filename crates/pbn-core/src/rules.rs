//! Heuristic rule engine.
//!
//! Evaluates independent graph/temporal/lexical rules into a
//! `{rule_name -> score}` map, then applies deterministic rule-chaining
//! multipliers when specific combinations co-occur.

use regex::Regex;
use std::sync::OnceLock;

use ahash::AHashMap;

use crate::aggregator::NetworkAggregate;
use crate::model::BacklinkSignal;

pub const SHARED_IP_NETWORK: &str = "shared_ip_network";
pub const SHARED_REGISTRAR_NETWORK: &str = "shared_registrar_network";
pub const ANCHOR_QUALITY: &str = "anchor_quality";
pub const VELOCITY_SPIKE: &str = "velocity_spike";
pub const DOMAIN_QUALITY: &str = "domain_quality";
pub const COMPOSITE_RISK: &str = "composite_risk";
pub const DATAFORSEO_SPAM_SCORE: &str = "dataforseo_spam_score";

/// All rule names the engine can ever emit, for validating `reasons`.
pub const RULE_NAMES: &[&str] = &[
    SHARED_IP_NETWORK,
    SHARED_REGISTRAR_NETWORK,
    ANCHOR_QUALITY,
    VELOCITY_SPIKE,
    DOMAIN_QUALITY,
    COMPOSITE_RISK,
    DATAFORSEO_SPAM_SCORE,
];

const ANCHOR_HIGH_RISK: &[&str] = &["casino", "poker", "adult", "viagra", "cialis", "loan", "debt"];
const ANCHOR_MEDIUM_RISK: &[&str] = &["buy", "cheap", "discount", "free"];
const ANCHOR_PUNCTUATION: &[&str] = &["!!!", "$$$", "click here"];
const COMPOSITE_ANCHOR_WORDS: &[&str] = &["buy", "cheap", "casino"];

fn digit_cluster_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4,}").unwrap())
}

/// An ordered `{rule_name -> score}` map - insertion order is evaluation
/// order, matching the `reasons` ordering contract.
pub type RuleScores = AHashMap<String, f64>;

/// Evaluates every rule for one backlink against the shared network
/// aggregate. Rule evaluation order is fixed; `reasons` derived from this
/// map must preserve it (callers iterate `RULE_NAMES` order, not map order,
/// since `AHashMap` does not preserve insertion order).
pub fn evaluate(backlink: &BacklinkSignal, agg: &NetworkAggregate) -> RuleScores {
    let mut scores = RuleScores::default();

    if let Some(s) = shared_ip_score(backlink, agg) {
        scores.insert(SHARED_IP_NETWORK.to_string(), s);
    }
    if let Some(s) = shared_registrar_score(backlink, agg) {
        scores.insert(SHARED_REGISTRAR_NETWORK.to_string(), s);
    }
    if let Some(s) = anchor_quality_score(backlink) {
        scores.insert(ANCHOR_QUALITY.to_string(), s);
    }
    if let Some(s) = velocity_spike_score(agg) {
        scores.insert(VELOCITY_SPIKE.to_string(), s);
    }
    if let Some(s) = domain_quality_score(backlink) {
        scores.insert(DOMAIN_QUALITY.to_string(), s);
    }
    if let Some(s) = composite_risk_score(backlink, agg) {
        scores.insert(COMPOSITE_RISK.to_string(), s);
    }
    if let Some(s) = dataforseo_spam_score(backlink) {
        scores.insert(DATAFORSEO_SPAM_SCORE.to_string(), s);
    }

    apply_chaining(&mut scores);
    scores
}

fn shared_ip_score(backlink: &BacklinkSignal, agg: &NetworkAggregate) -> Option<f64> {
    let ip = backlink.ip.as_deref()?;
    tiered_share_score(agg.ip_count(ip), agg.total_peers(), 0.3, 0.2, 0.1)
}

fn shared_registrar_score(backlink: &BacklinkSignal, agg: &NetworkAggregate) -> Option<f64> {
    let registrar = backlink.whois_registrar.as_deref()?;
    tiered_share_score(agg.registrar_count(registrar), agg.total_peers(), 0.25, 0.15, 0.1)
}

fn tiered_share_score(count: usize, total: usize, high: f64, mid: f64, low: f64) -> Option<f64> {
    if count == 0 {
        return None;
    }
    let total = total.max(1) as f64;
    let share = count as f64 / total;
    if count >= 10 && share >= 0.4 {
        Some(high)
    } else if count >= 5 && share >= 0.2 {
        Some(mid)
    } else if count >= 3 {
        Some(low)
    } else {
        None
    }
}

fn anchor_quality_score(backlink: &BacklinkSignal) -> Option<f64> {
    let anchor = backlink.anchor.as_deref()?;
    if anchor.is_empty() {
        return None;
    }
    let lower = anchor.to_lowercase();
    if ANCHOR_HIGH_RISK.iter().any(|w| lower.contains(w)) {
        Some(0.3)
    } else if ANCHOR_MEDIUM_RISK.iter().any(|w| lower.contains(w)) {
        Some(0.2)
    } else if ANCHOR_PUNCTUATION.iter().any(|p| lower.contains(p)) {
        Some(0.15)
    } else {
        None
    }
}

fn velocity_spike_score(agg: &NetworkAggregate) -> Option<f64> {
    let total = agg.total_peers().max(1) as f64;
    let v = agg.velocity();
    let windows = [(v.w7 as f64, 0.2), (v.w30 as f64, 0.15), (v.w90 as f64, 0.1)];
    let mut max_score: f64 = 0.0;
    for (count, base) in windows {
        if count / total >= 0.5 {
            max_score = max_score.max(base);
        }
    }
    if max_score > 0.0 {
        Some(max_score)
    } else {
        None
    }
}

fn domain_quality_score(backlink: &BacklinkSignal) -> Option<f64> {
    let mut score: f64 = 0.0;
    if let Some(rank) = backlink.domain_rank {
        if rank < 50.0 {
            score += 0.15;
        }
    }
    if let Some(age) = backlink.domain_age_days {
        if age < 180 {
            score += 0.1;
        }
    }
    if let Some(domain) = backlink.domain_from.as_deref() {
        let lower = domain.to_lowercase();
        if digit_cluster_re().is_match(&lower) || lower.len() < 6 {
            score += 0.1;
        }
    }
    let score = score.min(0.25);
    if score > 0.0 {
        Some(score)
    } else {
        None
    }
}

fn composite_risk_score(backlink: &BacklinkSignal, agg: &NetworkAggregate) -> Option<f64> {
    let mut factors = 0;

    let low_rank_young = backlink.domain_rank.is_some_and(|r| r < 200.0)
        && backlink.domain_age_days.is_some_and(|a| a < 365);
    if low_rank_young {
        factors += 1;
    }

    if let Some(ip) = backlink.ip.as_deref() {
        if agg.ip_count(ip) >= 3 {
            factors += 1;
        }
    }

    let risky_anchor = backlink
        .anchor
        .as_deref()
        .map(|a| {
            let lower = a.to_lowercase();
            COMPOSITE_ANCHOR_WORDS.iter().any(|w| lower.contains(w))
        })
        .unwrap_or(false);
    if risky_anchor {
        factors += 1;
    }

    match factors {
        f if f >= 3 => Some(0.2),
        f if f >= 2 => Some(0.12),
        f if f >= 1 => Some(0.05),
        _ => None,
    }
}

/// Fuzzy membership `mu(s)`: 1.0 at s>=80, linear 0.5->1.0 on [60,80), linear
/// 0.0->0.5 on [40,60), else 0.0.
fn spam_membership(spam_score: i32) -> f64 {
    let s = spam_score as f64;
    if s >= 80.0 {
        1.0
    } else if s >= 60.0 {
        0.5 + (s - 60.0) / 20.0 * 0.5
    } else if s >= 40.0 {
        (s - 40.0) / 20.0 * 0.5
    } else {
        0.0
    }
}

fn dataforseo_spam_score(backlink: &BacklinkSignal) -> Option<f64> {
    let mu = spam_membership(backlink.backlink_spam_score?);
    if mu >= 0.9 {
        Some(0.3)
    } else if mu >= 0.5 {
        Some(0.2)
    } else if mu > 0.0 {
        Some(0.1)
    } else {
        None
    }
}

fn apply_chaining(scores: &mut RuleScores) {
    let has = |scores: &RuleScores, name: &str| scores.contains_key(name);

    if has(scores, DATAFORSEO_SPAM_SCORE) && has(scores, SHARED_IP_NETWORK) {
        if let Some(v) = scores.get_mut(DATAFORSEO_SPAM_SCORE) {
            *v *= 1.2;
        }
        if let Some(v) = scores.get_mut(SHARED_IP_NETWORK) {
            *v *= 1.2;
        }
    }
    if has(scores, SHARED_REGISTRAR_NETWORK) && has(scores, DOMAIN_QUALITY) {
        if let Some(v) = scores.get_mut(DOMAIN_QUALITY) {
            *v *= 1.3;
        }
    }
    if has(scores, SHARED_IP_NETWORK) && has(scores, DOMAIN_QUALITY) {
        if let Some(v) = scores.get_mut(DOMAIN_QUALITY) {
            *v *= 1.2;
        }
    }
}

/// Rule names in the fixed evaluation order, for building `reasons`.
pub fn ordered_reasons(scores: &RuleScores) -> Vec<String> {
    RULE_NAMES
        .iter()
        .filter(|name| scores.contains_key(**name))
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::test_support::backlink;
    use chrono::Utc;

    #[test]
    fn shared_ip_cluster_of_ten_triggers_max_score() {
        let now = Utc::now();
        let peers: Vec<_> = (0..10).map(|_| backlink().ip_str("9.9.9.9").build()).collect();
        let agg = aggregate(&peers, now);
        let scores = evaluate(&peers[0], &agg);
        assert_eq!(scores.get(SHARED_IP_NETWORK).copied(), Some(0.3));
    }

    #[test]
    fn spam_score_80_triggers_top_tier() {
        let now = Utc::now();
        let peers = vec![backlink().spam_score(Some(85)).build()];
        let agg = aggregate(&peers, now);
        let scores = evaluate(&peers[0], &agg);
        assert_eq!(scores.get(DATAFORSEO_SPAM_SCORE).copied(), Some(0.3));
    }

    #[test]
    fn spam_score_below_40_does_not_trigger() {
        let now = Utc::now();
        let peers = vec![backlink().spam_score(Some(10)).build()];
        let agg = aggregate(&peers, now);
        let scores = evaluate(&peers[0], &agg);
        assert!(!scores.contains_key(DATAFORSEO_SPAM_SCORE));
    }

    #[test]
    fn chaining_boosts_domain_quality_with_shared_ip() {
        let now = Utc::now();
        let peers: Vec<_> = (0..10)
            .map(|_| {
                backlink()
                    .ip_str("9.9.9.9")
                    .domain_rank(Some(10.0))
                    .build()
            })
            .collect();
        let agg = aggregate(&peers, now);
        let scores = evaluate(&peers[0], &agg);
        let unchained = 0.15_f64.min(0.25);
        assert!(scores.get(DOMAIN_QUALITY).copied().unwrap() > unchained);
    }

    #[test]
    fn ordered_reasons_follow_rule_name_order_not_insertion() {
        let now = Utc::now();
        let peers = vec![backlink()
            .spam_score(Some(90))
            .anchor_str("casino bonus")
            .build()];
        let agg = aggregate(&peers, now);
        let scores = evaluate(&peers[0], &agg);
        let reasons = ordered_reasons(&scores);
        let anchor_idx = reasons.iter().position(|r| r == ANCHOR_QUALITY).unwrap();
        let spam_idx = reasons.iter().position(|r| r == DATAFORSEO_SPAM_SCORE).unwrap();
        assert!(anchor_idx < spam_idx);
    }
}
