//! Per-backlink feature extraction.
//!
//! Emits a fixed-length 11-dimensional vector consumed by both classifier
//! variants. Every sub-score is bounded; ties are resolved by the first
//! matching clause, in the order written below.

use regex::Regex;
use std::sync::OnceLock;

use crate::aggregator::NetworkAggregate;
use crate::model::BacklinkSignal;

pub const FEATURE_COUNT: usize = 11;

const HIGH_RISK_ANCHOR_WORDS: &[&str] = &[
    "casino", "poker", "adult", "viagra", "cialis", "loan", "debt", "forex", "crypto", "bitcoin",
];
const MEDIUM_RISK_ANCHOR_WORDS: &[&str] =
    &["buy", "cheap", "discount", "free", "click here", "visit now", "order now"];
const PUNCTUATION_PATTERNS: &[&str] = &["!!!", "$$$", "www.", "http"];

fn digit_cluster_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z]{3,}\d{3,}").unwrap())
}

/// `[anchor_length, money_anchor_score, domain_rank, dofollow, domain_age_days,
/// ip_reuse_ratio, registrar_reuse_ratio, link_velocity, domain_name_suspicion,
/// hosting_pattern, spam_score_normalized]`
#[derive(Debug, Clone, Copy)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn anchor_length(&self) -> f64 {
        self.0[0]
    }
    pub fn money_anchor_score(&self) -> f64 {
        self.0[1]
    }
    pub fn domain_rank(&self) -> f64 {
        self.0[2]
    }
    pub fn dofollow(&self) -> f64 {
        self.0[3]
    }
    pub fn domain_age_days(&self) -> f64 {
        self.0[4]
    }
    pub fn ip_reuse_ratio(&self) -> f64 {
        self.0[5]
    }
    pub fn registrar_reuse_ratio(&self) -> f64 {
        self.0[6]
    }
    pub fn link_velocity(&self) -> f64 {
        self.0[7]
    }
    pub fn domain_name_suspicion(&self) -> f64 {
        self.0[8]
    }
    pub fn hosting_pattern(&self) -> f64 {
        self.0[9]
    }
    pub fn spam_score_normalized(&self) -> f64 {
        self.0[10]
    }
}

pub fn money_anchor_score(anchor: Option<&str>) -> f64 {
    let anchor = match anchor {
        Some(a) if !a.is_empty() => a,
        _ => return 0.0,
    };
    let lower = anchor.to_lowercase();
    if HIGH_RISK_ANCHOR_WORDS.iter().any(|w| lower.contains(w)) {
        return 1.0;
    }
    if MEDIUM_RISK_ANCHOR_WORDS.iter().any(|w| lower.contains(w)) {
        return 0.6;
    }
    if PUNCTUATION_PATTERNS.iter().any(|p| lower.contains(p)) {
        return 0.4;
    }
    let has_alpha = anchor.chars().any(|c| c.is_alphabetic());
    let all_upper = anchor.chars().all(|c| !c.is_alphabetic() || c.is_uppercase());
    if anchor.len() > 5 && has_alpha && all_upper {
        return 0.3;
    }
    0.0
}

pub fn domain_name_suspicion(domain: Option<&str>) -> f64 {
    let domain = match domain {
        Some(d) if !d.is_empty() => d.to_lowercase(),
        _ => return 0.0,
    };
    let mut score: f64 = 0.0;
    if digit_cluster_re().is_match(&domain) {
        score += 0.4;
    }
    let digit_ratio = domain.chars().filter(|c| c.is_ascii_digit()).count() as f64 / domain.len() as f64;
    if digit_ratio > 0.3 {
        score += 0.3;
    }
    if domain.len() < 6 || domain.len() > 30 {
        score += 0.2;
    }
    if domain.matches('-').count() > 2 {
        score += 0.2;
    }
    score.min(1.0)
}

fn link_velocity(backlink: &BacklinkSignal, agg: &NetworkAggregate) -> f64 {
    if backlink.first_seen.is_none() {
        return 0.0;
    }
    let total = agg.total_peers().max(1) as f64;
    let v = agg.velocity();
    let w7 = v.w7 as f64 / total;
    let w30 = v.w30 as f64 / total;
    let w90 = v.w90 as f64 / total;
    0.5 * w7 + 0.3 * w30 + 0.2 * w90
}

/// Builds the 11-dimensional feature vector for one backlink against the
/// precomputed network aggregate.
pub fn extract(backlink: &BacklinkSignal, agg: &NetworkAggregate) -> FeatureVector {
    let anchor_length = backlink.anchor.as_deref().map(str::len).unwrap_or(0) as f64;
    let money_anchor = money_anchor_score(backlink.anchor.as_deref());
    let domain_rank = backlink.domain_rank.unwrap_or(0.0);
    let dofollow = if backlink.dofollow.unwrap_or(false) { 1.0 } else { 0.0 };
    let domain_age = backlink.domain_age_days.unwrap_or(0) as f64;
    let ip_reuse = agg.ip_reuse_ratio(backlink.ip.as_deref());
    let registrar_reuse = agg.registrar_reuse_ratio(backlink.whois_registrar.as_deref());
    let velocity = link_velocity(backlink, agg);
    let name_suspicion = domain_name_suspicion(backlink.domain_from.as_deref());
    // Reserved for a future, distinct hosting-provider signal; for now an
    // alias of ip_reuse_ratio per spec.
    let hosting_pattern = ip_reuse;
    let spam_normalized = backlink
        .backlink_spam_score
        .map(|s| (s as f64 / 100.0).clamp(0.0, 1.0))
        .unwrap_or(0.5);

    FeatureVector([
        anchor_length,
        money_anchor,
        domain_rank,
        dofollow,
        domain_age,
        ip_reuse,
        registrar_reuse,
        velocity,
        name_suspicion,
        hosting_pattern,
        spam_normalized,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::test_support::backlink;
    use chrono::Utc;

    #[test]
    fn money_anchor_high_risk_beats_medium() {
        assert_eq!(money_anchor_score(Some("buy casino chips")), 1.0);
    }

    #[test]
    fn money_anchor_medium_risk() {
        assert_eq!(money_anchor_score(Some("cheap widgets")), 0.6);
    }

    #[test]
    fn money_anchor_punctuation() {
        assert_eq!(money_anchor_score(Some("visit www.example.com")), 0.4);
    }

    #[test]
    fn money_anchor_all_caps() {
        assert_eq!(money_anchor_score(Some("CLICKNOW")), 0.3);
    }

    #[test]
    fn money_anchor_clean() {
        assert_eq!(money_anchor_score(Some("read our guide")), 0.0);
    }

    #[test]
    fn domain_suspicion_digit_cluster() {
        assert!(domain_name_suspicion(Some("abc123xyz999")) >= 0.4);
    }

    #[test]
    fn domain_suspicion_capped_at_one() {
        assert!(domain_name_suspicion(Some("ab12-34-56-78-90")) <= 1.0);
    }

    #[test]
    fn spam_score_absent_defaults_to_half() {
        let now = Utc::now();
        let peers = vec![backlink().build()];
        let agg = aggregate(&peers, now);
        let fv = extract(&peers[0], &agg);
        assert_eq!(fv.spam_score_normalized(), 0.5);
    }

    #[test]
    fn ip_reuse_ratio_zero_when_null() {
        let now = Utc::now();
        let peers = vec![backlink().build(), backlink().ip_str("1.2.3.4").build()];
        let agg = aggregate(&peers, now);
        let fv = extract(&peers[0], &agg);
        assert_eq!(fv.ip_reuse_ratio(), 0.0);
    }

    #[test]
    fn link_velocity_zero_without_first_seen() {
        let now = Utc::now();
        let peers = vec![backlink().build()];
        let agg = aggregate(&peers, now);
        assert_eq!(extract(&peers[0], &agg).link_velocity(), 0.0);
    }
}
