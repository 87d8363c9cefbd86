//! Enhanced (optional) feature extractor.
//!
//! Everything here is additive-only on top of the base classifier
//! probability: temporal stability/clustering, graph density/clustering
//! coefficient, and statistical z-scores against the batch. Any failure to
//! compute (degenerate batch, missing timestamps) suppresses the boost
//! rather than propagating an error - the whole stage is best-effort.

use crate::aggregator::NetworkAggregate;
use crate::model::BacklinkSignal;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnhancedFeatures {
    pub link_stability: f64,
    pub temporal_clustering: f64,
    pub clustering_coefficient: f64,
    pub network_density: f64,
    pub rank_z_score: f64,
    pub age_z_score: f64,
    pub spam_z_score: f64,
}

impl EnhancedFeatures {
    /// Sums the boost contributions for thresholds the batch actually
    /// crosses, each bounded, total capped so no single enhanced signal can
    /// dominate the base probability.
    pub fn boost(&self) -> f64 {
        let mut boost: f64 = 0.0;
        if self.link_stability > 0.7 {
            boost += 0.10;
        }
        if self.temporal_clustering > 0.6 {
            boost += 0.10;
        }
        if self.clustering_coefficient > 0.5 {
            boost += 0.15;
        }
        if self.network_density > 0.6 {
            boost += 0.10;
        }
        if self.rank_z_score.abs() > 2.0 {
            boost += 0.05;
        }
        if self.age_z_score.abs() > 2.0 {
            boost += 0.05;
        }
        if self.spam_z_score > 2.0 {
            boost += 0.10;
        }
        boost.min(0.30)
    }
}

/// `1.0` when `first_seen` and `last_seen` are both present and close
/// together (a link that appeared and has not moved since); `0.5` when one
/// or both timestamps are missing, since stability can't be judged.
fn link_stability(backlink: &BacklinkSignal, now: chrono::DateTime<chrono::Utc>) -> f64 {
    match (backlink.first_seen, backlink.last_seen) {
        (Some(first), Some(last)) => {
            let span_days = (last - first).num_days().max(0) as f64;
            let age_days = (now - first).num_days().max(1) as f64;
            1.0 - (span_days / age_days).min(1.0)
        }
        _ => 0.5,
    }
}

/// Share of the batch that first appeared within the same 7-day window as
/// this backlink - a proxy for "was this link part of a coordinated push".
fn temporal_clustering(backlink: &BacklinkSignal, peers: &[BacklinkSignal]) -> f64 {
    let anchor = match backlink.first_seen {
        Some(t) => t,
        None => return 0.0,
    };
    let total = peers.len().max(1) as f64;
    let co_occurring = peers
        .iter()
        .filter(|p| match p.first_seen {
            Some(t) => (t - anchor).num_days().abs() <= 7,
            None => false,
        })
        .count() as f64;
    co_occurring / total
}

/// Fraction of peers sharing both IP and registrar with this backlink -
/// approximates local clustering coefficient over the shared-infrastructure
/// graph without materializing it.
fn clustering_coefficient(backlink: &BacklinkSignal, peers: &[BacklinkSignal]) -> f64 {
    let ip = backlink.ip.as_deref();
    let registrar = backlink.whois_registrar.as_deref();
    if ip.is_none() && registrar.is_none() {
        return 0.0;
    }
    let total = peers.len().max(1) as f64;
    let shared = peers
        .iter()
        .filter(|p| {
            let ip_match = ip.is_some() && p.ip.as_deref() == ip;
            let registrar_match = registrar.is_some() && p.whois_registrar.as_deref() == registrar;
            ip_match && registrar_match
        })
        .count() as f64;
    shared / total
}

/// Batch-wide density: average pairwise IP-or-registrar sharing rate.
fn network_density(agg: &NetworkAggregate, peers: &[BacklinkSignal]) -> f64 {
    let total = peers.len();
    if total < 2 {
        return 0.0;
    }
    let mut shared_pairs = 0usize;
    for peer in peers {
        let ip_count = peer.ip.as_deref().map(|ip| agg.ip_count(ip)).unwrap_or(0);
        let reg_count = peer
            .whois_registrar
            .as_deref()
            .map(|r| agg.registrar_count(r))
            .unwrap_or(0);
        if ip_count > 1 || reg_count > 1 {
            shared_pairs += 1;
        }
    }
    shared_pairs as f64 / total as f64
}

fn z_score(value: f64, mean: f64, stdev: f64) -> f64 {
    if stdev <= f64::EPSILON {
        0.0
    } else {
        (value - mean) / stdev
    }
}

fn mean_and_stdev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Computes the enhanced feature set for one backlink against its batch.
/// Degenerate inputs (single-item batch, all-missing timestamps) naturally
/// collapse every z-score and clustering signal to zero rather than
/// erroring - the caller always gets a valid, zero-boost result back.
pub fn extract(
    backlink: &BacklinkSignal,
    peers: &[BacklinkSignal],
    agg: &NetworkAggregate,
) -> EnhancedFeatures {
    let now = agg.now();

    let ranks: Vec<f64> = peers.iter().filter_map(|p| p.domain_rank).collect();
    let ages: Vec<f64> = peers.iter().filter_map(|p| p.domain_age_days).map(|a| a as f64).collect();
    let spams: Vec<f64> = peers
        .iter()
        .filter_map(|p| p.backlink_spam_score)
        .map(|s| s as f64)
        .collect();

    let (rank_mean, rank_sd) = mean_and_stdev(&ranks);
    let (age_mean, age_sd) = mean_and_stdev(&ages);
    let (spam_mean, spam_sd) = mean_and_stdev(&spams);

    let rank_z = backlink.domain_rank.map(|r| z_score(r, rank_mean, rank_sd)).unwrap_or(0.0);
    let age_z = backlink
        .domain_age_days
        .map(|a| z_score(a as f64, age_mean, age_sd))
        .unwrap_or(0.0);
    let spam_z = backlink
        .backlink_spam_score
        .map(|s| z_score(s as f64, spam_mean, spam_sd))
        .unwrap_or(0.0);

    EnhancedFeatures {
        link_stability: link_stability(backlink, now),
        temporal_clustering: temporal_clustering(backlink, peers),
        clustering_coefficient: clustering_coefficient(backlink, peers),
        network_density: network_density(agg, peers),
        rank_z_score: rank_z,
        age_z_score: age_z,
        spam_z_score: spam_z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::test_support::backlink;
    use chrono::Utc;

    #[test]
    fn single_item_batch_has_no_boost() {
        let now = Utc::now();
        let peers = vec![backlink().build()];
        let agg = aggregate(&peers, now);
        let ef = extract(&peers[0], &peers, &agg);
        assert_eq!(ef.boost(), 0.0);
    }

    #[test]
    fn shared_ip_and_registrar_cluster_raises_clustering_coefficient() {
        let now = Utc::now();
        let peers: Vec<_> = (0..5)
            .map(|_| backlink().ip_str("8.8.8.8").registrar_str("NameCheap").build())
            .collect();
        let agg = aggregate(&peers, now);
        let ef = extract(&peers[0], &peers, &agg);
        assert!(ef.clustering_coefficient > 0.5);
    }

    #[test]
    fn outlier_spam_score_has_large_z_score() {
        let now = Utc::now();
        let mut peers: Vec<_> = (0..9).map(|_| backlink().spam_score(Some(5)).build()).collect();
        peers.push(backlink().spam_score(Some(95)).build());
        let agg = aggregate(&peers, now);
        let ef = extract(&peers[9], &peers, &agg);
        assert!(ef.spam_z_score > 2.0);
    }

    #[test]
    fn boost_is_capped() {
        let ef = EnhancedFeatures {
            link_stability: 1.0,
            temporal_clustering: 1.0,
            clustering_coefficient: 1.0,
            network_density: 1.0,
            rank_z_score: 5.0,
            age_z_score: 5.0,
            spam_z_score: 5.0,
        };
        assert_eq!(ef.boost(), 0.30);
    }
}
