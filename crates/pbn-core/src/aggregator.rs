//! Network statistics precomputation.
//!
//! A single O(n) pass over the batch turns the per-item O(n) lookups that
//! the rule engine and feature extractor would otherwise need (shared-IP
//! counts, shared-registrar counts, velocity windows) into O(1) map
//! lookups, shared read-only across every subsequent per-item computation.

use ahash::AHashMap;
use chrono::{DateTime, Utc};

use crate::model::BacklinkSignal;

/// Cumulative first-seen counts within 7/30/90-day windows of the request's
/// pinned "now". Buckets are cumulative: `w7 <= w30 <= w90`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityWindows {
    pub w7: usize,
    pub w30: usize,
    pub w90: usize,
}

/// Precomputed, read-only statistics over one batch of peers.
#[derive(Debug, Clone)]
pub struct NetworkAggregate {
    ip_counts: AHashMap<String, usize>,
    registrar_counts: AHashMap<String, usize>,
    total_peers: usize,
    velocity: VelocityWindows,
    /// The instant velocity windows and temporal features were computed
    /// against - pinned once per request so scoring is deterministic.
    now: DateTime<Utc>,
    content_similarity_ratio: f64,
}

impl NetworkAggregate {
    pub fn ip_count(&self, ip: &str) -> usize {
        self.ip_counts.get(ip).copied().unwrap_or(0)
    }

    pub fn registrar_count(&self, registrar: &str) -> usize {
        self.registrar_counts.get(registrar).copied().unwrap_or(0)
    }

    pub fn total_peers(&self) -> usize {
        self.total_peers
    }

    pub fn velocity(&self) -> VelocityWindows {
        self.velocity
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn content_similarity_ratio(&self) -> f64 {
        self.content_similarity_ratio
    }

    pub fn with_content_similarity_ratio(mut self, ratio: f64) -> Self {
        self.content_similarity_ratio = ratio;
        self
    }

    pub fn ip_reuse_ratio(&self, ip: Option<&str>) -> f64 {
        match ip {
            Some(ip) if self.total_peers > 0 => self.ip_count(ip) as f64 / self.total_peers as f64,
            _ => 0.0,
        }
    }

    pub fn registrar_reuse_ratio(&self, registrar: Option<&str>) -> f64 {
        match registrar {
            Some(r) if self.total_peers > 0 => self.registrar_count(r) as f64 / self.total_peers as f64,
            _ => 0.0,
        }
    }
}

/// Builds a `NetworkAggregate` in one O(n) pass. Deterministic, no I/O.
/// `now` is the wall-clock instant pinned for this request.
pub fn aggregate(peers: &[BacklinkSignal], now: DateTime<Utc>) -> NetworkAggregate {
    let mut ip_counts: AHashMap<String, usize> = AHashMap::new();
    let mut registrar_counts: AHashMap<String, usize> = AHashMap::new();
    let mut w7 = 0usize;
    let mut w30 = 0usize;
    let mut w90 = 0usize;

    for peer in peers {
        if let Some(ip) = peer.ip.as_deref().filter(|s| !s.is_empty()) {
            *ip_counts.entry(ip.to_string()).or_insert(0) += 1;
        }
        if let Some(registrar) = peer.whois_registrar.as_deref().filter(|s| !s.is_empty()) {
            *registrar_counts.entry(registrar.to_string()).or_insert(0) += 1;
        }
        if let Some(first_seen) = peer.first_seen {
            let age_days = (now - first_seen).num_days();
            if age_days <= 90 {
                w90 += 1;
                if age_days <= 30 {
                    w30 += 1;
                    if age_days <= 7 {
                        w7 += 1;
                    }
                }
            }
        }
    }

    NetworkAggregate {
        ip_counts,
        registrar_counts,
        total_peers: peers.len(),
        velocity: VelocityWindows { w7, w30, w90 },
        now,
        content_similarity_ratio: 0.0,
    }
}
