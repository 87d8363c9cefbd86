//! PBN detector metrics - collection and Prometheus text-format export.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct MetricsCollector {
    requests_total: AtomicU64,
    requests_failed: AtomicU64,
    items_scored: AtomicU64,
    high_risk_items: AtomicU64,
    medium_risk_items: AtomicU64,
    low_risk_items: AtomicU64,
    latency_ms_sum: AtomicU64,
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_failed: u64,
    pub items_scored: u64,
    pub high_risk_items: u64,
    pub medium_risk_items: u64,
    pub low_risk_items: u64,
    pub average_latency_ms: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, failed: bool, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_ms_sum.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_item(&self, high: u64, medium: u64, low: u64) {
        self.items_scored.fetch_add(high + medium + low, Ordering::Relaxed);
        self.high_risk_items.fetch_add(high, Ordering::Relaxed);
        self.medium_risk_items.fetch_add(medium, Ordering::Relaxed);
        self.low_risk_items.fetch_add(low, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.requests_total.load(Ordering::Relaxed);
        let latency_sum = self.latency_ms_sum.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests_total: total,
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            items_scored: self.items_scored.load(Ordering::Relaxed),
            high_risk_items: self.high_risk_items.load(Ordering::Relaxed),
            medium_risk_items: self.medium_risk_items.load(Ordering::Relaxed),
            low_risk_items: self.low_risk_items.load(Ordering::Relaxed),
            average_latency_ms: if total > 0 { latency_sum as f64 / total as f64 } else { 0.0 },
        }
    }

    /// Renders the current counters in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();
        format!(
            "# HELP pbn_requests_total Total detect requests served\n\
             # TYPE pbn_requests_total counter\n\
             pbn_requests_total {}\n\
             # HELP pbn_requests_failed_total Detect requests that returned 5xx\n\
             # TYPE pbn_requests_failed_total counter\n\
             pbn_requests_failed_total {}\n\
             # HELP pbn_items_scored_total Backlinks scored across all requests\n\
             # TYPE pbn_items_scored_total counter\n\
             pbn_items_scored_total {}\n\
             # HELP pbn_high_risk_items_total Items classified high risk\n\
             # TYPE pbn_high_risk_items_total counter\n\
             pbn_high_risk_items_total {}\n\
             # HELP pbn_medium_risk_items_total Items classified medium risk\n\
             # TYPE pbn_medium_risk_items_total counter\n\
             pbn_medium_risk_items_total {}\n\
             # HELP pbn_low_risk_items_total Items classified low risk\n\
             # TYPE pbn_low_risk_items_total counter\n\
             pbn_low_risk_items_total {}\n\
             # HELP pbn_average_latency_ms Average detect request latency in milliseconds\n\
             # TYPE pbn_average_latency_ms gauge\n\
             pbn_average_latency_ms {}\n",
            s.requests_total,
            s.requests_failed,
            s.items_scored,
            s.high_risk_items,
            s.medium_risk_items,
            s.low_risk_items,
            s.average_latency_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_at_zero() {
        let m = MetricsCollector::new();
        let s = m.snapshot();
        assert_eq!(s.requests_total, 0);
        assert_eq!(s.average_latency_ms, 0.0);
    }

    #[test]
    fn record_request_accumulates_latency_average() {
        let m = MetricsCollector::new();
        m.record_request(false, 10);
        m.record_request(false, 20);
        let s = m.snapshot();
        assert_eq!(s.requests_total, 2);
        assert_eq!(s.average_latency_ms, 15.0);
    }

    #[test]
    fn record_item_buckets_risk_counts() {
        let m = MetricsCollector::new();
        m.record_item(2, 3, 5);
        let s = m.snapshot();
        assert_eq!(s.items_scored, 10);
        assert_eq!(s.high_risk_items, 2);
        assert_eq!(s.medium_risk_items, 3);
        assert_eq!(s.low_risk_items, 5);
    }

    #[test]
    fn prometheus_render_contains_all_counters() {
        let m = MetricsCollector::new();
        m.record_request(false, 5);
        let text = m.render_prometheus();
        assert!(text.contains("pbn_requests_total 1"));
        assert!(text.contains("# TYPE pbn_requests_total counter"));
    }
}
