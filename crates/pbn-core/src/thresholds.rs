//! Adaptive risk thresholds.
//!
//! Starts from the configured `high_risk`/`medium_risk` cutoffs and nudges
//! them by batch size and, optionally, domain context: huge batches relax
//! the cutoff (more statistical corroboration per rule hit), tiny batches
//! tighten it, and a domain with a known-bad history tightens it further.

use crate::model::RiskLevel;

pub const DEFAULT_HIGH_RISK_THRESHOLD: f64 = 0.75;
pub const DEFAULT_MEDIUM_RISK_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct AdaptiveThresholds {
    pub low: f64,
    pub high: f64,
}

impl AdaptiveThresholds {
    pub fn classify(&self, probability: f64) -> RiskLevel {
        if probability >= self.high {
            RiskLevel::High
        } else if probability >= self.low {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Optional per-domain prior, supplied by the caller out of band (e.g. a
/// prior detection run against the same target domain).
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainContext {
    pub domain_authority: Option<f64>,
    pub historical_pbn_rate: Option<f64>,
}

fn nudge(t: &mut AdaptiveThresholds, delta: f64, high_bound: f64, low_bound: f64) {
    if delta >= 0.0 {
        t.high = (t.high + delta).min(high_bound);
        t.low = (t.low + delta).min(low_bound);
    } else {
        t.high = (t.high + delta).max(high_bound);
        t.low = (t.low + delta).max(low_bound);
    }
}

/// Computes the thresholds for this batch from the configured bases.
pub fn compute(
    total_peers: usize,
    high_risk_base: f64,
    medium_risk_base: f64,
    domain_context: Option<DomainContext>,
) -> AdaptiveThresholds {
    let mut t = AdaptiveThresholds { low: medium_risk_base, high: high_risk_base };

    if total_peers > 10_000 {
        nudge(&mut t, 0.05, 0.95, 0.85);
    } else if total_peers > 5_000 {
        nudge(&mut t, 0.03, 0.90, 0.80);
    } else if total_peers < 100 {
        nudge(&mut t, -0.05, 0.60, 0.40);
    }

    if let Some(ctx) = domain_context {
        if let Some(authority) = ctx.domain_authority {
            if authority > 80.0 {
                nudge(&mut t, 0.03, 0.90, 0.80);
            } else if authority < 30.0 {
                nudge(&mut t, -0.03, 0.60, 0.40);
            }
        }
        if let Some(rate) = ctx.historical_pbn_rate {
            if rate > 0.3 {
                nudge(&mut t, 0.05, 0.95, 0.85);
            } else if rate < 0.1 {
                nudge(&mut t, -0.03, 0.60, 0.40);
            }
        }
    }

    t
}
