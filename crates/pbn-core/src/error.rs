//! Library error type.
//!
//! `pbn-core` never panics across its public boundary under normal
//! operation; the one place panics can originate (a parallel scoring
//! worker) is caught and folded into `DetectorError::Internal` rather than
//! propagated, per the per-item failure isolation contract on `Detector::score`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal scoring failure: {0}")]
    Internal(String),
}
