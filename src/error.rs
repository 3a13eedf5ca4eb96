//! Construction-time errors.
//!
//! Selection and reward ingestion are total: once an [`OperatorSet`][crate::OperatorSet]
//! and a policy exist, nothing on the hot path returns an error.

use thiserror::Error;

/// Errors raised while building operators, operator sets, or simulations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("operator set is empty")]
    EmptyOperatorSet,
    #[error("duplicate operator name: {0}")]
    DuplicateOperator(String),
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("horizon must be at least 1")]
    ZeroHorizon,
    #[error("batch size must be at least 1")]
    ZeroBatch,
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("run count must be at least 1")]
    ZeroRuns,
    #[error("run {run} built {found} policies, expected {expected}")]
    PolicyCountMismatch {
        run: usize,
        expected: usize,
        found: usize,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reject non-finite values and values outside `[lo, hi]`.
pub(crate) fn check_range(name: &'static str, value: f64, lo: f64, hi: f64) -> Result<f64> {
    if value.is_finite() && value >= lo && value <= hi {
        Ok(value)
    } else {
        Err(Error::InvalidParameter { name, value })
    }
}
