//! Errors from benchmarking.

use thiserror::Error;

use crate::rank::ThroughputStrategy;

/// Convenience alias for results within the bench crate.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur while benchmarking or ranking by throughput.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The ranking strategy exists by name but has no implementation.
    #[error("ranking strategy '{strategy}' is not supported")]
    Unsupported { strategy: ThroughputStrategy },

    /// The benchmark settings cannot produce a measurement.
    #[error("invalid benchmark configuration: {detail}")]
    InvalidConfig { detail: String },

    /// A device could not run the reference workload.
    #[error("benchmark failed on '{device}': {detail}")]
    BenchmarkFailure { device: String, detail: String },

    #[error(transparent)]
    Select(#[from] cinder_select::SelectError),
}
