//! Measured throughput ranking for Cinder.
//!
//! Static metadata (compute units, memory) is a coarse proxy for speed.
//! This crate ranks devices by actually running a fixed reference workload
//! on each one, one device at a time, through the external execution engine
//! behind [`WorkloadRunner`].

pub mod error;
pub mod rank;
pub mod runner;
pub mod workload;

pub use error::{BenchError, Result};
pub use rank::{ThroughputRank, ThroughputRanking, ThroughputStrategy};
pub use runner::{BenchmarkRunner, Measurement, Outcome};
pub use workload::{ReferenceWorkload, RunError, WorkloadRunner};
