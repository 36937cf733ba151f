//! Selection layer for Cinder.
//!
//! Narrows a host's compute devices down to the set a parallel workload
//! should run on:
//!
//! ```text
//!    NativeRuntime ──► PlatformCatalog ──► DeviceCollection ──► ordered DeviceCollection
//!                      (platform filters)  (kind/vendor/memory   (compute units, memory,
//!                                           filters)              measured throughput*)
//! ```
//!
//! Filters keep the original relative order and return `None` when nothing
//! matches. Every result is a fresh collection; inputs are never mutated.
//!
//! *Measured throughput ranking lives in `cinder-bench`.

pub mod catalog;
pub mod collection;
pub mod error;
pub mod filter;
pub mod rank;
pub mod report;

pub use catalog::PlatformCatalog;
pub use collection::DeviceCollection;
pub use error::{MatchExt, Result, SelectError};
pub use filter::{fold, matches_any, Vendor};
pub use report::{catalog_report, device_report, format_gb, summaries_json, DeviceSummary};
