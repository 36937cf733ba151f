//! The reference workload and the seam to the execution engine.

use std::fmt;

use cinder_core::{BenchmarkConfig, Precision};
use cinder_select::DeviceCollection;
use serde::{Deserialize, Serialize};

/// Error type returned by a [`WorkloadRunner`].
pub type RunError = Box<dyn std::error::Error + Send + Sync>;

/// A fixed, documented workload run on every candidate device.
///
/// The default is a direct all-pairs gravitational n-body step over 16K
/// bodies in single precision, one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReferenceWorkload {
    pub bodies: usize,
    pub iterations: u32,
    pub precision: Precision,
}

impl ReferenceWorkload {
    /// 16K-body direct n-body, single precision, one step.
    pub fn nbody() -> Self {
        Self::from(&BenchmarkConfig::default())
    }

    /// Pairwise body interactions the workload computes.
    pub fn interactions(&self) -> u128 {
        let n = self.bodies as u128;
        n * n * u128::from(self.iterations)
    }
}

impl Default for ReferenceWorkload {
    fn default() -> Self {
        Self::nbody()
    }
}

impl From<&BenchmarkConfig> for ReferenceWorkload {
    fn from(config: &BenchmarkConfig) -> Self {
        Self {
            bodies: config.bodies,
            iterations: config.iterations,
            precision: config.precision,
        }
    }
}

impl fmt::Display for ReferenceWorkload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = match self.precision {
            Precision::Single => "f32",
            Precision::Double => "f64",
        };
        write!(
            f,
            "n-body {} bodies x{} ({precision})",
            self.bodies, self.iterations
        )
    }
}

/// The execution engine, as seen by the benchmark.
///
/// `run` must block until the workload has finished on every device in
/// `devices` (always exactly one here) or has failed.
pub trait WorkloadRunner: Send + Sync {
    fn run(
        &self,
        devices: &DeviceCollection,
        workload: &ReferenceWorkload,
    ) -> std::result::Result<(), RunError>;
}

impl<F> WorkloadRunner for F
where
    F: Fn(&DeviceCollection, &ReferenceWorkload) -> std::result::Result<(), RunError> + Send + Sync,
{
    fn run(
        &self,
        devices: &DeviceCollection,
        workload: &ReferenceWorkload,
    ) -> std::result::Result<(), RunError> {
        self(devices, workload)
    }
}
