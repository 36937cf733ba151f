//! Ranking by measured throughput.

use std::fmt;

use cinder_core::DeviceConfig;
use cinder_select::DeviceCollection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BenchError, Result};
use crate::runner::{BenchmarkRunner, Measurement};

/// How to turn benchmark runs into an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThroughputStrategy {
    /// One timed run per device; fastest first.
    Measured,
    /// Interpolated from runs at several workload sizes.
    Interpolated,
    /// Repeated runs, preferring devices with stable timings.
    LeastVariance,
}

impl fmt::Display for ThroughputStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Measured => "measured",
            Self::Interpolated => "interpolated",
            Self::LeastVariance => "least-variance",
        };
        write!(f, "{s}")
    }
}

/// A collection ordered fastest first, with the runs that ordered it.
#[derive(Debug, Clone)]
pub struct ThroughputRanking {
    /// The devices that were benchmarked, fastest first. Devices whose run
    /// failed or timed out follow in their prior relative order.
    pub devices: DeviceCollection,
    /// `measurements[i]` is the run of `devices[i]`.
    pub measurements: Vec<Measurement>,
    /// Devices left out of `devices`: not rebuilt, or blocked by an
    /// earlier run that never finished. In input order.
    pub excluded: Vec<Measurement>,
}

impl ThroughputRanking {
    /// Every measurement that did not complete, ranked or excluded.
    pub fn failures(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements
            .iter()
            .filter(|m| m.elapsed().is_none())
            .chain(self.excluded.iter())
    }
}

/// Throughput orderings on a [`DeviceCollection`].
pub trait ThroughputRank {
    /// Benchmark each device alone and order fastest first.
    fn ordered_by_measured_throughput_descending(
        &self,
        runner: &BenchmarkRunner,
        config: DeviceConfig,
    ) -> Result<ThroughputRanking>;

    /// Not implemented; always [`BenchError::Unsupported`].
    fn ordered_by_interpolated_throughput_descending(
        &self,
        runner: &BenchmarkRunner,
        config: DeviceConfig,
    ) -> Result<ThroughputRanking>;

    /// Not implemented; always [`BenchError::Unsupported`].
    fn ordered_by_least_variance_throughput_descending(
        &self,
        runner: &BenchmarkRunner,
        config: DeviceConfig,
    ) -> Result<ThroughputRanking>;

    /// Dispatch on `strategy`.
    fn ranked_by(
        &self,
        strategy: ThroughputStrategy,
        runner: &BenchmarkRunner,
        config: DeviceConfig,
    ) -> Result<ThroughputRanking> {
        match strategy {
            ThroughputStrategy::Measured => {
                self.ordered_by_measured_throughput_descending(runner, config)
            }
            ThroughputStrategy::Interpolated => {
                self.ordered_by_interpolated_throughput_descending(runner, config)
            }
            ThroughputStrategy::LeastVariance => {
                self.ordered_by_least_variance_throughput_descending(runner, config)
            }
        }
    }
}

impl ThroughputRank for DeviceCollection {
    fn ordered_by_measured_throughput_descending(
        &self,
        runner: &BenchmarkRunner,
        config: DeviceConfig,
    ) -> Result<ThroughputRanking> {
        info!(devices = self.len(), workload = %runner.workload(), "ranking by measured throughput");
        let mut runs = runner.run_all(self, config);
        runs.sort_by_key(|run| run.measurement.rank_key());

        let mut devices = Vec::with_capacity(runs.len());
        let mut measurements = Vec::with_capacity(runs.len());
        let mut excluded = Vec::new();
        for run in runs {
            match run.device {
                Some(device) => {
                    devices.push(device);
                    measurements.push(run.measurement);
                }
                None => {
                    warn!(position = run.measurement.position, device = %run.measurement.device, "device left out of the ranking");
                    excluded.push(run.measurement);
                }
            }
        }
        excluded.sort_by_key(|m| m.position);

        Ok(ThroughputRanking {
            devices: DeviceCollection::from_devices(devices),
            measurements,
            excluded,
        })
    }

    fn ordered_by_interpolated_throughput_descending(
        &self,
        _runner: &BenchmarkRunner,
        _config: DeviceConfig,
    ) -> Result<ThroughputRanking> {
        Err(BenchError::Unsupported {
            strategy: ThroughputStrategy::Interpolated,
        })
    }

    fn ordered_by_least_variance_throughput_descending(
        &self,
        _runner: &BenchmarkRunner,
        _config: DeviceConfig,
    ) -> Result<ThroughputRanking> {
        Err(BenchError::Unsupported {
            strategy: ThroughputStrategy::LeastVariance,
        })
    }
}
