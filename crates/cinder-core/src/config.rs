//! `cinder.toml` configuration.
//!
//! ```toml
//! [device]
//! partition-enabled = true
//! streaming-enabled = false
//! max-cpu-cores = 4
//!
//! [benchmark]
//! bodies = 16384
//! iterations = 1
//! precision = "single"
//! timeout-ms = 60000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::DeviceConfig;
use crate::error::{CoreError, Result, ValidationIssue};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CinderConfig {
    /// Settings applied when devices are built or rebuilt.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Reference benchmark settings.
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

/// Floating-point precision of the reference workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Precision {
    #[default]
    Single,
    Double,
}

/// Reference benchmark settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BenchmarkConfig {
    /// Bodies in the n-body reference simulation.
    pub bodies: usize,
    /// Simulation steps per device.
    pub iterations: u32,
    pub precision: Precision,
    /// Per-device limit; a device that runs longer is ranked last.
    pub timeout_ms: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            bodies: 16 * 1024,
            iterations: 1,
            precision: Precision::Single,
            timeout_ms: 60_000,
        }
    }
}

impl BenchmarkConfig {
    /// The per-device timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Load a configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CinderConfig> {
    if !path.exists() {
        return Err(CoreError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse a configuration from a TOML string.
pub fn parse_config(toml_str: &str) -> Result<CinderConfig> {
    let config: CinderConfig = toml::from_str(toml_str)?;
    Ok(config)
}

/// Serialize a configuration to pretty TOML.
pub fn config_to_toml(config: &CinderConfig) -> Result<String> {
    let toml_str = toml::to_string_pretty(config)?;
    Ok(toml_str)
}

/// Validate a configuration.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
pub fn validate_config(config: &CinderConfig) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = validate_benchmark(&config.benchmark).err().unwrap_or_default();

    match config.device.max_cpu_cores {
        Some(0) => issues.push(ValidationIssue::error("max-cpu-cores must be positive when set")),
        Some(_) if !config.device.partition_enabled => issues.push(ValidationIssue::warning(
            "max-cpu-cores has no effect unless partition-enabled is true",
        )),
        _ => {}
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Validate the `[benchmark]` section on its own.
pub fn validate_benchmark(
    benchmark: &BenchmarkConfig,
) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if benchmark.bodies == 0 {
        issues.push(ValidationIssue::error("benchmark bodies must be positive"));
    }
    if benchmark.iterations == 0 {
        issues.push(ValidationIssue::error("benchmark iterations must be positive"));
    }
    if benchmark.timeout_ms == 0 {
        issues.push(ValidationIssue::error("benchmark timeout-ms must be positive"));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
