//! Human-readable reports and structured device summaries.
//!
//! Reports are advisory text for logs; their layout is not a stable format.
//! Use [`DeviceSummary`] and [`summaries_json`] when a machine needs to read
//! the selection.

use std::fmt::{self, Write as _};

use cinder_core::{DeviceDescriptor, DeviceKind, MemoryArchitecture};
use serde::Serialize;

use crate::catalog::PlatformCatalog;
use crate::collection::DeviceCollection;
use crate::error::Result;

/// Width of the `#i: name(vendor)` column in device reports.
const NAME_COLUMN: usize = 70;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Format a byte count in GB with two decimals.
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2}GB", bytes as f64 / GIB)
}

/// Multi-line report of the platforms in a catalog.
pub fn catalog_report(catalog: &PlatformCatalog) -> String {
    catalog.to_string()
}

/// Multi-line report of the devices in a collection.
pub fn device_report(devices: &DeviceCollection) -> String {
    devices.to_string()
}

impl fmt::Display for PlatformCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Selected platforms ---")?;
        if self.is_empty() {
            return writeln!(f, "No platforms found!");
        }
        for (i, p) in self.iter().enumerate() {
            writeln!(f, "#{i}:")?;
            writeln!(f, "  Platform name: {}", p.name().trim())?;
            writeln!(f, "  Vendor name..: {}", p.vendor().trim())?;
            writeln!(
                f,
                "  Devices......: CPUs={}  GPUs={}  Accelerators={}",
                p.device_count(DeviceKind::Cpu),
                p.device_count(DeviceKind::Gpu),
                p.device_count(DeviceKind::Accelerator),
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for DeviceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Selected devices ---")?;
        if self.is_empty() {
            return writeln!(f, "No devices found!");
        }
        for (i, d) in self.iter().enumerate() {
            writeln!(
                f,
                "{}  compute units: {:>3}  type: {:<11}  memory: {}",
                name_column(i, d),
                d.compute_units(),
                d.kind().label(),
                format_gb(d.memory_size()),
            )?;
        }
        Ok(())
    }
}

/// `#i: name(vendor)` padded or cut to [`NAME_COLUMN`] characters.
fn name_column(index: usize, device: &DeviceDescriptor) -> String {
    let mut label = String::new();
    let _ = write!(
        label,
        "#{index}: {}({})",
        device.name().trim(),
        device.vendor().trim()
    );
    let width = label.chars().count();
    if width > NAME_COLUMN {
        label.chars().take(NAME_COLUMN).collect()
    } else {
        label.extend(std::iter::repeat(' ').take(NAME_COLUMN - width));
        label
    }
}

/// Serializable snapshot of one selected device and its effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceSummary {
    pub platform: String,
    pub kind: DeviceKind,
    pub index_within_kind: usize,
    pub name: String,
    pub vendor: String,
    pub compute_units: u32,
    pub memory_bytes: u64,
    pub memory_architecture: MemoryArchitecture,
    pub partition_enabled: bool,
    pub streaming_enabled: bool,
    pub max_cpu_cores: Option<u32>,
}

impl From<&DeviceDescriptor> for DeviceSummary {
    fn from(d: &DeviceDescriptor) -> Self {
        let config = d.config();
        Self {
            platform: d.platform().name().trim().to_string(),
            kind: d.kind(),
            index_within_kind: d.index_within_kind(),
            name: d.name().trim().to_string(),
            vendor: d.vendor().trim().to_string(),
            compute_units: d.compute_units(),
            memory_bytes: d.memory_size(),
            memory_architecture: d.memory_architecture(),
            partition_enabled: config.partition_enabled,
            streaming_enabled: config.streaming_enabled,
            max_cpu_cores: config.max_cpu_cores,
        }
    }
}

impl DeviceCollection {
    /// One summary per device, in collection order.
    pub fn summaries(&self) -> Vec<DeviceSummary> {
        self.iter().map(DeviceSummary::from).collect()
    }
}

/// Pretty JSON array of device summaries.
pub fn summaries_json(devices: &DeviceCollection) -> Result<String> {
    Ok(serde_json::to_string_pretty(&devices.summaries())?)
}
