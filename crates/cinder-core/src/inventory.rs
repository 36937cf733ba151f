//! File-backed native runtime.
//!
//! An inventory describes platforms and their devices in TOML
//! (`*.inventory.toml`). [`InventoryRuntime`] serves that description through
//! [`NativeRuntime`], for hosts without a compute runtime and for tests.
//!
//! ```toml
//! [[platform]]
//! name = "NVIDIA CUDA"
//! vendor = "NVIDIA Corporation"
//!
//! [[platform.device]]
//! kind = "gpu"
//! name = "GeForce RTX 3080"
//! vendor = "NVIDIA Corporation"
//! compute-units = 68
//! memory-bytes = 10737418240
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::device::{DeviceConfig, DeviceKind};
use crate::error::{CoreError, Result, ValidationIssue};
use crate::native::{
    DeviceHandle, NativeRuntime, PlatformId, PlatformListHandle, RawDevice, RawPlatform,
};

/// A description of every platform on a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Inventory {
    /// Platforms in runtime enumeration order.
    #[serde(default, rename = "platform")]
    pub platforms: Vec<InventoryPlatform>,
}

/// One platform entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InventoryPlatform {
    pub name: String,
    pub vendor: String,
    /// Devices in runtime enumeration order.
    #[serde(default, rename = "device")]
    pub devices: Vec<InventoryDevice>,
}

/// One device entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct InventoryDevice {
    pub kind: DeviceKind,
    pub name: String,
    pub vendor: String,
    pub compute_units: u32,
    pub memory_bytes: u64,
    /// Shares host RAM (CPUs, integrated GPUs).
    #[serde(default)]
    pub host_unified_memory: bool,
}

impl InventoryPlatform {
    pub fn new(name: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            devices: Vec::new(),
        }
    }

    /// Append a device.
    pub fn with_device(mut self, device: InventoryDevice) -> Self {
        self.devices.push(device);
        self
    }

    fn count(&self, kind: DeviceKind) -> usize {
        self.devices.iter().filter(|d| d.kind == kind).count()
    }
}

impl InventoryDevice {
    pub fn new(
        kind: DeviceKind,
        name: impl Into<String>,
        vendor: impl Into<String>,
        compute_units: u32,
        memory_bytes: u64,
        host_unified_memory: bool,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            vendor: vendor.into(),
            compute_units,
            memory_bytes,
            host_unified_memory,
        }
    }
}

/// Load an inventory from a TOML file.
pub fn load_inventory_toml(path: &Path) -> Result<Inventory> {
    if !path.exists() {
        return Err(CoreError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_inventory_toml(&content)
}

/// Parse an inventory from a TOML string.
pub fn parse_inventory_toml(toml_str: &str) -> Result<Inventory> {
    let inventory: Inventory = toml::from_str(toml_str)?;
    Ok(inventory)
}

/// Validate an inventory for structural correctness.
///
/// Returns `Ok(())` if valid, or `Err(issues)` with a list of problems.
pub fn validate_inventory(inventory: &Inventory) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    for (i, platform) in inventory.platforms.iter().enumerate() {
        if platform.name.trim().is_empty() {
            issues.push(ValidationIssue::error(format!("platform #{i} has an empty name")));
        }
        if platform.devices.is_empty() {
            issues.push(ValidationIssue::warning(format!(
                "platform '{}' has no devices",
                platform.name
            )));
        }
        for (j, device) in platform.devices.iter().enumerate() {
            if device.name.trim().is_empty() {
                issues.push(ValidationIssue::error(format!(
                    "device #{j} on platform '{}' has an empty name",
                    platform.name
                )));
            }
            if device.compute_units == 0 {
                issues.push(ValidationIssue::error(format!(
                    "device '{}' on platform '{}' reports 0 compute units",
                    device.name, platform.name
                )));
            }
            if device.memory_bytes == 0 {
                issues.push(ValidationIssue::warning(format!(
                    "device '{}' on platform '{}' reports no memory",
                    device.name, platform.name
                )));
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// A [`NativeRuntime`] that serves an [`Inventory`].
#[derive(Debug)]
pub struct InventoryRuntime {
    inventory: Inventory,
    unavailable: Option<String>,
    open_lists: AtomicUsize,
    next_handle: AtomicU64,
}

impl InventoryRuntime {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory,
            unavailable: None,
            open_lists: AtomicUsize::new(0),
            next_handle: AtomicU64::new(1),
        }
    }

    /// A runtime that fails discovery, as on a host with no driver installed.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::new(Inventory::default())
        }
    }

    /// Load, validate, and serve an inventory file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let inventory = load_inventory_toml(path)?;
        if let Err(issues) = validate_inventory(&inventory) {
            let errors: Vec<String> = issues
                .iter()
                .filter(|i| i.is_error())
                .map(|i| i.message.clone())
                .collect();
            if !errors.is_empty() {
                return Err(CoreError::Validation {
                    detail: errors.join("; "),
                });
            }
            for issue in issues {
                tracing::warn!(path = %path.display(), "{}", issue.message);
            }
        }
        Ok(Self::new(inventory))
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Number of platform lists opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open_lists.load(Ordering::SeqCst)
    }

    fn fresh_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }
}

impl NativeRuntime for InventoryRuntime {
    fn open_platform_list(&self) -> Result<PlatformListHandle> {
        if let Some(reason) = &self.unavailable {
            return Err(CoreError::Discovery {
                detail: reason.clone(),
            });
        }
        self.open_lists.fetch_add(1, Ordering::SeqCst);
        Ok(PlatformListHandle(self.fresh_handle()))
    }

    fn platform_count(&self, _list: &PlatformListHandle) -> usize {
        self.inventory.platforms.len()
    }

    fn close_platform_list(&self, _list: PlatformListHandle) {
        let _ = self
            .open_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    fn platform_info(&self, _list: &PlatformListHandle, index: usize) -> Result<RawPlatform> {
        let platform = self
            .inventory
            .platforms
            .get(index)
            .ok_or_else(|| CoreError::Discovery {
                detail: format!(
                    "platform index {index} out of range ({} platforms)",
                    self.inventory.platforms.len()
                ),
            })?;
        Ok(RawPlatform {
            id: PlatformId(index as u64),
            name: platform.name.clone(),
            vendor: platform.vendor.clone(),
            cpu_count: platform.count(DeviceKind::Cpu),
            gpu_count: platform.count(DeviceKind::Gpu),
            accelerator_count: platform.count(DeviceKind::Accelerator),
        })
    }

    fn create_device(
        &self,
        platform: PlatformId,
        kind: DeviceKind,
        index_within_kind: usize,
        config: &DeviceConfig,
    ) -> Result<RawDevice> {
        let entry = usize::try_from(platform.0)
            .ok()
            .and_then(|i| self.inventory.platforms.get(i))
            .ok_or_else(|| CoreError::DeviceCreation {
                platform: format!("#{}", platform.0),
                kind,
                index: index_within_kind,
                detail: "unknown platform".into(),
            })?;
        let device = entry
            .devices
            .iter()
            .filter(|d| d.kind == kind)
            .nth(index_within_kind)
            .ok_or_else(|| CoreError::DeviceCreation {
                platform: entry.name.clone(),
                kind,
                index: index_within_kind,
                detail: "no such device".into(),
            })?;

        let mut compute_units = device.compute_units;
        if kind == DeviceKind::Cpu && config.partition_enabled {
            if let Some(cap) = config.max_cpu_cores {
                compute_units = compute_units.min(cap);
            }
        }

        Ok(RawDevice {
            handle: DeviceHandle(self.fresh_handle()),
            name: device.name.clone(),
            vendor: device.vendor.clone(),
            compute_units,
            memory_size: device.memory_bytes,
            host_unified_memory: device.host_unified_memory,
        })
    }
}
