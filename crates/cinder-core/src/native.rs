//! Native runtime adapter.
//!
//! The driver-level bindings that enumerate platforms and build devices live
//! outside this crate. They are consumed through [`NativeRuntime`], whose
//! platform list is an owned resource: [`PlatformList`] releases it when
//! dropped, so every exit path out of discovery closes the list.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceConfig, DeviceKind};
use crate::error::Result;

/// Opaque handle to a platform list held open by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformListHandle(pub u64);

/// Runtime-assigned platform identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformId(pub u64);

/// Opaque handle to a device (or sub-device) built by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

/// Platform attributes as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlatform {
    pub id: PlatformId,
    pub name: String,
    pub vendor: String,
    pub cpu_count: usize,
    pub gpu_count: usize,
    pub accelerator_count: usize,
}

/// Device attributes as reported by the runtime after (sub-)device creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDevice {
    pub handle: DeviceHandle,
    pub name: String,
    pub vendor: String,
    pub compute_units: u32,
    /// Global memory in bytes.
    pub memory_size: u64,
    /// True when the device reads host RAM instead of its own memory.
    pub host_unified_memory: bool,
}

/// Capability set the catalog needs from a native compute runtime.
pub trait NativeRuntime: Send + Sync + fmt::Debug {
    /// Acquire the platform list. Fails when no runtime is installed.
    fn open_platform_list(&self) -> Result<PlatformListHandle>;

    /// Number of platforms in an open list.
    fn platform_count(&self, list: &PlatformListHandle) -> usize;

    /// Release a platform list.
    fn close_platform_list(&self, list: PlatformListHandle);

    /// Attributes of the platform at `index` in an open list.
    fn platform_info(&self, list: &PlatformListHandle, index: usize) -> Result<RawPlatform>;

    /// Build a device (or CPU sub-device) with the given configuration.
    fn create_device(
        &self,
        platform: PlatformId,
        kind: DeviceKind,
        index_within_kind: usize,
        config: &DeviceConfig,
    ) -> Result<RawDevice>;
}

/// An open platform list, closed on drop.
pub struct PlatformList<'a> {
    runtime: &'a dyn NativeRuntime,
    handle: PlatformListHandle,
}

impl<'a> PlatformList<'a> {
    /// Open the runtime's platform list.
    pub fn open(runtime: &'a dyn NativeRuntime) -> Result<Self> {
        let handle = runtime.open_platform_list()?;
        tracing::debug!(handle = handle.0, "opened platform list");
        Ok(Self { runtime, handle })
    }

    /// Number of platforms in the list.
    pub fn len(&self) -> usize {
        self.runtime.platform_count(&self.handle)
    }

    /// Whether the list has no platforms.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attributes of the platform at `index`.
    pub fn platform(&self, index: usize) -> Result<RawPlatform> {
        self.runtime.platform_info(&self.handle, index)
    }
}

impl Drop for PlatformList<'_> {
    fn drop(&mut self) {
        tracing::debug!(handle = self.handle.0, "closing platform list");
        self.runtime.close_platform_list(self.handle);
    }
}

impl fmt::Debug for PlatformList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformList")
            .field("handle", &self.handle)
            .finish()
    }
}
