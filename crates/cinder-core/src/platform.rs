//! Platform descriptors.

use std::sync::Arc;

use crate::device::DeviceKind;
use crate::native::{NativeRuntime, PlatformId, RawPlatform};

/// One native platform (a vendor driver stack) and its device counts.
///
/// Immutable once built. Devices keep an `Arc` back to their platform for
/// metadata lookup and for rebuilding themselves through the runtime.
#[derive(Debug, Clone)]
pub struct PlatformDescriptor {
    id: PlatformId,
    name: String,
    vendor: String,
    cpu_count: usize,
    gpu_count: usize,
    accelerator_count: usize,
    runtime: Arc<dyn NativeRuntime>,
}

impl PlatformDescriptor {
    /// Build a descriptor from runtime-reported attributes.
    pub fn from_raw(raw: RawPlatform, runtime: Arc<dyn NativeRuntime>) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            vendor: raw.vendor,
            cpu_count: raw.cpu_count,
            gpu_count: raw.gpu_count,
            accelerator_count: raw.accelerator_count,
            runtime,
        }
    }

    pub fn id(&self) -> PlatformId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    /// Number of devices of `kind` on this platform.
    pub fn device_count(&self, kind: DeviceKind) -> usize {
        match kind {
            DeviceKind::Cpu => self.cpu_count,
            DeviceKind::Gpu => self.gpu_count,
            DeviceKind::Accelerator => self.accelerator_count,
        }
    }

    /// Number of devices of every kind.
    pub fn total_devices(&self) -> usize {
        self.cpu_count + self.gpu_count + self.accelerator_count
    }

    /// The runtime that enumerated this platform.
    pub fn runtime(&self) -> &dyn NativeRuntime {
        self.runtime.as_ref()
    }
}
