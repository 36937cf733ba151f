//! Device descriptors.
//!
//! A [`DeviceDescriptor`] records one device's static attributes, copied out
//! of the runtime at build time, plus the small configuration it was built
//! with. Two copies exist: [`DeviceDescriptor::copy_exact`] duplicates the
//! value as-is, while [`DeviceDescriptor::reconfigured`] asks the runtime for
//! a fresh (sub-)device under new settings.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::native::DeviceHandle;
use crate::platform::PlatformDescriptor;

/// The kind of compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    Cpu,
    Gpu,
    /// FPGAs and other dedicated accelerators.
    Accelerator,
}

impl DeviceKind {
    /// Every kind, in per-platform expansion order: accelerators, CPUs, GPUs.
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Accelerator, DeviceKind::Cpu, DeviceKind::Gpu];

    /// Upper-case label used in reports.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
            Self::Accelerator => "ACCELERATOR",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A set of device kinds used to expand platforms into devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindSet {
    cpu: bool,
    gpu: bool,
    accelerator: bool,
}

impl KindSet {
    pub const NONE: KindSet = KindSet {
        cpu: false,
        gpu: false,
        accelerator: false,
    };
    pub const ALL: KindSet = KindSet {
        cpu: true,
        gpu: true,
        accelerator: true,
    };
    pub const CPU: KindSet = KindSet::NONE.with(DeviceKind::Cpu);
    pub const GPU: KindSet = KindSet::NONE.with(DeviceKind::Gpu);
    pub const ACCELERATOR: KindSet = KindSet::NONE.with(DeviceKind::Accelerator);

    /// This set plus `kind`.
    pub const fn with(mut self, kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Cpu => self.cpu = true,
            DeviceKind::Gpu => self.gpu = true,
            DeviceKind::Accelerator => self.accelerator = true,
        }
        self
    }

    /// Whether `kind` is in the set.
    pub const fn contains(&self, kind: DeviceKind) -> bool {
        match kind {
            DeviceKind::Cpu => self.cpu,
            DeviceKind::Gpu => self.gpu,
            DeviceKind::Accelerator => self.accelerator,
        }
    }
}

impl From<DeviceKind> for KindSet {
    fn from(kind: DeviceKind) -> Self {
        KindSet::NONE.with(kind)
    }
}

/// Whether a device owns its memory or shares host RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryArchitecture {
    /// Discrete memory (GDDR/HBM on a card, FPGA board memory).
    Dedicated,
    /// Host RAM, as with CPUs and integrated GPUs.
    HostShared,
}

impl MemoryArchitecture {
    /// Derive the architecture from the runtime's host-unified-memory flag.
    pub const fn from_host_unified(host_unified_memory: bool) -> Self {
        if host_unified_memory {
            Self::HostShared
        } else {
            Self::Dedicated
        }
    }
}

/// Per-device build settings.
///
/// `partition_enabled` and `max_cpu_cores` only apply to CPUs; building any
/// other kind clears them (see [`DeviceConfig::for_kind`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DeviceConfig {
    /// Split the CPU into a sub-device.
    pub partition_enabled: bool,
    /// Zero-copy access to host memory.
    pub streaming_enabled: bool,
    /// Core cap for a partitioned CPU; `None` is unconstrained.
    pub max_cpu_cores: Option<u32>,
}

impl DeviceConfig {
    pub fn new(partition_enabled: bool, streaming_enabled: bool, max_cpu_cores: Option<u32>) -> Self {
        Self {
            partition_enabled,
            streaming_enabled,
            max_cpu_cores,
        }
    }

    /// Configuration with only the streaming flag set as given.
    pub fn streaming(streaming_enabled: bool) -> Self {
        Self {
            streaming_enabled,
            ..Self::default()
        }
    }

    /// The effective configuration for a device of `kind`.
    pub fn for_kind(self, kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Cpu => self,
            DeviceKind::Gpu | DeviceKind::Accelerator => Self::streaming(self.streaming_enabled),
        }
    }
}

/// One device discovered under a platform.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    kind: DeviceKind,
    index_within_kind: usize,
    name: String,
    vendor: String,
    compute_units: u32,
    memory_size: u64,
    memory_architecture: MemoryArchitecture,
    config: DeviceConfig,
    handle: DeviceHandle,
    platform: Arc<PlatformDescriptor>,
}

impl DeviceDescriptor {
    /// Ask the platform's runtime for the `index`-th device of `kind`.
    pub fn build(
        platform: &Arc<PlatformDescriptor>,
        kind: DeviceKind,
        index_within_kind: usize,
        config: DeviceConfig,
    ) -> Result<Self> {
        let config = config.for_kind(kind);
        let raw = platform
            .runtime()
            .create_device(platform.id(), kind, index_within_kind, &config)?;
        tracing::debug!(
            platform = platform.name(),
            %kind,
            index = index_within_kind,
            device = raw.name.as_str(),
            "built device"
        );
        Ok(Self {
            kind,
            index_within_kind,
            name: raw.name,
            vendor: raw.vendor,
            compute_units: raw.compute_units,
            memory_size: raw.memory_size,
            memory_architecture: MemoryArchitecture::from_host_unified(raw.host_unified_memory),
            config,
            handle: raw.handle,
            platform: Arc::clone(platform),
        })
    }

    /// Value copy with the current configuration; no runtime call.
    pub fn copy_exact(&self) -> Self {
        self.clone()
    }

    /// Rebuild the same device under `config`, sharing the platform record.
    pub fn reconfigured(&self, config: DeviceConfig) -> Result<Self> {
        Self::build(&self.platform, self.kind, self.index_within_kind, config)
    }

    /// Rebuild the same device under `config` against a private copy of its platform.
    pub fn reconfigured_with_platform_copy(&self, config: DeviceConfig) -> Result<Self> {
        let platform = Arc::new(self.platform.as_ref().clone());
        Self::build(&platform, self.kind, self.index_within_kind, config)
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Position among devices of the same kind on the owning platform.
    pub fn index_within_kind(&self) -> usize {
        self.index_within_kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn compute_units(&self) -> u32 {
        self.compute_units
    }

    /// Global memory in bytes.
    pub fn memory_size(&self) -> u64 {
        self.memory_size
    }

    pub fn memory_architecture(&self) -> MemoryArchitecture {
        self.memory_architecture
    }

    /// Whether the device has its own discrete memory.
    pub fn has_dedicated_memory(&self) -> bool {
        self.memory_architecture == MemoryArchitecture::Dedicated
    }

    /// The configuration this descriptor was built (or last set) with.
    pub fn config(&self) -> DeviceConfig {
        self.config
    }

    /// Record a new configuration on this descriptor only.
    ///
    /// The native handle is not rebuilt; use [`DeviceDescriptor::reconfigured`]
    /// for that.
    pub fn set_config(&mut self, config: DeviceConfig) {
        self.config = config.for_kind(self.kind);
    }

    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }

    /// The platform this device was discovered under.
    pub fn platform(&self) -> &PlatformDescriptor {
        &self.platform
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) [{}]",
            self.name.trim(),
            self.vendor.trim(),
            self.kind
        )
    }
}
