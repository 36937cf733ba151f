//! Device collections.
//!
//! A [`DeviceCollection`] is an ordered, possibly empty sequence of devices
//! drawn from one or more platforms. It is what callers carry around after
//! discovery: narrowed by filters, reordered by rankings, merged with `+`,
//! and finally handed to the execution layer.
//!
//! Every operation returns a new collection of copies. Indexing and union
//! use exact copies (configuration preserved); filters and rankings rebuild
//! each device under the configuration they are given.

use std::ops::Add;

use cinder_core::{DeviceConfig, DeviceDescriptor, DeviceKind};
use tracing::{debug, warn};

use crate::filter::{matches_any, Vendor};

/// An ordered sequence of device descriptors.
#[derive(Debug, Clone, Default)]
pub struct DeviceCollection {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceCollection {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap already-built descriptors, keeping their order.
    pub fn from_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self { devices }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceDescriptor> {
        self.devices.iter()
    }

    pub fn as_slice(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Borrow the device at `index`.
    pub fn device(&self, index: usize) -> Option<&DeviceDescriptor> {
        self.devices.get(index)
    }

    /// A single-device collection holding an exact copy of the device at `index`.
    pub fn get(&self, index: usize) -> Option<DeviceCollection> {
        self.devices
            .get(index)
            .map(|d| Self::from_devices(vec![d.copy_exact()]))
    }

    /// Mutable access to one device's recorded configuration.
    pub fn device_mut(&mut self, index: usize) -> Option<&mut DeviceDescriptor> {
        self.devices.get_mut(index)
    }

    /// Exact copies of every device.
    pub fn copy_exact(&self) -> DeviceCollection {
        Self::from_devices(self.devices.iter().map(DeviceDescriptor::copy_exact).collect())
    }

    /// Exact copies of the devices at `indices`, in the order given.
    ///
    /// An empty index list copies everything; out-of-range indices are skipped.
    pub fn subset_exact(&self, indices: &[usize]) -> DeviceCollection {
        if indices.is_empty() {
            return self.copy_exact();
        }
        Self::from_devices(
            indices
                .iter()
                .filter_map(|&i| self.devices.get(i))
                .map(DeviceDescriptor::copy_exact)
                .collect(),
        )
    }

    /// Rebuild every device under `config`.
    ///
    /// A device the runtime refuses to rebuild is dropped with a warning;
    /// the others are unaffected.
    pub fn reconfigured(&self, config: DeviceConfig) -> DeviceCollection {
        Self::rebuild(self.devices.iter(), config)
    }

    /// `a`'s devices followed by `b`'s, each an exact copy.
    pub fn union(a: &DeviceCollection, b: &DeviceCollection) -> DeviceCollection {
        Self::from_devices(
            a.devices
                .iter()
                .chain(b.devices.iter())
                .map(DeviceDescriptor::copy_exact)
                .collect(),
        )
    }

    /// CPUs, rebuilt with the given partitioning, streaming and core cap.
    pub fn cpus(&self, config: DeviceConfig) -> Option<DeviceCollection> {
        self.select("cpus", config, |d| d.kind() == DeviceKind::Cpu)
    }

    /// GPUs, rebuilt with the given streaming flag.
    pub fn gpus(&self, streaming_enabled: bool) -> Option<DeviceCollection> {
        self.select("gpus", DeviceConfig::streaming(streaming_enabled), |d| {
            d.kind() == DeviceKind::Gpu
        })
    }

    /// Accelerators, rebuilt with the given streaming flag.
    pub fn accelerators(&self, streaming_enabled: bool) -> Option<DeviceCollection> {
        self.select(
            "accelerators",
            DeviceConfig::streaming(streaming_enabled),
            |d| d.kind() == DeviceKind::Accelerator,
        )
    }

    /// Devices whose name or vendor contains any of `patterns`.
    pub fn by_vendor_or_name_substring(
        &self,
        patterns: &[&str],
        config: DeviceConfig,
    ) -> Option<DeviceCollection> {
        let query = patterns.join("|");
        self.select(&query, config, |d| matches_any(d.name(), d.vendor(), patterns))
    }

    /// Devices made by `vendor`.
    pub fn by_vendor(&self, vendor: Vendor, config: DeviceConfig) -> Option<DeviceCollection> {
        self.by_vendor_or_name_substring(vendor.device_patterns(), config)
    }

    pub fn devices_intel(&self, config: DeviceConfig) -> Option<DeviceCollection> {
        self.by_vendor(Vendor::Intel, config)
    }

    pub fn devices_amd(&self, config: DeviceConfig) -> Option<DeviceCollection> {
        self.by_vendor(Vendor::Amd, config)
    }

    /// NVIDIA devices, also recognized by "GTX" and "Titan" in the name.
    pub fn devices_nvidia(&self, config: DeviceConfig) -> Option<DeviceCollection> {
        self.by_vendor(Vendor::Nvidia, config)
    }

    pub fn devices_altera(&self, config: DeviceConfig) -> Option<DeviceCollection> {
        self.by_vendor(Vendor::Altera, config)
    }

    pub fn devices_xilinx(&self, config: DeviceConfig) -> Option<DeviceCollection> {
        self.by_vendor(Vendor::Xilinx, config)
    }

    /// Devices with their own discrete memory (discrete GPUs, FPGA boards).
    pub fn with_dedicated_memory(&self, config: DeviceConfig) -> Option<DeviceCollection> {
        self.select("dedicated memory", config, DeviceDescriptor::has_dedicated_memory)
    }

    /// Devices sharing host RAM (CPUs, integrated GPUs).
    pub fn with_host_memory_sharing(&self, config: DeviceConfig) -> Option<DeviceCollection> {
        self.select("host memory sharing", config, |d| !d.has_dedicated_memory())
    }

    /// Stable subsequence of devices passing `keep`, rebuilt under `config`.
    ///
    /// `None` when nothing passes. A match whose rebuilds all fail yields
    /// `Some` of an empty collection.
    fn select<F>(&self, query: &str, config: DeviceConfig, keep: F) -> Option<DeviceCollection>
    where
        F: Fn(&DeviceDescriptor) -> bool,
    {
        let matched: Vec<&DeviceDescriptor> = self.devices.iter().filter(|&d| keep(d)).collect();
        if matched.is_empty() {
            debug!(query, candidates = self.devices.len(), "no devices matched");
            return None;
        }
        Some(Self::rebuild(matched.into_iter(), config))
    }

    fn rebuild<'a>(
        devices: impl Iterator<Item = &'a DeviceDescriptor>,
        config: DeviceConfig,
    ) -> DeviceCollection {
        let rebuilt = devices
            .filter_map(|d| match d.reconfigured(config) {
                Ok(copy) => Some(copy),
                Err(e) => {
                    warn!(device = d.name(), error = %e, "skipping device that could not be rebuilt");
                    None
                }
            })
            .collect();
        Self::from_devices(rebuilt)
    }

    pub(crate) fn devices_mut(&mut self) -> &mut Vec<DeviceDescriptor> {
        &mut self.devices
    }
}

impl Add for &DeviceCollection {
    type Output = DeviceCollection;

    fn add(self, rhs: &DeviceCollection) -> DeviceCollection {
        DeviceCollection::union(self, rhs)
    }
}

impl Add for DeviceCollection {
    type Output = DeviceCollection;

    fn add(self, rhs: DeviceCollection) -> DeviceCollection {
        DeviceCollection::union(&self, &rhs)
    }
}

impl<'a> IntoIterator for &'a DeviceCollection {
    type Item = &'a DeviceDescriptor;
    type IntoIter = std::slice::Iter<'a, DeviceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

impl IntoIterator for DeviceCollection {
    type Item = DeviceDescriptor;
    type IntoIter = std::vec::IntoIter<DeviceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}
