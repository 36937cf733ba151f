//! The platform catalog: every platform the native runtime reports.
//!
//! A catalog is built once per discovery and is normally narrowed into
//! [`DeviceCollection`]s right away. Devices keep their own copy of the
//! metadata they need, so the catalog can be dropped afterwards.

use std::cmp::Reverse;
use std::sync::Arc;

use cinder_core::{
    DeviceConfig, DeviceDescriptor, DeviceKind, KindSet, NativeRuntime, PlatformDescriptor,
    PlatformList, Result,
};
use tracing::{debug, warn};

use crate::collection::DeviceCollection;
use crate::filter::{matches_any, Vendor};

/// An ordered sequence of platform descriptors.
#[derive(Debug, Clone, Default)]
pub struct PlatformCatalog {
    platforms: Vec<Arc<PlatformDescriptor>>,
}

impl PlatformCatalog {
    /// Enumerate every platform `runtime` reports.
    ///
    /// Fails when the runtime cannot be initialized. Zero platforms is an
    /// empty catalog, not an error. The native platform list is released
    /// before this returns, on success and failure alike.
    pub fn discover_all(runtime: Arc<dyn NativeRuntime>) -> Result<Self> {
        let list = PlatformList::open(runtime.as_ref())?;
        let count = list.len();
        let mut platforms = Vec::with_capacity(count);
        for index in 0..count {
            let raw = list.platform(index)?;
            debug!(
                index,
                platform = raw.name.as_str(),
                vendor = raw.vendor.as_str(),
                cpus = raw.cpu_count,
                gpus = raw.gpu_count,
                accelerators = raw.accelerator_count,
                "discovered platform"
            );
            platforms.push(Arc::new(PlatformDescriptor::from_raw(
                raw,
                Arc::clone(&runtime),
            )));
        }
        drop(list);
        debug!(count, "platform discovery finished");
        Ok(Self { platforms })
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformDescriptor> {
        self.platforms.iter().map(Arc::as_ref)
    }

    /// Borrow the platform at `index`.
    pub fn platform(&self, index: usize) -> Option<&PlatformDescriptor> {
        self.platforms.get(index).map(Arc::as_ref)
    }

    /// A single-platform catalog holding a copy of the platform at `index`.
    pub fn get(&self, index: usize) -> Option<PlatformCatalog> {
        self.platforms.get(index).map(|p| Self {
            platforms: vec![deep_copy(p)],
        })
    }

    /// Copies of the platforms at `indices`, in the order given.
    ///
    /// An empty index list copies everything; out-of-range indices are skipped.
    pub fn subset(&self, indices: &[usize]) -> PlatformCatalog {
        let platforms = if indices.is_empty() {
            self.platforms.iter().map(deep_copy).collect()
        } else {
            indices
                .iter()
                .filter_map(|&i| self.platforms.get(i))
                .map(deep_copy)
                .collect()
        };
        Self { platforms }
    }

    /// `(platform name, vendor name)` pairs, or `None` for an empty catalog.
    pub fn platform_vendor_names(&self) -> Option<Vec<(String, String)>> {
        if self.platforms.is_empty() {
            return None;
        }
        Some(
            self.platforms
                .iter()
                .map(|p| (p.name().to_string(), p.vendor().to_string()))
                .collect(),
        )
    }

    /// Platforms whose name or vendor contains any of `patterns`.
    ///
    /// `None` when nothing matches.
    pub fn by_vendor_or_name_substring(&self, patterns: &[&str]) -> Option<PlatformCatalog> {
        let indices: Vec<usize> = self
            .platforms
            .iter()
            .enumerate()
            .filter(|(_, p)| matches_any(p.name(), p.vendor(), patterns))
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            debug!(query = %patterns.join("|"), "platform not found");
            return None;
        }
        Some(self.subset(&indices))
    }

    /// Platforms from `vendor`.
    pub fn by_vendor(&self, vendor: Vendor) -> Option<PlatformCatalog> {
        self.by_vendor_or_name_substring(vendor.platform_patterns())
    }

    pub fn platforms_intel(&self) -> Option<PlatformCatalog> {
        self.by_vendor(Vendor::Intel)
    }

    pub fn platforms_amd(&self) -> Option<PlatformCatalog> {
        self.by_vendor(Vendor::Amd)
    }

    pub fn platforms_nvidia(&self) -> Option<PlatformCatalog> {
        self.by_vendor(Vendor::Nvidia)
    }

    pub fn platforms_altera(&self) -> Option<PlatformCatalog> {
        self.by_vendor(Vendor::Altera)
    }

    pub fn platforms_xilinx(&self) -> Option<PlatformCatalog> {
        self.by_vendor(Vendor::Xilinx)
    }

    /// Platforms with the most devices (of any kind) first; ties keep order.
    pub fn ordered_by_device_count_descending(&self) -> PlatformCatalog {
        let mut sorted = self.subset(&[]);
        sorted
            .platforms
            .sort_by_key(|p| Reverse(p.total_devices()));
        sorted
    }

    /// Expand every platform's devices of the requested kinds.
    ///
    /// Per platform, devices come out accelerators first, then CPUs, then
    /// GPUs, each in runtime order. A device the runtime fails to
    /// build is skipped with a warning; its siblings are unaffected.
    pub fn to_devices(&self, kinds: KindSet, config: DeviceConfig) -> DeviceCollection {
        let mut devices = Vec::new();
        for platform in &self.platforms {
            for kind in DeviceKind::ALL {
                if !kinds.contains(kind) {
                    continue;
                }
                for index in 0..platform.device_count(kind) {
                    match DeviceDescriptor::build(platform, kind, index, config) {
                        Ok(device) => devices.push(device),
                        Err(e) => warn!(
                            platform = platform.name(),
                            %kind,
                            index,
                            error = %e,
                            "skipping device that could not be built"
                        ),
                    }
                }
            }
        }
        DeviceCollection::from_devices(devices)
    }

    /// Every CPU, built with the given partitioning, streaming and core cap.
    pub fn cpus(&self, config: DeviceConfig) -> DeviceCollection {
        self.to_devices(KindSet::CPU, config)
    }

    /// Every GPU.
    pub fn gpus(&self, streaming_enabled: bool) -> DeviceCollection {
        self.to_devices(KindSet::GPU, DeviceConfig::streaming(streaming_enabled))
    }

    /// Every accelerator.
    pub fn accelerators(&self, streaming_enabled: bool) -> DeviceCollection {
        self.to_devices(
            KindSet::ACCELERATOR,
            DeviceConfig::streaming(streaming_enabled),
        )
    }

    /// All devices, most compute units first. Each device is built once.
    pub fn devices_with_most_compute_units(&self, config: DeviceConfig) -> DeviceCollection {
        let mut all = self.to_devices(KindSet::ALL, config);
        all.devices_mut()
            .sort_by_key(|d| Reverse(d.compute_units()));
        all
    }

    /// All devices, most memory first. Each device is built once.
    pub fn devices_with_highest_memory(&self, config: DeviceConfig) -> DeviceCollection {
        let mut all = self.to_devices(KindSet::ALL, config);
        all.devices_mut().sort_by_key(|d| Reverse(d.memory_size()));
        all
    }

    /// Devices with dedicated memory; empty (not `None`) when there are none.
    pub fn devices_with_dedicated_memory(&self, config: DeviceConfig) -> DeviceCollection {
        let mut all = self.to_devices(KindSet::ALL, config);
        all.devices_mut().retain(DeviceDescriptor::has_dedicated_memory);
        all
    }

    /// Devices sharing host memory; empty (not `None`) when there are none.
    pub fn devices_with_host_memory_sharing(&self, config: DeviceConfig) -> DeviceCollection {
        let mut all = self.to_devices(KindSet::ALL, config);
        all.devices_mut().retain(|d| !d.has_dedicated_memory());
        all
    }

    /// Devices from `vendor` across every platform.
    pub fn devices_by_vendor(
        &self,
        vendor: Vendor,
        config: DeviceConfig,
    ) -> Option<DeviceCollection> {
        let all = self.to_devices(KindSet::ALL, config);
        let matching: Vec<usize> = all
            .iter()
            .enumerate()
            .filter(|(_, d)| matches_any(d.name(), d.vendor(), vendor.device_patterns()))
            .map(|(i, _)| i)
            .collect();
        if matching.is_empty() {
            debug!(?vendor, "no devices from vendor");
            return None;
        }
        Some(all.subset_exact(&matching))
    }
}

fn deep_copy(platform: &Arc<PlatformDescriptor>) -> Arc<PlatformDescriptor> {
    Arc::new(platform.as_ref().clone())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cinder_core::{
        CoreError, Inventory, InventoryDevice, InventoryPlatform, InventoryRuntime,
        PlatformListHandle, RawDevice, RawPlatform,
    };

    use super::*;
    use crate::collection::tests::scenario_inventory;

    fn scenario() -> (Arc<InventoryRuntime>, PlatformCatalog) {
        let runtime = Arc::new(InventoryRuntime::new(scenario_inventory()));
        let catalog = PlatformCatalog::discover_all(runtime.clone()).unwrap();
        (runtime, catalog)
    }

    fn platform_names(c: &PlatformCatalog) -> Vec<&str> {
        c.iter().map(PlatformDescriptor::name).collect()
    }

    #[test]
    fn discovery_releases_the_platform_list() {
        let (runtime, catalog) = scenario();
        assert_eq!(catalog.len(), 2);
        assert_eq!(runtime.open_handles(), 0);
    }

    #[test]
    fn discovery_fails_without_runtime() {
        let runtime = Arc::new(InventoryRuntime::unavailable("no OpenCL ICD"));
        let err = PlatformCatalog::discover_all(runtime.clone()).unwrap_err();
        assert!(matches!(err, CoreError::Discovery { .. }));
        assert_eq!(runtime.open_handles(), 0);
    }

    #[test]
    fn zero_platforms_is_an_empty_catalog() {
        let runtime = Arc::new(InventoryRuntime::new(Default::default()));
        let catalog = PlatformCatalog::discover_all(runtime).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.platform_vendor_names().is_none());
        assert!(catalog.to_devices(KindSet::ALL, DeviceConfig::default()).is_empty());
    }

    /// Reports one platform more than it can describe.
    #[derive(Debug)]
    struct Overcounting(InventoryRuntime);

    impl NativeRuntime for Overcounting {
        fn open_platform_list(&self) -> Result<PlatformListHandle> {
            self.0.open_platform_list()
        }
        fn platform_count(&self, list: &PlatformListHandle) -> usize {
            self.0.platform_count(list) + 1
        }
        fn close_platform_list(&self, list: PlatformListHandle) {
            self.0.close_platform_list(list)
        }
        fn platform_info(&self, list: &PlatformListHandle, index: usize) -> Result<RawPlatform> {
            self.0.platform_info(list, index)
        }
        fn create_device(
            &self,
            platform: cinder_core::PlatformId,
            kind: DeviceKind,
            index: usize,
            config: &DeviceConfig,
        ) -> Result<RawDevice> {
            self.0.create_device(platform, kind, index, config)
        }
    }

    #[test]
    fn list_is_released_when_discovery_fails_midway() {
        let runtime = Arc::new(Overcounting(InventoryRuntime::new(scenario_inventory())));
        assert!(PlatformCatalog::discover_all(runtime.clone()).is_err());
        assert_eq!(runtime.0.open_handles(), 0);
    }

    /// Refuses to build the first GPU of every platform.
    #[derive(Debug)]
    struct FirstGpuBroken(InventoryRuntime);

    impl NativeRuntime for FirstGpuBroken {
        fn open_platform_list(&self) -> Result<PlatformListHandle> {
            self.0.open_platform_list()
        }
        fn platform_count(&self, list: &PlatformListHandle) -> usize {
            self.0.platform_count(list)
        }
        fn close_platform_list(&self, list: PlatformListHandle) {
            self.0.close_platform_list(list)
        }
        fn platform_info(&self, list: &PlatformListHandle, index: usize) -> Result<RawPlatform> {
            self.0.platform_info(list, index)
        }
        fn create_device(
            &self,
            platform: cinder_core::PlatformId,
            kind: DeviceKind,
            index: usize,
            config: &DeviceConfig,
        ) -> Result<RawDevice> {
            if kind == DeviceKind::Gpu && index == 0 && platform.0 == 0 {
                return Err(CoreError::DeviceCreation {
                    platform: "#0".into(),
                    kind,
                    index,
                    detail: "out of resources".into(),
                });
            }
            self.0.create_device(platform, kind, index, config)
        }
    }

    #[test]
    fn failed_device_build_does_not_affect_siblings() {
        let runtime = Arc::new(FirstGpuBroken(InventoryRuntime::new(scenario_inventory())));
        let catalog = PlatformCatalog::discover_all(runtime).unwrap();
        let devices = catalog.to_devices(KindSet::ALL, DeviceConfig::default());
        let names: Vec<&str> = devices.iter().map(DeviceDescriptor::name).collect();
        assert_eq!(names, vec!["Intel(R) Core(TM) i7", "GeForce RTX 3080"]);
    }

    #[test]
    fn subset_and_get_copy_platforms() {
        let (_, catalog) = scenario();
        assert_eq!(platform_names(&catalog.subset(&[1, 5, 0])), vec!["NVIDIA CUDA", "Intel(R) OpenCL"]);
        assert_eq!(catalog.subset(&[]).len(), 2);
        assert_eq!(platform_names(&catalog.get(1).unwrap()), vec!["NVIDIA CUDA"]);
        assert!(catalog.get(2).is_none());
    }

    #[test]
    fn vendor_search_is_case_and_locale_invariant() {
        let (_, catalog) = scenario();
        assert_eq!(platform_names(&catalog.platforms_nvidia().unwrap()), vec!["NVIDIA CUDA"]);
        assert_eq!(
            platform_names(&catalog.by_vendor_or_name_substring(&["İNTEL"]).unwrap()),
            vec!["Intel(R) OpenCL"]
        );
        assert_eq!(
            catalog.by_vendor_or_name_substring(&["opencl", "cuda"]).unwrap().len(),
            2
        );
        assert!(catalog.platforms_amd().is_none());
        assert!(catalog.platforms_xilinx().is_none());
        assert!(catalog.platforms_altera().is_none());
        assert!(catalog.platforms_intel().is_some());
    }

    #[test]
    fn device_count_ordering_is_stable() {
        let (_, catalog) = scenario();
        let sorted = catalog.ordered_by_device_count_descending();
        assert_eq!(platform_names(&sorted), vec!["Intel(R) OpenCL", "NVIDIA CUDA"]);
        let reversed = catalog.subset(&[1, 0]).ordered_by_device_count_descending();
        assert_eq!(platform_names(&reversed), vec!["Intel(R) OpenCL", "NVIDIA CUDA"]);
    }

    #[test]
    fn kind_expansion() {
        let (_, catalog) = scenario();
        assert_eq!(catalog.cpus(DeviceConfig::default()).len(), 1);
        assert_eq!(catalog.gpus(false).len(), 2);
        assert!(catalog.accelerators(false).is_empty());
        let mixed = catalog.to_devices(KindSet::GPU.with(DeviceKind::Cpu), DeviceConfig::default());
        assert_eq!(mixed.len(), 3);
    }

    #[test]
    fn catalog_level_shortcuts() {
        let (_, catalog) = scenario();
        let config = DeviceConfig::default();
        let ranked = catalog.devices_with_most_compute_units(config);
        assert_eq!(ranked.device(0).unwrap().compute_units(), 80);
        assert_eq!(catalog.devices_with_dedicated_memory(config).len(), 2);
        assert_eq!(catalog.devices_with_host_memory_sharing(config).len(), 1);
        assert_eq!(
            catalog.devices_with_highest_memory(config).device(0).unwrap().kind(),
            DeviceKind::Cpu
        );
        assert_eq!(catalog.devices_by_vendor(Vendor::Nvidia, config).unwrap().len(), 1);
        assert!(catalog.devices_by_vendor(Vendor::Amd, config).is_none());
    }

    #[test]
    fn devices_outlive_the_catalog() {
        let (_, catalog) = scenario();
        let devices = catalog.gpus(false);
        drop(catalog);
        assert_eq!(devices.device(1).unwrap().platform().name(), "NVIDIA CUDA");
        assert_eq!(devices.device(1).unwrap().memory_size(), 8 << 30);
    }

    /// Counts sub-device creations.
    #[derive(Debug)]
    struct Counting {
        inner: InventoryRuntime,
        builds: AtomicUsize,
    }

    impl NativeRuntime for Counting {
        fn open_platform_list(&self) -> Result<PlatformListHandle> {
            self.inner.open_platform_list()
        }
        fn platform_count(&self, list: &PlatformListHandle) -> usize {
            self.inner.platform_count(list)
        }
        fn close_platform_list(&self, list: PlatformListHandle) {
            self.inner.close_platform_list(list)
        }
        fn platform_info(&self, list: &PlatformListHandle, index: usize) -> Result<RawPlatform> {
            self.inner.platform_info(list, index)
        }
        fn create_device(
            &self,
            platform: cinder_core::PlatformId,
            kind: DeviceKind,
            index: usize,
            config: &DeviceConfig,
        ) -> Result<RawDevice> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            self.inner.create_device(platform, kind, index, config)
        }
    }

    /// One platform reporting a GPU before an FPGA, both with their own memory.
    fn gpu_and_fpga() -> Inventory {
        Inventory {
            platforms: vec![InventoryPlatform::new("Board", "Vendor")
                .with_device(InventoryDevice::new(
                    DeviceKind::Gpu,
                    "gpu",
                    "Vendor",
                    16,
                    4 << 30,
                    false,
                ))
                .with_device(InventoryDevice::new(
                    DeviceKind::Accelerator,
                    "fpga",
                    "Vendor",
                    16,
                    4 << 30,
                    false,
                ))],
        }
    }

    fn counting(inventory: Inventory) -> (Arc<Counting>, PlatformCatalog) {
        let runtime = Arc::new(Counting {
            inner: InventoryRuntime::new(inventory),
            builds: AtomicUsize::new(0),
        });
        let catalog = PlatformCatalog::discover_all(runtime.clone()).unwrap();
        (runtime, catalog)
    }

    #[test]
    fn ranking_shortcuts_build_each_device_once() {
        let config = DeviceConfig::default();
        let (runtime, catalog) = counting(gpu_and_fpga());

        assert_eq!(catalog.devices_with_most_compute_units(config).len(), 2);
        assert_eq!(runtime.builds.load(Ordering::SeqCst), 2);

        assert_eq!(catalog.devices_with_highest_memory(config).len(), 2);
        assert_eq!(runtime.builds.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn expansion_puts_accelerators_before_cpus_and_gpus() {
        let config = DeviceConfig::default();
        let (_, catalog) = counting(gpu_and_fpga());
        let names = |c: &DeviceCollection| -> Vec<String> {
            c.iter().map(|d| d.name().to_string()).collect()
        };
        assert_eq!(names(&catalog.to_devices(KindSet::ALL, config)), vec!["fpga", "gpu"]);
        assert_eq!(names(&catalog.devices_with_dedicated_memory(config)), vec!["fpga", "gpu"]);
        // Equal compute units and memory: ties keep expansion order.
        assert_eq!(names(&catalog.devices_with_most_compute_units(config)), vec!["fpga", "gpu"]);
        assert_eq!(names(&catalog.devices_with_highest_memory(config)), vec!["fpga", "gpu"]);
    }

    #[test]
    fn platform_vendor_names_pairs() {
        let (_, catalog) = scenario();
        let names = catalog.platform_vendor_names().unwrap();
        assert_eq!(names[1], ("NVIDIA CUDA".to_string(), "NVIDIA Corporation".to_string()));
    }
}
