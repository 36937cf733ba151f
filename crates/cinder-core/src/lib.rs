//! Core model for Cinder: compute devices as discovered from a native runtime.
//!
//! A native compute runtime groups devices under platforms. This crate holds
//! the descriptors for both, the adapter trait through which they are
//! enumerated, and the configuration files that drive selection:
//!
//! - **Descriptors:** [`PlatformDescriptor`] and [`DeviceDescriptor`]
//! - **Native adapter:** [`NativeRuntime`] with scoped [`PlatformList`] handles
//! - **Inventory runtime:** a file-backed [`NativeRuntime`] for offline hosts
//! - **Configuration:** `cinder.toml` device and benchmark settings

pub mod config;
pub mod device;
pub mod error;
pub mod inventory;
pub mod native;
pub mod platform;

pub use config::{
    config_to_toml, load_config, parse_config, validate_benchmark, validate_config,
    BenchmarkConfig, CinderConfig, Precision,
};
pub use device::{DeviceConfig, DeviceDescriptor, DeviceKind, KindSet, MemoryArchitecture};
pub use error::{CoreError, Result, ValidationIssue};
pub use inventory::{
    load_inventory_toml, parse_inventory_toml, validate_inventory, Inventory, InventoryDevice,
    InventoryPlatform, InventoryRuntime,
};
pub use native::{
    DeviceHandle, NativeRuntime, PlatformId, PlatformList, PlatformListHandle, RawDevice,
    RawPlatform,
};
pub use platform::PlatformDescriptor;
