//! Static ranking by device metadata.
//!
//! Both orderings rebuild the whole collection under the given configuration
//! and then stable-sort it, so devices with equal keys keep their prior
//! relative order.

use std::cmp::Reverse;

use cinder_core::DeviceConfig;

use crate::collection::DeviceCollection;

impl DeviceCollection {
    /// Most compute units first.
    pub fn ordered_by_compute_units_descending(&self, config: DeviceConfig) -> DeviceCollection {
        let mut ranked = self.reconfigured(config);
        ranked
            .devices_mut()
            .sort_by_key(|d| Reverse(d.compute_units()));
        ranked
    }

    /// Most global memory first.
    pub fn ordered_by_memory_descending(&self, config: DeviceConfig) -> DeviceCollection {
        let mut ranked = self.reconfigured(config);
        ranked
            .devices_mut()
            .sort_by_key(|d| Reverse(d.memory_size()));
        ranked
    }
}
