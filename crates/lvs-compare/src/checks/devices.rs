use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lvs_netlist::model::DeviceModel;

use crate::canonical::{CanonicalDevice, Signature};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceMismatch {
    pub model: DeviceModel,
    pub instance: String,
}

/// Devices without an equal `(model, sorted terminal IDs)` on the other side,
/// plus the records of either side that could not be parsed into a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDiff {
    pub schematic: Vec<DeviceMismatch>,
    pub layout: Vec<DeviceMismatch>,
    #[serde(default)]
    pub unparsed_schematic: Vec<String>,
    #[serde(default)]
    pub unparsed_layout: Vec<String>,
}

impl DeviceDiff {
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn count(&self) -> usize {
        self.schematic.len()
            + self.layout.len()
            + self.unparsed_schematic.len()
            + self.unparsed_layout.len()
    }
}

fn unmatched(from: &[CanonicalDevice], against: &[CanonicalDevice]) -> Vec<DeviceMismatch> {
    let mut available: HashMap<(&DeviceModel, &[String]), usize> = HashMap::new();
    for d in against {
        *available.entry((&d.model, d.sorted.as_slice())).or_default() += 1;
    }
    let mut out = Vec::new();
    for d in from {
        match available.get_mut(&(&d.model, d.sorted.as_slice())) {
            Some(n) if *n > 0 => *n -= 1,
            _ => out.push(DeviceMismatch {
                model: d.model.clone(),
                instance: d.instance.clone(),
            }),
        }
    }
    out.sort();
    out
}

/// Multiset difference of the device keys, both ways. Unparsed records never
/// match anything.
pub fn check_devices(schematic: &Signature, layout: &Signature) -> DeviceDiff {
    DeviceDiff {
        schematic: unmatched(&schematic.devices, &layout.devices),
        layout: unmatched(&layout.devices, &schematic.devices),
        unparsed_schematic: schematic.unparsed.clone(),
        unparsed_layout: layout.unparsed.clone(),
    }
}
