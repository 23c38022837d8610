use serde::{Deserialize, Serialize};

use lvs_netlist::model::DeviceModel;

use crate::canonical::{CanonicalDevice, Signature};

/// Relative W/L tolerance, measured against the schematic value.
pub const DEFAULT_TOLERANCE: f64 = 0.02;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizedDevice {
    pub instance: String,
    pub width: Option<f64>,
    pub length: Option<f64>,
}

impl From<&CanonicalDevice> for SizedDevice {
    fn from(d: &CanonicalDevice) -> Self {
        Self {
            instance: d.instance.clone(),
            width: d.width,
            length: d.length,
        }
    }
}

/// A size disagreement. One side is `None` when the device found no
/// counterpart at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeMismatch {
    pub model: DeviceModel,
    pub schematic: Option<SizedDevice>,
    pub layout: Option<SizedDevice>,
}

fn close(schematic: Option<f64>, layout: Option<f64>, tolerance: f64) -> bool {
    match (schematic, layout) {
        (Some(s), Some(l)) => (l - s).abs() <= tolerance * s.abs() + EPSILON,
        (None, None) => true,
        _ => false,
    }
}

fn within(s: &CanonicalDevice, l: &CanonicalDevice, tolerance: f64) -> bool {
    close(s.width, l.width, tolerance) && close(s.length, l.length, tolerance)
}

/// Two-phase W/L comparison.
///
/// Phase one pairs devices with the same model and sorted terminal IDs,
/// preferring a partner within tolerance, and reports pairs that disagree.
/// Phase two pairs what is left by model and tolerance alone. Whatever is
/// still unpaired is reported without a counterpart. Ties go to the first
/// candidate in canonical order.
pub fn check_sizes(schematic: &Signature, layout: &Signature, tolerance: f64) -> Vec<SizeMismatch> {
    let mut used = vec![false; layout.devices.len()];
    let mut leftover = Vec::new();
    let mut out = Vec::new();

    for s in &schematic.devices {
        let candidates: Vec<usize> = (0..layout.devices.len())
            .filter(|&i| !used[i] && s.same_key(&layout.devices[i]))
            .collect();
        let pick = candidates
            .iter()
            .copied()
            .find(|&i| within(s, &layout.devices[i], tolerance))
            .or_else(|| candidates.first().copied());
        match pick {
            Some(i) => {
                used[i] = true;
                let l = &layout.devices[i];
                if !within(s, l, tolerance) {
                    out.push(SizeMismatch {
                        model: s.model.clone(),
                        schematic: Some(s.into()),
                        layout: Some(l.into()),
                    });
                }
            }
            None => leftover.push(s),
        }
    }

    for s in leftover {
        let pick = (0..layout.devices.len()).find(|&i| {
            !used[i] && layout.devices[i].model == s.model && within(s, &layout.devices[i], tolerance)
        });
        match pick {
            Some(i) => used[i] = true,
            None => out.push(SizeMismatch {
                model: s.model.clone(),
                schematic: Some(s.into()),
                layout: None,
            }),
        }
    }

    for (l, _) in layout.devices.iter().zip(&used).filter(|(_, u)| !**u) {
        out.push(SizeMismatch {
            model: l.model.clone(),
            schematic: None,
            layout: Some(l.into()),
        });
    }
    out
}
