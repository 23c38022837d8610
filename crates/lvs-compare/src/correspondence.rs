//! Device instance correspondence between schematic and layout.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::canonical::Signature;

/// A schematic device and the layout device standing for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePair {
    pub schematic: String,
    pub layout: String,
    /// Layout source and drain are exchanged relative to the schematic.
    pub swapped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub pairs: Vec<DevicePair>,
    pub unmatched_schematic: Vec<String>,
    pub unmatched_layout: Vec<String>,
}

impl Correspondence {
    /// Pair devices in two passes. The first pairs equal models with equal
    /// sorted terminal IDs, preferring the same instance name. The second
    /// pairs the rest by the best terminal agreement among devices of the
    /// same model, skipping pairs that agree nowhere.
    pub fn build(schematic: &Signature, layout: &Signature) -> Self {
        let mut used_layout = vec![false; layout.devices.len()];
        let mut matched_schematic = vec![false; schematic.devices.len()];
        let mut pairs = Vec::new();

        for (si, s) in schematic.devices.iter().enumerate() {
            let candidates: Vec<usize> = layout
                .devices
                .iter()
                .enumerate()
                .filter(|(li, l)| !used_layout[*li] && s.same_key(l))
                .map(|(li, _)| li)
                .collect();
            let pick = candidates
                .iter()
                .copied()
                .find(|&li| layout.devices[li].instance == s.instance)
                .or_else(|| candidates.first().copied());
            if let Some(li) = pick {
                let l = &layout.devices[li];
                used_layout[li] = true;
                matched_schematic[si] = true;
                pairs.push(DevicePair {
                    schematic: s.instance.clone(),
                    layout: l.instance.clone(),
                    swapped: s.matches(l) == Some(true),
                });
            }
        }

        let mut scored = Vec::new();
        for (si, s) in schematic.devices.iter().enumerate() {
            if matched_schematic[si] {
                continue;
            }
            for (li, l) in layout.devices.iter().enumerate() {
                if used_layout[li] || s.model != l.model {
                    continue;
                }
                let (score, swapped) = s.agreement(l);
                if score > 0 {
                    scored.push((score, si, li, swapped));
                }
            }
        }
        // Stable: equal scores keep canonical order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, si, li, swapped) in scored {
            if matched_schematic[si] || used_layout[li] {
                continue;
            }
            matched_schematic[si] = true;
            used_layout[li] = true;
            pairs.push(DevicePair {
                schematic: schematic.devices[si].instance.clone(),
                layout: layout.devices[li].instance.clone(),
                swapped,
            });
        }

        let unmatched_schematic = schematic
            .devices
            .iter()
            .zip(&matched_schematic)
            .filter(|(_, m)| !**m)
            .map(|(d, _)| d.instance.clone())
            .collect();
        let unmatched_layout = layout
            .devices
            .iter()
            .zip(&used_layout)
            .filter(|(_, u)| !**u)
            .map(|(d, _)| d.instance.clone())
            .collect();

        Self {
            pairs,
            unmatched_schematic,
            unmatched_layout,
        }
    }

    /// Layout instance → (schematic instance, swapped). Unpaired layout
    /// devices get a `layout_<instance>` placeholder.
    pub fn layout_to_schematic(&self, layout: &Signature) -> HashMap<String, (String, bool)> {
        let mut map: HashMap<String, (String, bool)> = self
            .pairs
            .iter()
            .map(|p| (p.layout.clone(), (p.schematic.clone(), p.swapped)))
            .collect();
        for d in &layout.devices {
            map.entry(d.instance.clone())
                .or_insert_with(|| (format!("layout_{}", d.instance), false));
        }
        map
    }
}
