use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalDevice, Signature};

/// A terminal connected to `schematic` in the schematic and to `layout` in
/// the layout. `None` marks a device without any counterpart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetMismatch {
    pub schematic: Option<String>,
    pub layout: Option<String>,
}

/// Compare role-ordered terminals. Devices that match exactly, or after a
/// source/drain swap, are accepted. The rest are paired greedily by terminal
/// agreement and every disagreeing position is reported as a net pair.
pub fn check_nets(schematic: &Signature, layout: &Signature) -> Vec<NetMismatch> {
    let mut used = vec![false; layout.devices.len()];
    let mut rest: Vec<&CanonicalDevice> = Vec::new();

    for s in &schematic.devices {
        let hit = (0..layout.devices.len()).find(|&i| !used[i] && s.matches(&layout.devices[i]).is_some());
        match hit {
            Some(i) => used[i] = true,
            None => rest.push(s),
        }
    }
    let leftover: Vec<usize> = (0..layout.devices.len()).filter(|&i| !used[i]).collect();

    let mut scored = Vec::new();
    for (si, s) in rest.iter().enumerate() {
        for &li in &leftover {
            let l = &layout.devices[li];
            if s.model != l.model {
                continue;
            }
            let (score, swapped) = s.agreement(l);
            if score > 0 {
                scored.push((score, si, li, swapped));
            }
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut mismatches = BTreeSet::new();
    let mut paired = vec![false; rest.len()];
    for (_, si, li, swapped) in scored {
        if paired[si] || used[li] {
            continue;
        }
        paired[si] = true;
        used[li] = true;
        let (s, l) = (rest[si], &layout.devices[li]);
        for role in 0..s.terminals.len().min(l.terminals.len()) {
            let other = CanonicalDevice::mapped_role(role, swapped);
            if s.terminals[role] != l.terminals[other] {
                mismatches.insert(NetMismatch {
                    schematic: Some(s.nets[role].clone()),
                    layout: Some(l.nets[other].clone()),
                });
            }
        }
    }

    for (s, _) in rest.iter().zip(&paired).filter(|(_, p)| !**p) {
        for net in &s.nets {
            mismatches.insert(NetMismatch {
                schematic: Some(net.clone()),
                layout: None,
            });
        }
    }
    for (l, _) in layout.devices.iter().zip(&used).filter(|(_, u)| !**u) {
        for net in &l.nets {
            mismatches.insert(NetMismatch {
                schematic: None,
                layout: Some(net.clone()),
            });
        }
    }
    mismatches.into_iter().collect()
}
