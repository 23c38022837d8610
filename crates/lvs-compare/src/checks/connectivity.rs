//! Opens and shorts: nets that one side splits or merges relative to the
//! other, found by mapping terminals through the device correspondence.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::canonical::{CanonicalDevice, Signature};
use crate::correspondence::Correspondence;

/// Net name → the nets of the other side its terminals land on.
pub type NetGroups = BTreeMap<String, BTreeSet<String>>;

type Terminal = (String, usize);

/// `(schematic instance, schematic role)` → layout net.
fn layout_by_schematic_terminal(
    layout: &Signature,
    corr: &Correspondence,
) -> HashMap<Terminal, String> {
    let names = corr.layout_to_schematic(layout);
    let mut xref = HashMap::new();
    for d in &layout.devices {
        let Some((sch_inst, swapped)) = names.get(&d.instance) else {
            continue;
        };
        for (role, net) in d.nets.iter().enumerate() {
            let sch_role = CanonicalDevice::mapped_role(role, *swapped);
            xref.insert((sch_inst.clone(), sch_role), net.clone());
        }
    }
    xref
}

/// A schematic net whose terminals land on more than one layout net.
pub fn check_opens(schematic: &Signature, layout: &Signature, corr: &Correspondence) -> NetGroups {
    let xref = layout_by_schematic_terminal(layout, corr);
    let mut opens = NetGroups::new();
    for (net, terminals) in &schematic.terminals {
        let landed: BTreeSet<String> = terminals
            .iter()
            .filter_map(|t| xref.get(t).cloned())
            .collect();
        if landed.len() > 1 {
            log::debug!("Open: schematic net '{}' lands on {:?}", net, landed);
            opens.insert(net.clone(), landed);
        }
    }
    opens
}

/// A layout net whose terminals land on more than one schematic net.
pub fn check_shorts(schematic: &Signature, layout: &Signature, corr: &Correspondence) -> NetGroups {
    let mut sch_xref: HashMap<Terminal, &str> = HashMap::new();
    for d in &schematic.devices {
        for (role, net) in d.nets.iter().enumerate() {
            sch_xref.insert((d.instance.clone(), role), net);
        }
    }
    let names = corr.layout_to_schematic(layout);

    let mut shorts = NetGroups::new();
    for (net, terminals) in &layout.terminals {
        let landed: BTreeSet<String> = terminals
            .iter()
            .filter_map(|(inst, role)| {
                let (sch_inst, swapped) = names.get(inst)?;
                let key = (sch_inst.clone(), CanonicalDevice::mapped_role(*role, *swapped));
                sch_xref.get(&key).map(|n| n.to_string())
            })
            .collect();
        if landed.len() > 1 {
            log::debug!("Short: layout net '{}' joins {:?}", net, landed);
            shorts.insert(net.clone(), landed);
        }
    }
    shorts
}
