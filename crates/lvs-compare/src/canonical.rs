//! Topology-based canonical form of a subcircuit.
//!
//! Port nets keep their names (`PORT_<name>`). Every internal net is named
//! after the sorted multiset of `(model, role class)` pairs that touch it, so
//! two nets with the same local connectivity get the same `INT_<k>` no matter
//! what they were called.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use lvs_netlist::model::{DeviceKind, DeviceModel, Subcircuit};

/// Terminal role as seen by the net naming. Source and drain share a class so
/// that relabeling them does not perturb internal net IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleClass {
    SourceDrain,
    Gate,
    Bulk,
    Pin(usize),
}

impl RoleClass {
    pub fn of(mos: bool, role: usize) -> Self {
        if !mos {
            return RoleClass::Pin(role);
        }
        match role {
            0 | 2 => RoleClass::SourceDrain,
            1 => RoleClass::Gate,
            3 => RoleClass::Bulk,
            other => RoleClass::Pin(other),
        }
    }
}

/// One device in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDevice {
    pub model: DeviceModel,
    /// Four-terminal MOS device; roles 0 and 2 are interchangeable.
    pub mos: bool,
    /// Canonical net IDs in terminal order.
    pub terminals: Vec<String>,
    /// Canonical net IDs, sorted.
    pub sorted: Vec<String>,
    pub instance: String,
    /// Original net names in terminal order.
    pub nets: Vec<String>,
    /// Drawn width in micrometers, when given.
    pub width: Option<f64>,
    /// Drawn length in micrometers, when given.
    pub length: Option<f64>,
}

impl CanonicalDevice {
    /// Terminal IDs with roles 0 and 2 exchanged. `None` for non-MOS devices.
    pub fn swapped_terminals(&self) -> Option<Vec<String>> {
        if !self.mos {
            return None;
        }
        let mut t = self.terminals.clone();
        t.swap(0, 2);
        Some(t)
    }

    /// Same model and same sorted terminal IDs.
    pub fn same_key(&self, other: &CanonicalDevice) -> bool {
        self.model == other.model && self.sorted == other.sorted
    }

    /// Identical role-ordered terminals, possibly after a source/drain swap.
    /// Returns the swap flag on a match.
    pub fn matches(&self, other: &CanonicalDevice) -> Option<bool> {
        if self.model != other.model {
            return None;
        }
        if self.terminals == other.terminals {
            return Some(false);
        }
        match other.swapped_terminals() {
            Some(t) if self.mos && t == self.terminals => Some(true),
            _ => None,
        }
    }

    /// Number of agreeing terminal positions under the better orientation,
    /// and whether that orientation swaps source and drain.
    pub fn agreement(&self, other: &CanonicalDevice) -> (usize, bool) {
        let direct = count_equal(&self.terminals, &other.terminals);
        let swapped = match other.swapped_terminals() {
            Some(t) if self.mos => count_equal(&self.terminals, &t),
            _ => 0,
        };
        if swapped > direct {
            (swapped, true)
        } else {
            (direct, false)
        }
    }

    /// Position in `other` that corresponds to `role` in `self`.
    pub fn mapped_role(role: usize, swapped: bool) -> usize {
        match (swapped, role) {
            (true, 0) => 2,
            (true, 2) => 0,
            (_, r) => r,
        }
    }
}

fn count_equal(a: &[String], b: &[String]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x == y).count()
}

/// Canonical signature of one subcircuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub ports: Vec<String>,
    /// Devices sorted by model, sorted IDs, role-ordered IDs, then instance.
    pub devices: Vec<CanonicalDevice>,
    /// Original net name → canonical ID.
    pub net_ids: BTreeMap<String, String>,
    /// Original net name → `(instance, role)` terminals touching it.
    pub terminals: BTreeMap<String, Vec<(String, usize)>>,
    /// Records left out because they have no model.
    pub unparsed: Vec<String>,
}

impl Signature {
    pub fn device(&self, instance: &str) -> Option<&CanonicalDevice> {
        self.devices.iter().find(|d| d.instance == instance)
    }

    /// Nets touched by a device that are not ports.
    pub fn internal_net_count(&self) -> usize {
        self.net_ids.values().filter(|id| id.starts_with("INT_")).count()
    }
}

/// Build the canonical signature of `sub`.
pub fn canonicalize(sub: &Subcircuit) -> Signature {
    let ports: HashSet<&str> = sub.ports.iter().map(|s| s.as_str()).collect();

    let mut records = Vec::new();
    let mut unparsed = Vec::new();
    for record in &sub.devices {
        match record.device_model() {
            Some(model) => {
                let mos = record.kind == DeviceKind::Mosfet && record.nets.len() == 4;
                records.push((record, model, mos));
            }
            None => unparsed.push(record.instance.clone()),
        }
    }
    if !unparsed.is_empty() {
        log::debug!(
            "Subcircuit '{}': {} records without a model left out",
            sub.name,
            unparsed.len()
        );
    }

    let mut connectivity: BTreeMap<&str, Vec<(DeviceModel, RoleClass)>> = BTreeMap::new();
    let mut terminals: BTreeMap<String, Vec<(String, usize)>> = BTreeMap::new();
    for (record, model, mos) in &records {
        for (role, net) in record.nets.iter().enumerate() {
            terminals
                .entry(net.clone())
                .or_default()
                .push((record.instance.clone(), role));
            if !ports.contains(net.as_str()) {
                connectivity
                    .entry(net.as_str())
                    .or_default()
                    .push((model.clone(), RoleClass::of(*mos, role)));
            }
        }
    }
    for list in connectivity.values_mut() {
        list.sort();
    }
    for list in terminals.values_mut() {
        list.sort();
    }

    // Dense rank: nets with identical connectivity share an ID.
    let ranks: BTreeMap<&Vec<(DeviceModel, RoleClass)>, usize> = connectivity
        .values()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, conn)| (conn, i + 1))
        .collect();

    let mut net_ids = BTreeMap::new();
    for net in terminals.keys() {
        let id = match connectivity.get(net.as_str()) {
            Some(conn) => format!("INT_{}", ranks[conn]),
            None => format!("PORT_{}", net),
        };
        net_ids.insert(net.clone(), id);
    }

    let mut devices: Vec<CanonicalDevice> = records
        .iter()
        .map(|(record, model, mos)| {
            let ids: Vec<String> = record.nets.iter().map(|n| net_ids[n].clone()).collect();
            let mut sorted = ids.clone();
            sorted.sort();
            CanonicalDevice {
                model: model.clone(),
                mos: *mos,
                terminals: ids,
                sorted,
                instance: record.instance.clone(),
                nets: record.nets.clone(),
                width: record.width(),
                length: record.length(),
            }
        })
        .collect();
    devices.sort_by(|a, b| {
        (&a.model, &a.sorted, &a.terminals, &a.instance, &a.nets).cmp(&(
            &b.model,
            &b.sorted,
            &b.terminals,
            &b.instance,
            &b.nets,
        ))
    });

    Signature {
        name: sub.name.clone(),
        ports: sub.ports.clone(),
        devices,
        net_ids,
        terminals,
        unparsed,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lvs_netlist::model::{DeviceRecord, Subcircuit};

    pub fn mos(inst: &str, nets: [&str; 4], model: &str, w: &str, l: &str) -> DeviceRecord {
        DeviceRecord::new(
            inst,
            nets.iter().map(|s| s.to_string()).collect(),
            Some(model.to_string()),
        )
        .with_param("W", w)
        .with_param("L", l)
    }

    pub fn subckt(name: &str, ports: &[&str], devices: Vec<DeviceRecord>) -> Subcircuit {
        let mut sub = Subcircuit::new(name, ports.iter().map(|s| s.to_string()).collect());
        sub.devices = devices;
        sub
    }

    /// Inverter as drawn in a schematic.
    pub fn inverter() -> Subcircuit {
        subckt(
            "INV",
            &["A", "Y", "VDD", "VSS"],
            vec![
                mos("MP", ["Y", "A", "VDD", "VDD"], "pmos", "2u", "0.2u"),
                mos("MN", ["Y", "A", "VSS", "VSS"], "nmos", "1u", "0.2u"),
            ],
        )
    }

    /// Two-stage buffer with an internal net between the stages.
    pub fn buffer(mid: &str) -> Subcircuit {
        subckt(
            "BUF",
            &["A", "Y", "VDD", "VSS"],
            vec![
                mos("MP1", [mid, "A", "VDD", "VDD"], "P", "2u", "0.2u"),
                mos("MN1", [mid, "A", "VSS", "VSS"], "N", "1u", "0.2u"),
                mos("MP2", ["Y", mid, "VDD", "VDD"], "P", "4u", "0.2u"),
                mos("MN2", ["Y", mid, "VSS", "VSS"], "N", "2u", "0.2u"),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn topology(sig: &Signature) -> Vec<(DeviceModel, Vec<String>, Vec<String>, String)> {
        sig.devices
            .iter()
            .map(|d| {
                (
                    d.model.clone(),
                    d.terminals.clone(),
                    d.sorted.clone(),
                    d.instance.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let sub = buffer("mid");
        assert_eq!(canonicalize(&sub), canonicalize(&sub));
    }

    #[test]
    fn test_renaming_internal_nets_keeps_topology() {
        let a = canonicalize(&buffer("mid"));
        let b = canonicalize(&buffer("net_42"));
        assert_eq!(topology(&a), topology(&b));
        assert_eq!(a.net_ids["mid"], b.net_ids["net_42"]);
        assert_eq!(a.internal_net_count(), 1);
    }

    fn and2(out_n: &str, stack: &str, swap_stack: bool) -> lvs_netlist::model::Subcircuit {
        let mn1 = if swap_stack {
            [stack, "A", out_n, "VSS"]
        } else {
            [out_n, "A", stack, "VSS"]
        };
        subckt(
            "AND2",
            &["A", "B", "Y", "VDD", "VSS"],
            vec![
                mos("MP1", [out_n, "A", "VDD", "VDD"], "P", "1u", "0.2u"),
                mos("MP2", [out_n, "B", "VDD", "VDD"], "P", "1u", "0.2u"),
                mos("MN1", mn1, "N", "1u", "0.2u"),
                mos("MN2", [stack, "B", "VSS", "VSS"], "N", "1u", "0.2u"),
                mos("MP3", ["Y", out_n, "VDD", "VDD"], "P", "2u", "0.2u"),
                mos("MN3", ["Y", out_n, "VSS", "VSS"], "N", "1u", "0.2u"),
            ],
        )
    }

    #[test]
    fn test_permuted_names_and_swapped_terminals_keep_ids() {
        let a = canonicalize(&and2("nd", "x1", false));
        // names swap their sort order and MN1 has source and drain exchanged
        let b = canonicalize(&and2("n7", "n3", true));

        assert_eq!(a.internal_net_count(), 2);
        assert_eq!(b.internal_net_count(), 2);
        assert_eq!(a.net_ids["nd"], b.net_ids["n7"]);
        assert_eq!(a.net_ids["x1"], b.net_ids["n3"]);
        assert_ne!(a.net_ids["nd"], a.net_ids["x1"]);

        for d in &a.devices {
            let other = b.device(&d.instance).unwrap();
            assert!(d.same_key(other), "{}", d.instance);
            let expected = d.instance == "MN1";
            assert_eq!(d.matches(other), Some(expected), "{}", d.instance);
        }
    }

    #[test]
    fn test_ports_and_internal_ids() {
        let sig = canonicalize(&buffer("mid"));
        assert_eq!(sig.net_ids["A"], "PORT_A");
        assert_eq!(sig.net_ids["mid"], "INT_1");
        let mp2 = sig.device("MP2").unwrap();
        assert_eq!(mp2.model, DeviceModel::Pmos);
        assert_eq!(mp2.terminals, vec!["PORT_Y", "INT_1", "PORT_VDD", "PORT_VDD"]);
        assert_eq!(mp2.width, Some(4.0));
        assert_eq!(sig.terminals["mid"].len(), 4);
    }

    #[test]
    fn test_source_drain_swap_keeps_ids() {
        let plain = canonicalize(&buffer("mid"));
        let mut sub = buffer("mid");
        sub.devices[0].nets.swap(0, 2);
        let swapped = canonicalize(&sub);
        assert_eq!(plain.net_ids, swapped.net_ids);

        let a = plain.device("MP1").unwrap();
        let b = swapped.device("MP1").unwrap();
        assert!(a.same_key(b));
        assert_eq!(a.matches(b), Some(true));
        assert_eq!(a.agreement(b), (4, true));
    }

    #[test]
    fn test_records_without_model_are_left_out() {
        let mut sub = inverter();
        sub.devices.push(lvs_netlist::model::DeviceRecord::new(
            "M9",
            vec!["Y".into(), "A".into()],
            None,
        ));
        let sig = canonicalize(&sub);
        assert_eq!(sig.devices.len(), 2);
        assert_eq!(sig.unparsed, vec!["M9"]);
    }
}
