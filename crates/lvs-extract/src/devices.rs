//! MOS device recognition and W/L extraction.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use lvs_core::kernel::GeometryKernel;
use lvs_core::layer::{synthetic, LayerSpec};
use lvs_netlist::model::{DeviceModel, DeviceRecord};
use lvs_netlist::writer::format_dimension;

use crate::geometry::{PolygonId, Workspace};
use crate::netmap::NetMap;

const UNCONNECTED: &str = "UNCONNECTED";

/// A transistor recognized in the layout. Terminal position 2 (`source`) is
/// the supply side when one terminal sits on a supply net, otherwise the
/// lexicographically larger net; the bulk always follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDevice {
    pub name: String,
    pub model: DeviceModel,
    pub drain: String,
    pub gate: String,
    pub source: String,
    pub bulk: String,
    /// Total width over all fingers, in micrometers.
    pub width: f64,
    /// Minimum channel length over all fingers, in micrometers.
    pub length: f64,
    pub fingers: u32,
}

impl ExtractedDevice {
    /// Nets in SPICE terminal order: drain, gate, source, bulk.
    pub fn nets(&self) -> [&str; 4] {
        [&self.drain, &self.gate, &self.source, &self.bulk]
    }

    pub fn to_record(&self) -> DeviceRecord {
        DeviceRecord::new(
            &self.name,
            self.nets().iter().map(|s| s.to_string()).collect(),
            Some(self.model.to_string()),
        )
        .with_param("W", &format_dimension(self.width))
        .with_param("L", &format_dimension(self.length))
        .with_param("nf", &self.fingers.to_string())
    }
}

/// Nets of diffusion regions that overlap a body-tap layer.
pub fn find_supply_nets(
    ws: &Workspace,
    kernel: &GeometryKernel,
    diff: LayerSpec,
    netmap: &NetMap,
) -> BTreeSet<String> {
    let bodies: Vec<PolygonId> = ws
        .on_layer(synthetic::P_BODY)
        .iter()
        .chain(ws.on_layer(synthetic::N_BODY))
        .copied()
        .collect();
    let mut supply = BTreeSet::new();
    for &d in ws.on_layer(diff) {
        let pd = ws.get(d);
        if bodies.iter().any(|&b| kernel.overlaps(pd, ws.get(b))) {
            if let Some(net) = netmap.get(d) {
                supply.insert(net.to_string());
            }
        }
    }
    supply
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DeviceKey {
    model: DeviceModel,
    nets: [String; 4],
}

#[derive(Debug, Clone, Default)]
struct Accumulated {
    fingers: u32,
    width: f64,
    length: f64,
}

/// Collects devices over one or more active layers, merging fingers that
/// connect to the same four nets.
pub struct DeviceExtractor<'a> {
    ws: &'a Workspace,
    kernel: &'a GeometryKernel,
    netmap: &'a NetMap,
    supply: &'a BTreeSet<String>,
    diff: LayerSpec,
    devices: IndexMap<DeviceKey, Accumulated>,
    skipped: usize,
}

impl<'a> DeviceExtractor<'a> {
    pub fn new(
        ws: &'a Workspace,
        kernel: &'a GeometryKernel,
        netmap: &'a NetMap,
        supply: &'a BTreeSet<String>,
        diff: LayerSpec,
    ) -> Self {
        Self {
            ws,
            kernel,
            netmap,
            supply,
            diff,
            devices: IndexMap::new(),
            skipped: 0,
        }
    }

    fn net(&self, id: PolygonId) -> String {
        self.netmap.get(id).unwrap_or(UNCONNECTED).to_string()
    }

    /// Recognize one transistor per gate polygon on `active` that shares an
    /// edge with exactly two diffusion regions.
    pub fn scan(&mut self, active: LayerSpec, model: DeviceModel) {
        let index = self.ws.spatial_index(self.diff);
        let diffs = self.ws.on_layer(self.diff);

        for &gate in self.ws.on_layer(active) {
            let pg = self.ws.get(gate);
            let Some(bbox) = pg.bbox() else {
                continue;
            };
            let neighbors: Vec<PolygonId> = index
                .candidates(&bbox)
                .into_iter()
                .map(|i| diffs[i])
                .filter(|&d| self.kernel.shares_edge(pg, self.ws.get(d)))
                .collect();
            if neighbors.len() != 2 {
                log::warn!(
                    "{} gate near ({:.3}, {:.3}) touches {} diffusion regions; skipped",
                    model,
                    bbox.min.x,
                    bbox.min.y,
                    neighbors.len()
                );
                self.skipped += 1;
                continue;
            }

            let (first, second) = (neighbors[0], neighbors[1]);
            let length = self
                .kernel
                .min_distance(self.ws.get(first), self.ws.get(second));
            if length <= 0.0 {
                log::warn!(
                    "{} gate near ({:.3}, {:.3}) has touching terminals; skipped",
                    model,
                    bbox.min.x,
                    bbox.min.y
                );
                self.skipped += 1;
                continue;
            }

            let gate_net = self.net(gate);
            let (a, b) = (self.net(first), self.net(second));
            let (t0, t2) = if self.supply.contains(&b) {
                (a, b)
            } else if self.supply.contains(&a) {
                (b, a)
            } else if a < b {
                (a, b)
            } else {
                (b, a)
            };
            let key = DeviceKey {
                model: model.clone(),
                nets: [t0, gate_net, t2.clone(), t2],
            };

            let area = self.kernel.area(pg);
            let acc = self.devices.entry(key).or_default();
            acc.fingers += 1;
            acc.length = if acc.length == 0.0 {
                length
            } else {
                acc.length.min(length)
            };
            acc.width += self.kernel.quantize(area / acc.length);
        }
    }

    /// Number of gates that did not form a device.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Devices in first-seen order, named `M1..Mn`.
    pub fn finish(self) -> Vec<ExtractedDevice> {
        self.devices
            .into_iter()
            .enumerate()
            .map(|(i, (key, acc))| {
                let [drain, gate, source, bulk] = key.nets;
                ExtractedDevice {
                    name: format!("M{}", i + 1),
                    model: key.model,
                    drain,
                    gate,
                    source,
                    bulk,
                    width: self.kernel.quantize(acc.width),
                    length: acc.length,
                    fingers: acc.fingers,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use lvs_core::geometry::Polygon;

    const DIFF: LayerSpec = LayerSpec::new(1, 0);

    /// Two fingers sharing a middle diffusion: S | G | D | G | S.
    fn two_finger_workspace() -> Workspace {
        let mut layers = BTreeMap::new();
        layers.insert(
            DIFF,
            vec![
                Polygon::rect(DIFF, 0.0, 0.0, 1.0, 1.0),
                Polygon::rect(DIFF, 1.2, 0.0, 2.2, 1.0),
                Polygon::rect(DIFF, 2.4, 0.0, 3.4, 1.0),
            ],
        );
        layers.insert(
            synthetic::NMOS_ACTIVE,
            vec![
                Polygon::rect(synthetic::NMOS_ACTIVE, 1.0, 0.0, 1.2, 1.0),
                Polygon::rect(synthetic::NMOS_ACTIVE, 2.2, 0.0, 2.4, 1.0),
            ],
        );
        layers.insert(
            synthetic::N_BODY,
            vec![Polygon::rect(synthetic::N_BODY, 0.0, 0.0, 1.0, 1.0)],
        );
        Workspace::from_layers(layers)
    }

    fn named(ws: &Workspace, names: &[&str]) -> NetMap {
        let mut map = NetMap::new();
        for (id, name) in ws.ids().zip(names) {
            map.assign(id, name);
        }
        map
    }

    #[test]
    fn test_fingers_merge_into_one_device() {
        let ws = two_finger_workspace();
        // diff (3), active (2), body (1) in layer order
        let netmap = named(&ws, &["VSS", "Y", "VSS", "G", "G", "VSS"]);
        let kernel = GeometryKernel::default();
        let supply = find_supply_nets(&ws, &kernel, DIFF, &netmap);
        assert_eq!(supply.iter().collect::<Vec<_>>(), vec!["VSS"]);

        let mut ex = DeviceExtractor::new(&ws, &kernel, &netmap, &supply, DIFF);
        ex.scan(synthetic::NMOS_ACTIVE, DeviceModel::Nmos);
        assert_eq!(ex.skipped(), 0);
        let devices = ex.finish();
        assert_eq!(devices.len(), 1);

        let d = &devices[0];
        assert_eq!(d.name, "M1");
        assert_eq!(d.nets(), ["Y", "G", "VSS", "VSS"]);
        assert_eq!(d.fingers, 2);
        assert!((d.width - 2.0).abs() < 1e-9);
        assert!((d.length - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_gate_with_one_neighbor_is_discarded() {
        let mut layers = BTreeMap::new();
        layers.insert(DIFF, vec![Polygon::rect(DIFF, 0.0, 0.0, 1.0, 1.0)]);
        layers.insert(
            synthetic::PMOS_ACTIVE,
            vec![Polygon::rect(synthetic::PMOS_ACTIVE, 1.0, 0.0, 1.2, 1.0)],
        );
        let ws = Workspace::from_layers(layers);
        let netmap = named(&ws, &["a", "g"]);
        let kernel = GeometryKernel::default();
        let supply = BTreeSet::new();
        let mut ex = DeviceExtractor::new(&ws, &kernel, &netmap, &supply, DIFF);
        ex.scan(synthetic::PMOS_ACTIVE, DeviceModel::Pmos);
        assert_eq!(ex.skipped(), 1);
        assert!(ex.finish().is_empty());
    }

    #[test]
    fn test_without_supply_larger_net_goes_to_source() {
        let ws = two_finger_workspace();
        let netmap = named(&ws, &["b", "a", "c", "g1", "g2", "x"]);
        let kernel = GeometryKernel::default();
        let supply = BTreeSet::new();
        let mut ex = DeviceExtractor::new(&ws, &kernel, &netmap, &supply, DIFF);
        ex.scan(synthetic::NMOS_ACTIVE, DeviceModel::Nmos);
        let devices = ex.finish();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].nets(), ["a", "g1", "b", "b"]);
        assert_eq!(devices[1].nets(), ["a", "g2", "c", "c"]);
        assert_eq!(devices[1].to_record().nets, vec!["a", "g2", "c", "c"]);
    }
}
