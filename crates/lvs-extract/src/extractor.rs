//! Per-cell extraction: layout geometry in, named nets and devices out.

use std::collections::{BTreeSet, HashSet};

use lvs_core::cell::{Cell, FlatCell};
use lvs_core::database::LayoutLibrary;
use lvs_core::kernel::GeometryKernel;
use lvs_core::layer::{synthetic, LayerStack, Tier};
use lvs_io::config::ProcessConfig;
use lvs_netlist::model::{DeviceModel, Subcircuit};

use crate::connect::{propagate, VisitedPairs};
use crate::devices::{find_supply_nets, DeviceExtractor, ExtractedDevice};
use crate::error::ExtractionError;
use crate::geometry::Workspace;
use crate::labels::{assign_placeholders, bind_pin_labels, collect_ports};
use crate::layers::prepare_layers;
use crate::netmap::{NetMap, NetUnionFind};

/// Everything extracted from one layout cell.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub cell: String,
    pub ports: Vec<String>,
    pub devices: Vec<ExtractedDevice>,
    pub supply_nets: BTreeSet<String>,
    /// Distinct nets on the conductor layers of the stack.
    pub net_count: usize,
    /// Gates that touched other than two diffusion regions, or whose
    /// terminals touch.
    pub skipped_gates: usize,
    pub netmap: NetMap,
    pub workspace: Workspace,
}

impl Extraction {
    /// The layout-derived `.SUBCKT`.
    pub fn to_subcircuit(&self) -> Subcircuit {
        let mut sub = Subcircuit::new(&self.cell, self.ports.clone());
        sub.devices = self.devices.iter().map(|d| d.to_record()).collect();
        sub
    }

    /// The working geometry, synthetic layers included, for inspection.
    pub fn geometry_cell(&self) -> Cell {
        self.workspace.to_cell(&format!("{}_lvs", self.cell))
    }
}

/// Flatten `cell` and extract it.
pub fn extract_from_library(
    lib: &LayoutLibrary,
    cell: &str,
    config: &ProcessConfig,
) -> Result<Extraction, ExtractionError> {
    let flat = lib.flatten(cell)?;
    extract_cell(&flat, lib.dbu, config)
}

/// Extract nets and MOS devices from a flattened cell.
pub fn extract_cell(
    flat: &FlatCell,
    dbu: f64,
    config: &ProcessConfig,
) -> Result<Extraction, ExtractionError> {
    let kernel = GeometryKernel::new(dbu);
    let base = config.base;

    let layers = prepare_layers(flat, config, &kernel)?;
    let workspace = Workspace::from_layers(layers);

    let ports = collect_ports(flat, &config.pins);
    let mut netmap = NetMap::new();
    let bound = bind_pin_labels(&workspace, flat, &config.pins, &kernel, &mut netmap);
    assign_placeholders(&workspace, &mut netmap);
    log::debug!(
        "Cell '{}': {} ports, {} polygons named from labels",
        flat.name,
        ports.len(),
        bound
    );

    let mut uf = NetUnionFind::new(ports.iter().cloned());
    let mut visited = VisitedPairs::new();
    let mut merges = propagate(
        &workspace,
        &kernel,
        &config.stack,
        base.poly,
        &netmap,
        &mut uf,
        &mut visited,
    );
    let gate_stack = LayerStack::new(vec![
        Tier::alternatives(vec![synthetic::PMOS_ACTIVE, synthetic::NMOS_ACTIVE]),
        Tier::single(base.poly),
    ]);
    let mut visited = VisitedPairs::new();
    merges += propagate(
        &workspace,
        &kernel,
        &gate_stack,
        base.poly,
        &netmap,
        &mut uf,
        &mut visited,
    );
    let netmap = uf.resolve(&netmap);

    let conductors: HashSet<_> = config.stack.layers().collect();
    let net_count = netmap
        .iter()
        .filter(|(id, _)| conductors.contains(&workspace.get(*id).layer))
        .map(|(_, name)| name)
        .collect::<HashSet<_>>()
        .len();

    let supply_nets = find_supply_nets(&workspace, &kernel, base.diff, &netmap);
    let mut extractor = DeviceExtractor::new(&workspace, &kernel, &netmap, &supply_nets, base.diff);
    extractor.scan(synthetic::PMOS_ACTIVE, DeviceModel::Pmos);
    extractor.scan(synthetic::NMOS_ACTIVE, DeviceModel::Nmos);
    let skipped_gates = extractor.skipped();
    let devices = extractor.finish();

    log::info!(
        "Extracted '{}': {} devices, {} nets ({} merges), supply {:?}",
        flat.name,
        devices.len(),
        net_count,
        merges,
        supply_nets
    );

    Ok(Extraction {
        cell: flat.name.clone(),
        ports,
        devices,
        supply_nets,
        net_count,
        skipped_gates,
        netmap,
        workspace,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lvs_core::geometry::{Label, Point, Polygon};
    use lvs_core::layer::LayerSpec;
    use lvs_io::config::{BaseLayers, PinLayer};

    use super::*;

    pub const DIFF: LayerSpec = LayerSpec::new(1, 0);
    pub const POLY: LayerSpec = LayerSpec::new(2, 0);
    pub const PP: LayerSpec = LayerSpec::new(3, 0);
    pub const NP: LayerSpec = LayerSpec::new(4, 0);
    pub const NWELL: LayerSpec = LayerSpec::new(5, 0);
    pub const CONT: LayerSpec = LayerSpec::new(6, 0);
    pub const M1: LayerSpec = LayerSpec::new(7, 0);
    pub const TXT: LayerSpec = LayerSpec::new(8, 0);

    pub fn config() -> ProcessConfig {
        ProcessConfig {
            base: BaseLayers {
                poly: POLY,
                diff: DIFF,
                pp: PP,
                np: NP,
                nwell: NWELL,
            },
            stack: LayerStack::new(vec![
                Tier::alternatives(vec![DIFF, POLY]),
                Tier::single(CONT),
                Tier::single(M1),
            ]),
            pins: vec![PinLayer { text: TXT, metal: M1 }],
        }
    }

    fn rect(flat: &mut FlatCell, layer: LayerSpec, x0: f64, y0: f64, x1: f64, y1: f64) {
        flat.polygons.push(Polygon::rect(layer, x0, y0, x1, y1));
    }

    /// A CMOS inverter with substrate and well taps. Inputs A, output Y.
    pub fn inverter() -> FlatCell {
        let mut f = FlatCell::new("INV");
        // poly with a contact pad
        rect(&mut f, POLY, 1.0, -0.5, 1.2, 5.5);
        rect(&mut f, POLY, 0.8, 1.8, 1.4, 2.4);
        // nmos
        rect(&mut f, DIFF, 0.0, 0.0, 2.2, 1.0);
        rect(&mut f, NP, -0.5, -0.5, 2.7, 1.5);
        // pmos
        rect(&mut f, DIFF, 0.0, 3.0, 2.2, 5.0);
        rect(&mut f, PP, -0.5, 2.5, 2.7, 5.5);
        rect(&mut f, NWELL, -1.0, 2.0, 5.5, 6.0);
        // substrate tap
        rect(&mut f, DIFF, 4.0, 0.0, 5.0, 1.0);
        rect(&mut f, PP, 3.8, -0.2, 5.2, 1.2);
        // well tap
        rect(&mut f, DIFF, 4.0, 4.0, 5.0, 5.0);
        rect(&mut f, NP, 3.8, 3.8, 5.2, 5.2);
        // contacts
        for (x0, y0) in [(0.3, 0.3), (1.5, 0.3), (0.3, 3.5), (1.5, 3.5), (4.3, 0.3), (4.3, 4.3)] {
            rect(&mut f, CONT, x0, y0, x0 + 0.3, y0 + 0.3);
        }
        rect(&mut f, CONT, 0.95, 1.95, 1.25, 2.25);
        // VSS
        rect(&mut f, M1, 0.2, -0.4, 0.7, 0.7);
        rect(&mut f, M1, 0.2, -0.4, 4.7, -0.1);
        rect(&mut f, M1, 4.2, -0.4, 4.7, 0.7);
        // VDD
        rect(&mut f, M1, 0.2, 3.4, 0.7, 5.8);
        rect(&mut f, M1, 0.2, 5.5, 4.7, 5.8);
        rect(&mut f, M1, 4.2, 4.2, 4.7, 5.8);
        // Y and A
        rect(&mut f, M1, 1.4, 0.2, 1.9, 3.9);
        rect(&mut f, M1, 0.9, 1.9, 1.3, 2.3);

        f.labels.push(Label::new(TXT, "A", Point::new(1.1, 2.1)));
        f.labels.push(Label::new(TXT, "Y", Point::new(1.65, 2.0)));
        f.labels.push(Label::new(TXT, "VDD", Point::new(0.45, 5.0)));
        f.labels.push(Label::new(TXT, "VSS", Point::new(0.45, 0.0)));
        f
    }
}
