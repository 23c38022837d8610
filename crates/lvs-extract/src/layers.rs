//! Layer preparation: merge conductor layers and derive the device
//! recognition layers with boolean operations.

use std::collections::BTreeMap;

use lvs_core::cell::FlatCell;
use lvs_core::geometry::Polygon;
use lvs_core::kernel::GeometryKernel;
use lvs_core::layer::{synthetic, LayerSpec};
use lvs_io::config::ProcessConfig;

use crate::error::ExtractionError;

pub type LayerShapes = BTreeMap<LayerSpec, Vec<Polygon>>;

fn group_by_layer(flat: &FlatCell) -> LayerShapes {
    let mut layers = LayerShapes::new();
    for poly in &flat.polygons {
        layers.entry(poly.layer).or_default().push(poly.clone());
    }
    layers
}

/// Group the flattened shapes by layer, merge every stack layer and add the
/// synthetic layers. The diffusion layer is replaced by diffusion minus poly
/// so that source/drain regions are separate polygons.
pub fn prepare_layers(
    flat: &FlatCell,
    config: &ProcessConfig,
    kernel: &GeometryKernel,
) -> Result<LayerShapes, ExtractionError> {
    let base = &config.base;
    let mut layers = group_by_layer(flat);

    for (name, spec) in [("poly", base.poly), ("diff", base.diff)] {
        if layers.get(&spec).map_or(true, |v| v.is_empty()) {
            return Err(ExtractionError::MissingLayer {
                cell: flat.name.clone(),
                name: name.to_string(),
                spec,
            });
        }
    }
    for (name, spec) in [("pp", base.pp), ("np", base.np), ("nwell", base.nwell)] {
        if !layers.contains_key(&spec) {
            log::warn!("Cell '{}': no shapes on {} ({})", flat.name, name, spec);
        }
    }

    for layer in config.stack.layers() {
        if let Some(shapes) = layers.get(&layer) {
            let merged = kernel.merge(shapes, layer);
            log::debug!(
                "Merged {} shapes on {} into {}",
                shapes.len(),
                layer,
                merged.len()
            );
            layers.insert(layer, merged);
        }
    }

    let shapes = |layers: &LayerShapes, spec: LayerSpec| layers.get(&spec).cloned().unwrap_or_default();
    let diff = shapes(&layers, base.diff);
    let poly = shapes(&layers, base.poly);
    let pp = shapes(&layers, base.pp);
    let np = shapes(&layers, base.np);
    let nwell = shapes(&layers, base.nwell);

    let gate = kernel.intersect(&diff, &poly, synthetic::GATE);
    if gate.is_empty() {
        return Err(ExtractionError::NoGates {
            cell: flat.name.clone(),
        });
    }
    let pmos_active = kernel.intersect(&gate, &pp, synthetic::PMOS_ACTIVE);
    let nmos_active = kernel.intersect(&gate, &np, synthetic::NMOS_ACTIVE);
    if pmos_active.is_empty() && nmos_active.is_empty() {
        log::warn!(
            "Cell '{}': {} gate regions but none inside a p+ or n+ implant",
            flat.name,
            gate.len()
        );
    }
    let p_diffusion = kernel.intersect(&diff, &pp, synthetic::P_DIFFUSION);
    let n_diffusion = kernel.intersect(&diff, &np, synthetic::N_DIFFUSION);
    let p_body = kernel.intersect(&n_diffusion, &nwell, synthetic::P_BODY);
    let n_body = kernel.subtract(&p_diffusion, &nwell, synthetic::N_BODY);
    let diff_not_poly = kernel.subtract(&diff, &poly, base.diff);

    log::debug!(
        "Cell '{}': {} gates ({} pmos, {} nmos), {} diffusion regions, {} body taps",
        flat.name,
        gate.len(),
        pmos_active.len(),
        nmos_active.len(),
        diff_not_poly.len(),
        p_body.len() + n_body.len()
    );

    layers.insert(base.diff, diff_not_poly);
    layers.insert(synthetic::GATE, gate);
    layers.insert(synthetic::PMOS_ACTIVE, pmos_active);
    layers.insert(synthetic::NMOS_ACTIVE, nmos_active);
    layers.insert(synthetic::P_DIFFUSION, p_diffusion);
    layers.insert(synthetic::N_DIFFUSION, n_diffusion);
    layers.insert(synthetic::P_BODY, p_body);
    layers.insert(synthetic::N_BODY, n_body);
    Ok(layers)
}
