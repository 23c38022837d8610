//! Connectivity propagation through the layer stack.

use std::collections::HashSet;

use rayon::prelude::*;

use lvs_core::kernel::GeometryKernel;
use lvs_core::layer::{LayerSpec, LayerStack};

use crate::geometry::{PolygonId, Workspace};
use crate::netmap::{NetMap, NetUnionFind};

/// Layer pairs already compared during one propagation pass.
pub type VisitedPairs = HashSet<(LayerSpec, LayerSpec)>;

/// Every `(a, b)` with `a` on `lower` and `b` on `upper` whose interiors
/// overlap. Candidates come from an R-tree over `upper`.
pub fn overlapping_pairs(
    ws: &Workspace,
    kernel: &GeometryKernel,
    lower: LayerSpec,
    upper: LayerSpec,
) -> Vec<(PolygonId, PolygonId)> {
    let index = ws.spatial_index(upper);
    let targets = ws.on_layer(upper);
    ws.on_layer(lower)
        .par_iter()
        .map(|&a| {
            let pa = ws.get(a);
            let Some(bbox) = pa.bbox() else {
                return Vec::new();
            };
            index
                .candidates(&bbox)
                .into_iter()
                .map(|i| targets[i])
                .filter(|&b| kernel.overlaps(pa, ws.get(b)))
                .map(|b| (a, b))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Walk the stack from `start`, merging the nets of overlapping polygons on
/// adjacent tiers until every reachable layer pair has been compared.
/// Returns the number of merges performed.
pub fn propagate(
    ws: &Workspace,
    kernel: &GeometryKernel,
    stack: &LayerStack,
    start: LayerSpec,
    netmap: &NetMap,
    uf: &mut NetUnionFind,
    visited: &mut VisitedPairs,
) -> usize {
    let mut merges = 0;
    let mut work = vec![start];
    while let Some(current) = work.pop() {
        if !ws.has(current) {
            continue;
        }
        for neighbor in stack.neighbors(current) {
            if !ws.has(neighbor) || visited.contains(&(current, neighbor)) {
                continue;
            }
            visited.insert((current, neighbor));
            visited.insert((neighbor, current));

            for (a, b) in overlapping_pairs(ws, kernel, current, neighbor) {
                let (Some(na), Some(nb)) = (netmap.get(a), netmap.get(b)) else {
                    continue;
                };
                if uf.union(na, nb) {
                    merges += 1;
                }
            }
            log::trace!("Compared {} with {}", current, neighbor);
            work.push(neighbor);
        }
    }
    merges
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use lvs_core::geometry::Polygon;
    use lvs_core::layer::Tier;

    const POLY: LayerSpec = LayerSpec::new(2, 0);
    const CONT: LayerSpec = LayerSpec::new(6, 0);
    const M1: LayerSpec = LayerSpec::new(7, 0);
    const VIA: LayerSpec = LayerSpec::new(9, 0);
    const M2: LayerSpec = LayerSpec::new(10, 0);

    #[test]
    fn test_chain_through_stack() {
        let mut layers = BTreeMap::new();
        layers.insert(POLY, vec![Polygon::rect(POLY, 0.0, 0.0, 1.0, 1.0)]);
        layers.insert(CONT, vec![Polygon::rect(CONT, 0.2, 0.2, 0.4, 0.4)]);
        layers.insert(
            M1,
            vec![
                Polygon::rect(M1, 0.0, 0.0, 3.0, 0.5),
                // abuts the first metal shape only on the layer itself
                Polygon::rect(M1, 3.0, 0.0, 4.0, 0.5),
            ],
        );
        // m2 is unreachable: no via shapes
        layers.insert(M2, vec![Polygon::rect(M2, 0.0, 0.0, 5.0, 5.0)]);
        let ws = Workspace::from_layers(layers);
        let stack = LayerStack::new(vec![
            Tier::single(POLY),
            Tier::single(CONT),
            Tier::single(M1),
            Tier::single(VIA),
            Tier::single(M2),
        ]);

        let mut netmap = NetMap::new();
        for (k, id) in ws.ids().enumerate() {
            netmap.assign(id, &format!("n{}", k));
        }
        let mut uf = NetUnionFind::new(Vec::new());
        let mut visited = VisitedPairs::new();
        let kernel = GeometryKernel::default();
        let merges = propagate(&ws, &kernel, &stack, POLY, &netmap, &mut uf, &mut visited);

        assert_eq!(merges, 2);
        let resolved = uf.resolve(&netmap);
        let poly_net = resolved.get(ws.on_layer(POLY)[0]).unwrap().to_string();
        assert_eq!(resolved.get(ws.on_layer(M1)[0]), Some(poly_net.as_str()));
        assert_ne!(resolved.get(ws.on_layer(M1)[1]), Some(poly_net.as_str()));
        assert!(visited.contains(&(M1, CONT)));
        assert!(!visited.contains(&(M1, VIA)));
    }
}
