use std::collections::BTreeMap;

use lvs_core::cell::Cell;
use lvs_core::geometry::Polygon;
use lvs_core::layer::LayerSpec;
use lvs_core::spatial::{SpatialEntry, SpatialIndex};

/// Index of a polygon in the [`Workspace`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolygonId(pub usize);

/// The working geometry of one cell run: every polygon lives in a single
/// arena and per-layer lists refer to it by [`PolygonId`].
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    polygons: Vec<Polygon>,
    by_layer: BTreeMap<LayerSpec, Vec<PolygonId>>,
}

impl Workspace {
    /// Freeze per-layer polygon lists into an arena. Ids are handed out in
    /// layer order, then in list order.
    pub fn from_layers(layers: BTreeMap<LayerSpec, Vec<Polygon>>) -> Self {
        let mut ws = Self::default();
        for (layer, polys) in layers {
            if polys.is_empty() {
                continue;
            }
            let ids = ws.by_layer.entry(layer).or_default();
            for mut poly in polys {
                poly.layer = layer;
                ids.push(PolygonId(ws.polygons.len()));
                ws.polygons.push(poly);
            }
        }
        ws
    }

    pub fn get(&self, id: PolygonId) -> &Polygon {
        &self.polygons[id.0]
    }

    pub fn on_layer(&self, layer: LayerSpec) -> &[PolygonId] {
        self.by_layer.get(&layer).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn has(&self, layer: LayerSpec) -> bool {
        !self.on_layer(layer).is_empty()
    }

    pub fn layers(&self) -> impl Iterator<Item = LayerSpec> + '_ {
        self.by_layer.keys().copied()
    }

    /// Every polygon id, in arena order.
    pub fn ids(&self) -> impl Iterator<Item = PolygonId> {
        (0..self.polygons.len()).map(PolygonId)
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// R-tree over one layer. Entry indices are positions in
    /// [`Workspace::on_layer`].
    pub fn spatial_index(&self, layer: LayerSpec) -> SpatialIndex {
        let entries = self
            .on_layer(layer)
            .iter()
            .enumerate()
            .filter_map(|(index, &id)| {
                self.get(id).bbox().map(|bbox| SpatialEntry { index, bbox })
            })
            .collect();
        SpatialIndex::build(entries)
    }

    /// The working geometry as a layout cell, synthetic layers included.
    pub fn to_cell(&self, name: &str) -> Cell {
        let mut cell = Cell::new(name);
        for poly in &self.polygons {
            cell.add_polygon(poly.clone());
        }
        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: LayerSpec = LayerSpec::new(1, 0);
    const B: LayerSpec = LayerSpec::new(2, 0);

    #[test]
    fn test_arena_layout() {
        let mut layers = BTreeMap::new();
        layers.insert(B, vec![Polygon::rect(B, 0.0, 0.0, 1.0, 1.0)]);
        layers.insert(
            A,
            vec![
                Polygon::rect(A, 0.0, 0.0, 1.0, 1.0),
                Polygon::rect(A, 5.0, 5.0, 6.0, 6.0),
            ],
        );
        layers.insert(LayerSpec::new(3, 0), Vec::new());

        let ws = Workspace::from_layers(layers);
        assert_eq!(ws.len(), 3);
        assert_eq!(ws.on_layer(A), &[PolygonId(0), PolygonId(1)]);
        assert_eq!(ws.on_layer(B), &[PolygonId(2)]);
        assert!(!ws.has(LayerSpec::new(3, 0)));
        assert_eq!(ws.layers().count(), 2);
        assert_eq!(ws.spatial_index(A).len(), 2);
        assert_eq!(ws.to_cell("dump").geometry_count(), 3);
    }
}
