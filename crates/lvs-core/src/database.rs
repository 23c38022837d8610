use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::{Cell, FlatCell, Transform};
use crate::geometry::{GeomPrimitive, Label};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("cell '{0}' not found in layout library")]
    UnknownCell(String),

    #[error("cell '{0}' instantiates itself through its hierarchy")]
    RecursiveHierarchy(String),
}

/// A node of the cell instantiation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellTree {
    pub cell: String,
    pub children: Vec<CellTree>,
}

/// The layout library: all cells of one GDS stream, keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutLibrary {
    /// Library name.
    pub name: String,
    cells: HashMap<String, Cell>,
    /// Cell names in definition order.
    order: Vec<String>,
    /// Database unit in micrometers (coordinate quantization step).
    pub dbu: f64,
    /// User unit in meters, as declared by the stream.
    pub user_unit_m: f64,
}

impl LayoutLibrary {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: HashMap::new(),
            order: Vec::new(),
            dbu: 0.001,
            user_unit_m: 1e-6,
        }
    }

    // ── Cell management ──────────────────────────────────────────────

    pub fn add_cell(&mut self, cell: Cell) {
        if !self.cells.contains_key(&cell.name) {
            self.order.push(cell.name.clone());
        }
        self.cells.insert(cell.name.clone(), cell);
    }

    pub fn get_cell(&self, name: &str) -> Option<&Cell> {
        self.cells.get(name)
    }

    pub fn cell_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn all_cells(&self) -> impl Iterator<Item = &Cell> {
        self.order.iter().filter_map(|n| self.cells.get(n))
    }

    // ── Hierarchy ────────────────────────────────────────────────────

    /// Cells that are never instantiated by another cell, in definition order.
    pub fn top_cells(&self) -> Vec<&str> {
        let referenced: BTreeSet<&str> = self
            .cells
            .values()
            .flat_map(|c| c.instances.iter().map(|i| i.cell_name.as_str()))
            .collect();
        self.cell_names()
            .filter(|n| !referenced.contains(n))
            .collect()
    }

    /// Instantiation tree below `name`. Undefined references become leaves.
    pub fn hierarchy(&self, name: &str) -> Result<CellTree, LayoutError> {
        let mut path = Vec::new();
        self.hierarchy_inner(name, &mut path)
    }

    fn hierarchy_inner(&self, name: &str, path: &mut Vec<String>) -> Result<CellTree, LayoutError> {
        if path.iter().any(|p| p == name) {
            return Err(LayoutError::RecursiveHierarchy(name.to_string()));
        }
        let Some(cell) = self.cells.get(name) else {
            return Ok(CellTree {
                cell: name.to_string(),
                children: Vec::new(),
            });
        };
        path.push(name.to_string());
        let mut children = Vec::new();
        for inst in &cell.instances {
            children.push(self.hierarchy_inner(&inst.cell_name, path)?);
        }
        path.pop();
        Ok(CellTree {
            cell: name.to_string(),
            children,
        })
    }

    // ── Flattening ───────────────────────────────────────────────────

    /// Resolve the hierarchy below `name` into a single level of polygons and
    /// labels. Paths are converted to polygons on the way.
    pub fn flatten(&self, name: &str) -> Result<FlatCell, LayoutError> {
        let mut cache: BTreeMap<String, FlatCell> = BTreeMap::new();
        let mut path = Vec::new();
        let flat = self.flatten_inner(name, &mut cache, &mut path)?;
        log::debug!(
            "Flattened '{}': {} polygons, {} labels",
            name,
            flat.polygons.len(),
            flat.labels.len()
        );
        Ok(flat)
    }

    fn flatten_inner(
        &self,
        name: &str,
        cache: &mut BTreeMap<String, FlatCell>,
        path: &mut Vec<String>,
    ) -> Result<FlatCell, LayoutError> {
        if let Some(done) = cache.get(name) {
            return Ok(done.clone());
        }
        if path.iter().any(|p| p == name) {
            return Err(LayoutError::RecursiveHierarchy(name.to_string()));
        }
        let cell = self
            .cells
            .get(name)
            .ok_or_else(|| LayoutError::UnknownCell(name.to_string()))?;

        path.push(name.to_string());
        let mut flat = FlatCell::new(name);
        for geom in &cell.geometries {
            match geom {
                GeomPrimitive::Polygon(p) => flat.polygons.push(p.clone()),
                GeomPrimitive::Path(p) => flat.polygons.extend(p.to_polygons()),
            }
        }
        flat.labels.extend(cell.labels.iter().cloned());

        for inst in &cell.instances {
            let child = self.flatten_inner(&inst.cell_name, cache, path)?;
            for placement in inst.placements() {
                place(&mut flat, &child, &placement);
            }
        }
        path.pop();

        cache.insert(name.to_string(), flat.clone());
        Ok(flat)
    }
}

fn place(into: &mut FlatCell, child: &FlatCell, transform: &Transform) {
    into.polygons
        .extend(child.polygons.iter().map(|p| p.map_points(|pt| transform.apply(pt))));
    into.labels.extend(child.labels.iter().map(|l| Label {
        layer: l.layer,
        text: l.text.clone(),
        position: transform.apply(&l.position),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellInstance;
    use crate::geometry::{Path, Point, Polygon};
    use crate::layer::LayerSpec;

    const M1: LayerSpec = LayerSpec::new(7, 0);
    const PIN: LayerSpec = LayerSpec::new(7, 1);

    fn library() -> LayoutLibrary {
        let mut lib = LayoutLibrary::new("test");
        let mut leaf = Cell::new("leaf");
        leaf.add_polygon(Polygon::rect(M1, 0.0, 0.0, 1.0, 1.0));
        leaf.add_label(Label::new(PIN, "A", Point::new(0.5, 0.5)));
        lib.add_cell(leaf);

        let mut top = Cell::new("top");
        top.add_geometry(GeomPrimitive::Path(Path::new(
            M1,
            vec![Point::new(0.0, 5.0), Point::new(4.0, 5.0)],
            0.2,
        )));
        top.add_instance(CellInstance::new("leaf", Transform::translate(10.0, 0.0)));
        top.add_instance(CellInstance::new("leaf", Transform::translate(20.0, 0.0)));
        lib.add_cell(top);
        lib
    }

    #[test]
    fn test_top_cells() {
        let lib = library();
        assert_eq!(lib.top_cells(), vec!["top"]);
        assert_eq!(lib.cell_count(), 2);
    }

    #[test]
    fn test_flatten_places_children() {
        let lib = library();
        let flat = lib.flatten("top").unwrap();
        assert_eq!(flat.polygons.len(), 3);
        assert_eq!(flat.labels.len(), 2);
        assert_eq!(flat.labels[1].position, Point::new(20.5, 0.5));
        let bb = flat.polygons[1].bbox().unwrap();
        assert!((bb.min.x - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_flatten_unknown_cell() {
        let lib = library();
        assert_eq!(
            lib.flatten("nope").unwrap_err(),
            LayoutError::UnknownCell("nope".into())
        );
    }

    #[test]
    fn test_recursive_hierarchy_detected() {
        let mut lib = LayoutLibrary::new("loop");
        let mut a = Cell::new("a");
        a.add_instance(CellInstance::new("b", Transform::default()));
        let mut b = Cell::new("b");
        b.add_instance(CellInstance::new("a", Transform::default()));
        lib.add_cell(a);
        lib.add_cell(b);
        assert!(matches!(
            lib.flatten("a"),
            Err(LayoutError::RecursiveHierarchy(_))
        ));
        assert!(lib.hierarchy("a").is_err());
    }

    #[test]
    fn test_hierarchy_tree() {
        let lib = library();
        let tree = lib.hierarchy("top").unwrap();
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].cell, "leaf");
    }
}
