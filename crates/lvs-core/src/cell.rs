use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, GeomPrimitive, Label, Point, Polygon};
use crate::layer::LayerSpec;

/// A transformation for placing subcell instances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation offset.
    pub offset: Point,
    /// Rotation in degrees, counter-clockwise.
    pub rotation: f64,
    /// Mirror about X axis (applied before rotation).
    pub mirror_x: bool,
    /// Uniform scale factor (typically 1.0).
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset: Point::new(0.0, 0.0),
            rotation: 0.0,
            mirror_x: false,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            offset: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn apply(&self, point: &Point) -> Point {
        let mut p = *point;

        p.x *= self.scale;
        p.y *= self.scale;

        if self.mirror_x {
            p.y = -p.y;
        }

        let (rx, ry) = match self.rotation.rem_euclid(360.0) {
            r if r == 0.0 => (p.x, p.y),
            r if r == 90.0 => (-p.y, p.x),
            r if r == 180.0 => (-p.x, -p.y),
            r if r == 270.0 => (p.y, -p.x),
            r => {
                let rad = r.to_radians();
                let (sin_r, cos_r) = rad.sin_cos();
                (p.x * cos_r - p.y * sin_r, p.x * sin_r + p.y * cos_r)
            }
        };

        Point::new(rx + self.offset.x, ry + self.offset.y)
    }

    /// The same transform shifted by an extra offset (array placements).
    pub fn shifted(&self, dx: f64, dy: f64) -> Self {
        Self {
            offset: self.offset.translate(dx, dy),
            ..*self
        }
    }
}

/// Column/row repetition of an AREF placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArraySpec {
    pub columns: u16,
    pub rows: u16,
    /// Displacement between adjacent columns.
    pub column_step: Point,
    /// Displacement between adjacent rows.
    pub row_step: Point,
}

/// A reference to a subcell placed within a parent cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInstance {
    pub cell_name: String,
    pub transform: Transform,
    pub array: Option<ArraySpec>,
}

impl CellInstance {
    pub fn new(cell_name: &str, transform: Transform) -> Self {
        Self {
            cell_name: cell_name.to_string(),
            transform,
            array: None,
        }
    }

    pub fn arrayed(cell_name: &str, transform: Transform, array: ArraySpec) -> Self {
        Self {
            cell_name: cell_name.to_string(),
            transform,
            array: Some(array),
        }
    }

    /// One transform per placed copy.
    pub fn placements(&self) -> Vec<Transform> {
        match self.array {
            None => vec![self.transform],
            Some(a) => {
                let mut result = Vec::with_capacity(a.columns as usize * a.rows as usize);
                for r in 0..a.rows {
                    for c in 0..a.columns {
                        let dx = a.column_step.x * c as f64 + a.row_step.x * r as f64;
                        let dy = a.column_step.y * c as f64 + a.row_step.y * r as f64;
                        result.push(self.transform.shifted(dx, dy));
                    }
                }
                result
            }
        }
    }
}

/// A layout cell containing drawn geometry, labels and subcell references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub geometries: Vec<GeomPrimitive>,
    pub instances: Vec<CellInstance>,
    pub labels: Vec<Label>,
}

impl Cell {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            geometries: Vec::new(),
            instances: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn add_geometry(&mut self, geom: GeomPrimitive) {
        self.geometries.push(geom);
    }

    pub fn add_polygon(&mut self, polygon: Polygon) {
        self.geometries.push(GeomPrimitive::Polygon(polygon));
    }

    pub fn add_instance(&mut self, instance: CellInstance) {
        self.instances.push(instance);
    }

    pub fn add_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    /// Compute the bounding box of all geometry in this cell (not including subcells).
    pub fn local_bbox(&self) -> Option<BBox> {
        self.geometries
            .iter()
            .filter_map(|g| g.bbox())
            .reduce(|a, b| a.union(&b))
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// A cell with its hierarchy resolved: every path converted to polygons and
/// every subcell placement expanded into top-level coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlatCell {
    pub name: String,
    pub polygons: Vec<Polygon>,
    pub labels: Vec<Label>,
}

impl FlatCell {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn labels_on(&self, layer: LayerSpec) -> impl Iterator<Item = &Label> {
        self.labels.iter().filter(move |l| l.layer == layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const M1: LayerSpec = LayerSpec::new(7, 0);

    #[test]
    fn test_cell_bbox() {
        let mut cell = Cell::new("test_cell");
        cell.add_polygon(Polygon::rect(M1, 0.0, 0.0, 100.0, 50.0));
        cell.add_polygon(Polygon::rect(M1, 50.0, 25.0, 200.0, 75.0));
        let bb = cell.local_bbox().unwrap();
        assert!((bb.min.x - 0.0).abs() < 1e-10);
        assert!((bb.min.y - 0.0).abs() < 1e-10);
        assert!((bb.max.x - 200.0).abs() < 1e-10);
        assert!((bb.max.y - 75.0).abs() < 1e-10);
    }

    #[test]
    fn test_transform_translate() {
        let t = Transform::translate(10.0, 20.0);
        let result = t.apply(&Point::new(5.0, 5.0));
        assert!((result.x - 15.0).abs() < 1e-10);
        assert!((result.y - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_transform_mirror_then_rotate() {
        let t = Transform {
            offset: Point::new(0.0, 0.0),
            rotation: 90.0,
            mirror_x: true,
            scale: 1.0,
        };
        // (1, 2) -> mirror (1, -2) -> rotate 90 (2, 1)
        let result = t.apply(&Point::new(1.0, 2.0));
        assert_eq!(result, Point::new(2.0, 1.0));
    }

    #[test]
    fn test_array_placements() {
        let inst = CellInstance::arrayed(
            "bit",
            Transform::translate(1.0, 1.0),
            ArraySpec {
                columns: 2,
                rows: 3,
                column_step: Point::new(5.0, 0.0),
                row_step: Point::new(0.0, 4.0),
            },
        );
        let placements = inst.placements();
        assert_eq!(placements.len(), 6);
        assert_eq!(placements[5].offset, Point::new(6.0, 9.0));
    }
}
