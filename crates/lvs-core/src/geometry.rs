use serde::{Deserialize, Serialize};

use crate::layer::LayerSpec;

/// A 2D point in layout coordinates (micrometers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// True when the boxes overlap or touch.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

/// A polygon: one outer ring plus optional holes. Rings are stored open
/// (the first vertex is not repeated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub layer: LayerSpec,
    pub vertices: Vec<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<Point>>,
}

impl Polygon {
    pub fn new(layer: LayerSpec, vertices: Vec<Point>) -> Self {
        Self {
            layer,
            vertices,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(layer: LayerSpec, vertices: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        Self {
            layer,
            vertices,
            holes,
        }
    }

    /// Axis-aligned rectangle from two opposite corners.
    pub fn rect(layer: LayerSpec, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let (lx, hx) = (x1.min(x2), x1.max(x2));
        let (ly, hy) = (y1.min(y2), y1.max(y2));
        Self::new(
            layer,
            vec![
                Point::new(lx, ly),
                Point::new(hx, ly),
                Point::new(hx, hy),
                Point::new(lx, hy),
            ],
        )
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.vertices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Outer ring followed by every hole.
    pub fn rings(&self) -> impl Iterator<Item = &[Point]> {
        std::iter::once(self.vertices.as_slice()).chain(self.holes.iter().map(|h| h.as_slice()))
    }

    pub fn map_points(&self, f: impl Fn(&Point) -> Point) -> Self {
        Self {
            layer: self.layer,
            vertices: self.vertices.iter().map(&f).collect(),
            holes: self
                .holes
                .iter()
                .map(|h| h.iter().map(&f).collect())
                .collect(),
        }
    }
}

/// GDS path end style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathEnd {
    /// PATHTYPE 0: ends flush with the endpoints.
    Flush,
    /// PATHTYPE 1 and 2: ends extended by half the width.
    HalfWidth,
    /// PATHTYPE 4: explicit begin/end extensions.
    Custom { begin: f64, end: f64 },
}

/// A path (wire) defined by a centerline and width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub layer: LayerSpec,
    pub points: Vec<Point>,
    pub width: f64,
    pub end: PathEnd,
}

impl Path {
    pub fn new(layer: LayerSpec, points: Vec<Point>, width: f64) -> Self {
        Self {
            layer,
            points,
            width,
            end: PathEnd::Flush,
        }
    }

    pub fn with_end(mut self, end: PathEnd) -> Self {
        self.end = end;
        self
    }

    pub fn bbox(&self) -> Option<BBox> {
        let half_w = self.width / 2.0;
        let expanded: Vec<Point> = self
            .points
            .iter()
            .flat_map(|p| {
                vec![
                    Point::new(p.x - half_w, p.y - half_w),
                    Point::new(p.x + half_w, p.y + half_w),
                ]
            })
            .collect();
        BBox::from_points(&expanded)
    }

    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].distance_to(&w[1]))
            .sum()
    }

    /// Convert to one quadrilateral per segment. Interior joints are extended
    /// by half the width so Manhattan corners are fully covered once the
    /// pieces are merged.
    pub fn to_polygons(&self) -> Vec<Polygon> {
        let half = self.width.abs() / 2.0;
        if half == 0.0 || self.points.len() < 2 {
            return Vec::new();
        }
        let (begin_ext, end_ext) = match self.end {
            PathEnd::Flush => (0.0, 0.0),
            PathEnd::HalfWidth => (half, half),
            PathEnd::Custom { begin, end } => (begin, end),
        };
        let last = self.points.len() - 2;
        let mut result = Vec::new();
        for (i, seg) in self.points.windows(2).enumerate() {
            let (a, b) = (seg[0], seg[1]);
            let len = a.distance_to(&b);
            if len == 0.0 {
                continue;
            }
            let (dx, dy) = ((b.x - a.x) / len, (b.y - a.y) / len);
            let (nx, ny) = (-dy * half, dx * half);
            let eb = if i == 0 { begin_ext } else { half };
            let ee = if i == last { end_ext } else { half };
            let start = a.translate(-dx * eb, -dy * eb);
            let stop = b.translate(dx * ee, dy * ee);
            result.push(Polygon::new(
                self.layer,
                vec![
                    start.translate(nx, ny),
                    stop.translate(nx, ny),
                    stop.translate(-nx, -ny),
                    start.translate(-nx, -ny),
                ],
            ));
        }
        result
    }
}

/// A text label, used to name the net of the polygon it sits on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// `(layer, texttype)`.
    pub layer: LayerSpec,
    pub text: String,
    pub position: Point,
}

impl Label {
    pub fn new(layer: LayerSpec, text: &str, position: Point) -> Self {
        Self {
            layer,
            text: text.to_string(),
            position,
        }
    }
}

/// A drawn geometric element of a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeomPrimitive {
    Polygon(Polygon),
    Path(Path),
}

impl GeomPrimitive {
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            GeomPrimitive::Polygon(p) => p.bbox(),
            GeomPrimitive::Path(p) => p.bbox(),
        }
    }

    pub fn layer(&self) -> LayerSpec {
        match self {
            GeomPrimitive::Polygon(p) => p.layer,
            GeomPrimitive::Path(p) => p.layer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const M1: LayerSpec = LayerSpec::new(7, 0);

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Polygon::rect(M1, 10.0, 5.0, 0.0, 0.0);
        let bb = r.bbox().unwrap();
        assert_eq!(bb.min, Point::new(0.0, 0.0));
        assert_eq!(bb.max, Point::new(10.0, 5.0));
        assert_eq!(r.vertex_count(), 4);
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = BBox::new(Point::new(5.0, 5.0), Point::new(15.0, 15.0));
        let c = BBox::new(Point::new(20.0, 20.0), Point::new(30.0, 30.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_flush_path_to_polygon() {
        let path = Path::new(M1, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)], 2.0);
        let polys = path.to_polygons();
        assert_eq!(polys.len(), 1);
        let bb = polys[0].bbox().unwrap();
        assert!((bb.min.x - 0.0).abs() < 1e-10);
        assert!((bb.max.x - 10.0).abs() < 1e-10);
        assert!((bb.min.y + 1.0).abs() < 1e-10);
        assert!((bb.max.y - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_extended_path_covers_corner() {
        let path = Path::new(
            M1,
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
            ],
            2.0,
        )
        .with_end(PathEnd::HalfWidth);
        let polys = path.to_polygons();
        assert_eq!(polys.len(), 2);
        let first = polys[0].bbox().unwrap();
        assert!((first.min.x + 1.0).abs() < 1e-10);
        assert!((first.max.x - 11.0).abs() < 1e-10);
        let second = polys[1].bbox().unwrap();
        assert!((second.min.y + 1.0).abs() < 1e-10);
        assert!((second.max.y - 11.0).abs() < 1e-10);
    }
}
