//! Boolean operations and spatial predicates over layer polygons.
//!
//! Every computation happens on the integer grid defined by the database
//! unit: coordinates are divided by `dbu` and rounded before any test, so two
//! points closer than one grid step are the same point.

use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon as GeoPolygon};

use crate::geometry::{Point, Polygon};
use crate::layer::LayerSpec;

type GridPoint = (i64, i64);

/// Fixed-precision polygon kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryKernel {
    dbu: f64,
}

impl GeometryKernel {
    /// `dbu` is the database unit in micrometers. Non-positive values fall
    /// back to 1 nm.
    pub fn new(dbu: f64) -> Self {
        let dbu = if dbu > 0.0 { dbu } else { 0.001 };
        Self { dbu }
    }

    pub fn dbu(&self) -> f64 {
        self.dbu
    }

    /// Snap a value to the database-unit grid.
    pub fn quantize(&self, v: f64) -> f64 {
        (v / self.dbu).round() * self.dbu
    }

    fn grid(&self, v: f64) -> i64 {
        (v / self.dbu).round() as i64
    }

    fn grid_point(&self, p: &Point) -> GridPoint {
        (self.grid(p.x), self.grid(p.y))
    }

    /// Snap a ring to the grid, dropping repeated vertices and the closing
    /// vertex if present.
    fn grid_ring(&self, ring: &[Point]) -> Vec<GridPoint> {
        let mut out: Vec<GridPoint> = Vec::with_capacity(ring.len());
        for p in ring {
            let g = self.grid_point(p);
            if out.last() != Some(&g) {
                out.push(g);
            }
        }
        while out.len() > 1 && out.first() == out.last() {
            out.pop();
        }
        out
    }

    fn grid_rings(&self, poly: &Polygon) -> Vec<Vec<GridPoint>> {
        poly.rings()
            .map(|r| self.grid_ring(r))
            .filter(|r| r.len() >= 3)
            .collect()
    }

    // ── Conversion to and from geo ───────────────────────────────────

    fn geo_ring(ring: &[GridPoint]) -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = ring
            .iter()
            .map(|&(x, y)| Coord {
                x: x as f64,
                y: y as f64,
            })
            .collect();
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
        LineString::from(coords)
    }

    fn to_geo(&self, poly: &Polygon) -> Option<GeoPolygon<f64>> {
        let rings = self.grid_rings(poly);
        let (outer, holes) = rings.split_first()?;
        if ring_area2(outer) == 0 {
            return None;
        }
        Some(GeoPolygon::new(
            Self::geo_ring(outer),
            holes.iter().map(|h| Self::geo_ring(h)).collect(),
        ))
    }

    fn to_geo_set(&self, polys: &[Polygon]) -> MultiPolygon<f64> {
        let mut acc = MultiPolygon::new(Vec::new());
        for p in polys {
            if let Some(g) = self.to_geo(p) {
                let single: MultiPolygon<f64> = g.into();
                acc = if acc.0.is_empty() {
                    single
                } else {
                    acc.union(&single)
                };
            }
        }
        acc
    }

    fn from_geo(&self, set: &MultiPolygon<f64>, layer: LayerSpec) -> Vec<Polygon> {
        let snap_ring = |ls: &LineString<f64>| -> Option<Vec<Point>> {
            let mut grid: Vec<GridPoint> = Vec::new();
            for c in ls.coords() {
                let g = (c.x.round() as i64, c.y.round() as i64);
                if grid.last() != Some(&g) {
                    grid.push(g);
                }
            }
            while grid.len() > 1 && grid.first() == grid.last() {
                grid.pop();
            }
            if grid.len() < 3 || ring_area2(&grid) == 0 {
                return None;
            }
            Some(
                grid.iter()
                    .map(|&(x, y)| Point::new(x as f64 * self.dbu, y as f64 * self.dbu))
                    .collect(),
            )
        };

        set.0
            .iter()
            .filter_map(|g| {
                let outer = snap_ring(g.exterior())?;
                let holes = g.interiors().iter().filter_map(&snap_ring).collect();
                Some(Polygon::with_holes(layer, outer, holes))
            })
            .collect()
    }

    // ── Booleans ─────────────────────────────────────────────────────

    /// OR all shapes of a set together.
    pub fn merge(&self, polys: &[Polygon], layer: LayerSpec) -> Vec<Polygon> {
        self.from_geo(&self.to_geo_set(polys), layer)
    }

    pub fn union(&self, a: &[Polygon], b: &[Polygon], layer: LayerSpec) -> Vec<Polygon> {
        let ga = self.to_geo_set(a);
        let gb = self.to_geo_set(b);
        self.from_geo(&ga.union(&gb), layer)
    }

    pub fn intersect(&self, a: &[Polygon], b: &[Polygon], layer: LayerSpec) -> Vec<Polygon> {
        let ga = self.to_geo_set(a);
        let gb = self.to_geo_set(b);
        if ga.0.is_empty() || gb.0.is_empty() {
            return Vec::new();
        }
        self.from_geo(&ga.intersection(&gb), layer)
    }

    pub fn subtract(&self, a: &[Polygon], b: &[Polygon], layer: LayerSpec) -> Vec<Polygon> {
        let ga = self.to_geo_set(a);
        if ga.0.is_empty() {
            return Vec::new();
        }
        let gb = self.to_geo_set(b);
        if gb.0.is_empty() {
            return self.from_geo(&ga, layer);
        }
        self.from_geo(&ga.difference(&gb), layer)
    }

    // ── Predicates ───────────────────────────────────────────────────

    fn grid_bbox(rings: &[Vec<GridPoint>]) -> Option<(GridPoint, GridPoint)> {
        let outer = rings.first()?;
        let mut min = (i64::MAX, i64::MAX);
        let mut max = (i64::MIN, i64::MIN);
        for &(x, y) in outer {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        Some((min, max))
    }

    /// True when the intersection of `p` and `q` has positive area. Shapes
    /// that only abut along an edge do not overlap.
    pub fn overlaps(&self, p: &Polygon, q: &Polygon) -> bool {
        let (rp, rq) = (self.grid_rings(p), self.grid_rings(q));
        let (Some((pmin, pmax)), Some((qmin, qmax))) = (Self::grid_bbox(&rp), Self::grid_bbox(&rq))
        else {
            return false;
        };
        if pmin.0 >= qmax.0 || qmin.0 >= pmax.0 || pmin.1 >= qmax.1 || qmin.1 >= pmax.1 {
            return false;
        }
        let (Some(gp), Some(gq)) = (self.to_geo(p), self.to_geo(q)) else {
            return false;
        };
        gp.intersection(&gq).unsigned_area() > 0.0
    }

    /// True when the boundaries of `p` and `q` share collinear segments of
    /// positive length. Touching at a single point does not count.
    pub fn shares_edge(&self, p: &Polygon, q: &Polygon) -> bool {
        let (rp, rq) = (self.grid_rings(p), self.grid_rings(q));
        for a in rp.iter().flat_map(|r| ring_edges(r)) {
            for b in rq.iter().flat_map(|r| ring_edges(r)) {
                if collinear_overlap(a, b) > 0 {
                    return true;
                }
            }
        }
        false
    }

    /// True when `point` lies inside `poly` or on its boundary.
    pub fn covers(&self, poly: &Polygon, point: &Point) -> bool {
        let rings = self.grid_rings(poly);
        if rings.is_empty() {
            return false;
        }
        let g = self.grid_point(point);
        if rings
            .iter()
            .flat_map(|r| ring_edges(r))
            .any(|(a, b)| on_segment(a, b, g))
        {
            return true;
        }
        rings.iter().filter(|r| ray_crossings(r, g)).count() % 2 == 1
    }

    /// Area in square micrometers, net of holes.
    pub fn area(&self, poly: &Polygon) -> f64 {
        let rings = self.grid_rings(poly);
        let Some((outer, holes)) = rings.split_first() else {
            return 0.0;
        };
        let twice: i128 = ring_area2(outer).abs() - holes.iter().map(|h| ring_area2(h).abs()).sum::<i128>();
        let grid_area = twice.max(0) as f64 / 2.0;
        self.quantize(grid_area * self.dbu * self.dbu)
    }

    /// Minimum Euclidean distance between two polygons, zero when they
    /// overlap, touch or contain one another.
    pub fn min_distance(&self, p: &Polygon, q: &Polygon) -> f64 {
        let (rp, rq) = (self.grid_rings(p), self.grid_rings(q));
        if rp.is_empty() || rq.is_empty() {
            return 0.0;
        }
        if self.covers(p, &q.vertices[0]) || self.covers(q, &p.vertices[0]) {
            return 0.0;
        }
        let mut best = f64::MAX;
        for a in rp.iter().flat_map(|r| ring_edges(r)) {
            for b in rq.iter().flat_map(|r| ring_edges(r)) {
                let d = segment_distance(a, b);
                if d == 0.0 {
                    return 0.0;
                }
                best = best.min(d);
            }
        }
        self.quantize(best * self.dbu)
    }
}

impl Default for GeometryKernel {
    fn default() -> Self {
        Self::new(0.001)
    }
}

// ── Integer helpers ──────────────────────────────────────────────────

type Segment = (GridPoint, GridPoint);

fn ring_edges(ring: &[GridPoint]) -> impl Iterator<Item = Segment> + '_ {
    let n = ring.len();
    (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
}

/// Twice the signed area of a ring.
fn ring_area2(ring: &[GridPoint]) -> i128 {
    ring_edges(ring)
        .map(|(a, b)| a.0 as i128 * b.1 as i128 - b.0 as i128 * a.1 as i128)
        .sum()
}

fn cross(o: GridPoint, a: GridPoint, b: GridPoint) -> i128 {
    (a.0 - o.0) as i128 * (b.1 - o.1) as i128 - (a.1 - o.1) as i128 * (b.0 - o.0) as i128
}

fn dot(o: GridPoint, a: GridPoint, b: GridPoint) -> i128 {
    (a.0 - o.0) as i128 * (b.0 - o.0) as i128 + (a.1 - o.1) as i128 * (b.1 - o.1) as i128
}

/// Length (in squared-direction units) of the shared part of two collinear
/// segments; zero when they are not collinear or meet in at most one point.
fn collinear_overlap(a: Segment, b: Segment) -> i128 {
    let (a0, a1) = a;
    if a0 == a1 || cross(a0, a1, b.0) != 0 || cross(a0, a1, b.1) != 0 {
        return 0;
    }
    let len = dot(a0, a1, a1);
    let s0 = dot(a0, a1, b.0);
    let s1 = dot(a0, a1, b.1);
    let lo = s0.min(s1).max(0);
    let hi = s0.max(s1).min(len);
    (hi - lo).max(0)
}

fn on_segment(a: GridPoint, b: GridPoint, p: GridPoint) -> bool {
    cross(a, b, p) == 0
        && p.0 >= a.0.min(b.0)
        && p.0 <= a.0.max(b.0)
        && p.1 >= a.1.min(b.1)
        && p.1 <= a.1.max(b.1)
}

/// Even-odd ray cast toward +x.
fn ray_crossings(ring: &[GridPoint], p: GridPoint) -> bool {
    let mut inside = false;
    for (a, b) in ring_edges(ring) {
        if (a.1 > p.1) != (b.1 > p.1) {
            let t = (p.1 - a.1) as f64 / (b.1 - a.1) as f64;
            let x = a.0 as f64 + t * (b.0 - a.0) as f64;
            if (p.0 as f64) < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn segments_intersect(a: Segment, b: Segment) -> bool {
    let d1 = cross(b.0, b.1, a.0).signum();
    let d2 = cross(b.0, b.1, a.1).signum();
    let d3 = cross(a.0, a.1, b.0).signum();
    let d4 = cross(a.0, a.1, b.1).signum();
    if d1 * d2 < 0 && d3 * d4 < 0 {
        return true;
    }
    on_segment(b.0, b.1, a.0)
        || on_segment(b.0, b.1, a.1)
        || on_segment(a.0, a.1, b.0)
        || on_segment(a.0, a.1, b.1)
}

fn point_segment_distance(p: GridPoint, s: Segment) -> f64 {
    let (a, b) = s;
    let len2 = dot(a, b, b);
    let (px, py) = (p.0 as f64, p.1 as f64);
    if len2 == 0 {
        return ((px - a.0 as f64).powi(2) + (py - a.1 as f64).powi(2)).sqrt();
    }
    let t = (dot(a, b, p) as f64 / len2 as f64).clamp(0.0, 1.0);
    let cx = a.0 as f64 + t * (b.0 - a.0) as f64;
    let cy = a.1 as f64 + t * (b.1 - a.1) as f64;
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

fn segment_distance(a: Segment, b: Segment) -> f64 {
    if segments_intersect(a, b) {
        return 0.0;
    }
    point_segment_distance(a.0, b)
        .min(point_segment_distance(a.1, b))
        .min(point_segment_distance(b.0, a))
        .min(point_segment_distance(b.1, a))
}
