use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::BBox;

/// An entry in the R-tree spatial index, referencing a polygon by its index.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    /// Index into the owner's polygon storage.
    pub index: usize,
    /// Bounding box of the polygon.
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Spatial index used to prune candidate pairs before exact predicates.
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Build the index from a list of bounding boxes.
    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn insert(&mut self, entry: SpatialEntry) {
        self.tree.insert(entry);
    }

    /// Indices of all entries whose box overlaps or touches `bbox`, sorted.
    pub fn candidates(&self, bbox: &BBox) -> Vec<usize> {
        let envelope = AABB::from_corners([bbox.min.x, bbox.min.y], [bbox.max.x, bbox.max.y]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|e| e.index)
            .collect();
        hits.sort_unstable();
        hits
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[test]
    fn test_spatial_candidates() {
        let entries = vec![
            SpatialEntry {
                index: 0,
                bbox: BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0)),
            },
            SpatialEntry {
                index: 1,
                bbox: BBox::new(Point::new(20.0, 20.0), Point::new(30.0, 30.0)),
            },
            SpatialEntry {
                index: 2,
                bbox: BBox::new(Point::new(10.0, 0.0), Point::new(12.0, 5.0)),
            },
        ];
        let index = SpatialIndex::build(entries);
        assert_eq!(index.len(), 3);

        // Touching boxes are candidates too.
        let query = BBox::new(Point::new(-5.0, -5.0), Point::new(10.0, 10.0));
        assert_eq!(index.candidates(&query), vec![0, 2]);

        let far = BBox::new(Point::new(50.0, 50.0), Point::new(60.0, 60.0));
        assert!(index.candidates(&far).is_empty());
    }
}
