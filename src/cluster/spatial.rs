use geo_types::Rect;
use rstar::{RTree, RTreeObject, AABB};
use crate::config::subsystems::IndexBackend;

/// Bounding-box query structure the graph builder prunes candidates with.
pub trait SpatialIndex: Send + Sync {
    fn insert(&mut self, id: usize, bounds: Rect<f64>);

    /// Add a batch of entries.
    fn load(&mut self, entries: Vec<(usize, Rect<f64>)>) {
        for (id, bounds) in entries {
            self.insert(id, bounds);
        }
    }

    /// Ids whose stored bounds intersect `bounds`, boundaries included.
    fn query(&self, bounds: &Rect<f64>) -> Vec<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Construct an empty index for the configured backend.
pub fn new_index(backend: IndexBackend) -> Box<dyn SpatialIndex> {
    match backend {
        IndexBackend::RTree => Box::new(RTreeIndex::default()),
        IndexBackend::BruteForce => Box::new(BruteForceIndex::default()),
    }
}

/// Wrapper around an id and its envelope to make it compatible with R-Tree spatial indexing
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedBounds {
    pub id: usize,
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl IndexedBounds {
    pub fn new(id: usize, bounds: Rect<f64>) -> Self {
        Self {
            id,
            min: [bounds.min().x, bounds.min().y],
            max: [bounds.max().x, bounds.max().y],
        }
    }
}

impl RTreeObject for IndexedBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

fn to_aabb(bounds: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners(
        [bounds.min().x, bounds.min().y],
        [bounds.max().x, bounds.max().y],
    )
}

#[derive(Default)]
pub struct RTreeIndex {
    tree: RTree<IndexedBounds>,
}

impl RTreeIndex {
    /// Bulk load is much more efficient than individual insertions
    pub fn bulk_load(entries: Vec<(usize, Rect<f64>)>) -> Self {
        let rects = entries.into_iter()
            .map(|(id, bounds)| IndexedBounds::new(id, bounds))
            .collect();
        Self { tree: RTree::bulk_load(rects) }
    }
}

impl SpatialIndex for RTreeIndex {
    fn insert(&mut self, id: usize, bounds: Rect<f64>) {
        self.tree.insert(IndexedBounds::new(id, bounds));
    }

    fn load(&mut self, entries: Vec<(usize, Rect<f64>)>) {
        if self.tree.size() == 0 {
            *self = Self::bulk_load(entries);
        } else {
            for (id, bounds) in entries {
                self.insert(id, bounds);
            }
        }
    }

    fn query(&self, bounds: &Rect<f64>) -> Vec<usize> {
        self.tree.locate_in_envelope_intersecting(&to_aabb(bounds))
            .map(|entry| entry.id)
            .collect()
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}

/// O(n) scan per query. Reference backend for checking the tree.
#[derive(Debug, Default)]
pub struct BruteForceIndex {
    entries: Vec<(usize, Rect<f64>)>,
}

impl SpatialIndex for BruteForceIndex {
    fn insert(&mut self, id: usize, bounds: Rect<f64>) {
        self.entries.push((id, bounds));
    }

    fn query(&self, bounds: &Rect<f64>) -> Vec<usize> {
        self.entries.iter()
            .filter(|(_, r)| {
                r.min().x <= bounds.max().x
                    && r.max().x >= bounds.min().x
                    && r.min().y <= bounds.max().y
                    && r.max().y >= bounds.min().y
            })
            .map(|(id, _)| *id)
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Coord;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect<f64> {
        Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }

    fn fill(index: &mut dyn SpatialIndex) {
        index.insert(0, rect(0.0, 0.0, 10.0, 1.0));
        index.insert(1, rect(10.0, 0.0, 20.0, 1.0));
        index.insert(2, rect(50.0, 50.0, 60.0, 60.0));
        index.insert(3, rect(-5.0, -5.0, -1.0, -1.0));
    }

    fn sorted(mut ids: Vec<usize>) -> Vec<usize> {
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_backends_agree() {
        for backend in [IndexBackend::RTree, IndexBackend::BruteForce] {
            let mut index = new_index(backend);
            fill(index.as_mut());
            assert_eq!(index.len(), 4);
            assert_eq!(sorted(index.query(&rect(5.0, 0.5, 6.0, 0.6))), vec![0], "{:?}", backend);
            // Shared edge at x = 10 counts as intersecting
            assert_eq!(sorted(index.query(&rect(10.0, 0.0, 10.0, 0.0))), vec![0, 1], "{:?}", backend);
            assert_eq!(sorted(index.query(&rect(-100.0, -100.0, 100.0, 100.0))), vec![0, 1, 2, 3]);
            assert!(index.query(&rect(30.0, 30.0, 40.0, 40.0)).is_empty());
        }
    }

    #[test]
    fn test_bulk_load_matches_inserts() {
        let bulk = RTreeIndex::bulk_load(vec![
            (7, rect(0.0, 0.0, 1.0, 1.0)),
            (9, rect(2.0, 2.0, 3.0, 3.0)),
        ]);
        assert_eq!(bulk.len(), 2);
        assert_eq!(bulk.query(&rect(0.5, 0.5, 2.5, 2.5)).len(), 2);
        assert_eq!(bulk.query(&rect(2.5, 2.5, 2.6, 2.6)), vec![9]);
    }

    #[test]
    fn test_load_into_empty_and_filled_index() {
        for backend in [IndexBackend::RTree, IndexBackend::BruteForce] {
            let mut index = new_index(backend);
            index.load(vec![(0, rect(0.0, 0.0, 1.0, 1.0)), (1, rect(5.0, 5.0, 6.0, 6.0))]);
            assert_eq!(index.len(), 2);
            index.load(vec![(2, rect(0.5, 0.5, 5.5, 5.5))]);
            assert_eq!(index.len(), 3);
            assert_eq!(sorted(index.query(&rect(0.9, 0.9, 0.9, 0.9))), vec![0, 2], "{:?}", backend);
        }
    }
}
