use cv_core::point_cloud::is_finite_point;
use nalgebra::Point3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

// Wrapper for RTree
struct IndexedPoint(usize, [f32; 3]);

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f32; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.1)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        let dx = self.1[0] - point[0];
        let dy = self.1[1] - point[1];
        let dz = self.1[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Spatial index over the finite points of a cloud.
///
/// Results carry the index of the point in the slice the index was built
/// from and the squared distance to the query.
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    pub fn new(points: &[Point3<f32>]) -> Self {
        let wrappers: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| is_finite_point(p))
            .map(|(i, p)| IndexedPoint(i, [p.x, p.y, p.z]))
            .collect();

        Self {
            tree: RTree::bulk_load(wrappers),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Up to `k` nearest points, closest first.
    pub fn nearest_k(&self, query: &Point3<f32>, k: usize) -> Vec<(usize, f32)> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[query.x, query.y, query.z])
            .take(k)
            .map(|(p, d2)| (p.0, d2))
            .collect()
    }

    /// Nearest point whose index differs from `exclude`.
    pub fn nearest_other(&self, query: &Point3<f32>, exclude: usize) -> Option<(usize, f32)> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[query.x, query.y, query.z])
            .find(|(p, _)| p.0 != exclude)
            .map(|(p, d2)| (p.0, d2))
    }

    /// All points within `radius` of the query, in no particular order.
    pub fn within_radius(&self, query: &Point3<f32>, radius: f32) -> Vec<(usize, f32)> {
        let q = [query.x, query.y, query.z];
        self.tree
            .locate_within_distance(q, radius * radius)
            .map(|p| (p.0, p.distance_2(&q)))
            .collect()
    }
}
