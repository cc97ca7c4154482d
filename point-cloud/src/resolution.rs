//! Cloud resolution estimate.

use crate::search::PointIndex;
use cv_core::point_cloud::{is_finite_point, PointCloud};

/// Average distance from every finite point to its nearest neighbour.
///
/// The neighbour is the closest other point of the cloud, so coincident
/// duplicates contribute a zero spacing. Returns 0 when no point has a
/// neighbour (fewer than two finite points).
pub fn compute_cloud_resolution(cloud: &PointCloud) -> f32 {
    let index = PointIndex::new(&cloud.points);

    let mut total = 0.0f64;
    let mut n_points = 0usize;
    for (i, p) in cloud.points.iter().enumerate() {
        if !is_finite_point(p) {
            continue;
        }
        if let Some((_, d2)) = index.nearest_other(p, i) {
            total += (d2 as f64).sqrt();
            n_points += 1;
        }
    }

    let resolution = if n_points == 0 {
        0.0
    } else {
        (total / n_points as f64) as f32
    };
    tracing::debug!(points = n_points, resolution, "cloud resolution");
    resolution
}
