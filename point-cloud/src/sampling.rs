//! Uniform keypoint sampling.

use cv_core::point_cloud::{is_finite_point, PointCloud};
use std::collections::BTreeMap;

/// Select at most one point per cubic voxel of edge `radius`: the one closest
/// to the voxel centre.
///
/// Returned indices refer to `cloud` and are ordered by voxel key, so the
/// selection is deterministic. A non-positive or non-finite radius keeps
/// every finite point.
pub fn uniform_sample(cloud: &PointCloud, radius: f32) -> Vec<usize> {
    if !(radius > 0.0 && radius.is_finite()) {
        return cloud.finite_indices().collect();
    }

    let inv = 1.0 / radius;
    let mut voxels: BTreeMap<(i64, i64, i64), (usize, f32)> = BTreeMap::new();

    for (i, p) in cloud.points.iter().enumerate() {
        if !is_finite_point(p) {
            continue;
        }
        let key = (
            (p.x * inv).floor() as i64,
            (p.y * inv).floor() as i64,
            (p.z * inv).floor() as i64,
        );
        let cx = (key.0 as f32 + 0.5) * radius;
        let cy = (key.1 as f32 + 0.5) * radius;
        let cz = (key.2 as f32 + 0.5) * radius;
        let d2 = (p.x - cx).powi(2) + (p.y - cy).powi(2) + (p.z - cz).powi(2);

        voxels
            .entry(key)
            .and_modify(|best| {
                if d2 < best.1 {
                    *best = (i, d2);
                }
            })
            .or_insert((i, d2));
    }

    tracing::debug!(points = cloud.len(), keypoints = voxels.len(), radius, "uniform sampling");
    voxels.into_values().map(|(i, _)| i).collect()
}
