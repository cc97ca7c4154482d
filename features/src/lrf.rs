//! Local reference frames from the distance-weighted covariance of a
//! keypoint's spherical support.

use crate::{FeatureError, Result};
use cv_core::point_cloud::{is_finite_point, PointCloud};
use cv_core::ReferenceFrame;
use cv_point_cloud::PointIndex;
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;

/// Support points required for a frame to be considered stable.
pub const MIN_SUPPORT: usize = 5;

/// One frame per keypoint, index aligned. `surface` provides the support
/// within `radius`; `normals` (aligned with `surface`) orient an otherwise
/// ambiguous z axis. Keypoints with fewer than [`MIN_SUPPORT`] neighbours get
/// [`ReferenceFrame::invalid`].
pub fn estimate_reference_frames(
    keypoints: &PointCloud,
    surface: &PointCloud,
    normals: &[Vector3<f32>],
    radius: f32,
) -> Result<Vec<ReferenceFrame>> {
    if normals.len() != surface.len() {
        return Err(FeatureError::ReferenceFrameError(format!(
            "{} normals for a surface of {} points",
            normals.len(),
            surface.len()
        )));
    }
    let index = PointIndex::new(&surface.points);

    Ok(keypoints
        .points
        .par_iter()
        .map(|kp| frame_at(kp, &index, surface, normals, radius))
        .collect())
}

pub(crate) fn frame_at(
    kp: &Point3<f32>,
    index: &PointIndex,
    surface: &PointCloud,
    normals: &[Vector3<f32>],
    radius: f32,
) -> ReferenceFrame {
    if !is_finite_point(kp) || !(radius > 0.0) {
        return ReferenceFrame::invalid();
    }
    let neighbors = index.within_radius(kp, radius);
    if neighbors.len() < MIN_SUPPORT {
        return ReferenceFrame::invalid();
    }

    let mut cov = Matrix3::zeros();
    let mut weight_sum = 0.0f32;
    for &(j, d2) in &neighbors {
        let w = radius - d2.sqrt();
        let d = surface.points[j] - kp;
        cov += d * d.transpose() * w;
        weight_sum += w;
    }
    if weight_sum <= f32::EPSILON {
        return ReferenceFrame::invalid();
    }
    cov /= weight_sum;

    let eigen = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let mut x: Vector3<f32> = eigen.eigenvectors.column(order[0]).into_owned();
    let mut z: Vector3<f32> = eigen.eigenvectors.column(order[2]).into_owned();

    // Point the axes towards the majority of the support.
    let mut x_votes = 0i64;
    let mut z_votes = 0i64;
    for &(j, _) in &neighbors {
        let d = surface.points[j] - kp;
        x_votes += if d.dot(&x) >= 0.0 { 1 } else { -1 };
        z_votes += if d.dot(&z) >= 0.0 { 1 } else { -1 };
    }
    if x_votes < 0 {
        x = -x;
    }
    if z_votes < 0 {
        z = -z;
    } else if z_votes == 0 {
        let mean_normal: Vector3<f32> = neighbors
            .iter()
            .map(|&(j, _)| normals[j])
            .filter(|n| n.iter().all(|v| v.is_finite()))
            .sum();
        if mean_normal.dot(&z) < 0.0 {
            z = -z;
        }
    }

    let y = z.cross(&x);
    let frame = ReferenceFrame::from_axes(&x, &y, &z);
    if frame.is_finite() {
        frame
    } else {
        ReferenceFrame::invalid()
    }
}
