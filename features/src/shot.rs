//! 352-bin signatures of histograms of normal orientations.
//!
//! The spherical support of a keypoint is split into 32 volumes (8 azimuth
//! sectors, 2 elevation halves and 2 radial shells, all in the keypoint's
//! local reference frame). Each volume accumulates an 11-bin histogram of the
//! cosine between the neighbour normal and the frame's z axis, with linear
//! interpolation between adjacent cosine bins. The whole signature is L2
//! normalized.

use crate::lrf::{frame_at, MIN_SUPPORT};
use crate::{FeatureError, Result};
use cv_core::point_cloud::PointCloud;
use cv_core::{Descriptor, Descriptors, DESCRIPTOR_LEN};
use cv_point_cloud::PointIndex;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use std::f32::consts::PI;

const AZIMUTH_DIVISIONS: usize = 8;
const ELEVATION_DIVISIONS: usize = 2;
const RADIAL_DIVISIONS: usize = 2;
const COSINE_BINS: usize = 11;

const _: () = assert!(
    AZIMUTH_DIVISIONS * ELEVATION_DIVISIONS * RADIAL_DIVISIONS * COSINE_BINS == DESCRIPTOR_LEN
);

/// One descriptor per keypoint, index aligned. Keypoints whose frame cannot
/// be estimated or whose support is too sparse get [`Descriptor::invalid`].
pub fn compute_descriptors(
    keypoints: &PointCloud,
    surface: &PointCloud,
    normals: &[Vector3<f32>],
    radius: f32,
) -> Result<Descriptors> {
    if normals.len() != surface.len() {
        return Err(FeatureError::DescriptorError(format!(
            "{} normals for a surface of {} points",
            normals.len(),
            surface.len()
        )));
    }
    let index = PointIndex::new(&surface.points);

    let descriptors: Vec<Descriptor> = keypoints
        .points
        .par_iter()
        .map(|kp| describe(kp, &index, surface, normals, radius))
        .collect();

    Ok(Descriptors { descriptors })
}

fn describe(
    kp: &Point3<f32>,
    index: &PointIndex,
    surface: &PointCloud,
    normals: &[Vector3<f32>],
    radius: f32,
) -> Descriptor {
    let frame = frame_at(kp, index, surface, normals, radius);
    if !frame.is_finite() {
        return Descriptor::invalid();
    }

    let mut hist = [0.0f32; DESCRIPTOR_LEN];
    let mut used = 0usize;

    for (j, d2) in index.within_radius(kp, radius) {
        let n = normals[j];
        if !n.iter().all(|v| v.is_finite()) {
            continue;
        }
        let local = frame.to_local(&(surface.points[j] - kp));

        let azimuth = local.y.atan2(local.x);
        let sector = (((azimuth + PI) / (2.0 * PI) * AZIMUTH_DIVISIONS as f32) as usize)
            .min(AZIMUTH_DIVISIONS - 1);
        let elevation = usize::from(local.z > 0.0);
        let shell = usize::from(d2.sqrt() > radius * 0.5);
        let volume = (sector * ELEVATION_DIVISIONS + elevation) * RADIAL_DIVISIONS + shell;

        let cos = n.dot(&frame.z_axis()).clamp(-1.0, 1.0);
        let pos = ((cos + 1.0) * 0.5 * COSINE_BINS as f32 - 0.5)
            .clamp(0.0, (COSINE_BINS - 1) as f32);
        let lo = pos.floor() as usize;
        let frac = pos - lo as f32;

        let base = volume * COSINE_BINS;
        hist[base + lo] += 1.0 - frac;
        if lo + 1 < COSINE_BINS {
            hist[base + lo + 1] += frac;
        }
        used += 1;
    }

    if used < MIN_SUPPORT {
        return Descriptor::invalid();
    }

    let norm = hist.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return Descriptor::invalid();
    }
    for v in &mut hist {
        *v /= norm;
    }
    Descriptor::new(hist)
}
