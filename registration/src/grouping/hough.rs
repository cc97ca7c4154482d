//! Voting for the model centroid in a sparse 3D histogram.

use super::HoughParams;
use cv_core::point_cloud::{is_finite_point, PointCloud};
use cv_core::{Correspondence, Correspondences, ReferenceFrame};
use nalgebra::{Point3, Vector3};
use std::collections::HashMap;

type BinKey = [i64; 3];

#[derive(Default)]
struct Bin {
    weight: f32,
    voters: Vec<usize>,
}

/// Sparse histogram with cubic bins; bin `k` covers `[k·size, (k+1)·size)`.
struct HoughSpace {
    bin_size: f32,
    bins: HashMap<BinKey, Bin>,
}

impl HoughSpace {
    fn new(bin_size: f32) -> Self {
        Self {
            bin_size,
            bins: HashMap::new(),
        }
    }

    fn vote(&mut self, at: &Point3<f32>, weight: f32, voter: usize) {
        let key = [0, 1, 2].map(|i| (at[i] / self.bin_size).floor() as i64);
        self.add(key, weight, voter);
    }

    /// Split the vote over the 8 bins whose centres surround `at`.
    fn vote_interpolated(&mut self, at: &Point3<f32>, weight: f32, voter: usize) {
        let rel = [0, 1, 2].map(|i| at[i] / self.bin_size - 0.5);
        let base = rel.map(|r| r.floor());
        let frac = [rel[0] - base[0], rel[1] - base[1], rel[2] - base[2]];

        for corner in 0..8usize {
            let mut key = [0i64; 3];
            let mut w = weight;
            for axis in 0..3 {
                let upper = (corner >> axis) & 1 == 1;
                key[axis] = base[axis] as i64 + i64::from(upper);
                w *= if upper { frac[axis] } else { 1.0 - frac[axis] };
            }
            if w > 0.0 {
                self.add(key, w, voter);
            }
        }
    }

    fn add(&mut self, key: BinKey, weight: f32, voter: usize) {
        let bin = self.bins.entry(key).or_default();
        bin.weight += weight;
        bin.voters.push(voter);
    }

    /// Bins above `threshold` that no neighbour outweighs, in key order.
    fn maxima(&self, threshold: f32) -> Vec<&Bin> {
        let mut keys: Vec<&BinKey> = self
            .bins
            .iter()
            .filter(|(_, bin)| bin.weight > threshold)
            .map(|(key, _)| key)
            .collect();
        keys.sort();

        keys.into_iter()
            .filter(|key| self.is_local_maximum(key))
            .filter_map(|key| self.bins.get(key))
            .collect()
    }

    fn is_local_maximum(&self, key: &BinKey) -> bool {
        let Some(center) = self.bins.get(key) else {
            return false;
        };
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let neighbor = [key[0] + dx, key[1] + dy, key[2] + dz];
                    if let Some(bin) = self.bins.get(&neighbor) {
                        if bin.weight > center.weight {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }
}

/// Clusters of correspondences, one per accepted histogram maximum.
pub(super) fn cluster(
    params: &HoughParams,
    model: &PointCloud,
    scene: &PointCloud,
    model_frames: &[ReferenceFrame],
    scene_frames: &[ReferenceFrame],
    correspondences: &Correspondences,
) -> Vec<Vec<Correspondence>> {
    if correspondences.is_empty() || !(params.bin_size > 0.0) {
        return Vec::new();
    }
    let Some(centroid) = model.centroid() else {
        return Vec::new();
    };

    // Keypoint-to-centroid vectors in each model keypoint's own frame.
    let model_votes: Vec<Option<Vector3<f32>>> = model
        .points
        .iter()
        .zip(model_frames)
        .map(|(p, frame)| {
            (is_finite_point(p) && frame.is_finite()).then(|| frame.to_local(&(centroid - *p)))
        })
        .collect();

    let mut space = HoughSpace::new(params.bin_size);
    let mut cast = 0usize;
    for (ci, c) in correspondences.iter().enumerate() {
        let Some(local) = model_votes[c.model_idx] else {
            continue;
        };
        let frame = &scene_frames[c.scene_idx];
        let anchor = scene.points[c.scene_idx];
        if !frame.is_finite() || !is_finite_point(&anchor) {
            continue;
        }
        let vote = anchor + frame.to_global(&local);
        if params.use_interpolation {
            space.vote_interpolated(&vote, 1.0, ci);
        } else {
            space.vote(&vote, 1.0, ci);
        }
        cast += 1;
    }

    let clusters: Vec<Vec<Correspondence>> = space
        .maxima(params.threshold)
        .into_iter()
        .map(|bin| bin.voters.iter().map(|&ci| correspondences.as_slice()[ci]).collect())
        .collect();

    tracing::debug!(
        votes = cast,
        bins = space.bins.len(),
        maxima = clusters.len(),
        "hough voting"
    );
    clusters
}
