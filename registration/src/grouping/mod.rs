//! Correspondence grouping: partition model-scene correspondences into
//! geometrically coherent subsets, one per detected model instance.
//!
//! Two strategies sit behind [`Clusterer::cluster`]:
//! - [`Clusterer::Hough`] votes for the model centroid in a 3D histogram,
//!   transferring each vote through the keypoints' local reference frames.
//! - [`Clusterer::GeometricConsistency`] greedily grows clusters whose
//!   pairwise model and scene distances agree.

mod gc;
mod hough;

use crate::rigid::{estimate_rigid_transform, estimate_translation, MIN_PAIRS};
use crate::{RegistrationError, Result};
use cv_core::point_cloud::PointCloud;
use cv_core::{Correspondence, Correspondences, ReferenceFrame, RigidTransform};
use nalgebra::Point3;

/// Inlier threshold of the refit pass, as a multiple of the cluster size.
pub const REFINE_FACTOR: f32 = 2.0;

/// A detected instance: the model-to-scene motion and the correspondences
/// supporting it.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseHypothesis {
    pub transform: RigidTransform,
    pub correspondences: Correspondences,
}

impl PoseHypothesis {
    pub fn support(&self) -> usize {
        self.correspondences.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
    /// Edge of a cubic histogram bin.
    pub bin_size: f32,
    /// A bin is an instance when its weight is strictly above this.
    pub threshold: f32,
    /// Spread each vote over the 8 surrounding bins.
    pub use_interpolation: bool,
}

impl HoughParams {
    pub fn new(bin_size: f32, threshold: f32) -> Self {
        Self {
            bin_size,
            threshold,
            use_interpolation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcParams {
    /// Tolerance on the difference of pairwise model and scene distances.
    pub consensus_size: f32,
    /// A cluster is an instance when it has at least this many members.
    pub threshold: f32,
}

impl GcParams {
    pub fn new(consensus_size: f32, threshold: f32) -> Self {
        Self {
            consensus_size,
            threshold,
        }
    }
}

/// Keypoints of one side of the match, with frames when they are available.
#[derive(Debug, Clone, Copy)]
pub struct GroupingInput<'a> {
    pub keypoints: &'a PointCloud,
    pub frames: Option<&'a [ReferenceFrame]>,
}

impl<'a> GroupingInput<'a> {
    pub fn new(keypoints: &'a PointCloud) -> Self {
        Self {
            keypoints,
            frames: None,
        }
    }

    pub fn with_frames(mut self, frames: &'a [ReferenceFrame]) -> Self {
        self.frames = Some(frames);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Clusterer {
    Hough(HoughParams),
    GeometricConsistency(GcParams),
}

impl Clusterer {
    pub fn requires_frames(&self) -> bool {
        matches!(self, Clusterer::Hough(_))
    }

    /// Group `correspondences` between `model` and `scene` keypoints into
    /// pose hypotheses. An empty result means no instance was found.
    pub fn cluster(
        &self,
        model: GroupingInput<'_>,
        scene: GroupingInput<'_>,
        correspondences: &Correspondences,
    ) -> Result<Vec<PoseHypothesis>> {
        check_indices(model, scene, correspondences)?;

        let (clusters, refine_distance) = match self {
            Clusterer::Hough(params) => {
                let model_frames = aligned_frames(model, "model")?;
                let scene_frames = aligned_frames(scene, "scene")?;
                let clusters = hough::cluster(
                    params,
                    model.keypoints,
                    scene.keypoints,
                    model_frames,
                    scene_frames,
                    correspondences,
                );
                (clusters, params.bin_size * REFINE_FACTOR)
            }
            Clusterer::GeometricConsistency(params) => {
                let clusters = gc::cluster(params, model.keypoints, scene.keypoints, correspondences);
                (clusters, params.consensus_size * REFINE_FACTOR)
            }
        };

        let hypotheses: Vec<PoseHypothesis> = clusters
            .into_iter()
            .filter_map(|members| fit(model.keypoints, scene.keypoints, members, refine_distance))
            .collect();

        tracing::debug!(
            correspondences = correspondences.len(),
            hypotheses = hypotheses.len(),
            "clustered correspondences"
        );
        Ok(hypotheses)
    }
}

fn check_indices(
    model: GroupingInput<'_>,
    scene: GroupingInput<'_>,
    correspondences: &Correspondences,
) -> Result<()> {
    for c in correspondences.iter() {
        if c.model_idx >= model.keypoints.len() || c.scene_idx >= scene.keypoints.len() {
            return Err(RegistrationError::IndexOutOfRange {
                model_idx: c.model_idx,
                scene_idx: c.scene_idx,
            });
        }
    }
    Ok(())
}

fn aligned_frames<'a>(input: GroupingInput<'a>, side: &'static str) -> Result<&'a [ReferenceFrame]> {
    let frames = input
        .frames
        .ok_or(RegistrationError::MissingReferenceFrames(side))?;
    if frames.len() != input.keypoints.len() {
        return Err(RegistrationError::FrameCountMismatch {
            side,
            frames: frames.len(),
            keypoints: input.keypoints.len(),
        });
    }
    Ok(frames)
}

/// Least-squares fit of a cluster, then one trim-and-refit pass over the
/// members whose residual exceeds `refine_distance`.
///
/// A cluster that cannot pin down a rotation (fewer than [`MIN_PAIRS`]
/// members or degenerate geometry) still yields a hypothesis, carrying the
/// translation between the member centroids. Only an empty cluster yields none.
fn fit(
    model: &PointCloud,
    scene: &PointCloud,
    members: Vec<Correspondence>,
    refine_distance: f32,
) -> Option<PoseHypothesis> {
    let (src, dst) = endpoints(model, scene, &members);
    let Some(transform) = estimate_rigid_transform(&src, &dst) else {
        tracing::debug!(
            members = members.len(),
            "cluster too small or degenerate for a rotation, using centroid offset"
        );
        let transform = estimate_translation(&src, &dst)?;
        return Some(PoseHypothesis {
            transform,
            correspondences: members.into_iter().collect(),
        });
    };

    let inliers: Vec<Correspondence> = members
        .iter()
        .zip(src.iter().zip(&dst))
        .filter(|(_, (s, d))| (transform.transform_point(s) - **d).norm() <= refine_distance)
        .map(|(c, _)| *c)
        .collect();

    if inliers.len() < members.len() && inliers.len() >= MIN_PAIRS {
        let (src, dst) = endpoints(model, scene, &inliers);
        if let Some(refined) = estimate_rigid_transform(&src, &dst) {
            return Some(PoseHypothesis {
                transform: refined,
                correspondences: inliers.into_iter().collect(),
            });
        }
    }

    Some(PoseHypothesis {
        transform,
        correspondences: members.into_iter().collect(),
    })
}

fn endpoints(
    model: &PointCloud,
    scene: &PointCloud,
    members: &[Correspondence],
) -> (Vec<Point3<f32>>, Vec<Point3<f32>>) {
    members
        .iter()
        .map(|c| (model.points[c.model_idx], scene.points[c.scene_idx]))
        .unzip()
}
