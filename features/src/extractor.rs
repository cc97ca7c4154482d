//! The feature-extraction boundary consumed by the recognition pipeline.

use crate::lrf::estimate_reference_frames;
use crate::shot::compute_descriptors;
use crate::{FeatureError, Result};
use cv_core::point_cloud::PointCloud;
use cv_core::{Descriptors, ReferenceFrame};
use cv_point_cloud::{uniform_sample, NormalEstimation};
use nalgebra::Vector3;

/// Radii for one extraction pass, already scaled to the cloud if needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionParams {
    pub sampling_radius: f32,
    pub descriptor_radius: f32,
    /// Reference frames are only computed when this is set.
    pub frame_radius: Option<f32>,
}

/// Keypoints of a cloud with everything computed at them, index aligned.
#[derive(Debug, Clone)]
pub struct KeypointFeatures {
    pub keypoints: PointCloud,
    /// Position of every keypoint in the source cloud.
    pub keypoint_indices: Vec<usize>,
    pub descriptors: Descriptors,
    pub frames: Option<Vec<ReferenceFrame>>,
}

impl KeypointFeatures {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

pub trait FeatureExtractor: Send + Sync {
    /// One normal per point of `cloud`; non-finite where undefined.
    fn normals(&self, cloud: &PointCloud) -> Result<Vec<Vector3<f32>>>;

    /// Indices of the keypoints of `cloud` at the given spacing.
    fn keypoints(&self, cloud: &PointCloud, radius: f32) -> Result<Vec<usize>>;

    fn descriptors(
        &self,
        keypoints: &PointCloud,
        surface: &PointCloud,
        normals: &[Vector3<f32>],
        radius: f32,
    ) -> Result<Descriptors>;

    fn reference_frames(
        &self,
        keypoints: &PointCloud,
        surface: &PointCloud,
        normals: &[Vector3<f32>],
        radius: f32,
    ) -> Result<Vec<ReferenceFrame>>;

    fn extract(&self, cloud: &PointCloud, params: &ExtractionParams) -> Result<KeypointFeatures> {
        let normals = self.normals(cloud)?;
        let keypoint_indices = self.keypoints(cloud, params.sampling_radius)?;
        let keypoints = cloud.select(&keypoint_indices);

        let descriptors =
            self.descriptors(&keypoints, cloud, &normals, params.descriptor_radius)?;
        if descriptors.len() != keypoints.len() {
            return Err(FeatureError::DescriptorError(format!(
                "{} descriptors for {} keypoints",
                descriptors.len(),
                keypoints.len()
            )));
        }

        let frames = match params.frame_radius {
            Some(radius) => {
                let frames = self.reference_frames(&keypoints, cloud, &normals, radius)?;
                if frames.len() != keypoints.len() {
                    return Err(FeatureError::ReferenceFrameError(format!(
                        "{} frames for {} keypoints",
                        frames.len(),
                        keypoints.len()
                    )));
                }
                Some(frames)
            }
            None => None,
        };

        tracing::debug!(
            points = cloud.len(),
            keypoints = keypoints.len(),
            "extracted features"
        );

        Ok(KeypointFeatures {
            keypoints,
            keypoint_indices,
            descriptors,
            frames,
        })
    }
}

/// PCA normals, voxel keypoints, covariance frames and 352-bin signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShotExtractor {
    pub normal_estimation: NormalEstimation,
}

impl ShotExtractor {
    pub fn new(normal_estimation: NormalEstimation) -> Self {
        Self { normal_estimation }
    }
}

impl FeatureExtractor for ShotExtractor {
    fn normals(&self, cloud: &PointCloud) -> Result<Vec<Vector3<f32>>> {
        Ok(self.normal_estimation.compute(cloud))
    }

    fn keypoints(&self, cloud: &PointCloud, radius: f32) -> Result<Vec<usize>> {
        Ok(uniform_sample(cloud, radius))
    }

    fn descriptors(
        &self,
        keypoints: &PointCloud,
        surface: &PointCloud,
        normals: &[Vector3<f32>],
        radius: f32,
    ) -> Result<Descriptors> {
        compute_descriptors(keypoints, surface, normals, radius)
    }

    fn reference_frames(
        &self,
        keypoints: &PointCloud,
        surface: &PointCloud,
        normals: &[Vector3<f32>],
        radius: f32,
    ) -> Result<Vec<ReferenceFrame>> {
        estimate_reference_frames(keypoints, surface, normals, radius)
    }
}
