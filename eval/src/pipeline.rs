//! Recognition of one model in one scene.

use crate::cancel::CancelToken;
use crate::params::RunParameters;
use crate::Result;
use cv_core::point_cloud::PointCloud;
use cv_features::{CorrespondenceSearch, FeatureExtractor, KeypointFeatures, ShotExtractor};
use cv_point_cloud::compute_cloud_resolution;
use cv_registration::{GroupingInput, PoseHypothesis};

/// What a completed pair produced.
#[derive(Debug, Clone)]
pub struct PairReport {
    pub model_points: usize,
    pub scene_points: usize,
    pub model_keypoints: usize,
    pub scene_keypoints: usize,
    pub correspondences: usize,
    pub hypotheses: Vec<PoseHypothesis>,
    /// Parameters after resolution scaling.
    pub effective: RunParameters,
}

impl PairReport {
    pub fn instances(&self) -> usize {
        self.hypotheses.len()
    }
}

#[derive(Debug, Clone)]
pub enum PipelineRun {
    Completed(PairReport),
    /// The token was set between two stages; nothing from this pair counts.
    Cancelled,
}

/// Resolution estimate, feature extraction, correspondence search and
/// clustering, in that order.
pub struct Pipeline<E = ShotExtractor> {
    params: RunParameters,
    extractor: E,
}

impl Pipeline {
    pub fn new(params: RunParameters) -> Self {
        Self::with_extractor(params, ShotExtractor::default())
    }
}

impl<E: FeatureExtractor> Pipeline<E> {
    pub fn with_extractor(params: RunParameters, extractor: E) -> Self {
        Self { params, extractor }
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    pub fn run(
        &self,
        model: &PointCloud,
        scene: &PointCloud,
        cancel: &CancelToken,
    ) -> Result<PipelineRun> {
        let effective = if self.params.use_resolution {
            let resolution = compute_cloud_resolution(model);
            let scaled = self.params.scaled(resolution);
            tracing::info!(
                resolution,
                model_ss = scaled.model_ss,
                scene_ss = scaled.scene_ss,
                rf_rad = scaled.rf_rad,
                descr_rad = scaled.descr_rad,
                cg_size = scaled.cg_size,
                "model resolution"
            );
            scaled
        } else {
            self.params
        };

        if cancel.is_cancelled() {
            return Ok(PipelineRun::Cancelled);
        }
        let model_features = self.extractor.extract(model, &effective.model_extraction())?;

        if cancel.is_cancelled() {
            return Ok(PipelineRun::Cancelled);
        }
        let scene_features = self.extractor.extract(scene, &effective.scene_extraction())?;

        if cancel.is_cancelled() {
            return Ok(PipelineRun::Cancelled);
        }
        let correspondences = CorrespondenceSearch::new(effective.kd_thresh)
            .find(&model_features.descriptors, &scene_features.descriptors);

        if cancel.is_cancelled() {
            return Ok(PipelineRun::Cancelled);
        }
        let hypotheses = effective.clusterer().cluster(
            grouping_input(&model_features),
            grouping_input(&scene_features),
            &correspondences,
        )?;

        Ok(PipelineRun::Completed(PairReport {
            model_points: model.len(),
            scene_points: scene.len(),
            model_keypoints: model_features.len(),
            scene_keypoints: scene_features.len(),
            correspondences: correspondences.len(),
            hypotheses,
            effective,
        }))
    }
}

fn grouping_input(features: &KeypointFeatures) -> GroupingInput<'_> {
    let input = GroupingInput::new(&features.keypoints);
    match &features.frames {
        Some(frames) => input.with_frames(frames),
        None => input,
    }
}
