//! Pose estimation from descriptor correspondences.
//!
//! This crate turns a model-to-scene correspondence set into pose hypotheses:
//! - Hough voting over local reference frames
//! - Geometric consistency grouping
//! - Least-squares rigid alignment with a single trim-and-refit pass

pub mod grouping;
pub mod rigid;

pub use grouping::{
    Clusterer, GcParams, GroupingInput, HoughParams, PoseHypothesis, REFINE_FACTOR,
};
pub use rigid::{alignment_rmse, estimate_rigid_transform, estimate_translation};

pub type Result<T> = std::result::Result<T, RegistrationError>;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Hough grouping needs {0} reference frames")]
    MissingReferenceFrames(&'static str),

    #[error("{frames} {side} reference frames for {keypoints} keypoints")]
    FrameCountMismatch {
        side: &'static str,
        frames: usize,
        keypoints: usize,
    },

    #[error("Correspondence ({model_idx}, {scene_idx}) refers to a missing keypoint")]
    IndexOutOfRange { model_idx: usize, scene_idx: usize },
}
