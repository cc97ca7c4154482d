//! Local features for correspondence grouping.
//!
//! - `lrf`: per-keypoint local reference frames
//! - `shot`: 352-bin signatures of histograms of normal orientations
//! - `extractor`: the `FeatureExtractor` boundary the recognition pipeline uses
//! - `index`: exact kd-tree over descriptors
//! - `matcher`: nearest-neighbour correspondence search with distance pruning

pub mod extractor;
pub mod index;
pub mod lrf;
pub mod matcher;
pub mod shot;

pub use extractor::{ExtractionParams, FeatureExtractor, KeypointFeatures, ShotExtractor};
pub use index::DescriptorIndex;
pub use lrf::estimate_reference_frames;
pub use matcher::{find_correspondences, CorrespondenceSearch};
pub use shot::compute_descriptors;

pub type Result<T> = std::result::Result<T, FeatureError>;

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("Descriptor error: {0}")]
    DescriptorError(String),

    #[error("Reference frame error: {0}")]
    ReferenceFrameError(String),

    #[error("Matching error: {0}")]
    MatchingError(String),
}
