//! Model-to-scene descriptor correspondences.

use crate::index::DescriptorIndex;
use cv_core::{Correspondence, Correspondences, Descriptors};
use rayon::prelude::*;

/// Nearest-neighbour search from scene descriptors into a model index.
///
/// Every finite scene descriptor is matched to its closest model descriptor.
/// The pair is kept only when the squared distance is strictly below
/// `threshold`, so each scene keypoint contributes at most one
/// correspondence.
pub struct CorrespondenceSearch {
    threshold: f32,
}

impl CorrespondenceSearch {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Correspondences ordered by scene keypoint index.
    pub fn find(&self, model: &Descriptors, scene: &Descriptors) -> Correspondences {
        let index = DescriptorIndex::build(model);
        self.find_in(&index, scene)
    }

    /// Same as [`CorrespondenceSearch::find`] against a prebuilt model index.
    pub fn find_in(&self, model: &DescriptorIndex, scene: &Descriptors) -> Correspondences {
        if model.is_empty() {
            return Correspondences::new();
        }

        let matched: Vec<Option<Correspondence>> = scene
            .descriptors
            .par_iter()
            .enumerate()
            .map(|(scene_idx, desc)| {
                let (model_idx, distance) = model.nearest(desc)?;
                (distance < self.threshold)
                    .then(|| Correspondence::new(model_idx, scene_idx, distance))
            })
            .collect();

        let found: Correspondences = matched.into_iter().flatten().collect();
        tracing::debug!(
            scene = scene.len(),
            model = model.len(),
            found = found.len(),
            "descriptor correspondences"
        );
        found
    }
}

pub fn find_correspondences(
    model: &Descriptors,
    scene: &Descriptors,
    threshold: f32,
) -> Correspondences {
    CorrespondenceSearch::new(threshold).find(model, scene)
}
