//! Run parameters and their presets.

use crate::EvalError;
use cv_features::ExtractionParams;
use cv_registration::{Clusterer, GcParams, HoughParams};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusteringAlgorithm {
    Hough,
    GeometricConsistency,
}

impl FromStr for ClusteringAlgorithm {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hough" => Ok(ClusteringAlgorithm::Hough),
            "GC" => Ok(ClusteringAlgorithm::GeometricConsistency),
            other => Err(EvalError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for ClusteringAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusteringAlgorithm::Hough => f.write_str("Hough"),
            ClusteringAlgorithm::GeometricConsistency => f.write_str("GC"),
        }
    }
}

/// Geometric parameters of one batch run.
///
/// Radii are in cloud units, or in multiples of the model resolution when
/// `use_resolution` is set. See [`RunParameters::scaled`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunParameters {
    pub model_ss: f32,
    pub scene_ss: f32,
    pub rf_rad: f32,
    pub descr_rad: f32,
    pub cg_size: f32,
    pub cg_thresh: f32,
    pub kd_thresh: f32,
    pub use_resolution: bool,
    pub algorithm: ClusteringAlgorithm,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self::object_object()
    }
}

impl RunParameters {
    /// Isolated models matched against isolated objects.
    pub fn object_object() -> Self {
        Self {
            model_ss: 0.015,
            scene_ss: 0.015,
            rf_rad: 0.06,
            descr_rad: 0.08,
            cg_size: 0.035,
            cg_thresh: 6.0,
            kd_thresh: 0.24,
            use_resolution: false,
            algorithm: ClusteringAlgorithm::Hough,
        }
    }

    /// Isolated models matched against cluttered scenes.
    pub fn object_scene() -> Self {
        Self {
            model_ss: 0.01,
            scene_ss: 0.03,
            rf_rad: 0.015,
            descr_rad: 0.02,
            cg_size: 0.01,
            cg_thresh: 5.0,
            kd_thresh: 0.25,
            use_resolution: false,
            algorithm: ClusteringAlgorithm::Hough,
        }
    }

    /// Parameters for one pair, given the model's resolution.
    ///
    /// With `use_resolution` and a positive resolution the radii and the
    /// cluster size are multiplied by it; otherwise they are returned as is.
    /// Always derived from `self`, so repeated calls never compound.
    pub fn scaled(&self, resolution: f32) -> Self {
        if !self.use_resolution || !(resolution > 0.0 && resolution.is_finite()) {
            return *self;
        }
        Self {
            model_ss: self.model_ss * resolution,
            scene_ss: self.scene_ss * resolution,
            rf_rad: self.rf_rad * resolution,
            descr_rad: self.descr_rad * resolution,
            cg_size: self.cg_size * resolution,
            ..*self
        }
    }

    pub fn clusterer(&self) -> Clusterer {
        match self.algorithm {
            ClusteringAlgorithm::Hough => {
                Clusterer::Hough(HoughParams::new(self.cg_size, self.cg_thresh))
            }
            ClusteringAlgorithm::GeometricConsistency => {
                Clusterer::GeometricConsistency(GcParams::new(self.cg_size, self.cg_thresh))
            }
        }
    }

    pub fn model_extraction(&self) -> ExtractionParams {
        self.extraction(self.model_ss)
    }

    pub fn scene_extraction(&self) -> ExtractionParams {
        self.extraction(self.scene_ss)
    }

    fn extraction(&self, sampling_radius: f32) -> ExtractionParams {
        ExtractionParams {
            sampling_radius,
            descriptor_radius: self.descr_rad,
            frame_radius: self.clusterer().requires_frames().then_some(self.rf_rad),
        }
    }

    pub fn result_file_name(&self) -> String {
        format!(
            "Result_{}_{}_{}_{}_{}_{}_{}_{}.txt",
            self.model_ss,
            self.scene_ss,
            self.rf_rad,
            self.descr_rad,
            self.cg_size,
            self.cg_thresh,
            self.kd_thresh,
            self.algorithm
        )
    }

    /// `name : value` lines written at the top of the result log.
    pub fn describe(&self) -> Vec<String> {
        vec![
            format!("model_ss : {}", self.model_ss),
            format!("scene_ss : {}", self.scene_ss),
            format!("rf_rad : {}", self.rf_rad),
            format!("descr_rad : {}", self.descr_rad),
            format!("cg_size : {}", self.cg_size),
            format!("cg_thresh : {}", self.cg_thresh),
            format!("kd_thresh : {}", self.kd_thresh),
            format!("use_resolution : {}", self.use_resolution),
            format!("algorithm : {}", self.algorithm),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names() {
        assert_eq!("Hough".parse::<ClusteringAlgorithm>().unwrap(), ClusteringAlgorithm::Hough);
        assert_eq!(
            "GC".parse::<ClusteringAlgorithm>().unwrap(),
            ClusteringAlgorithm::GeometricConsistency
        );
        assert!(matches!(
            "hough".parse::<ClusteringAlgorithm>(),
            Err(EvalError::UnknownAlgorithm(name)) if name == "hough"
        ));
        assert_eq!(ClusteringAlgorithm::GeometricConsistency.to_string(), "GC");
    }

    #[test]
    fn scaling_never_compounds() {
        let base = RunParameters {
            use_resolution: true,
            ..RunParameters::object_object()
        };
        let once = base.scaled(0.002);
        let again = base.scaled(0.002);
        assert_eq!(once, again);
        assert!((once.cg_size - 0.035 * 0.002).abs() < 1e-9);
        assert_eq!(once.cg_thresh, base.cg_thresh);
        assert_eq!(once.kd_thresh, base.kd_thresh);
    }

    #[test]
    fn scaling_is_off_without_the_flag_or_resolution() {
        let base = RunParameters::object_scene();
        assert_eq!(base.scaled(0.5), base);
        let flagged = RunParameters {
            use_resolution: true,
            ..base
        };
        assert_eq!(flagged.scaled(0.0), flagged);
    }

    #[test]
    fn file_name_lists_base_parameters() {
        assert_eq!(
            RunParameters::object_object().result_file_name(),
            "Result_0.015_0.015_0.06_0.08_0.035_6_0.24_Hough.txt"
        );
    }

    #[test]
    fn frames_only_for_hough() {
        let hough = RunParameters::object_object();
        assert_eq!(hough.model_extraction().frame_radius, Some(0.06));
        let gc = RunParameters {
            algorithm: ClusteringAlgorithm::GeometricConsistency,
            ..hough
        };
        assert_eq!(gc.scene_extraction().frame_radius, None);
        assert_eq!(gc.scene_extraction().sampling_radius, 0.015);
    }
}
