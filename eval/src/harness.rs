//! Every model against every scene, with ground truth from file names.

use crate::cancel::CancelToken;
use crate::confusion::{ConfusionMatrix, Outcome};
use crate::label::{identity_label, DEFAULT_DELIMITER};
use crate::pipeline::{PairReport, Pipeline, PipelineRun};
use crate::result_log::ResultLog;
use crate::{EvalError, Result};
use cv_core::point_cloud::PointCloud;
use cv_features::{FeatureExtractor, ShotExtractor};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const CLOUD_EXTENSION: &str = "pcd";

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub model_dir: PathBuf,
    pub scene_dir: PathBuf,
    /// Directory receiving the result log.
    pub output_dir: PathBuf,
    pub label_delimiter: char,
    /// Report keypoint counts of every pair at info level.
    pub show_keypoints: bool,
    /// Report the pose and support of every instance at info level.
    pub show_correspondences: bool,
}

impl HarnessConfig {
    pub fn new(model_dir: impl Into<PathBuf>, scene_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            scene_dir: scene_dir.into(),
            output_dir: PathBuf::from("."),
            label_delimiter: DEFAULT_DELIMITER,
            show_keypoints: false,
            show_correspondences: false,
        }
    }
}

/// Result of one (scene, model) pair.
#[derive(Debug)]
pub enum PairOutcome {
    Processed { outcome: Outcome, report: PairReport },
    /// Loading or processing failed; the pair is not classified.
    Skipped(EvalError),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub counters: ConfusionMatrix,
    pub skipped: u64,
    pub cancelled: bool,
    pub log_path: PathBuf,
}

/// Owns the run state: counters, skipped tally and the result log.
///
/// Pairs are processed one at a time. Cancellation is checked before every
/// pair and inside the pipeline; either way the run ends through the same
/// finalize path that writes the summary.
pub struct BatchHarness<E = ShotExtractor> {
    pipeline: Pipeline<E>,
    config: HarnessConfig,
    cancel: CancelToken,
    counters: ConfusionMatrix,
    skipped: u64,
}

impl<E: FeatureExtractor> BatchHarness<E> {
    pub fn new(pipeline: Pipeline<E>, config: HarnessConfig, cancel: CancelToken) -> Self {
        Self {
            pipeline,
            config,
            cancel,
            counters: ConfusionMatrix::new(),
            skipped: 0,
        }
    }

    pub fn counters(&self) -> &ConfusionMatrix {
        &self.counters
    }

    /// Run the batch, writing the result log into `config.output_dir`.
    pub fn run(self) -> Result<BatchSummary> {
        self.check_directories()?;
        let (log, log_path) = ResultLog::create(&self.config.output_dir, self.pipeline.params())?;
        self.run_with_log(log, log_path)
    }

    /// Run the batch into an already opened log; `log_path` is only reported.
    ///
    /// A failed pair line stops the batch. The summary is still written and
    /// the write error is returned afterwards.
    pub fn run_with_log<W: Write>(
        mut self,
        mut log: ResultLog<W>,
        log_path: PathBuf,
    ) -> Result<BatchSummary> {
        self.check_directories()?;
        let scenes = collect_pcd_files(&self.config.scene_dir)?;
        let models = collect_pcd_files(&self.config.model_dir)?;
        tracing::info!(
            scenes = scenes.len(),
            models = models.len(),
            "starting batch"
        );

        let mut cancelled = false;
        let mut write_error = None;

        'scenes: for scene_path in &scenes {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let scene = match load(scene_path) {
                Ok(cloud) => cloud,
                Err(err) => {
                    tracing::warn!(pairs = models.len(), "skipping scene: {err}");
                    self.skipped += models.len() as u64;
                    continue;
                }
            };

            for model_path in &models {
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    break 'scenes;
                }
                match self.process_pair(scene_path, &scene, model_path) {
                    PairOutcome::Processed { outcome, report } => {
                        self.counters.record(outcome);
                        debug_assert!(self.counters.is_consistent());
                        if let Err(err) = log.record_pair(
                            &file_name(scene_path),
                            &file_name(model_path),
                            report.correspondences,
                            report.instances(),
                        ) {
                            tracing::warn!("result log write failed, stopping batch: {err}");
                            write_error = Some(err);
                            break 'scenes;
                        }
                    }
                    PairOutcome::Skipped(err) => {
                        tracing::warn!("skipping pair: {err}");
                        self.skipped += 1;
                    }
                    PairOutcome::Cancelled => {
                        cancelled = true;
                        break 'scenes;
                    }
                }
            }
        }

        if cancelled {
            tracing::warn!(
                processed = self.counters.total(),
                "batch interrupted, writing summary"
            );
        }
        log.finalize(&self.counters, self.skipped)?;
        if let Some(err) = write_error {
            return Err(err.into());
        }

        for outcome in Outcome::ALL {
            tracing::info!(
                count = self.counters.count(outcome),
                rate = ?self.counters.rate(outcome),
                "{outcome}"
            );
        }
        tracing::info!(
            total = self.counters.total(),
            skipped = self.skipped,
            log = %log_path.display(),
            "batch finished"
        );

        Ok(BatchSummary {
            counters: self.counters,
            skipped: self.skipped,
            cancelled,
            log_path,
        })
    }

    fn check_directories(&self) -> Result<()> {
        for dir in [&self.config.model_dir, &self.config.scene_dir] {
            if !dir.is_dir() {
                return Err(EvalError::MissingDirectory(dir.clone()));
            }
        }
        Ok(())
    }

    /// Run the pipeline on one pair and classify the result. Does not touch
    /// the counters.
    pub fn process_pair(&self, scene_path: &Path, scene: &PointCloud, model_path: &Path) -> PairOutcome {
        let model = match load(model_path) {
            Ok(cloud) => cloud,
            Err(err) => return PairOutcome::Skipped(err),
        };

        let report = match self.pipeline.run(&model, scene, &self.cancel) {
            Ok(PipelineRun::Completed(report)) => report,
            Ok(PipelineRun::Cancelled) => return PairOutcome::Cancelled,
            Err(err) => return PairOutcome::Skipped(err),
        };

        let delimiter = self.config.label_delimiter;
        let same_object =
            identity_label(scene_path, delimiter) == identity_label(model_path, delimiter);
        let outcome = Outcome::classify(same_object, report.instances());

        self.report(scene_path, model_path, &report, outcome);
        PairOutcome::Processed { outcome, report }
    }

    fn report(&self, scene_path: &Path, model_path: &Path, report: &PairReport, outcome: Outcome) {
        let scene = file_name(scene_path);
        let model = file_name(model_path);
        if self.config.show_keypoints {
            tracing::info!(
                %scene,
                %model,
                model_points = report.model_points,
                model_keypoints = report.model_keypoints,
                scene_points = report.scene_points,
                scene_keypoints = report.scene_keypoints,
                "keypoints"
            );
        } else {
            tracing::debug!(
                %scene,
                %model,
                model_keypoints = report.model_keypoints,
                scene_keypoints = report.scene_keypoints,
                "keypoints"
            );
        }
        tracing::info!(
            %scene,
            %model,
            correspondences = report.correspondences,
            instances = report.instances(),
            "{outcome}"
        );

        if self.config.show_correspondences {
            for (i, h) in report.hypotheses.iter().enumerate() {
                let r = h.transform.rotation;
                let t = h.transform.translation;
                tracing::info!(
                    instance = i + 1,
                    support = h.support(),
                    "R = [{:.3} {:.3} {:.3}; {:.3} {:.3} {:.3}; {:.3} {:.3} {:.3}] t = <{:.3}, {:.3}, {:.3}>",
                    r[(0, 0)], r[(0, 1)], r[(0, 2)],
                    r[(1, 0)], r[(1, 1)], r[(1, 2)],
                    r[(2, 0)], r[(2, 1)], r[(2, 2)],
                    t.x, t.y, t.z
                );
            }
        }
    }
}

fn load(path: &Path) -> Result<PointCloud> {
    cv_io::load_pcd(path).map_err(|source| EvalError::Load {
        path: path.to_path_buf(),
        source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Regular `.pcd` files anywhere below `dir`, sorted by path.
pub fn collect_pcd_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file()
                && path.extension().is_some_and(|ext| ext == CLOUD_EXTENSION)
            {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_nested_pcd_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        for name in ["b-1.pcd", "a-1.pcd", "notes.txt", "sub/c-1.pcd", "upper.PCD"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("dir.pcd")).unwrap();

        let files = collect_pcd_files(dir.path()).unwrap();
        let names: Vec<PathBuf> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a-1.pcd"),
                PathBuf::from("b-1.pcd"),
                PathBuf::from("sub/c-1.pcd"),
            ]
        );
    }
}
