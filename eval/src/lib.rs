//! Batch evaluation of model-in-scene recognition.
//!
//! [`BatchHarness`] walks a model and a scene directory, runs the
//! [`Pipeline`] on every (scene, model) pair, classifies the result against
//! labels taken from the file names and keeps a [`ConfusionMatrix`] plus a
//! result log on disk.

pub mod cancel;
pub mod confusion;
pub mod error;
pub mod harness;
pub mod label;
pub mod params;
pub mod pipeline;
pub mod result_log;

pub use cancel::CancelToken;
pub use confusion::{ConfusionMatrix, Outcome};
pub use error::{EvalError, Result};
pub use harness::{collect_pcd_files, BatchHarness, BatchSummary, HarnessConfig, PairOutcome};
pub use label::identity_label;
pub use params::{ClusteringAlgorithm, RunParameters};
pub use pipeline::{PairReport, Pipeline, PipelineRun};
pub use result_log::ResultLog;
