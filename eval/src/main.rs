//! correspondence_grouping: recognise every model in every scene and tally
//! the detections against file-name labels.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use cv_eval::{
    BatchHarness, CancelToken, ClusteringAlgorithm, EvalError, HarnessConfig, Pipeline,
    RunParameters,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE_EXIT: u8 = 255;
const MISSING_DIRECTORY_EXIT: u8 = 2;
const FAILURE_EXIT: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    ObjectObject,
    ObjectScene,
}

#[derive(Parser, Debug)]
#[command(name = "correspondence_grouping")]
#[command(about = "Recognise models in scenes by correspondence grouping and report a confusion matrix")]
struct Cli {
    /// Directory searched recursively for model .pcd files.
    model_dir: PathBuf,

    /// Directory searched recursively for scene .pcd files.
    scene_dir: PathBuf,

    /// Report keypoint counts for every pair.
    #[arg(short = 'k')]
    show_keypoints: bool,

    /// Report the pose of every detected instance.
    #[arg(short = 'c')]
    show_correspondences: bool,

    /// Scale radii and cluster size by the model resolution.
    #[arg(short = 'r')]
    use_resolution: bool,

    /// Clustering algorithm: Hough or GC.
    #[arg(long, default_value = "Hough")]
    algorithm: String,

    /// Base parameter set; the options below override single values.
    #[arg(long, value_enum, default_value_t = Preset::ObjectObject)]
    preset: Preset,

    /// Model uniform sampling radius.
    #[arg(long = "model_ss")]
    model_ss: Option<f32>,

    /// Scene uniform sampling radius.
    #[arg(long = "scene_ss")]
    scene_ss: Option<f32>,

    /// Reference frame radius.
    #[arg(long = "rf_rad")]
    rf_rad: Option<f32>,

    /// Descriptor radius.
    #[arg(long = "descr_rad")]
    descr_rad: Option<f32>,

    /// Cluster size.
    #[arg(long = "cg_size")]
    cg_size: Option<f32>,

    /// Clustering threshold.
    #[arg(long = "cg_thresh")]
    cg_thresh: Option<f32>,

    /// Squared descriptor distance below which a match is kept.
    #[arg(long = "kd_thresh")]
    kd_thresh: Option<f32>,

    /// Directory receiving the result log.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Character ending the object label in file names.
    #[arg(long, default_value_t = '-')]
    label_delimiter: char,

    /// Worker threads for feature extraction (else CVREC_CPU_THREADS).
    #[arg(long)]
    threads: Option<usize>,
}

impl Cli {
    fn run_parameters(&self, algorithm: ClusteringAlgorithm) -> RunParameters {
        let base = match self.preset {
            Preset::ObjectObject => RunParameters::object_object(),
            Preset::ObjectScene => RunParameters::object_scene(),
        };
        RunParameters {
            model_ss: self.model_ss.unwrap_or(base.model_ss),
            scene_ss: self.scene_ss.unwrap_or(base.scene_ss),
            rf_rad: self.rf_rad.unwrap_or(base.rf_rad),
            descr_rad: self.descr_rad.unwrap_or(base.descr_rad),
            cg_size: self.cg_size.unwrap_or(base.cg_size),
            cg_thresh: self.cg_thresh.unwrap_or(base.cg_thresh),
            kd_thresh: self.kd_thresh.unwrap_or(base.kd_thresh),
            use_resolution: self.use_resolution,
            algorithm,
        }
    }
}

fn write_usage<W: Write>(out: &mut W) -> io::Result<()> {
    Cli::command().write_help(out)?;
    writeln!(out)
}

fn print_usage() {
    if let Err(err) = write_usage(&mut io::stdout().lock()) {
        tracing::error!("failed to print usage: {err}");
    }
}

fn print_clap_error(err: &clap::Error) {
    if let Err(io_err) = err.print() {
        tracing::error!("failed to print usage: {io_err}");
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    print_clap_error(&err);
                    ExitCode::SUCCESS
                }
                _ => {
                    print_clap_error(&err);
                    ExitCode::from(USAGE_EXIT)
                }
            };
        }
    };

    let algorithm = match cli.algorithm.parse::<ClusteringAlgorithm>() {
        Ok(algorithm) => algorithm,
        Err(err) => {
            println!("{err}");
            print_usage();
            return ExitCode::from(USAGE_EXIT);
        }
    };

    if let Err(err) = cv_core::init_global_thread_pool(cli.threads) {
        tracing::error!("thread pool: {err}");
        return ExitCode::from(FAILURE_EXIT);
    }

    let params = cli.run_parameters(algorithm);
    for line in params.describe() {
        tracing::info!("{line}");
    }
    tracing::info!(threads = cv_core::current_cpu_threads(), "worker threads");

    let cancel = CancelToken::new();
    if let Err(err) = cancel.install_interrupt_handler() {
        tracing::error!("{err}");
        return ExitCode::from(FAILURE_EXIT);
    }

    let config = HarnessConfig {
        output_dir: cli.output_dir.clone(),
        label_delimiter: cli.label_delimiter,
        show_keypoints: cli.show_keypoints,
        show_correspondences: cli.show_correspondences,
        ..HarnessConfig::new(&cli.model_dir, &cli.scene_dir)
    };

    match BatchHarness::new(Pipeline::new(params), config, cancel).run() {
        Ok(summary) => {
            if summary.cancelled {
                tracing::warn!("interrupted; partial results in {}", summary.log_path.display());
            }
            ExitCode::SUCCESS
        }
        Err(err @ EvalError::MissingDirectory(_)) => {
            tracing::error!("{err}");
            ExitCode::from(MISSING_DIRECTORY_EXIT)
        }
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::from(FAILURE_EXIT)
        }
    }
}
