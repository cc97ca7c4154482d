//! End-to-end batch runs over temporary model and scene directories.
//!
//! Features come from a tagging extractor: every point is a keypoint and its
//! descriptor is a one-hot vector keyed by the point's red channel, so model
//! and scene points with the same tag always match. Clustering then decides
//! purely on geometry.

use cv_core::point_cloud::PointCloud;
use cv_core::{Descriptor, Descriptors, ReferenceFrame, DESCRIPTOR_LEN};
use cv_eval::{
    BatchHarness, CancelToken, ClusteringAlgorithm, EvalError, HarnessConfig, Pipeline,
    ResultLog, RunParameters,
};
use cv_features::{FeatureExtractor, Result as FeatureResult};
use nalgebra::{Point3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

const TAGS: usize = 16;

#[derive(Default)]
struct TagExtractor {
    /// Cancel this token once `extract` has been called this many times.
    cancel_after: Option<(usize, CancelToken)>,
    calls: AtomicUsize,
}

impl FeatureExtractor for TagExtractor {
    fn normals(&self, cloud: &PointCloud) -> FeatureResult<Vec<Vector3<f32>>> {
        Ok(vec![Vector3::z(); cloud.len()])
    }

    fn keypoints(&self, cloud: &PointCloud, _radius: f32) -> FeatureResult<Vec<usize>> {
        Ok((0..cloud.len()).collect())
    }

    fn descriptors(
        &self,
        keypoints: &PointCloud,
        _surface: &PointCloud,
        _normals: &[Vector3<f32>],
        _radius: f32,
    ) -> FeatureResult<Descriptors> {
        let colors = keypoints.colors.as_deref().unwrap_or_default();
        Ok(colors
            .iter()
            .map(|c| {
                let mut data = [0.0f32; DESCRIPTOR_LEN];
                data[(c.x * 255.0).round() as usize % DESCRIPTOR_LEN] = 1.0;
                Descriptor::new(data)
            })
            .collect())
    }

    fn reference_frames(
        &self,
        keypoints: &PointCloud,
        _surface: &PointCloud,
        _normals: &[Vector3<f32>],
        _radius: f32,
    ) -> FeatureResult<Vec<ReferenceFrame>> {
        Ok(vec![ReferenceFrame::default(); keypoints.len()])
    }

    fn extract(
        &self,
        cloud: &PointCloud,
        params: &cv_features::ExtractionParams,
    ) -> FeatureResult<cv_features::KeypointFeatures> {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after {
            if calls >= *limit {
                token.cancel();
            }
        }
        let normals = self.normals(cloud)?;
        let keypoint_indices = self.keypoints(cloud, params.sampling_radius)?;
        let keypoints = cloud.select(&keypoint_indices);
        let descriptors = self.descriptors(&keypoints, cloud, &normals, params.descriptor_radius)?;
        Ok(cv_features::KeypointFeatures {
            keypoints,
            keypoint_indices,
            descriptors,
            frames: None,
        })
    }
}

fn shape(seed: u64) -> Vec<Point3<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..TAGS)
        .map(|_| {
            Point3::new(
                rng.gen_range(-0.1..0.1),
                rng.gen_range(-0.1..0.1),
                rng.gen_range(-0.1..0.1),
            )
        })
        .collect()
}

fn box_shape() -> Vec<Point3<f32>> {
    shape(1)
}

fn cup_shape() -> Vec<Point3<f32>> {
    shape(2)
}

fn moved(points: &[Point3<f32>], angle: f32, offset: Vector3<f32>) -> Vec<Point3<f32>> {
    let rotation = Rotation3::from_euler_angles(angle, 0.3, -angle);
    points.iter().map(|p| rotation * *p + offset).collect()
}

/// Write one cloud made of the given instances, tagging points by position
/// within their instance.
fn write_cloud(path: &Path, instances: &[Vec<Point3<f32>>]) {
    let mut points = Vec::new();
    let mut colors = Vec::new();
    for instance in instances {
        for (i, p) in instance.iter().enumerate() {
            points.push(*p);
            colors.push(Point3::new(i as f32 / 255.0, 0.0, 0.0));
        }
    }
    let cloud = PointCloud::new(points).with_colors(colors).unwrap();
    let mut file = fs::File::create(path).unwrap();
    cv_io::write_pcd(&mut file, &cloud).unwrap();
}

fn params() -> RunParameters {
    RunParameters {
        cg_size: 0.005,
        cg_thresh: 5.0,
        kd_thresh: 0.25,
        algorithm: ClusteringAlgorithm::GeometricConsistency,
        ..RunParameters::object_object()
    }
}

struct Dirs {
    root: tempfile::TempDir,
}

impl Dirs {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("models")).unwrap();
        fs::create_dir(root.path().join("scenes")).unwrap();
        fs::create_dir(root.path().join("out")).unwrap();
        Self { root }
    }

    fn model(&self, name: &str) -> std::path::PathBuf {
        self.root.path().join("models").join(name)
    }

    fn scene(&self, name: &str) -> std::path::PathBuf {
        self.root.path().join("scenes").join(name)
    }

    fn config(&self) -> HarnessConfig {
        HarnessConfig {
            output_dir: self.root.path().join("out"),
            ..HarnessConfig::new(self.root.path().join("models"), self.root.path().join("scenes"))
        }
    }

    fn log(&self) -> String {
        let path = self.root.path().join("out").join(params().result_file_name());
        fs::read_to_string(path).unwrap()
    }
}

fn harness(dirs: &Dirs, extractor: TagExtractor, cancel: CancelToken) -> BatchHarness<TagExtractor> {
    BatchHarness::new(
        Pipeline::with_extractor(params(), extractor),
        dirs.config(),
        cancel,
    )
}

fn two_by_two() -> Dirs {
    let dirs = Dirs::new();
    write_cloud(&dirs.model("box-01.pcd"), &[box_shape()]);
    write_cloud(&dirs.model("cup-01.pcd"), &[cup_shape()]);
    write_cloud(
        &dirs.scene("box-07.pcd"),
        &[
            moved(&box_shape(), 0.4, Vector3::new(0.5, 0.0, 1.0)),
            moved(&box_shape(), -1.2, Vector3::new(-0.5, 0.2, 1.5)),
        ],
    );
    write_cloud(
        &dirs.scene("cup-02.pcd"),
        &[moved(&cup_shape(), 2.0, Vector3::new(0.0, 0.3, 0.8))],
    );
    dirs
}

#[test]
fn two_instances_of_the_right_object_are_a_true_positive() {
    let dirs = Dirs::new();
    write_cloud(&dirs.model("box-01.pcd"), &[box_shape()]);
    write_cloud(
        &dirs.scene("box-07.pcd"),
        &[
            moved(&box_shape(), 0.4, Vector3::new(0.5, 0.0, 1.0)),
            moved(&box_shape(), -1.2, Vector3::new(-0.5, 0.2, 1.5)),
        ],
    );

    let summary = harness(&dirs, TagExtractor::default(), CancelToken::new()).run().unwrap();
    let c = summary.counters;
    assert_eq!(c.total(), 1);
    assert_eq!(c.count(cv_eval::Outcome::TruePositive), 1);
    assert!(!summary.cancelled);

    let log = dirs.log();
    assert!(log.contains("box-07.pcd <<<>>> box-01.pcd : 32 -> 2\n"));
    assert!(log.contains("True positive: 1\tRate:  1\n"));
}

#[test]
fn every_outcome_is_reachable() {
    let dirs = Dirs::new();
    write_cloud(&dirs.model("box-01.pcd"), &[box_shape()]);
    // Labelled as a box but holding a cup: missed.
    write_cloud(&dirs.scene("box-09.pcd"), &[moved(&cup_shape(), 0.1, Vector3::zeros())]);
    // Labelled as a cup but holding a box: false alarm.
    write_cloud(&dirs.scene("cup-05.pcd"), &[moved(&box_shape(), 0.7, Vector3::zeros())]);
    // A cup scene without any box: correctly rejected.
    write_cloud(&dirs.scene("cup-06.pcd"), &[moved(&cup_shape(), 0.9, Vector3::zeros())]);

    let c = harness(&dirs, TagExtractor::default(), CancelToken::new())
        .run()
        .unwrap()
        .counters;
    assert_eq!(c.total(), 3);
    assert_eq!(c.count(cv_eval::Outcome::FalseNegative), 1);
    assert_eq!(c.count(cv_eval::Outcome::FalsePositive), 1);
    assert_eq!(c.count(cv_eval::Outcome::TrueNegative), 1);
    assert!(c.is_consistent());
}

#[test]
fn full_cross_product_is_classified() {
    let dirs = two_by_two();
    let summary = harness(&dirs, TagExtractor::default(), CancelToken::new()).run().unwrap();
    let c = summary.counters;
    assert_eq!(c.total(), 4);
    assert_eq!(c.count(cv_eval::Outcome::TruePositive), 2);
    assert_eq!(c.count(cv_eval::Outcome::TrueNegative), 2);
    assert!(c.is_consistent());

    let log = dirs.log();
    let pair_lines: Vec<&str> = log.lines().filter(|l| l.contains(" <<<>>> ")).collect();
    assert_eq!(
        pair_lines.iter().map(|l| l.split(" : ").next().unwrap()).collect::<Vec<_>>(),
        vec![
            "box-07.pcd <<<>>> box-01.pcd",
            "box-07.pcd <<<>>> cup-01.pcd",
            "cup-02.pcd <<<>>> box-01.pcd",
            "cup-02.pcd <<<>>> cup-01.pcd",
        ]
    );
}

#[test]
fn repeated_runs_are_identical() {
    let dirs = two_by_two();
    let first = harness(&dirs, TagExtractor::default(), CancelToken::new()).run().unwrap();
    let first_log = dirs.log();
    let second = harness(&dirs, TagExtractor::default(), CancelToken::new()).run().unwrap();
    assert_eq!(first.counters, second.counters);
    assert_eq!(first_log, dirs.log());
}

#[test]
fn unreadable_files_are_skipped_not_counted() {
    let dirs = two_by_two();
    fs::write(dirs.scene("broken-01.pcd"), "not a point cloud").unwrap();
    fs::write(dirs.model("cup-99.pcd"), "VERSION 0.7\nFIELDS x y z\n").unwrap();

    let summary = harness(&dirs, TagExtractor::default(), CancelToken::new()).run().unwrap();
    // 3 scenes x 3 models, minus the broken scene row and the broken model column.
    assert_eq!(summary.counters.total(), 4);
    assert_eq!(summary.skipped, 5);
    assert!(dirs.log().contains("Skipped pairs : 5\n"));
}

#[test]
fn interrupt_before_start_still_writes_summary() {
    let dirs = two_by_two();
    let cancel = CancelToken::new();
    cancel.cancel();

    let summary = harness(&dirs, TagExtractor::default(), cancel).run().unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.counters.total(), 0);
    let log = dirs.log();
    assert!(log.contains("Total iterations : 0\n"));
    assert!(log.contains("True positive: 0\tRate:  n/a\n"));
}

#[test]
fn interrupt_mid_pair_abandons_that_pair() {
    let dirs = two_by_two();
    let cancel = CancelToken::new();
    // Calls 1 and 2 extract the first pair; call 3 is the second pair's model.
    let extractor = TagExtractor {
        cancel_after: Some((3, cancel.clone())),
        ..TagExtractor::default()
    };

    let summary = harness(&dirs, extractor, cancel).run().unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.counters.total(), 1);
    assert!(summary.counters.is_consistent());

    let log = dirs.log();
    assert_eq!(log.lines().filter(|l| l.contains(" <<<>>> ")).count(), 1);
    assert!(log.contains("Total iterations : 1\n"));
}

#[test]
fn missing_directory_is_fatal_and_writes_nothing() {
    let dirs = Dirs::new();
    let config = HarnessConfig {
        output_dir: dirs.root.path().join("out"),
        ..HarnessConfig::new(dirs.root.path().join("nope"), dirs.root.path().join("scenes"))
    };
    let result = BatchHarness::new(
        Pipeline::with_extractor(params(), TagExtractor::default()),
        config,
        CancelToken::new(),
    )
    .run();
    assert!(matches!(result, Err(EvalError::MissingDirectory(_))));
    assert_eq!(fs::read_dir(dirs.root.path().join("out")).unwrap().count(), 0);
}

/// Shared in-memory log whose first pair line fails to write.
#[derive(Clone, Default)]
struct FailingPairLine {
    written: Rc<RefCell<Vec<u8>>>,
    failed: Rc<RefCell<bool>>,
}

impl Write for FailingPairLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !*self.failed.borrow() && buf.windows(6).any(|w| w == b"<<<>>>") {
            *self.failed.borrow_mut() = true;
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.written.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn log_write_failure_stops_the_batch_but_writes_summary() {
    let dirs = two_by_two();
    let sink = FailingPairLine::default();
    let log = ResultLog::from_writer(sink.clone(), &params()).unwrap();

    let result = harness(&dirs, TagExtractor::default(), CancelToken::new())
        .run_with_log(log, dirs.root.path().join("memory.txt"));
    assert!(matches!(result, Err(EvalError::Io(_))));

    let text = String::from_utf8(sink.written.borrow().clone()).unwrap();
    assert!(text.starts_with("Parameters: \n"));
    assert_eq!(text.lines().filter(|l| l.contains(" : ") && l.contains(".pcd")).count(), 0);
    assert!(text.contains("Total iterations : 1\n"));
    assert!(text.contains("Skipped pairs : 0\n"));
}
