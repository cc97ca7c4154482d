//! The preprocessing stages chained the way feature extraction uses them.

use cv_core::point_cloud::PointCloud;
use cv_point_cloud::{compute_cloud_resolution, estimate_normals, uniform_sample, PointIndex};
use nalgebra::Point3;

fn plane(n: usize, spacing: f32) -> PointCloud {
    let mut points = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            points.push(Point3::new(i as f32 * spacing, j as f32 * spacing, 1.0));
        }
    }
    PointCloud::new(points)
}

#[test]
fn resolution_of_a_regular_grid_is_its_spacing() {
    let cloud = plane(20, 0.01);
    let resolution = compute_cloud_resolution(&cloud);
    assert!((resolution - 0.01).abs() < 1e-5, "resolution {resolution}");
}

#[test]
fn normals_of_a_plane_face_the_origin() {
    let cloud = plane(10, 0.01);
    let normals = estimate_normals(&cloud, 8);
    assert_eq!(normals.len(), cloud.len());
    for n in &normals {
        assert!(n.z < -0.999, "normal {n:?}");
    }
}

#[test]
fn sampled_keypoints_cover_the_cloud() {
    let cloud = plane(30, 0.005);
    let radius = 0.03;
    let keypoints = uniform_sample(&cloud, radius);

    assert!(!keypoints.is_empty());
    assert!(keypoints.len() < cloud.len());
    assert!(keypoints.windows(2).all(|w| w[0] != w[1]));

    let index = PointIndex::new(&cloud.select(&keypoints).points);
    let reach = radius * 3f32.sqrt();
    for p in &cloud.points {
        let (_, d2) = index.nearest_k(p, 1)[0];
        assert!(d2.sqrt() <= reach, "point {p:?} is {d2} from every keypoint");
    }
}

#[test]
fn non_finite_points_are_ignored_throughout() {
    let mut cloud = plane(10, 0.01);
    cloud.points[5] = Point3::new(f32::NAN, 0.0, 1.0);

    let keypoints = uniform_sample(&cloud, 0.0);
    assert_eq!(keypoints.len(), cloud.len() - 1);
    assert!(!keypoints.contains(&5));

    let normals = estimate_normals(&cloud, 8);
    assert!(normals[5].x.is_nan());
    assert!(normals[6].iter().all(|v| v.is_finite()));
}
