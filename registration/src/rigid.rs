//! Least-squares rigid alignment of paired points.

use cv_core::RigidTransform;
use nalgebra::{Matrix3, Point3, Vector3};

/// Pairs needed to pin down a rigid motion.
pub const MIN_PAIRS: usize = 3;

/// Rotation and translation minimising `Σ ‖R·source_i + t − target_i‖²`.
///
/// Returns `None` for fewer than [`MIN_PAIRS`] pairs, mismatched lengths or a
/// decomposition that does not produce a finite transform.
pub fn estimate_rigid_transform(
    source: &[Point3<f32>],
    target: &[Point3<f32>],
) -> Option<RigidTransform> {
    if source.len() != target.len() || source.len() < MIN_PAIRS {
        return None;
    }

    let n = source.len() as f32;
    let source_centroid: Vector3<f32> = source.iter().map(|p| p.coords).sum::<Vector3<f32>>() / n;
    let target_centroid: Vector3<f32> = target.iter().map(|p| p.coords).sum::<Vector3<f32>>() / n;

    let mut covariance = Matrix3::<f32>::zeros();
    for (s, t) in source.iter().zip(target) {
        let src = s.coords - source_centroid;
        let tgt = t.coords - target_centroid;
        covariance += tgt * src.transpose();
    }

    let svd = covariance.svd(true, true);
    let u = svd.u?;
    let vt = svd.v_t?;

    let mut rotation = u * vt;
    if rotation.determinant() < 0.0 {
        let mut u_corrected = u;
        u_corrected.set_column(2, &(u.column(2) * -1.0));
        rotation = u_corrected * vt;
    }

    let translation = target_centroid - rotation * source_centroid;
    let transform = RigidTransform::new(rotation, translation);
    transform.is_finite().then_some(transform)
}

/// Pure translation between the two centroids.
///
/// Used for clusters too small or too degenerate for
/// [`estimate_rigid_transform`]. Returns `None` for empty or mismatched input.
pub fn estimate_translation(
    source: &[Point3<f32>],
    target: &[Point3<f32>],
) -> Option<RigidTransform> {
    if source.is_empty() || source.len() != target.len() {
        return None;
    }
    let n = source.len() as f32;
    let source_centroid: Vector3<f32> = source.iter().map(|p| p.coords).sum::<Vector3<f32>>() / n;
    let target_centroid: Vector3<f32> = target.iter().map(|p| p.coords).sum::<Vector3<f32>>() / n;
    let transform = RigidTransform::new(Matrix3::identity(), target_centroid - source_centroid);
    transform.is_finite().then_some(transform)
}

/// Root mean square of `‖T·source_i − target_i‖`.
pub fn alignment_rmse(
    transform: &RigidTransform,
    source: &[Point3<f32>],
    target: &[Point3<f32>],
) -> f32 {
    if source.is_empty() {
        return 0.0;
    }
    let sum: f32 = source
        .iter()
        .zip(target)
        .map(|(s, t)| (transform.transform_point(s) - t).norm_squared())
        .sum();
    (sum / source.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn recovers_known_motion() {
        let mut rng = StdRng::seed_from_u64(21);
        let rotation = Rotation3::from_euler_angles(0.3, -1.1, 2.0).into_inner();
        let translation = Vector3::new(0.4, -0.2, 1.5);
        let source: Vec<Point3<f32>> = (0..25)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-0.1..0.1),
                    rng.gen_range(-0.1..0.1),
                    rng.gen_range(-0.1..0.1),
                )
            })
            .collect();
        let target: Vec<Point3<f32>> = source
            .iter()
            .map(|p| Point3::from(rotation * p.coords + translation))
            .collect();

        let t = estimate_rigid_transform(&source, &target).unwrap();
        assert_relative_eq!(t.rotation, rotation, epsilon = 1e-4);
        assert_relative_eq!(t.translation, translation, epsilon = 1e-4);
        assert!(alignment_rmse(&t, &source, &target) < 1e-4);
        assert_relative_eq!(t.rotation.determinant(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn reflection_is_not_returned() {
        let source = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
        ];
        let target: Vec<Point3<f32>> = source.iter().map(|p| Point3::new(-p.x, p.y, p.z)).collect();
        let t = estimate_rigid_transform(&source, &target).unwrap();
        assert!(t.rotation.determinant() > 0.0);
    }

    #[test]
    fn too_few_pairs() {
        let pts = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(estimate_rigid_transform(&pts, &pts).is_none());
        assert!(estimate_rigid_transform(&pts, &pts[..1]).is_none());
    }

    #[test]
    fn translation_between_centroids() {
        let source = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let target = vec![Point3::new(0.5, 2.0, 1.0), Point3::new(1.5, 2.0, 1.0)];
        let t = estimate_translation(&source, &target).unwrap();
        assert_eq!(t.rotation, Matrix3::identity());
        assert_relative_eq!(t.translation, Vector3::new(0.5, 2.0, 1.0), epsilon = 1e-6);
        assert!(estimate_translation(&[], &[]).is_none());
    }
}
