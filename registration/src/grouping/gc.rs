use super::GcParams;
use cv_core::{Correspondence, Correspondences};
use cv_core::point_cloud::PointCloud;

/// Greedy consensus sets, seeded in order of increasing descriptor distance.
///
/// A candidate joins the growing set only if, against every current member,
/// its model-side and scene-side distances differ by at most
/// `consensus_size`. Members of an accepted set are not reused.
pub(super) fn cluster(
    params: &GcParams,
    model: &PointCloud,
    scene: &PointCloud,
    correspondences: &Correspondences,
) -> Vec<Vec<Correspondence>> {
    let corrs = correspondences.as_slice();
    let order = correspondences.order_by_distance();
    let mut taken = vec![false; corrs.len()];
    let mut clusters = Vec::new();

    for &seed in &order {
        if taken[seed] {
            continue;
        }
        let mut members = vec![seed];

        for &candidate in &order {
            if candidate == seed || taken[candidate] {
                continue;
            }
            let c = &corrs[candidate];
            let consistent = members.iter().all(|&k| {
                let m = &corrs[k];
                let model_dist = (model.points[m.model_idx] - model.points[c.model_idx]).norm();
                let scene_dist = (scene.points[m.scene_idx] - scene.points[c.scene_idx]).norm();
                (model_dist - scene_dist).abs() <= params.consensus_size
            });
            if consistent {
                members.push(candidate);
            }
        }

        if members.len() as f32 >= params.threshold {
            for &k in &members {
                taken[k] = true;
            }
            clusters.push(members.into_iter().map(|k| corrs[k]).collect());
        }
    }

    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn line(xs: &[f32]) -> PointCloud {
        PointCloud::new(xs.iter().map(|&x| Point3::new(x, 0.0, 0.0)).collect())
    }

    #[test]
    fn inconsistent_pair_is_left_out() {
        let model = line(&[0.0, 1.0, 2.0, 3.0]);
        // Scene keypoint 3 sits where model keypoint 3 cannot map rigidly.
        let scene = line(&[10.0, 11.0, 12.0, 20.0]);
        let corrs: Correspondences = (0..4).map(|i| Correspondence::new(i, i, 0.1)).collect();

        let clusters = cluster(&GcParams::new(0.05, 3.0), &model, &scene, &corrs);
        assert_eq!(clusters.len(), 1);
        let scene_ids: Vec<usize> = clusters[0].iter().map(|c| c.scene_idx).collect();
        assert_eq!(scene_ids, vec![0, 1, 2]);
    }

    #[test]
    fn seeds_follow_descriptor_distance() {
        let model = line(&[0.0, 1.0, 2.0]);
        let scene = line(&[0.0, 1.0, 2.0]);
        let corrs: Correspondences = [
            Correspondence::new(0, 0, 0.3),
            Correspondence::new(1, 1, 0.1),
            Correspondence::new(2, 2, 0.2),
        ]
        .into_iter()
        .collect();

        let clusters = cluster(&GcParams::new(0.01, 3.0), &model, &scene, &corrs);
        assert_eq!(clusters.len(), 1);
        let order: Vec<usize> = clusters[0].iter().map(|c| c.model_idx).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let model = line(&[0.0, 1.0]);
        let corrs: Correspondences = (0..2).map(|i| Correspondence::new(i, i, 0.1)).collect();
        assert_eq!(cluster(&GcParams::new(0.01, 2.0), &model, &model, &corrs).len(), 1);
        assert!(cluster(&GcParams::new(0.01, 3.0), &model, &model, &corrs).is_empty());
    }
}
