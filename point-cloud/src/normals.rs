//! Normal estimation using PCA on k-nearest neighbourhoods.

use crate::search::PointIndex;
use cv_core::point_cloud::{is_finite_point, PointCloud};
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy)]
pub struct NormalEstimation {
    /// Neighbourhood size, the query point included.
    pub k: usize,
    /// Normals are flipped to face this point.
    pub viewpoint: Point3<f32>,
}

impl Default for NormalEstimation {
    fn default() -> Self {
        Self {
            k: 10,
            viewpoint: Point3::origin(),
        }
    }
}

impl NormalEstimation {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn with_viewpoint(mut self, viewpoint: Point3<f32>) -> Self {
        self.viewpoint = viewpoint;
        self
    }

    /// One normal per point of `cloud`, index aligned. Points that are not
    /// finite or have fewer than three neighbours get a NaN normal.
    pub fn compute(&self, cloud: &PointCloud) -> Vec<Vector3<f32>> {
        let index = PointIndex::new(&cloud.points);
        let points = &cloud.points;

        points
            .par_iter()
            .map(|p| {
                if !is_finite_point(p) {
                    return nan_normal();
                }
                let neighbors = index.nearest_k(p, self.k);
                if neighbors.len() < 3 {
                    return nan_normal();
                }

                let mut centroid = Vector3::zeros();
                for &(j, _) in &neighbors {
                    centroid += points[j].coords;
                }
                centroid /= neighbors.len() as f32;

                let mut cov = Matrix3::zeros();
                for &(j, _) in &neighbors {
                    let d = points[j].coords - centroid;
                    cov += d * d.transpose();
                }
                cov /= neighbors.len() as f32;

                let eigen = SymmetricEigen::new(cov);
                let mut min_idx = 0;
                for i in 1..3 {
                    if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
                        min_idx = i;
                    }
                }
                let mut normal: Vector3<f32> = eigen.eigenvectors.column(min_idx).into_owned();

                if normal.dot(&(self.viewpoint - p)) < 0.0 {
                    normal = -normal;
                }
                normal
            })
            .collect()
    }
}

/// Normals from the `k` nearest neighbours, oriented toward the origin.
pub fn estimate_normals(cloud: &PointCloud, k: usize) -> Vec<Vector3<f32>> {
    NormalEstimation::new(k).compute(cloud)
}

fn nan_normal() -> Vector3<f32> {
    Vector3::from_element(f32::NAN)
}
