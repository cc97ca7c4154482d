//! Point cloud operations used ahead of descriptor extraction.
//!
//! - `search`: R-tree backed k-nearest and radius queries
//! - `resolution`: mean nearest-neighbour spacing of a cloud
//! - `normals`: PCA normal estimation over k-nearest neighbourhoods
//! - `sampling`: uniform (voxel) keypoint selection

pub mod normals;
pub mod resolution;
pub mod sampling;
pub mod search;

pub use normals::{estimate_normals, NormalEstimation};
pub use resolution::compute_cloud_resolution;
pub use sampling::uniform_sample;
pub use search::PointIndex;
