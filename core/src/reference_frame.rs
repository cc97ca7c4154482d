use nalgebra::{Matrix3, Vector3};

/// Orthonormal basis anchored at a keypoint.
///
/// Rows of `axes` are the frame's x, y and z axes expressed in cloud
/// coordinates, so `axes * v` maps a cloud-frame vector into the local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    pub axes: Matrix3<f32>,
}

impl ReferenceFrame {
    pub fn from_axes(x: &Vector3<f32>, y: &Vector3<f32>, z: &Vector3<f32>) -> Self {
        Self {
            axes: Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]),
        }
    }

    /// Frame marking a keypoint whose support could not produce a basis.
    pub fn invalid() -> Self {
        Self {
            axes: Matrix3::from_element(f32::NAN),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.axes.iter().all(|v| v.is_finite())
    }

    pub fn x_axis(&self) -> Vector3<f32> {
        self.axes.row(0).transpose()
    }

    pub fn y_axis(&self) -> Vector3<f32> {
        self.axes.row(1).transpose()
    }

    pub fn z_axis(&self) -> Vector3<f32> {
        self.axes.row(2).transpose()
    }

    pub fn to_local(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.axes * v
    }

    pub fn to_global(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.axes.transpose() * v
    }
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self {
            axes: Matrix3::identity(),
        }
    }
}
