use nalgebra::{Point3, Scalar, Vector3};

#[derive(Debug, Clone, Default)]
pub struct PointCloud<T: Scalar = f32> {
    pub points: Vec<Point3<T>>,
    pub colors: Option<Vec<Point3<T>>>,
    pub normals: Option<Vec<Vector3<T>>>,
}

impl<T: Scalar> PointCloud<T> {
    pub fn new(points: Vec<Point3<T>>) -> Self {
        Self {
            points,
            colors: None,
            normals: None,
        }
    }

    pub fn with_colors(mut self, colors: Vec<Point3<T>>) -> crate::Result<Self> {
        if colors.len() == self.points.len() {
            self.colors = Some(colors);
            Ok(self)
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Color count {} does not match point count {}",
                colors.len(),
                self.points.len()
            )))
        }
    }

    pub fn with_normals(mut self, normals: Vec<Vector3<T>>) -> crate::Result<Self> {
        if normals.len() == self.points.len() {
            self.normals = Some(normals);
            Ok(self)
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Normal count {} does not match point count {}",
                normals.len(),
                self.points.len()
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Copy the points at `indices`, together with their colors and normals,
    /// into a new cloud. Out-of-range indices are ignored.
    pub fn select(&self, indices: &[usize]) -> Self {
        let valid: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.points.len())
            .collect();

        let points = valid.iter().map(|&i| self.points[i].clone()).collect();
        let colors = self
            .colors
            .as_ref()
            .map(|c| valid.iter().map(|&i| c[i].clone()).collect());
        let normals = self
            .normals
            .as_ref()
            .map(|n| valid.iter().map(|&i| n[i].clone()).collect());

        Self {
            points,
            colors,
            normals,
        }
    }
}

impl PointCloud<f32> {
    /// Indices of points whose three coordinates are finite.
    pub fn finite_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| is_finite_point(p))
            .map(|(i, _)| i)
    }

    /// Mean of the finite points, `None` when there are none.
    pub fn centroid(&self) -> Option<Point3<f32>> {
        let mut sum = Vector3::zeros();
        let mut count = 0usize;
        for p in self.points.iter().filter(|p| is_finite_point(p)) {
            sum += p.coords;
            count += 1;
        }
        (count > 0).then(|| Point3::from(sum / count as f32))
    }
}

pub fn is_finite_point(p: &Point3<f32>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}

pub type PointCloudf32 = PointCloud<f32>;
pub type PointCloudf64 = PointCloud<f64>;
