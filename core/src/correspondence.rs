/// A model keypoint paired with a scene keypoint by descriptor similarity.
///
/// `distance` is the squared descriptor distance of the pairing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub model_idx: usize,
    pub scene_idx: usize,
    pub distance: f32,
}

impl Correspondence {
    pub fn new(model_idx: usize, scene_idx: usize, distance: f32) -> Self {
        Self {
            model_idx,
            scene_idx,
            distance,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    pub correspondences: Vec<Correspondence>,
}

impl Correspondences {
    pub fn new() -> Self {
        Self {
            correspondences: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            correspondences: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, c: Correspondence) {
        self.correspondences.push(c);
    }

    pub fn len(&self) -> usize {
        self.correspondences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correspondences.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Correspondence> {
        self.correspondences.get(idx)
    }

    pub fn as_slice(&self) -> &[Correspondence] {
        &self.correspondences
    }

    pub fn iter(&self) -> impl Iterator<Item = &Correspondence> {
        self.correspondences.iter()
    }

    pub fn filter_by_distance(&mut self, max_distance: f32) {
        self.correspondences.retain(|c| c.distance < max_distance);
    }

    /// Indices into this set ordered by ascending descriptor distance.
    /// Ties keep their original order.
    pub fn order_by_distance(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.correspondences.len()).collect();
        order.sort_by(|&a, &b| {
            self.correspondences[a]
                .distance
                .total_cmp(&self.correspondences[b].distance)
        });
        order
    }
}

impl FromIterator<Correspondence> for Correspondences {
    fn from_iter<I: IntoIterator<Item = Correspondence>>(iter: I) -> Self {
        Self {
            correspondences: iter.into_iter().collect(),
        }
    }
}
