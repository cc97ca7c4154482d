/// Length of the local shape signature produced for every keypoint.
pub const DESCRIPTOR_LEN: usize = 352;

/// Fixed-length local shape signature.
///
/// Signatures are L2-normalized histograms, so the squared distance between
/// two valid descriptors is bounded. A keypoint whose support was too sparse
/// carries a non-finite descriptor and must be skipped by consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub data: [f32; DESCRIPTOR_LEN],
}

impl Descriptor {
    pub fn new(data: [f32; DESCRIPTOR_LEN]) -> Self {
        Self { data }
    }

    pub fn invalid() -> Self {
        Self {
            data: [f32::NAN; DESCRIPTOR_LEN],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    pub fn squared_distance(&self, other: &Descriptor) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

#[derive(Debug, Clone)]
pub struct Descriptors {
    pub descriptors: Vec<Descriptor>,
}

impl Descriptors {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            descriptors: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, desc: Descriptor) {
        self.descriptors.push(desc);
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Descriptor> {
        self.descriptors.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }
}

impl Default for Descriptors {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Descriptor> for Descriptors {
    fn from_iter<I: IntoIterator<Item = Descriptor>>(iter: I) -> Self {
        Self {
            descriptors: iter.into_iter().collect(),
        }
    }
}
