//! Exact kd-tree over fixed-length descriptors.
//!
//! Each split is made on the dimension with the largest spread, at the median
//! value. Search descends the closer side first and visits the other side
//! only when the splitting plane is nearer than the best match so far, so the
//! result is the true nearest neighbour under squared Euclidean distance.

use cv_core::{Descriptor, Descriptors, DESCRIPTOR_LEN};

const LEAF_SIZE: usize = 16;

enum KdTreeNode {
    Leaf(Vec<usize>),
    Internal {
        dimension: usize,
        threshold: f32,
        left: Box<KdTreeNode>,
        right: Box<KdTreeNode>,
    },
}

/// Nearest-neighbour index over the finite entries of a descriptor set.
///
/// Non-finite descriptors are left out of the tree and can never be returned.
/// Indices reported by [`DescriptorIndex::nearest`] refer to positions in the built set.
pub struct DescriptorIndex {
    root: Option<KdTreeNode>,
    points: Vec<[f32; DESCRIPTOR_LEN]>,
    indexed: usize,
}

impl DescriptorIndex {
    pub fn build(descriptors: &Descriptors) -> Self {
        let points: Vec<[f32; DESCRIPTOR_LEN]> =
            descriptors.iter().map(|d| d.data).collect();
        let indices: Vec<usize> = descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_finite())
            .map(|(i, _)| i)
            .collect();
        let indexed = indices.len();
        let root = (!indices.is_empty()).then(|| build_recursive(&points, indices));

        Self {
            root,
            points,
            indexed,
        }
    }

    /// Number of descriptors that can be returned by a query.
    pub fn len(&self) -> usize {
        self.indexed
    }

    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }

    /// Closest indexed descriptor and its squared distance to `query`.
    /// Returns `None` for an empty index or a non-finite query.
    pub fn nearest(&self, query: &Descriptor) -> Option<(usize, f32)> {
        if !query.is_finite() {
            return None;
        }
        let root = self.root.as_ref()?;
        let mut best: Option<(usize, f32)> = None;
        self.search(root, &query.data, &mut best);
        best
    }

    fn search(
        &self,
        node: &KdTreeNode,
        query: &[f32; DESCRIPTOR_LEN],
        best: &mut Option<(usize, f32)>,
    ) {
        match node {
            KdTreeNode::Leaf(indices) => {
                for &idx in indices {
                    let dist = squared_distance(query, &self.points[idx]);
                    // Ties keep the lower index so results do not depend on tree shape.
                    let better = match *best {
                        None => true,
                        Some((bi, bd)) => dist < bd || (dist == bd && idx < bi),
                    };
                    if better {
                        *best = Some((idx, dist));
                    }
                }
            }
            KdTreeNode::Internal {
                dimension,
                threshold,
                left,
                right,
            } => {
                let diff = query[*dimension] - *threshold;
                let (first, second) = if diff < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };

                self.search(first, query, best);

                let bound = best.map_or(f32::INFINITY, |(_, d)| d);
                if diff * diff <= bound {
                    self.search(second, query, best);
                }
            }
        }
    }
}

fn build_recursive(points: &[[f32; DESCRIPTOR_LEN]], indices: Vec<usize>) -> KdTreeNode {
    if indices.len() <= LEAF_SIZE {
        return KdTreeNode::Leaf(indices);
    }

    let mut dimension = 0;
    let mut spread = 0.0f32;
    let mut bounds = (0.0f32, 0.0f32);
    for dim in 0..DESCRIPTOR_LEN {
        let (lo, hi) = indices.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &i| {
            let v = points[i][dim];
            (lo.min(v), hi.max(v))
        });
        if hi - lo > spread {
            spread = hi - lo;
            dimension = dim;
            bounds = (lo, hi);
        }
    }
    if spread <= 0.0 {
        return KdTreeNode::Leaf(indices);
    }

    let mut values: Vec<f32> = indices.iter().map(|&i| points[i][dimension]).collect();
    values.sort_by(f32::total_cmp);
    let mut threshold = values[values.len() / 2];

    let (mut left, mut right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| points[i][dimension] < threshold);

    // Heavy duplication at the median leaves one side empty; split at the
    // middle of the range instead, which always separates lo from hi.
    if left.is_empty() || right.is_empty() {
        threshold = 0.5 * (bounds.0 + bounds.1);
        (left, right) = indices
            .iter()
            .partition(|&&i| points[i][dimension] < threshold);
        if left.is_empty() || right.is_empty() {
            return KdTreeNode::Leaf(indices);
        }
    }

    KdTreeNode::Internal {
        dimension,
        threshold,
        left: Box::new(build_recursive(points, left)),
        right: Box::new(build_recursive(points, right)),
    }
}

fn squared_distance(a: &[f32; DESCRIPTOR_LEN], b: &[f32; DESCRIPTOR_LEN]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_descriptors(rng: &mut StdRng, n: usize) -> Descriptors {
        (0..n)
            .map(|_| {
                let mut data = [0.0f32; DESCRIPTOR_LEN];
                for v in data.iter_mut() {
                    *v = rng.gen_range(0.0..1.0);
                }
                Descriptor::new(data)
            })
            .collect()
    }

    fn brute_force(set: &Descriptors, query: &Descriptor) -> Option<(usize, f32)> {
        set.iter()
            .enumerate()
            .filter(|(_, d)| d.is_finite())
            .map(|(i, d)| (i, d.squared_distance(query)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }

    #[test]
    fn matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let train = random_descriptors(&mut rng, 300);
        let queries = random_descriptors(&mut rng, 40);
        let index = DescriptorIndex::build(&train);
        assert_eq!(index.len(), 300);

        for q in queries.iter() {
            let (i, d) = index.nearest(q).unwrap();
            let (bi, bd) = brute_force(&train, q).unwrap();
            assert_eq!(i, bi);
            assert!((d - bd).abs() <= 1e-4 * bd.max(1.0));
        }
    }

    #[test]
    fn exact_member_is_found() {
        let mut rng = StdRng::seed_from_u64(3);
        let train = random_descriptors(&mut rng, 100);
        let index = DescriptorIndex::build(&train);
        let (i, d) = index.nearest(&train.descriptors[57]).unwrap();
        assert_eq!(i, 57);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn non_finite_entries_are_skipped() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut train = random_descriptors(&mut rng, 20);
        let query = train.descriptors[4].clone();
        train.descriptors[4] = Descriptor::invalid();

        let index = DescriptorIndex::build(&train);
        assert_eq!(index.len(), 19);
        let (i, _) = index.nearest(&query).unwrap();
        assert_ne!(i, 4);
        assert!(index.nearest(&Descriptor::invalid()).is_none());
    }

    #[test]
    fn duplicates_and_empty_sets() {
        let same: Descriptors = (0..50).map(|_| Descriptor::new([0.25; DESCRIPTOR_LEN])).collect();
        let index = DescriptorIndex::build(&same);
        assert_eq!(index.nearest(&same.descriptors[0]), Some((0, 0.0)));

        let empty = DescriptorIndex::build(&Descriptors::new());
        assert!(empty.is_empty());
        assert!(empty.nearest(&same.descriptors[0]).is_none());
    }
}
