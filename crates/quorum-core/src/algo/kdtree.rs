//! Static k-d tree over the reference set.
//!
//! Built once from an immutable point set and shared by the density and
//! clustering detectors. Nodes split on the dimension of largest spread at the
//! median; buckets of up to `LEAF_SIZE` points are scanned linearly.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

const LEAF_SIZE: usize = 16;

/// A point returned by a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index into the point set the tree was built from
    pub index: usize,
    pub distance: f64,
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.index.cmp(&other.index))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
enum KdNode {
    Leaf {
        indices: Vec<usize>,
    },
    Split {
        dim: usize,
        value: f64,
        left: Box<KdNode>,
        right: Box<KdNode>,
    },
}

#[derive(Debug)]
pub struct KdTree {
    points: Vec<Vec<f64>>,
    root: KdNode,
}

pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl KdTree {
    /// Build a tree over `points`. All points must share one dimensionality.
    pub fn build(points: Vec<Vec<f64>>) -> Self {
        let indices: Vec<usize> = (0..points.len()).collect();
        let root = Self::build_node(&points, indices);
        Self { points, root }
    }

    fn build_node(points: &[Vec<f64>], mut indices: Vec<usize>) -> KdNode {
        if indices.len() <= LEAF_SIZE {
            return KdNode::Leaf { indices };
        }

        let dims = points[indices[0]].len();
        let mut best_dim = 0;
        let mut best_spread = 0.0;
        for dim in 0..dims {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(points[i][dim]), hi.max(points[i][dim]))
            });
            if hi - lo > best_spread {
                best_spread = hi - lo;
                best_dim = dim;
            }
        }
        // All points identical: nothing to split on.
        if best_spread <= 0.0 {
            return KdNode::Leaf { indices };
        }

        indices.sort_by(|&a, &b| points[a][best_dim].total_cmp(&points[b][best_dim]));
        let mid = indices.len() / 2;
        let value = points[indices[mid]][best_dim];
        let right = indices.split_off(mid);

        KdNode::Split {
            dim: best_dim,
            value,
            left: Box::new(Self::build_node(points, indices)),
            right: Box::new(Self::build_node(points, right)),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> &[f64] {
        &self.points[index]
    }

    /// Points in the order the tree was built from.
    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    /// The `k` nearest points to `query`, closest first (ties by index).
    /// `exclude` skips one point, used to query a reference point against the
    /// rest of the set.
    pub fn nearest(&self, query: &[f64], k: usize, exclude: Option<usize>) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search_nearest(&self.root, query, k, exclude, &mut heap);
        heap.into_sorted_vec()
    }

    fn search_nearest(
        &self,
        node: &KdNode,
        query: &[f64],
        k: usize,
        exclude: Option<usize>,
        heap: &mut BinaryHeap<Neighbor>,
    ) {
        match node {
            KdNode::Leaf { indices } => {
                for &index in indices {
                    if Some(index) == exclude {
                        continue;
                    }
                    let candidate = Neighbor {
                        index,
                        distance: euclidean(query, &self.points[index]),
                    };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            KdNode::Split {
                dim,
                value,
                left,
                right,
            } => {
                let diff = query[*dim] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search_nearest(near, query, k, exclude, heap);

                let worst = heap.peek().map_or(f64::INFINITY, |n| n.distance);
                if heap.len() < k || diff.abs() <= worst {
                    self.search_nearest(far, query, k, exclude, heap);
                }
            }
        }
    }

    /// Number of points within `radius` (inclusive) of `query`.
    pub fn count_within(&self, query: &[f64], radius: f64) -> usize {
        let mut count = 0;
        self.search_radius(&self.root, query, radius, &mut count);
        count
    }

    fn search_radius(&self, node: &KdNode, query: &[f64], radius: f64, count: &mut usize) {
        match node {
            KdNode::Leaf { indices } => {
                let r2 = radius * radius;
                *count += indices
                    .iter()
                    .filter(|&&i| squared_euclidean(query, &self.points[i]) <= r2)
                    .count();
            }
            KdNode::Split {
                dim,
                value,
                left,
                right,
            } => {
                let diff = query[*dim] - value;
                if diff < 0.0 {
                    self.search_radius(left, query, radius, count);
                    if -diff <= radius {
                        self.search_radius(right, query, radius, count);
                    }
                } else {
                    self.search_radius(right, query, radius, count);
                    if diff <= radius {
                        self.search_radius(left, query, radius, count);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_points(n: usize, dims: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..dims).map(|_| rng.random_range(-5.0..5.0)).collect())
            .collect()
    }

    fn brute_force(points: &[Vec<f64>], query: &[f64], k: usize, exclude: Option<usize>) -> Vec<Neighbor> {
        let mut all: Vec<Neighbor> = points
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != exclude)
            .map(|(index, p)| Neighbor {
                index,
                distance: euclidean(query, p),
            })
            .collect();
        all.sort();
        all.truncate(k);
        all
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let points = random_points(300, 3, 7);
        let tree = KdTree::build(points.clone());
        let queries = random_points(25, 3, 8);

        for query in &queries {
            assert_eq!(tree.nearest(query, 7, None), brute_force(&points, query, 7, None));
        }
    }

    #[test]
    fn test_nearest_excludes_self() {
        let points = random_points(120, 2, 3);
        let tree = KdTree::build(points.clone());

        let neighbors = tree.nearest(&points[10], 5, Some(10));
        assert_eq!(neighbors.len(), 5);
        assert!(neighbors.iter().all(|n| n.index != 10));
        assert_eq!(neighbors, brute_force(&points, &points[10], 5, Some(10)));
    }

    #[test]
    fn test_count_within_matches_scan() {
        let points = random_points(400, 2, 11);
        let tree = KdTree::build(points.clone());

        for (query, radius) in [(vec![0.0, 0.0], 1.5), (vec![4.0, -4.0], 2.0), (vec![50.0, 50.0], 3.0)] {
            let expected = points.iter().filter(|p| euclidean(&query, p) <= radius).count();
            assert_eq!(tree.count_within(&query, radius), expected);
        }
    }

    #[test]
    fn test_duplicate_points_form_leaf() {
        let tree = KdTree::build(vec![vec![1.0, 1.0]; 40]);
        assert_eq!(tree.count_within(&[1.0, 1.0], 0.0), 40);
        assert_eq!(tree.nearest(&[0.0, 0.0], 3, None).len(), 3);
    }
}
