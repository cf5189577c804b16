//! Reference dataset of known-normal observations.

use crate::algo::KdTree;
use crate::error::{EnsembleError, Result};
use crate::signal::FeatureVector;
use std::sync::Arc;

/// Validated, immutable reference set plus its spatial index.
///
/// Cloning is cheap; the points live once, inside the shared k-d tree.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    index: Arc<KdTree>,
    dimensions: usize,
}

impl ReferenceSet {
    pub fn new(points: Vec<FeatureVector>) -> Result<Self> {
        let Some(first) = points.first() else {
            return Err(EnsembleError::config("reference set is empty"));
        };
        let dimensions = first.len();
        if dimensions == 0 {
            return Err(EnsembleError::config("reference vectors have no features"));
        }
        if points.len() < 2 {
            return Err(EnsembleError::config(
                "reference set needs at least 2 observations",
            ));
        }
        for (row, point) in points.iter().enumerate() {
            if point.len() != dimensions {
                return Err(EnsembleError::config(format!(
                    "reference row {row} has {} features, expected {dimensions}",
                    point.len()
                )));
            }
            if let Some(col) = point.iter().position(|v| !v.is_finite()) {
                return Err(EnsembleError::config(format!(
                    "reference row {row} has a non-finite value at index {col}"
                )));
            }
        }

        Ok(Self {
            index: Arc::new(KdTree::build(points)),
            dimensions,
        })
    }

    pub fn points(&self) -> &[FeatureVector] {
        self.index.points()
    }

    pub fn index(&self) -> &KdTree {
        &self.index
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unusable_reference_sets() {
        assert!(ReferenceSet::new(vec![]).is_err());
        assert!(ReferenceSet::new(vec![vec![1.0]]).is_err());
        assert!(ReferenceSet::new(vec![vec![], vec![]]).is_err());
        assert!(ReferenceSet::new(vec![vec![1.0, 2.0], vec![1.0]]).is_err());

        let err = ReferenceSet::new(vec![vec![1.0, 2.0], vec![f64::NAN, 0.0]]).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_shares_points_with_index() {
        let set = ReferenceSet::new(vec![vec![0.0, 0.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(set.dimensions(), 2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.index().len(), 2);
        assert_eq!(set.index().point(1), &[3.0, 4.0]);
        assert_eq!(set.points()[1], vec![3.0, 4.0]);
    }

    #[test]
    fn test_clones_share_one_copy_of_points() {
        let set = ReferenceSet::new(vec![vec![0.0, 0.0], vec![3.0, 4.0]]).unwrap();
        let copy = set.clone();
        assert!(std::ptr::eq(set.points().as_ptr(), copy.points().as_ptr()));
        assert!(std::ptr::eq(set.points().as_ptr(), set.index().points().as_ptr()));
    }
}
