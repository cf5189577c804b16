pub mod dbscan;
pub mod isolation_forest;
pub mod kdtree;
pub mod lof;
pub mod one_class;

// Re-exports for convenience
pub use dbscan::DensityNeighborhood;
pub use isolation_forest::IsolationForest;
pub use kdtree::{KdTree, Neighbor};
pub use lof::LocalOutlierFactor;
pub use one_class::OneClassBoundary;
