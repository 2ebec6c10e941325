//! Vector similarity indexes over node embeddings
//!
//! Approximate nearest neighbour candidates come from HNSW; scores are always
//! computed exactly on the stored vector.

pub mod index;
pub mod manager;

pub use index::{DistanceMetric, VectorError, VectorIndex, VectorResult};
pub use manager::{IndexKey, VectorIndexInfo, VectorIndexManager};
