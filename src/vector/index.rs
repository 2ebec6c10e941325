//! Vector index over node embeddings
//!
//! HNSW (via `hnsw_rs`) proposes candidates for large indexes; every candidate
//! is rescored exactly against the node's current vector, so replaced vectors
//! never surface stale scores and results are ordered deterministically.

use crate::graph::NodeId;
use hnsw_rs::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

/// Below this many vectors a search scans every entry.
const EXACT_SCAN_THRESHOLD: usize = 1024;

/// Vector index errors
#[derive(Error, Debug, PartialEq)]
pub enum VectorError {
    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Vector index '{0}' not found")]
    IndexNotFound(String),

    #[error("Vector index '{0}' already exists")]
    IndexExists(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub type VectorResult<T> = Result<T, VectorError>;

/// Similarity function of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    /// Parse the `vector.similarity_function` option value
    pub fn parse(name: &str) -> VectorResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            other => Err(VectorError::IndexError(format!(
                "Unknown similarity function '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    /// Similarity score in `[0, 1]`, higher is closer
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => (1.0 + cosine_similarity(a, b)) / 2.0,
            DistanceMetric::Euclidean => 1.0 / (1.0 + squared_euclidean(a, b)),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Distance adapter handed to `hnsw_rs`
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricDistance(pub DistanceMetric);

impl Distance<f32> for MetricDistance {
    fn eval(&self, va: &[f32], vb: &[f32]) -> f32 {
        1.0 - self.0.score(va, vb)
    }
}

/// A single named index over one `(label, property)` pair
pub struct VectorIndex {
    dimensions: usize,
    metric: DistanceMetric,
    hnsw: Hnsw<'static, f32, MetricDistance>,
    /// Current vector per node; the source of truth for scoring
    vectors: HashMap<NodeId, Vec<f32>>,
    /// Points in the HNSW graph that were superseded by a newer vector
    stale_points: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimensions", &self.dimensions)
            .field("metric", &self.metric)
            .field("len", &self.vectors.len())
            .finish()
    }
}

impl VectorIndex {
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        let max_elements = 100_000;
        let m = 16;
        let ef_construction = 200;
        let hnsw = Hnsw::new(m, max_elements, 16, ef_construction, MetricDistance(metric));

        Self {
            dimensions,
            metric,
            hnsw,
            vectors: HashMap::new(),
            stale_points: 0,
        }
    }

    /// Add or replace the vector for a node
    pub fn add(&mut self, node_id: NodeId, vector: &[f32]) -> VectorResult<()> {
        self.check_dimensions(vector.len())?;

        let owned = vector.to_vec();
        self.hnsw.insert((&owned, node_id.as_u64() as usize));
        if self.vectors.insert(node_id, owned).is_some() {
            self.stale_points += 1;
        }
        Ok(())
    }

    /// Drop a node from the index (its HNSW point becomes stale)
    pub fn remove(&mut self, node_id: NodeId) {
        if self.vectors.remove(&node_id).is_some() {
            self.stale_points += 1;
        }
    }

    /// Top-`k` nodes by descending score, one entry per node
    pub fn search(&self, query: &[f32], k: usize) -> VectorResult<Vec<(NodeId, f32)>> {
        self.check_dimensions(query.len())?;
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let candidates: Vec<NodeId> = if self.vectors.len() <= EXACT_SCAN_THRESHOLD {
            self.vectors.keys().copied().collect()
        } else {
            let wanted = k + self.stale_points;
            let ef_search = (wanted * 2).max(64);
            self.hnsw
                .search(query, wanted, ef_search)
                .into_iter()
                .map(|neighbour| NodeId::new(neighbour.d_id as u64))
                .collect()
        };

        let mut scored: Vec<(NodeId, f32)> = candidates
            .into_iter()
            .filter_map(|id| self.vectors.get(&id).map(|v| (id, self.metric.score(query, v))))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.dedup_by_key(|(id, _)| *id);
        scored.truncate(k);
        Ok(scored)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn check_dimensions(&self, got: usize) -> VectorResult<()> {
        if got != self.dimensions {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimensions,
                got,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_orders_by_descending_score() {
        let mut index = VectorIndex::new(3, DistanceMetric::Cosine);
        index.add(NodeId::new(1), &[1.0, 0.0, 0.0]).unwrap();
        index.add(NodeId::new(2), &[0.0, 1.0, 0.0]).unwrap();
        index.add(NodeId::new(3), &[0.7, 0.7, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.1, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, NodeId::new(1));
        assert_eq!(results[1].0, NodeId::new(3));
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn test_replacing_a_vector_keeps_one_entry() {
        let mut index = VectorIndex::new(2, DistanceMetric::Cosine);
        index.add(NodeId::new(1), &[1.0, 0.0]).unwrap();
        index.add(NodeId::new(1), &[0.0, 1.0]).unwrap();
        index.add(NodeId::new(2), &[0.6, 0.8]).unwrap();

        let results = index.search(&[0.0, 1.0], 5).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, NodeId::new(1));
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = VectorIndex::new(3, DistanceMetric::Cosine);
        let err = index.add(NodeId::new(1), &[1.0]).unwrap_err();
        assert_eq!(err, VectorError::DimensionMismatch { expected: 3, got: 1 });
        assert!(index.search(&[1.0, 2.0], 1).is_err());
    }

    #[test]
    fn test_scores() {
        let cosine = DistanceMetric::Cosine;
        assert!((cosine.score(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine.score(&[1.0, 0.0], &[0.0, 1.0]) - 0.5).abs() < 1e-6);
        assert!((cosine.score(&[1.0, 0.0], &[-1.0, 0.0])).abs() < 1e-6);

        let l2 = DistanceMetric::Euclidean;
        assert!((l2.score(&[1.0, 1.0], &[1.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((l2.score(&[0.0, 0.0], &[1.0, 0.0]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!(DistanceMetric::parse("COSINE").unwrap(), DistanceMetric::Cosine);
        assert_eq!(DistanceMetric::parse("euclidean").unwrap(), DistanceMetric::Euclidean);
        assert!(DistanceMetric::parse("manhattan").is_err());
    }

    #[test]
    fn test_zero_k_and_removal() {
        let mut index = VectorIndex::new(2, DistanceMetric::Euclidean);
        index.add(NodeId::new(1), &[1.0, 0.0]).unwrap();
        assert!(index.search(&[1.0, 0.0], 0).unwrap().is_empty());

        index.remove(NodeId::new(1));
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0], 3).unwrap().is_empty());
    }
}
