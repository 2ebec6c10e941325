//! Named vector indexes
//!
//! Each index is registered under a name and covers one `(label, property)`
//! pair. The graph store calls into the manager whenever a node property
//! changes so every covering index stays in sync.

use crate::graph::NodeId;
use crate::vector::index::{DistanceMetric, VectorError, VectorIndex, VectorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The `(label, property)` pair an index covers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexKey {
    pub label: String,
    pub property_key: String,
}

/// Description of a registered index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexInfo {
    pub name: String,
    pub key: IndexKey,
    pub dimensions: usize,
    pub metric: DistanceMetric,
    pub size: usize,
}

#[derive(Debug)]
struct NamedIndex {
    key: IndexKey,
    index: VectorIndex,
}

/// All vector indexes of a graph, keyed by index name
#[derive(Debug, Default)]
pub struct VectorIndexManager {
    indices: BTreeMap<String, NamedIndex>,
}

impl VectorIndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index.
    ///
    /// Returns `Ok(false)` when an index with the same name and definition
    /// already exists, and an error when the name is taken by a different one.
    pub fn create_index(
        &mut self,
        name: &str,
        label: &str,
        property_key: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> VectorResult<bool> {
        if dimensions == 0 {
            return Err(VectorError::IndexError(
                "vector dimensions must be positive".to_string(),
            ));
        }
        let key = IndexKey {
            label: label.to_string(),
            property_key: property_key.to_string(),
        };

        if let Some(existing) = self.indices.get(name) {
            if existing.key == key
                && existing.index.dimensions() == dimensions
                && existing.index.metric() == metric
            {
                return Ok(false);
            }
            return Err(VectorError::IndexExists(name.to_string()));
        }

        self.indices.insert(
            name.to_string(),
            NamedIndex {
                key,
                index: VectorIndex::new(dimensions, metric),
            },
        );
        Ok(true)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn info(&self, name: &str) -> Option<VectorIndexInfo> {
        self.indices.get(name).map(|named| VectorIndexInfo {
            name: name.to_string(),
            key: named.key.clone(),
            dimensions: named.index.dimensions(),
            metric: named.index.metric(),
            size: named.index.len(),
        })
    }

    pub fn list_indexes(&self) -> Vec<VectorIndexInfo> {
        self.indices.keys().filter_map(|name| self.info(name)).collect()
    }

    /// Add a vector to a single named index
    pub fn add_vector(&mut self, name: &str, node_id: NodeId, vector: &[f32]) -> VectorResult<()> {
        let named = self
            .indices
            .get_mut(name)
            .ok_or_else(|| VectorError::IndexNotFound(name.to_string()))?;
        named.index.add(node_id, vector)
    }

    /// Names of the indexes covering `(label, property_key)`
    pub fn covering(&self, label: &str, property_key: &str) -> Vec<String> {
        self.indices
            .iter()
            .filter(|(_, named)| named.key.label == label && named.key.property_key == property_key)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Drop a node from every index that covers `(label, property_key)`
    pub fn remove_vector(&mut self, label: &str, property_key: &str, node_id: NodeId) {
        for named in self.indices.values_mut() {
            if named.key.label == label && named.key.property_key == property_key {
                named.index.remove(node_id);
            }
        }
    }

    /// Top-`k` search on a named index
    pub fn search(&self, name: &str, query: &[f32], k: usize) -> VectorResult<Vec<(NodeId, f32)>> {
        let named = self
            .indices
            .get(name)
            .ok_or_else(|| VectorError::IndexNotFound(name.to_string()))?;
        named.index.search(query, k)
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_idempotent_for_same_definition() {
        let mut manager = VectorIndexManager::new();
        assert!(manager
            .create_index("docs", "Doc", "embedding", 3, DistanceMetric::Cosine)
            .unwrap());
        assert!(!manager
            .create_index("docs", "Doc", "embedding", 3, DistanceMetric::Cosine)
            .unwrap());
        assert_eq!(
            manager.create_index("docs", "Doc", "embedding", 4, DistanceMetric::Cosine),
            Err(VectorError::IndexExists("docs".to_string()))
        );
    }

    #[test]
    fn test_search_named_index() {
        let mut manager = VectorIndexManager::new();
        manager
            .create_index("docs", "Doc", "embedding", 2, DistanceMetric::Cosine)
            .unwrap();
        manager.add_vector("docs", NodeId::new(1), &[1.0, 0.0]).unwrap();
        manager.add_vector("docs", NodeId::new(2), &[0.0, 1.0]).unwrap();

        let hits = manager.search("docs", &[0.9, 0.1], 1).unwrap();
        assert_eq!(hits[0].0, NodeId::new(1));

        assert_eq!(manager.covering("Doc", "embedding"), vec!["docs".to_string()]);
        assert!(manager.covering("Doc", "other").is_empty());
        assert_eq!(
            manager.search("missing", &[1.0, 0.0], 1),
            Err(VectorError::IndexNotFound("missing".to_string()))
        );

        let info = manager.info("docs").unwrap();
        assert_eq!(info.size, 2);
        assert_eq!(info.key.label, "Doc");
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut manager = VectorIndexManager::new();
        assert!(manager
            .create_index("bad", "Doc", "embedding", 0, DistanceMetric::Cosine)
            .is_err());
    }
}
