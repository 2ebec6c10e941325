//! In-memory graph storage
//!
//! Nodes and edges live in id-indexed arenas with adjacency lists per node,
//! a label index and an edge-type index. Vector indexes are owned by the
//! store and updated on every property write.

use super::edge::Edge;
use super::node::Node;
use super::property::{PropertyMap, PropertyValue};
use super::types::{EdgeId, EdgeType, Label, NodeId};
use crate::vector::{DistanceMetric, VectorError, VectorIndexInfo, VectorIndexManager};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during graph operations
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(NodeId),

    #[error("Invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(NodeId),

    #[error(transparent)]
    Vector(#[from] VectorError),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Counts reported by `GraphStore::statistics`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub label_counts: BTreeMap<String, usize>,
    pub edge_type_counts: BTreeMap<String, usize>,
    pub vector_indexes: Vec<VectorIndexInfo>,
}

/// In-memory property graph
///
/// - nodes / edges: arenas indexed by id (slot 0 unused)
/// - outgoing / incoming: adjacency lists per node
/// - label_index: Label -> nodes carrying it
/// - edge_type_index: EdgeType -> edges of that type
#[derive(Debug)]
pub struct GraphStore {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    outgoing: Vec<Vec<EdgeId>>,
    incoming: Vec<Vec<EdgeId>>,
    label_index: HashMap<Label, HashSet<NodeId>>,
    edge_type_index: HashMap<EdgeType, HashSet<EdgeId>>,
    vector_index: VectorIndexManager,
    node_count: usize,
    edge_count: usize,
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore {
            nodes: vec![None],
            edges: vec![None],
            outgoing: vec![Vec::new()],
            incoming: vec![Vec::new()],
            label_index: HashMap::new(),
            edge_type_index: HashMap::new(),
            vector_index: VectorIndexManager::new(),
            node_count: 0,
            edge_count: 0,
        }
    }

    /// Create a node with a single label and no properties
    pub fn create_node(&mut self, label: impl Into<Label>) -> NodeId {
        self.create_node_with_properties(vec![label.into()], PropertyMap::new())
    }

    pub fn create_node_with_properties(
        &mut self,
        labels: Vec<Label>,
        properties: PropertyMap,
    ) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u64);
        let node = Node::new_with_properties(id, labels, properties);

        for label in &node.labels {
            self.label_index.entry(label.clone()).or_default().insert(id);
        }
        let vectors: Vec<(String, PropertyValue)> = node
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let labels: Vec<Label> = node.labels.iter().cloned().collect();

        self.nodes.push(Some(node));
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        self.node_count += 1;

        for (key, value) in &vectors {
            self.sync_vector_indexes(id, &labels, key, value);
        }
        id
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_u64() as usize).and_then(|n| n.as_ref())
    }

    /// Mutable access that bypasses vector index upkeep; use
    /// `set_node_property` for indexed properties.
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.as_u64() as usize).and_then(|n| n.as_mut())
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.get_node(id).is_some()
    }

    /// Set a node property, returning the previous value.
    ///
    /// Every vector index covering one of the node's labels and `key` is
    /// updated; a value that is not a vector removes the node from them.
    /// Setting `Null` removes the property.
    pub fn set_node_property(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<Option<PropertyValue>> {
        let key = key.into();
        let value = value.into();
        let node = self
            .nodes
            .get_mut(id.as_u64() as usize)
            .and_then(|n| n.as_mut())
            .ok_or(GraphError::NodeNotFound(id))?;

        let labels: Vec<Label> = node.labels.iter().cloned().collect();
        let old = if value.is_null() {
            node.remove_property(&key)
        } else {
            node.set_property(key.clone(), value.clone())
        };
        self.sync_vector_indexes(id, &labels, &key, &value);
        Ok(old)
    }

    pub fn add_label_to_node(&mut self, id: NodeId, label: impl Into<Label>) -> GraphResult<()> {
        let label = label.into();
        let node = self
            .nodes
            .get_mut(id.as_u64() as usize)
            .and_then(|n| n.as_mut())
            .ok_or(GraphError::NodeNotFound(id))?;

        if !node.labels.insert(label.clone()) {
            return Ok(());
        }
        let properties: Vec<(String, PropertyValue)> = node
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.label_index.entry(label.clone()).or_default().insert(id);

        let labels = [label];
        for (key, value) in &properties {
            self.sync_vector_indexes(id, &labels, key, value);
        }
        Ok(())
    }

    /// Nodes carrying `label` whose properties match every constraint, by ascending id
    pub fn find_nodes(&self, label: &Label, constraints: &PropertyMap) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .label_index
            .get(label)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| {
                self.get_node(*id)
                    .map(|node| node.matches_properties(constraints))
                    .unwrap_or(false)
            })
            .collect();
        ids.sort();
        ids
    }

    pub fn create_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
    ) -> GraphResult<EdgeId> {
        if !self.has_node(source) {
            return Err(GraphError::InvalidEdgeSource(source));
        }
        if !self.has_node(target) {
            return Err(GraphError::InvalidEdgeTarget(target));
        }

        let id = EdgeId::new(self.edges.len() as u64);
        let edge = Edge::new(id, source, target, edge_type);
        self.edge_type_index
            .entry(edge.edge_type.clone())
            .or_default()
            .insert(id);
        self.outgoing[source.as_u64() as usize].push(id);
        self.incoming[target.as_u64() as usize].push(id);
        self.edges.push(Some(edge));
        self.edge_count += 1;
        Ok(id)
    }

    /// The edge `source -[edge_type]-> target`, if one exists
    pub fn find_edge(&self, source: NodeId, target: NodeId, edge_type: &EdgeType) -> Option<EdgeId> {
        self.outgoing
            .get(source.as_u64() as usize)?
            .iter()
            .copied()
            .find(|id| {
                self.get_edge(*id)
                    .map(|e| e.target == target && &e.edge_type == edge_type)
                    .unwrap_or(false)
            })
    }

    /// Create the edge unless the same `(source, type, target)` triple exists.
    ///
    /// Returns the edge id and whether it was created.
    pub fn merge_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
    ) -> GraphResult<(EdgeId, bool)> {
        let edge_type = edge_type.into();
        if let Some(existing) = self.find_edge(source, target, &edge_type) {
            return Ok((existing, false));
        }
        let id = self.create_edge(source, target, edge_type)?;
        Ok((id, true))
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.as_u64() as usize).and_then(|e| e.as_ref())
    }

    pub fn set_edge_property(
        &mut self,
        id: EdgeId,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> GraphResult<Option<PropertyValue>> {
        let edge = self
            .edges
            .get_mut(id.as_u64() as usize)
            .and_then(|e| e.as_mut())
            .ok_or(GraphError::EdgeNotFound(id))?;
        let key = key.into();
        let value = value.into();
        if value.is_null() {
            return Ok(edge.properties.remove(&key));
        }
        Ok(edge.properties.insert(key, value))
    }

    pub fn get_outgoing_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.adjacent(&self.outgoing, node_id)
    }

    pub fn get_incoming_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.adjacent(&self.incoming, node_id)
    }

    fn adjacent<'a>(&'a self, lists: &'a [Vec<EdgeId>], node_id: NodeId) -> Vec<&'a Edge> {
        lists
            .get(node_id.as_u64() as usize)
            .map(|ids| ids.iter().filter_map(|id| self.get_edge(*id)).collect())
            .unwrap_or_default()
    }

    pub fn get_nodes_by_label(&self, label: &Label) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self
            .label_index
            .get(label)
            .into_iter()
            .flatten()
            .filter_map(|id| self.get_node(*id))
            .collect();
        nodes.sort_by_key(|n| n.id);
        nodes
    }

    pub fn get_edges_by_type(&self, edge_type: &EdgeType) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .edge_type_index
            .get(edge_type)
            .into_iter()
            .flatten()
            .filter_map(|id| self.get_edge(*id))
            .collect();
        edges.sort_by_key(|e| e.id);
        edges
    }

    pub fn all_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().flatten().collect()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Remove all nodes, edges and vector indexes
    pub fn clear(&mut self) {
        *self = GraphStore::new();
    }

    /// Create a named vector index and index the nodes that already qualify.
    ///
    /// Returns `false` when an identical index already existed.
    pub fn create_vector_index(
        &mut self,
        name: &str,
        label: &str,
        property_key: &str,
        dimensions: usize,
        metric: DistanceMetric,
    ) -> GraphResult<bool> {
        let created = self
            .vector_index
            .create_index(name, label, property_key, dimensions, metric)?;
        if !created {
            return Ok(false);
        }

        let label = Label::new(label);
        let pending: Vec<(NodeId, Vec<f32>)> = self
            .get_nodes_by_label(&label)
            .into_iter()
            .filter_map(|node| {
                node.get_property(property_key)
                    .and_then(|v| v.as_vector())
                    .map(|vector| (node.id, vector))
            })
            .collect();

        let mut indexed = 0usize;
        for (id, vector) in pending {
            match self.vector_index.add_vector(name, id, &vector) {
                Ok(()) => indexed += 1,
                Err(e) => warn!("Skipping {} for index '{}': {}", id, name, e),
            }
        }
        debug!("Created vector index '{}' with {} existing vectors", name, indexed);
        Ok(true)
    }

    /// Top-`k` nodes of a named index by descending score
    pub fn vector_query(
        &self,
        name: &str,
        k: usize,
        query: &[f32],
    ) -> GraphResult<Vec<(NodeId, f32)>> {
        Ok(self.vector_index.search(name, query, k)?)
    }

    pub fn vector_indexes(&self) -> Vec<VectorIndexInfo> {
        self.vector_index.list_indexes()
    }

    pub fn statistics(&self) -> GraphStatistics {
        let label_counts = self
            .label_index
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(label, ids)| (label.as_str().to_string(), ids.len()))
            .collect();
        let edge_type_counts = self
            .edge_type_index
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(edge_type, ids)| (edge_type.as_str().to_string(), ids.len()))
            .collect();

        GraphStatistics {
            node_count: self.node_count,
            edge_count: self.edge_count,
            label_counts,
            edge_type_counts,
            vector_indexes: self.vector_indexes(),
        }
    }

    fn sync_vector_indexes(&mut self, id: NodeId, labels: &[Label], key: &str, value: &PropertyValue) {
        for label in labels {
            let covering = self.vector_index.covering(label.as_str(), key);
            if covering.is_empty() {
                continue;
            }
            match value.as_vector() {
                Some(vector) => {
                    for name in covering {
                        if let Err(e) = self.vector_index.add_vector(&name, id, &vector) {
                            warn!("Vector for {} not indexed in '{}': {}", id, name, e);
                            self.vector_index.remove_vector(label.as_str(), key, id);
                        }
                    }
                }
                None => self.vector_index.remove_vector(label.as_str(), key, id),
            }
        }
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
