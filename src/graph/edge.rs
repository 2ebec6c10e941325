//! Directed, typed edges

use super::node::now_millis;
use super::property::{PropertyMap, PropertyValue};
use super::types::{EdgeId, EdgeType, NodeId};
use serde::{Deserialize, Serialize};

/// A directed edge `source -[edge_type]-> target`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
    pub properties: PropertyMap,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, edge_type: impl Into<EdgeType>) -> Self {
        Edge {
            id,
            source,
            target,
            edge_type: edge_type.into(),
            properties: PropertyMap::new(),
            created_at: now_millis(),
        }
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// The node at the other end of this edge, seen from `node`
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Edge {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_direction_and_other_end() {
        let edge = Edge::new(EdgeId::new(1), NodeId::new(10), NodeId::new(20), "TREATS");
        assert_eq!(edge.edge_type.as_str(), "TREATS");
        assert_eq!(edge.other_end(NodeId::new(10)), NodeId::new(20));
        assert_eq!(edge.other_end(NodeId::new(20)), NodeId::new(10));
        assert!(edge.get_property("since").is_none());
    }
}
