//! Records flowing through the operator pipeline

use crate::graph::{EdgeId, GraphStore, NodeId, PropertyValue};
use std::collections::HashMap;

/// A single row: variable bindings by name
#[derive(Debug, Clone, Default)]
pub struct Record {
    bindings: HashMap<String, Value>,
}

/// Value bound to a variable
///
/// Nodes and edges are bound by id and resolved against the store on access.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Node(NodeId),
    Edge(EdgeId),
    Property(PropertyValue),
    Null,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, variable: impl Into<String>, value: Value) {
        self.bindings.insert(variable.into(), value);
    }

    pub fn get(&self, variable: &str) -> Option<&Value> {
        self.bindings.get(variable)
    }

    pub fn bindings(&self) -> &HashMap<String, Value> {
        &self.bindings
    }

    pub fn has(&self, variable: &str) -> bool {
        self.bindings.contains_key(variable)
    }

    /// Merge another record into this one; `other` wins on conflicts
    pub fn merge(&mut self, other: Record) {
        self.bindings.extend(other.bindings);
    }

    /// Clone with only the given variables, in any order
    pub fn project(&self, variables: &[String]) -> Record {
        let mut projected = Record::new();
        for var in variables {
            if let Some(value) = self.bindings.get(var) {
                projected.bind(var.clone(), value.clone());
            }
        }
        projected
    }

    /// Identity of the row over `columns`, for DISTINCT and grouping
    pub fn key(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| self.get(c).map(Value::key).unwrap_or_else(|| Value::Null.key()))
            .collect()
    }
}

impl Value {
    /// Wrap a property value, mapping `PropertyValue::Null` to `Value::Null`
    pub fn from_property(value: PropertyValue) -> Self {
        if value.is_null() {
            Value::Null
        } else {
            Value::Property(value)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn edge_id(&self) -> Option<EdgeId> {
        match self {
            Value::Edge(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyValue> {
        match self {
            Value::Property(p) => Some(p),
            _ => None,
        }
    }

    /// Property `key` of the node or edge this value points at
    pub fn resolve_property(&self, key: &str, store: &GraphStore) -> PropertyValue {
        let found = match self {
            Value::Node(id) => store.get_node(*id).and_then(|n| n.get_property(key)),
            Value::Edge(id) => store.get_edge(*id).and_then(|e| e.get_property(key)),
            Value::Property(PropertyValue::Map(map)) => map.get(key),
            _ => None,
        };
        found.cloned().unwrap_or(PropertyValue::Null)
    }

    /// Canonical string used to compare rows
    pub fn key(&self) -> String {
        match self {
            Value::Node(id) => format!("node:{}", id.as_u64()),
            Value::Edge(id) => format!("edge:{}", id.as_u64()),
            Value::Property(p) => format!("value:{}", p.to_json()),
            Value::Null => "null".to_string(),
        }
    }

    /// JSON form for result records; nodes and edges render as their property maps
    pub fn to_json(&self, store: &GraphStore) -> serde_json::Value {
        match self {
            Value::Node(id) => store
                .get_node(*id)
                .map(|n| properties_json(&n.properties))
                .unwrap_or(serde_json::Value::Null),
            Value::Edge(id) => store
                .get_edge(*id)
                .map(|e| properties_json(&e.properties))
                .unwrap_or(serde_json::Value::Null),
            Value::Property(p) => p.to_json(),
            Value::Null => serde_json::Value::Null,
        }
    }
}

fn properties_json(properties: &crate::graph::PropertyMap) -> serde_json::Value {
    serde_json::Value::Object(
        properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

/// A result set
#[derive(Debug, Default)]
pub struct RecordBatch {
    pub records: Vec<Record>,
    pub columns: Vec<String>,
}

impl RecordBatch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            records: Vec::new(),
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Label;

    #[test]
    fn test_record_binding_and_project() {
        let mut record = Record::new();
        record.bind("a", Value::Property(PropertyValue::Integer(1)));
        record.bind("b", Value::Node(NodeId::new(2)));
        record.bind("c", Value::Null);

        let projected = record.project(&["a".to_string(), "c".to_string()]);
        assert!(projected.has("a"));
        assert!(!projected.has("b"));
        assert!(projected.has("c"));
    }

    #[test]
    fn test_record_merge() {
        let mut left = Record::new();
        left.bind("a", Value::Property(1i64.into()));
        let mut right = Record::new();
        right.bind("a", Value::Property(2i64.into()));
        right.bind("b", Value::Null);

        left.merge(right);
        assert_eq!(left.get("a"), Some(&Value::Property(2i64.into())));
        assert!(left.has("b"));
    }

    #[test]
    fn test_keys_distinguish_values() {
        assert_ne!(Value::Node(NodeId::new(1)).key(), Value::Edge(EdgeId::new(1)).key());
        assert_eq!(
            Value::Property("x".into()).key(),
            Value::Property("x".into()).key()
        );
        assert_eq!(Value::from_property(PropertyValue::Null), Value::Null);
    }

    #[test]
    fn test_resolve_and_json() {
        let mut store = GraphStore::new();
        let id = store.create_node(Label::new("Patient"));
        store.set_node_property(id, "name", "Alice").unwrap();

        let value = Value::Node(id);
        assert_eq!(value.resolve_property("name", &store), PropertyValue::from("Alice"));
        assert_eq!(value.resolve_property("age", &store), PropertyValue::Null);
        assert_eq!(value.to_json(&store)["name"], "Alice");
    }
}
