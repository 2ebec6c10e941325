//! Graph nodes

use super::property::{PropertyMap, PropertyValue};
use super::types::{Label, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A node in the property graph
///
/// Labels are kept sorted so results render the same way on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: BTreeSet<Label>,
    pub properties: PropertyMap,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<Label>) -> Self {
        Self::new_with_properties(id, vec![label.into()], PropertyMap::new())
    }

    pub fn new_with_properties(id: NodeId, labels: Vec<Label>, properties: PropertyMap) -> Self {
        let now = now_millis();
        Node {
            id,
            labels: labels.into_iter().collect(),
            properties,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_label(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    /// Set a property, returning the previous value
    pub fn set_property(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        let old = self.properties.insert(key.into(), value.into());
        self.updated_at = now_millis();
        old
    }

    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        let old = self.properties.remove(key);
        if old.is_some() {
            self.updated_at = now_millis();
        }
        old
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// True when every `(key, value)` pair is present and equal on this node
    pub fn matches_properties<'a, I>(&self, constraints: I) -> bool
    where
        I: IntoIterator<Item = (&'a String, &'a PropertyValue)>,
    {
        constraints.into_iter().all(|(key, expected)| {
            self.properties
                .get(key)
                .map(|actual| actual.matches(expected))
                .unwrap_or(false)
        })
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_properties() {
        let mut node = Node::new(NodeId::new(1), "Patient");
        assert!(node.has_label(&Label::new("Patient")));

        assert!(node.set_property("name", "Alice").is_none());
        let old = node.set_property("age", 40i64);
        assert!(old.is_none());
        let old = node.set_property("age", 41i64);
        assert_eq!(old, Some(PropertyValue::Integer(40)));
        assert_eq!(node.get_property("name").and_then(|v| v.as_string()), Some("Alice"));
    }

    #[test]
    fn test_matches_properties() {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), "Alice".into());
        props.insert("condition".to_string(), "Migraine".into());
        let node = Node::new_with_properties(NodeId::new(2), vec![Label::new("Patient")], props);

        let mut wanted = PropertyMap::new();
        wanted.insert("condition".to_string(), "Migraine".into());
        assert!(node.matches_properties(&wanted));

        wanted.insert("name".to_string(), "Bob".into());
        assert!(!node.matches_properties(&wanted));

        let mut missing = PropertyMap::new();
        missing.insert("gender".to_string(), "F".into());
        assert!(!node.matches_properties(&missing));
    }
}
