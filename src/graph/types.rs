//! Identifier and name types for the property graph

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                $name(id)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                $name(id)
            }
        }
    };
}

macro_rules! graph_name {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                $name(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the name can be spliced into a Cypher template unquoted
            pub fn is_plain(&self) -> bool {
                is_identifier(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

numeric_id!(
    /// Unique identifier for a node
    NodeId
);

numeric_id!(
    /// Unique identifier for an edge
    EdgeId
);

graph_name!(
    /// Node label (e.g., "HealthcareProvider", "Patient")
    Label
);

graph_name!(
    /// Relationship type (e.g., "TREATS", "LOCATED_AT")
    EdgeType
);

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Labels, relationship types and property keys are interpolated into query
/// templates, so anything else is rejected before a template is built.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_and_convert() {
        let id = NodeId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(format!("{}", id), "NodeId(42)");

        let edge: EdgeId = 7.into();
        assert_eq!(format!("{}", edge), "EdgeId(7)");
        assert!(NodeId::new(1) < NodeId::new(2));
    }

    #[test]
    fn test_names() {
        let label: Label = "HealthcareProvider".into();
        assert_eq!(label.as_str(), "HealthcareProvider");
        assert_eq!(label.to_string(), "HealthcareProvider");
        assert!(label.is_plain());

        let bad = EdgeType::new("TREATS]->(x) DETACH DELETE x //");
        assert!(!bad.is_plain());
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("SPECIALIZES_IN"));
        assert!(is_identifier("_private1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("with space"));
        assert!(!is_identifier("dash-ed"));
    }
}
