//! Property graph data model and in-memory store
//!
//! Nodes carry labels and properties, edges are directed and typed. The store
//! keeps adjacency lists, a label index and the vector indexes.

pub mod edge;
pub mod node;
pub mod property;
pub mod store;
pub mod types;

pub use edge::Edge;
pub use node::Node;
pub use property::{PropertyMap, PropertyValue};
pub use store::{GraphError, GraphResult, GraphStatistics, GraphStore};
pub use types::{is_identifier, EdgeId, EdgeType, Label, NodeId};
