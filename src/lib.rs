//! Caregraph
//!
//! Idempotent graph ingestion and query layer for healthcare knowledge graphs.
//! Tabular records become deduplicated nodes and relationships; reports run as
//! parameterized traversal queries; providers are ranked by vector similarity
//! over embeddings of their bios.
//!
//! # Architecture
//!
//! - `ingest`: records to `MERGE` upserts, batch driver, embedding backfill
//! - `retrieval`: named queries, conjunctive traversals, similarity search
//! - `client`: the Graph Store seam (`EmbeddedClient`, `Neo4jClient`)
//! - `embed`: the Embedding Provider seam (OpenAI, Ollama)
//! - `graph`, `vector`, `query`: the in-process store behind `EmbeddedClient`
//! - `config`: explicit configuration loaded from the environment or YAML
//!
//! ## Example Usage
//!
//! ```rust
//! use caregraph::client::{EmbeddedClient, GraphClient};
//! use caregraph::ingest::{GraphSchema, Ingestor, SourceRecord};
//! use caregraph::retrieval::{QueryRunner, Traversal};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client: Arc<dyn GraphClient> = Arc::new(EmbeddedClient::new());
//! let ingestor = Ingestor::new(client.clone(), GraphSchema::healthcare()).unwrap();
//!
//! let record = SourceRecord::new()
//!     .with("Provider", "Dr. Smith")
//!     .with("Patient", "Alice")
//!     .with("Specialization", "Cardiology")
//!     .with("Location", "Houston")
//!     .with("Bio", "Cardiologist.")
//!     .with("Patient_Age", 40i64)
//!     .with("Patient_Gender", "F")
//!     .with("Patient_Condition", "Migraine");
//! ingestor.ingest(&record).await.unwrap();
//!
//! let runner = QueryRunner::new(client);
//! let names = runner
//!     .traverse(&Traversal::providers().location("Houston").specialization("Cardiology"))
//!     .await;
//! assert_eq!(names, vec!["Dr. Smith".to_string()]);
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod embed;
pub mod graph;
pub mod ingest;
pub mod query;
pub mod retrieval;
pub mod vector;

// Re-export main types for convenience
pub use graph::{
    Edge, EdgeId, EdgeType, GraphError, GraphResult, GraphStore, Label, Node, NodeId,
    PropertyMap, PropertyValue,
};

pub use query::{parse_query, Params, Query, QueryEngine, RecordBatch};

pub use client::{ClientError, ClientResult, EmbeddedClient, GraphClient, Neo4jClient, QueryResult, ResultRecord};

pub use config::{AppConfig, BackendConfig, ConfigError, EmbeddingConfig, Neo4jConfig};

pub use embed::{EmbedError, EmbeddingClient, EmbeddingProvider};

pub use ingest::{ErrorPolicy, GraphSchema, IngestError, IngestReport, Ingestor, SourceRecord};

pub use retrieval::{NamedQuery, QueryRunner, RetrievalError, SimilarityHit, Traversal};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

/// Connect the Graph Store selected by `config`
pub async fn connect(config: &AppConfig) -> ClientResult<std::sync::Arc<dyn GraphClient>> {
    match &config.backend {
        BackendConfig::Embedded => Ok(std::sync::Arc::new(EmbeddedClient::new())),
        BackendConfig::Neo4j(neo4j) => Ok(std::sync::Arc::new(Neo4jClient::connect(neo4j).await?)),
    }
}
