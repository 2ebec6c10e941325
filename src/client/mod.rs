//! Graph Store clients
//!
//! `GraphClient` is the one seam the ingestion and query components talk
//! through: a query template plus parameters in, result records out.
//!
//! - `EmbeddedClient` runs templates in-process against a `GraphStore`
//! - `Neo4jClient` sends them to a Neo4j server over Bolt

pub mod embedded;
pub mod error;
pub mod models;
pub mod neo4j;

pub use embedded::EmbeddedClient;
pub use error::{ClientError, ClientResult};
pub use models::{QueryResult, ResultRecord, StorageStats, VectorHit};
pub use neo4j::Neo4jClient;

use crate::graph::PropertyValue;
use crate::query::Params;
use async_trait::async_trait;

/// Template used by the default `query_vector_index`
pub const VECTOR_QUERY_TEMPLATE: &str = "CALL db.index.vector.queryNodes($index_name, $top_k, $vector) \
     YIELD node, score RETURN properties(node) AS properties, score ORDER BY score DESC";

/// Unified interface over embedded and remote Graph Stores
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Execute one query template as a single unit of work
    async fn execute(&self, template: &str, params: &Params) -> ClientResult<QueryResult>;

    /// Top-`k` nodes of a vector index, by descending score
    async fn query_vector_index(
        &self,
        index_name: &str,
        top_k: usize,
        vector: &[f32],
    ) -> ClientResult<Vec<VectorHit>> {
        let mut params = Params::new();
        params.insert("index_name".to_string(), index_name.into());
        params.insert("top_k".to_string(), PropertyValue::Integer(top_k as i64));
        params.insert("vector".to_string(), PropertyValue::Vector(vector.to_vec()));

        let result = self.execute(VECTOR_QUERY_TEMPLATE, &params).await?;
        result
            .records
            .into_iter()
            .map(|record| {
                let score = record
                    .get_f64("score")
                    .ok_or_else(|| ClientError::Conversion("vector hit without score".to_string()))?;
                let properties = match record.get("properties") {
                    Some(serde_json::Value::Object(map)) => map.clone(),
                    _ => serde_json::Map::new(),
                };
                Ok(VectorHit { properties, score })
            })
            .collect()
    }

    /// Node and relationship counts
    async fn status(&self) -> ClientResult<StorageStats>;
}
