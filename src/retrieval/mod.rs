//! Retrieval: named queries, traversals and similarity search
//!
//! `QueryRunner` offers each read in two forms. The `try_` form returns a
//! `Result`; the plain form logs the failure and yields an empty result, which
//! is what a reporting caller wants.

pub mod catalog;
pub mod traversal;

pub use catalog::{catalog, find, report_params, NamedQuery};
pub use traversal::{Traversal, TraversalTarget};

use crate::client::{ClientError, GraphClient, ResultRecord};
use crate::embed::{EmbedError, EmbeddingProvider};
use crate::ingest::VectorIndexSpec;
use crate::query::Params;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Query '{query}' needs parameter '{name}'")]
    MissingParameter { query: String, name: String },

    #[error("No embedding provider configured")]
    NoEmbeddingProvider,

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("Query '{query}' failed: {source}")]
    Store {
        query: String,
        #[source]
        source: ClientError,
    },
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// A provider ranked by similarity to a text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub score: f64,
}

/// Runs read queries against a Graph Store
pub struct QueryRunner {
    client: Arc<dyn GraphClient>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    index: VectorIndexSpec,
}

impl QueryRunner {
    pub fn new(client: Arc<dyn GraphClient>) -> Self {
        Self {
            client,
            embedder: None,
            index: VectorIndexSpec::default(),
        }
    }

    /// Enable similarity queries against `index`
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>, index: VectorIndexSpec) -> Self {
        self.embedder = Some(embedder);
        self.index = index;
        self
    }

    pub fn client(&self) -> &Arc<dyn GraphClient> {
        &self.client
    }

    pub async fn try_run_query(&self, query: &NamedQuery, params: &Params) -> RetrievalResult<Vec<ResultRecord>> {
        if let Some(name) = query.missing(params).first() {
            return Err(RetrievalError::MissingParameter {
                query: query.name.clone(),
                name: name.to_string(),
            });
        }

        let result = self
            .client
            .execute(&query.template, params)
            .await
            .map_err(|source| RetrievalError::Store {
                query: query.name.clone(),
                source,
            })?;
        debug!(query = %query.name, rows = result.len(), "Query executed");
        Ok(result.records)
    }

    /// `try_run_query`, logging any failure and returning no records
    pub async fn run_query(&self, query: &NamedQuery, params: &Params) -> Vec<ResultRecord> {
        match self.try_run_query(query, params).await {
            Ok(records) => records,
            Err(e) => {
                warn!(query = %query.name, error = %e, "Query failed");
                Vec::new()
            }
        }
    }

    /// Names matched by a traversal, in ascending order
    pub async fn try_traverse(&self, traversal: &Traversal) -> RetrievalResult<Vec<String>> {
        let query = NamedQuery::new("traversal", &traversal.template(), &[]);
        let column = traversal.target.column();
        let records = self.try_run_query(&query, &traversal.params()).await?;
        Ok(records
            .iter()
            .filter_map(|r| r.get_str(column).map(str::to_string))
            .collect())
    }

    pub async fn traverse(&self, traversal: &Traversal) -> Vec<String> {
        match self.try_traverse(traversal).await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Traversal failed");
                Vec::new()
            }
        }
    }

    /// The `top_k` nodes most similar to `text`, by descending score
    pub async fn try_similar(&self, text: &str, top_k: usize) -> RetrievalResult<Vec<SimilarityHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let embedder = self.embedder.as_ref().ok_or(RetrievalError::NoEmbeddingProvider)?;
        let vector = embedder.embed(text).await?;

        let hits = self
            .client
            .query_vector_index(&self.index.name, top_k, &vector)
            .await
            .map_err(|source| RetrievalError::Store {
                query: self.index.name.clone(),
                source,
            })?;

        let text_of = |props: &serde_json::Map<String, serde_json::Value>, key: &str| {
            props.get(key).and_then(|v| v.as_str()).map(str::to_string)
        };
        let mut ranked: Vec<SimilarityHit> = hits
            .into_iter()
            .map(|hit| SimilarityHit {
                name: text_of(&hit.properties, &self.index.key_property),
                bio: text_of(&hit.properties, &self.index.source_property),
                score: hit.score,
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_k);
        Ok(ranked)
    }

    pub async fn similar(&self, text: &str, top_k: usize) -> Vec<SimilarityHit> {
        match self.try_similar(text, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(top_k, error = %e, "Similarity query failed");
                Vec::new()
            }
        }
    }
}
