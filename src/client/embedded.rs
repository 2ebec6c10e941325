//! EmbeddedClient: in-process Graph Store
//!
//! Uses `GraphStore` and the query executors directly, no network needed.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::{ClientResult, GraphClient, QueryResult, ResultRecord, StorageStats};
use crate::graph::GraphStore;
use crate::query::{parse_query, MutQueryExecutor, Params, QueryExecutor, RecordBatch};

/// In-process client that wraps a GraphStore directly.
///
/// Read-only templates share a read lock; MERGE/SET templates take the write
/// lock for the whole statement.
#[derive(Clone)]
pub struct EmbeddedClient {
    store: Arc<RwLock<GraphStore>>,
}

impl EmbeddedClient {
    /// Create a new EmbeddedClient with a fresh empty graph store
    pub fn new() -> Self {
        Self::with_store(Arc::new(RwLock::new(GraphStore::new())))
    }

    /// Create an EmbeddedClient wrapping an existing store
    pub fn with_store(store: Arc<RwLock<GraphStore>>) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store
    pub fn store(&self) -> &Arc<RwLock<GraphStore>> {
        &self.store
    }

    /// Acquire a read lock on the store for direct inspection
    pub async fn store_read(&self) -> tokio::sync::RwLockReadGuard<'_, GraphStore> {
        self.store.read().await
    }

    /// Acquire a write lock on the store for direct mutation
    pub async fn store_write(&self) -> tokio::sync::RwLockWriteGuard<'_, GraphStore> {
        self.store.write().await
    }
}

impl Default for EmbeddedClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a RecordBatch from the executor into a client QueryResult
fn record_batch_to_query_result(batch: &RecordBatch, store: &GraphStore) -> QueryResult {
    let records = batch
        .records
        .iter()
        .map(|record| {
            batch
                .columns
                .iter()
                .map(|col| {
                    let value = record
                        .get(col)
                        .map(|v| v.to_json(store))
                        .unwrap_or(serde_json::Value::Null);
                    (col.clone(), value)
                })
                .collect::<ResultRecord>()
        })
        .collect();

    QueryResult {
        columns: batch.columns.clone(),
        records,
    }
}

#[async_trait]
impl GraphClient for EmbeddedClient {
    async fn execute(&self, template: &str, params: &Params) -> ClientResult<QueryResult> {
        let query = parse_query(template)
            .map_err(crate::query::ExecutionError::from)?
            .bind_parameters(params)?;

        if query.is_read_only() {
            let store_guard = self.store.read().await;
            let batch = QueryExecutor::new(&store_guard).execute(&query)?;
            Ok(record_batch_to_query_result(&batch, &store_guard))
        } else {
            let mut store_guard = self.store.write().await;
            let batch = MutQueryExecutor::new(&mut store_guard).execute(&query)?;
            debug!(
                nodes = store_guard.node_count(),
                edges = store_guard.edge_count(),
                "write statement applied"
            );
            Ok(record_batch_to_query_result(&batch, &store_guard))
        }
    }

    async fn status(&self) -> ClientResult<StorageStats> {
        let store_guard = self.store.read().await;
        Ok(StorageStats {
            nodes: store_guard.node_count() as u64,
            edges: store_guard.edge_count() as u64,
        })
    }
}
