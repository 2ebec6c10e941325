//! Ingestion: tabular records to idempotent node and relationship upserts
//!
//! Every record is turned into one `MERGE` per declared entity, keyed on the
//! entity's identity property, followed by one guarded `MATCH ... MERGE` per
//! declared relationship. Re-ingesting the same input leaves the graph as it
//! was; an edge whose endpoint does not exist is skipped, not created.
//!
//! ```text
//!   SourceRecord ──> Ingestor::ingest ──> GraphClient::execute (entities)
//!                                     └─> GraphClient::execute (edges)
//! ```

pub mod embeddings;
pub mod record;
pub mod schema;

pub use embeddings::{backfill_embeddings, ensure_vector_index, BackfillReport, VectorIndexSpec};
pub use record::{healthcare_records, read_healthcare_csv, HealthcareRow, SourceRecord};
pub use schema::{laureate_facts, AttributeSpec, EntitySpec, GraphSchema, RelationshipSpec};

use crate::client::{ClientError, GraphClient};
use crate::graph::PropertyValue;
use crate::query::Params;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Record is missing field '{field}'")]
    MissingField { field: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("{operation} failed for '{key}': {source}")]
    Store {
        operation: String,
        key: String,
        #[source]
        source: ClientError,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// Errors that no later record can avoid: the input or schema is wrong
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IngestError::Store { .. })
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

/// What the batch driver does after a record fails with a store error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log the failure and move on to the next record
    #[default]
    Continue,
    /// Stop at the first failing record
    Abort,
}

/// Work done for one record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub nodes_merged: usize,
    /// Entities with a null or blank identity value
    pub nodes_skipped: usize,
    pub edges_linked: usize,
    /// Edges with a missing endpoint
    pub edges_skipped: usize,
}

/// A record that could not be ingested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFailure {
    /// Position of the record in the input
    pub index: usize,
    pub error: String,
}

/// Summary of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub records_ok: usize,
    pub records_failed: usize,
    pub nodes_merged: usize,
    pub nodes_skipped: usize,
    pub edges_linked: usize,
    pub edges_skipped: usize,
    pub failures: Vec<IngestFailure>,
    /// The batch stopped early under `ErrorPolicy::Abort`
    pub aborted: bool,
}

impl IngestReport {
    fn absorb(&mut self, outcome: &RecordOutcome) {
        self.records_ok += 1;
        self.nodes_merged += outcome.nodes_merged;
        self.nodes_skipped += outcome.nodes_skipped;
        self.edges_linked += outcome.edges_linked;
        self.edges_skipped += outcome.edges_skipped;
    }
}

/// Turns source records into graph upserts through a `GraphClient`
pub struct Ingestor {
    client: Arc<dyn GraphClient>,
    schema: GraphSchema,
    policy: ErrorPolicy,
    entity_templates: Vec<String>,
    link_templates: Vec<String>,
}

impl Ingestor {
    /// Validates the schema and prepares its templates
    pub fn new(client: Arc<dyn GraphClient>, schema: GraphSchema) -> IngestResult<Self> {
        schema.validate()?;
        let entity_templates = schema.entities.iter().map(|e| e.upsert_template()).collect();
        let link_templates = schema
            .relationships
            .iter()
            .map(|r| schema.link_template(r))
            .collect::<IngestResult<Vec<_>>>()?;

        Ok(Self {
            client,
            schema,
            policy: ErrorPolicy::default(),
            entity_templates,
            link_templates,
        })
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn schema(&self) -> &GraphSchema {
        &self.schema
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Upsert one record's entities, then link them
    ///
    /// Every field the schema reads must be present before anything is
    /// written. The first store error ends the record.
    pub async fn ingest(&self, record: &SourceRecord) -> IngestResult<RecordOutcome> {
        for field in self.schema.required_fields() {
            record.require(field)?;
        }

        let mut outcome = RecordOutcome::default();
        let mut keys: HashMap<&str, &PropertyValue> = HashMap::new();

        for (entity, template) in self.schema.entities.iter().zip(&self.entity_templates) {
            let key = record.require(&entity.key_field)?;
            if is_blank(key) {
                debug!(entity = %entity.alias, field = %entity.key_field, "Blank identity, entity skipped");
                outcome.nodes_skipped += 1;
                continue;
            }

            let mut params = Params::new();
            params.insert("key".to_string(), key.clone());
            for attr in &entity.attributes {
                params.insert(
                    schema::attribute_param(&attr.property),
                    record.require(&attr.field)?.clone(),
                );
            }

            self.client
                .execute(template, &params)
                .await
                .map_err(|source| IngestError::Store {
                    operation: format!("merge {}", entity.label),
                    key: display_key(key),
                    source,
                })?;
            keys.insert(entity.alias.as_str(), key);
            outcome.nodes_merged += 1;
        }

        for (rel, template) in self.schema.relationships.iter().zip(&self.link_templates) {
            let (source, target) = match (keys.get(rel.source.as_str()), keys.get(rel.target.as_str())) {
                (Some(source), Some(target)) => (*source, *target),
                _ => {
                    outcome.edges_skipped += 1;
                    continue;
                }
            };

            let mut params = Params::new();
            params.insert("source".to_string(), source.clone());
            params.insert("target".to_string(), target.clone());
            let result = self
                .client
                .execute(template, &params)
                .await
                .map_err(|e| IngestError::Store {
                    operation: format!("link {}", rel.edge_type),
                    key: format!("{} -> {}", display_key(source), display_key(target)),
                    source: e,
                })?;

            let linked = result
                .records
                .first()
                .and_then(|r| r.get_i64("linked"))
                .unwrap_or(0);
            if linked > 0 {
                outcome.edges_linked += 1;
            } else {
                debug!(edge_type = %rel.edge_type, "Endpoint missing, edge skipped");
                outcome.edges_skipped += 1;
            }
        }

        Ok(outcome)
    }

    /// Lazily ingest records one at a time, in input order
    ///
    /// The stream ends after a fatal error, or after any error under
    /// `ErrorPolicy::Abort`.
    pub fn ingest_all<'a, I>(&'a self, records: I) -> impl Stream<Item = IngestResult<RecordOutcome>> + 'a
    where
        I: IntoIterator<Item = SourceRecord>,
        I::IntoIter: Send + 'a,
    {
        stream::unfold((records.into_iter(), false), move |(mut records, stopped)| async move {
            if stopped {
                return None;
            }
            let record = records.next()?;
            let result = self.ingest(&record).await;
            let stop = match &result {
                Ok(_) => false,
                Err(e) => e.is_fatal() || self.policy == ErrorPolicy::Abort,
            };
            Some((result, (records, stop)))
        })
    }

    /// Drain `ingest_all` into a report
    ///
    /// Store failures are logged and counted; a fatal error is returned.
    pub async fn ingest_batch<I>(&self, records: I) -> IngestResult<IngestReport>
    where
        I: IntoIterator<Item = SourceRecord>,
        I::IntoIter: Send,
    {
        let mut report = IngestReport::default();
        let results = self.ingest_all(records);
        futures::pin_mut!(results);

        let mut index = 0;
        while let Some(result) = results.next().await {
            match result {
                Ok(outcome) => report.absorb(&outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(record = index, error = %e, "Record ingestion failed");
                    report.records_failed += 1;
                    report.failures.push(IngestFailure {
                        index,
                        error: e.to_string(),
                    });
                    if self.policy == ErrorPolicy::Abort {
                        report.aborted = true;
                    }
                }
            }
            index += 1;
        }

        info!(
            schema = %self.schema.name,
            records_ok = report.records_ok,
            records_failed = report.records_failed,
            nodes_merged = report.nodes_merged,
            edges_linked = report.edges_linked,
            edges_skipped = report.edges_skipped,
            "Ingestion finished"
        );
        Ok(report)
    }
}

fn is_blank(value: &PropertyValue) -> bool {
    match value {
        PropertyValue::Null => true,
        PropertyValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn display_key(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientResult, EmbeddedClient, QueryResult, StorageStats};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn smith() -> SourceRecord {
        SourceRecord::new()
            .with("Provider", "Dr. Smith")
            .with("Patient", "Alice")
            .with("Specialization", "Cardiology")
            .with("Location", "Houston")
            .with("Bio", "Cardiologist with 20 years of practice.")
            .with("Patient_Age", 40i64)
            .with("Patient_Gender", "F")
            .with("Patient_Condition", "Migraine")
    }

    /// Fails every statement that mentions `Patient` on its `fail_on`-th call
    struct FlakyClient {
        inner: EmbeddedClient,
        calls: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl GraphClient for FlakyClient {
        async fn execute(&self, template: &str, params: &Params) -> ClientResult<QueryResult> {
            if template.contains(":Patient") {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n == self.fail_on {
                    return Err(ClientError::Connection("connection reset".to_string()));
                }
            }
            self.inner.execute(template, params).await
        }

        async fn status(&self) -> ClientResult<StorageStats> {
            self.inner.status().await
        }
    }

    #[tokio::test]
    async fn test_ingest_single_record() {
        let client = Arc::new(EmbeddedClient::new());
        let ingestor = Ingestor::new(client.clone(), GraphSchema::healthcare()).unwrap();

        let outcome = ingestor.ingest(&smith()).await.unwrap();
        assert_eq!(outcome.nodes_merged, 4);
        assert_eq!(outcome.edges_linked, 3);
        assert_eq!(outcome.edges_skipped, 0);

        let stats = client.status().await.unwrap();
        assert_eq!(stats.nodes, 4);
        assert_eq!(stats.edges, 3);
    }

    #[tokio::test]
    async fn test_blank_identity_skips_entity_and_edges() {
        let client = Arc::new(EmbeddedClient::new());
        let ingestor = Ingestor::new(client.clone(), GraphSchema::healthcare()).unwrap();

        let mut record = smith();
        record.insert("Location", "  ");
        let outcome = ingestor.ingest(&record).await.unwrap();
        assert_eq!(outcome.nodes_merged, 3);
        assert_eq!(outcome.nodes_skipped, 1);
        assert_eq!(outcome.edges_linked, 2);
        assert_eq!(outcome.edges_skipped, 1);
    }

    #[tokio::test]
    async fn test_missing_field_writes_nothing() {
        let client = Arc::new(EmbeddedClient::new());
        let ingestor = Ingestor::new(client.clone(), GraphSchema::healthcare()).unwrap();

        let record = SourceRecord::new().with("Provider", "Dr. Smith");
        let err = ingestor.ingest(&record).await.unwrap_err();
        assert!(matches!(err, IngestError::MissingField { .. }));
        assert!(err.is_fatal());
        assert_eq!(client.status().await.unwrap().nodes, 0);
    }

    #[tokio::test]
    async fn test_batch_continues_past_store_failure() {
        let client = Arc::new(FlakyClient {
            inner: EmbeddedClient::new(),
            calls: AtomicUsize::new(0),
            fail_on: 0,
        });
        let ingestor = Ingestor::new(client.clone(), GraphSchema::healthcare()).unwrap();

        let mut second = smith();
        second.insert("Patient", "Bob");
        let report = ingestor.ingest_batch(vec![smith(), second]).await.unwrap();
        assert_eq!(report.records_failed, 1);
        assert_eq!(report.records_ok, 1);
        assert_eq!(report.failures[0].index, 0);
        assert!(report.failures[0].error.contains("Alice"));
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn test_batch_aborts_under_abort_policy() {
        let client = Arc::new(FlakyClient {
            inner: EmbeddedClient::new(),
            calls: AtomicUsize::new(0),
            fail_on: 0,
        });
        let ingestor = Ingestor::new(client.clone(), GraphSchema::healthcare())
            .unwrap()
            .with_policy(ErrorPolicy::Abort);

        let report = ingestor.ingest_batch(vec![smith(), smith()]).await.unwrap();
        assert_eq!(report.records_failed, 1);
        assert_eq!(report.records_ok, 0);
        assert!(report.aborted);
    }

    #[tokio::test]
    async fn test_batch_returns_fatal_error() {
        let client = Arc::new(EmbeddedClient::new());
        let ingestor = Ingestor::new(client, GraphSchema::healthcare()).unwrap();
        let result = ingestor
            .ingest_batch(vec![smith(), SourceRecord::new()])
            .await;
        assert!(matches!(result, Err(IngestError::MissingField { .. })));
    }

    #[tokio::test]
    async fn test_ingest_all_is_ordered_and_lazy() {
        let client = Arc::new(EmbeddedClient::new());
        let ingestor = Ingestor::new(client.clone(), GraphSchema::healthcare()).unwrap();

        let mut second = smith();
        second.insert("Patient", "Bob");
        let results = ingestor.ingest_all(vec![smith(), second]);
        futures::pin_mut!(results);

        let first = results.next().await.unwrap().unwrap();
        assert_eq!(first.nodes_merged, 4);
        // Only the first record has been written so far
        assert_eq!(client.status().await.unwrap().nodes, 4);

        results.next().await.unwrap().unwrap();
        assert!(results.next().await.is_none());
        assert_eq!(client.status().await.unwrap().nodes, 5);
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let schema = GraphSchema::new("bad").entity(EntitySpec::new("a", "Bad Label", "x"));
        let client: Arc<dyn GraphClient> = Arc::new(EmbeddedClient::new());
        assert!(matches!(
            Ingestor::new(client, schema),
            Err(IngestError::InvalidSchema(_))
        ));
    }
}
