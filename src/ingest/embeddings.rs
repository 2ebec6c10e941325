//! Provider embeddings: vector index setup and backfill
//!
//! The backfill embeds every provider's `bio` and stores the vector on the
//! indexed property, so similarity queries can rank providers by free text.

use super::{IngestError, IngestResult};
use crate::client::GraphClient;
use crate::embed::EmbeddingProvider;
use crate::graph::{is_identifier, PropertyValue};
use crate::query::Params;
use crate::vector::DistanceMetric;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Where provider embeddings live and how they are compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorIndexSpec {
    pub name: String,
    pub label: String,
    /// Identity property used to write embeddings back
    pub key_property: String,
    /// Property holding the embedding
    pub property: String,
    /// Property holding the text to embed
    pub source_property: String,
    pub dimensions: usize,
    pub similarity: DistanceMetric,
}

impl Default for VectorIndexSpec {
    fn default() -> Self {
        Self {
            name: "health_providers_embeddings".to_string(),
            label: "HealthcareProvider".to_string(),
            key_property: "name".to_string(),
            property: "comprehensiveEmbedding".to_string(),
            source_property: "bio".to_string(),
            dimensions: 1536,
            similarity: DistanceMetric::Cosine,
        }
    }
}

impl VectorIndexSpec {
    pub fn validate(&self) -> Result<(), String> {
        for (what, name) in [
            ("index name", &self.name),
            ("label", &self.label),
            ("key property", &self.key_property),
            ("property", &self.property),
            ("source property", &self.source_property),
        ] {
            if !is_identifier(name) {
                return Err(format!("{} '{}' is not a plain identifier", what, name));
            }
        }
        if self.dimensions == 0 {
            return Err("dimensions must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn create_template(&self) -> String {
        format!(
            "CREATE VECTOR INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.{}) \
             OPTIONS {{indexConfig: {{`vector.dimensions`: {}, `vector.similarity_function`: '{}'}}}}",
            self.name,
            self.label,
            self.property,
            self.dimensions,
            self.similarity.as_str()
        )
    }

    fn pending_template(&self) -> String {
        format!(
            "MATCH (n:{}) WHERE n.{} IS NOT NULL RETURN n.{} AS key, n.{} AS text",
            self.label, self.source_property, self.key_property, self.source_property
        )
    }

    fn store_template(&self) -> String {
        format!(
            "MATCH (n:{} {{{}: $key}}) SET n.{} = $embedding",
            self.label, self.key_property, self.property
        )
    }
}

/// Counts from one backfill run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub embedded: usize,
    pub failed: usize,
    /// Nodes whose key or text was not a string
    pub skipped: usize,
}

/// Create the index unless it already exists
pub async fn ensure_vector_index(client: &dyn GraphClient, spec: &VectorIndexSpec) -> IngestResult<()> {
    spec.validate().map_err(IngestError::InvalidSchema)?;
    let template = spec.create_template();
    client
        .execute(&template, &Params::new())
        .await
        .map_err(|source| IngestError::Store {
            operation: "create vector index".to_string(),
            key: spec.name.clone(),
            source,
        })?;
    info!(index = %spec.name, label = %spec.label, property = %spec.property, "Vector index ready");
    Ok(())
}

/// Embed the source text of every node under `spec.label` and store it
///
/// A node whose embedding or write fails is counted and logged; the run
/// continues with the next node. Only failing to list the nodes is an error.
pub async fn backfill_embeddings(
    client: &dyn GraphClient,
    provider: &dyn EmbeddingProvider,
    spec: &VectorIndexSpec,
) -> IngestResult<BackfillReport> {
    spec.validate().map_err(IngestError::InvalidSchema)?;

    let pending = client
        .execute(&spec.pending_template(), &Params::new())
        .await
        .map_err(|source| IngestError::Store {
            operation: "list nodes to embed".to_string(),
            key: spec.label.clone(),
            source,
        })?;

    let store_template = spec.store_template();
    let mut report = BackfillReport::default();
    for record in &pending.records {
        let (key, text) = match (record.get_str("key"), record.get_str("text")) {
            (Some(key), Some(text)) => (key, text),
            _ => {
                report.skipped += 1;
                continue;
            }
        };

        let embedding = match provider.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(key = %key, error = %e, "Embedding failed");
                report.failed += 1;
                continue;
            }
        };

        let mut params = Params::new();
        params.insert("key".to_string(), key.into());
        params.insert("embedding".to_string(), PropertyValue::Vector(embedding));
        match client.execute(&store_template, &params).await {
            Ok(_) => {
                debug!(key = %key, "Stored embedding");
                report.embedded += 1;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Storing embedding failed");
                report.failed += 1;
            }
        }
    }

    info!(
        embedded = report.embedded,
        failed = report.failed,
        skipped = report.skipped,
        "Embedding backfill finished"
    );
    Ok(report)
}
