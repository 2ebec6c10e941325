//! Neo4jClient: remote Graph Store over Bolt (`neo4rs`)

use async_trait::async_trait;
use neo4rs::{query, BoltNull, BoltType, ConfigBuilder, Graph};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::client::{ClientError, ClientResult, GraphClient, QueryResult, ResultRecord, StorageStats};
use crate::config::Neo4jConfig;
use crate::graph::PropertyValue;
use crate::query::{parse_query, Params};

/// Client for a Neo4j (or Aura) database.
///
/// `neo4rs` pools connections internally; each `execute` runs as its own
/// auto-commit transaction.
pub struct Neo4jClient {
    graph: Graph,
    database: String,
}

impl Neo4jClient {
    /// Connect using the configured URI, credentials and database
    pub async fn connect(config: &Neo4jConfig) -> ClientResult<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.username.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        info!(uri = %config.uri, database = %config.database, "Connected to Neo4j");
        Ok(Self {
            graph,
            database: config.database.clone(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

/// Convert a parameter value into its Bolt form
pub fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::String(s) => s.clone().into(),
        PropertyValue::Integer(i) => (*i).into(),
        PropertyValue::Float(f) => (*f).into(),
        PropertyValue::Boolean(b) => (*b).into(),
        PropertyValue::Vector(v) => v.iter().map(|f| *f as f64).collect::<Vec<f64>>().into(),
        PropertyValue::Array(items) => items.iter().map(to_bolt).collect::<Vec<BoltType>>().into(),
        PropertyValue::Map(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), to_bolt(v)))
            .collect::<HashMap<String, BoltType>>()
            .into(),
        PropertyValue::Null => BoltType::Null(BoltNull),
    }
}

/// Result columns in template order, when the template is in the parsed subset
fn template_columns(template: &str) -> Option<Vec<String>> {
    parse_query(template).ok().map(|q| q.return_columns())
}

#[async_trait]
impl GraphClient for Neo4jClient {
    async fn execute(&self, template: &str, params: &Params) -> ClientResult<QueryResult> {
        let mut q = query(template);
        for (name, value) in params {
            q = q.param(name.as_str(), to_bolt(value));
        }

        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| ClientError::Query(e.to_string()))?;

        let columns = template_columns(template);
        let mut records = Vec::new();
        let mut seen_columns: Vec<String> = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?
        {
            let record: ResultRecord = match &columns {
                Some(columns) => columns
                    .iter()
                    .map(|col| {
                        row.get::<serde_json::Value>(col)
                            .map(|v| (col.clone(), v))
                            .map_err(|e| ClientError::Conversion(format!("{}: {}", col, e)))
                    })
                    .collect::<ClientResult<ResultRecord>>()?,
                None => row
                    .to::<BTreeMap<String, serde_json::Value>>()
                    .map_err(|e| ClientError::Conversion(e.to_string()))?
                    .into_iter()
                    .collect(),
            };
            if seen_columns.is_empty() {
                seen_columns = record.fields().map(|(k, _)| k.clone()).collect();
            }
            records.push(record);
        }

        debug!(rows = records.len(), "Neo4j query completed");
        Ok(QueryResult {
            columns: columns.unwrap_or(seen_columns),
            records,
        })
    }

    async fn status(&self) -> ClientResult<StorageStats> {
        let nodes = self
            .execute("MATCH (n) RETURN count(n) AS nodes", &Params::new())
            .await?
            .scalar("nodes")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let edges = self
            .execute("MATCH ()-[r]->() RETURN count(r) AS edges", &Params::new())
            .await?
            .scalar("edges")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        Ok(StorageStats { nodes, edges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_columns() {
        assert_eq!(
            template_columns("MATCH (n) RETURN count(n) as numberOfNodes"),
            Some(vec!["numberOfNodes".to_string()])
        );
        assert_eq!(
            template_columns(
                "CALL db.index.vector.queryNodes('idx', 3, $v) YIELD node AS hp, score RETURN hp.name, hp.bio, score"
            ),
            Some(vec!["hp.name".to_string(), "hp.bio".to_string(), "score".to_string()])
        );
        assert_eq!(template_columns("SHOW INDEXES"), None);
    }

    #[test]
    fn test_to_bolt() {
        assert!(matches!(to_bolt(&PropertyValue::Null), BoltType::Null(_)));
        assert!(matches!(to_bolt(&"Houston".into()), BoltType::String(_)));
        assert!(matches!(to_bolt(&PropertyValue::Integer(3)), BoltType::Integer(_)));
        assert!(matches!(
            to_bolt(&PropertyValue::Vector(vec![0.5, 0.25])),
            BoltType::List(_)
        ));
    }
}
