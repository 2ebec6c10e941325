//! Result models shared by every Graph Store client
//!
//! Values are carried as JSON so embedded and remote results look the same:
//! nodes and relationships become their property maps.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One result row: returned field name to value, in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRecord(pub IndexMap<String, serde_json::Value>);

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: serde_json::Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(|v| v.as_f64())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, serde_json::Value)> for ResultRecord {
    fn from_iter<T: IntoIterator<Item = (String, serde_json::Value)>>(iter: T) -> Self {
        ResultRecord(iter.into_iter().collect())
    }
}

/// Result of executing a query template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Result rows
    pub records: Vec<ResultRecord>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of one column across all rows
    pub fn column(&self, name: &str) -> Vec<&serde_json::Value> {
        self.records.iter().filter_map(|r| r.get(name)).collect()
    }

    /// First value of a column, for single-row results such as counts
    pub fn scalar(&self, name: &str) -> Option<&serde_json::Value> {
        self.records.first().and_then(|r| r.get(name))
    }
}

impl IntoIterator for QueryResult {
    type Item = ResultRecord;
    type IntoIter = std::vec::IntoIter<ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// A node returned by a vector index lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub score: f64,
}

/// Storage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub nodes: u64,
    pub edges: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_keeps_column_order() {
        let record: ResultRecord = vec![
            ("zeta".to_string(), json!(1)),
            ("alpha".to_string(), json!("a")),
        ]
        .into_iter()
        .collect();
        let names: Vec<&String> = record.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"zeta":1,"alpha":"a"}"#);
    }

    #[test]
    fn test_query_result_accessors() {
        let mut row = ResultRecord::new();
        row.insert("numberOfNodes", json!(12));
        let result = QueryResult {
            columns: vec!["numberOfNodes".to_string()],
            records: vec![row],
        };
        assert_eq!(result.scalar("numberOfNodes").and_then(|v| v.as_i64()), Some(12));
        assert_eq!(result.column("missing").len(), 0);
        assert_eq!(result.into_iter().count(), 1);
    }
}
