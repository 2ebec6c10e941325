//! Source records and the healthcare CSV reader

use super::{IngestError, IngestResult};
use crate::graph::PropertyValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One tabular record: named fields to values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRecord(IndexMap<String, PropertyValue>);

impl SourceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `insert`
    pub fn with(mut self, field: &str, value: impl Into<PropertyValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<PropertyValue>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&PropertyValue> {
        self.0.get(field)
    }

    /// The field's value, or `MissingField` when the record lacks it
    pub fn require(&self, field: &str) -> IngestResult<&PropertyValue> {
        self.get(field).ok_or_else(|| IngestError::MissingField {
            field: field.to_string(),
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A row of `healthcare.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthcareRow {
    #[serde(rename = "Provider")]
    pub provider: String,
    #[serde(rename = "Patient")]
    pub patient: String,
    #[serde(rename = "Specialization")]
    pub specialization: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Bio")]
    pub bio: String,
    #[serde(rename = "Patient_Age")]
    pub patient_age: Option<i64>,
    #[serde(rename = "Patient_Gender")]
    pub patient_gender: String,
    #[serde(rename = "Patient_Condition")]
    pub patient_condition: String,
}

impl From<HealthcareRow> for SourceRecord {
    fn from(row: HealthcareRow) -> Self {
        SourceRecord::new()
            .with("Provider", row.provider)
            .with("Patient", row.patient)
            .with("Specialization", row.specialization)
            .with("Location", row.location)
            .with("Bio", row.bio)
            .with("Patient_Age", row.patient_age)
            .with("Patient_Gender", row.patient_gender)
            .with("Patient_Condition", row.patient_condition)
    }
}

/// Read every row of a healthcare CSV file
///
/// Fails on the first malformed row, including a header set that lacks one
/// of the fixed columns.
pub fn read_healthcare_csv(path: impl AsRef<Path>) -> IngestResult<Vec<HealthcareRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// `read_healthcare_csv`, converted to source records
pub fn healthcare_records(path: impl AsRef<Path>) -> IngestResult<Vec<SourceRecord>> {
    Ok(read_healthcare_csv(path)?
        .into_iter()
        .map(SourceRecord::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "Provider,Patient,Specialization,Location,Bio,Patient_Age,Patient_Gender,Patient_Condition\n\
Dr. Smith,Alice,Cardiology,Houston,Heart specialist.,40,F,Migraine\n\
Dr. Jones, Bob ,Dermatology,Dallas,Skin doctor.,,M,Eczema\n";

    #[test]
    fn test_read_healthcare_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();

        let rows = read_healthcare_csv(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].provider, "Dr. Smith");
        assert_eq!(rows[0].patient_age, Some(40));
        assert_eq!(rows[1].patient, "Bob");
        assert_eq!(rows[1].patient_age, None);

        let record = SourceRecord::from(rows[0].clone());
        assert_eq!(record.len(), 8);
        assert_eq!(record.get("Patient_Condition"), Some(&"Migraine".into()));
        assert_eq!(record.get("Patient_Age"), Some(&PropertyValue::Integer(40)));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Provider,Patient\nDr. Smith,Alice\n").unwrap();
        assert!(matches!(
            read_healthcare_csv(file.path()),
            Err(IngestError::Csv(_))
        ));
    }

    #[test]
    fn test_require() {
        let record = SourceRecord::new().with("Provider", "Dr. Smith");
        assert!(record.require("Provider").is_ok());
        assert!(matches!(
            record.require("Location"),
            Err(IngestError::MissingField { field }) if field == "Location"
        ));
    }
}
