//! Named, parameterized read queries
//!
//! The healthcare reporting queries plus the laureate facts. Values are always
//! supplied as parameters; `required` lists the ones a query cannot run without.

use crate::graph::PropertyValue;
use crate::query::Params;
use serde::{Deserialize, Serialize};

/// A fixed query template with a stable name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedQuery {
    pub name: String,
    pub template: String,
    pub required: Vec<String>,
}

impl NamedQuery {
    pub fn new(name: &str, template: &str, required: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            template: template.to_string(),
            required: required.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// A caller-supplied template; the store reports any missing parameter
    pub fn adhoc(template: &str) -> Self {
        Self::new("adhoc", template, &[])
    }

    /// Required parameters absent from `params`
    pub fn missing<'a>(&'a self, params: &Params) -> Vec<&'a str> {
        self.required
            .iter()
            .filter(|name| !params.contains_key(name.as_str()))
            .map(|name| name.as_str())
            .collect()
    }
}

pub const NODE_COUNT: &str = "node_count";
pub const PROVIDER_COUNT: &str = "provider_count";
pub const PROVIDER_NAMES: &str = "provider_names";
pub const PATIENT_NAMES: &str = "patient_names";
pub const SPECIALIZATION_NAMES: &str = "specialization_names";
pub const LOCATION_NAMES: &str = "location_names";
pub const PROVIDER_PATIENTS: &str = "provider_patients";
pub const PROVIDER_SPECIALIZATIONS: &str = "provider_specializations";
pub const PROVIDERS_IN_LOCATION: &str = "providers_in_location";
pub const PATIENTS_BY_SPECIALIZATION: &str = "patients_by_specialization";
pub const PROVIDERS_BY_LOCATION_AND_SPECIALIZATION: &str = "providers_by_location_and_specialization";
pub const PATIENTS_BY_SPECIALIZATION_AND_LOCATION: &str = "patients_by_specialization_and_location";
pub const PATIENTS_BY_CONDITION: &str = "patients_by_condition";
pub const ALL_NAMES: &str = "all_names";
pub const LAUREATE_FACTS: &str = "laureate_facts";

/// Every catalogued query, in report order
pub fn catalog() -> Vec<NamedQuery> {
    vec![
        NamedQuery::new(NODE_COUNT, "MATCH (n) RETURN count(n) AS numberOfNodes", &[]),
        NamedQuery::new(
            PROVIDER_COUNT,
            "MATCH (n:HealthcareProvider) RETURN count(n) AS numberOfProviders",
            &[],
        ),
        NamedQuery::new(
            PROVIDER_NAMES,
            "MATCH (n:HealthcareProvider) RETURN n.name AS ProviderName ORDER BY ProviderName",
            &[],
        ),
        NamedQuery::new(
            PATIENT_NAMES,
            "MATCH (n:Patient) RETURN n.name AS PatientName ORDER BY PatientName LIMIT $limit",
            &["limit"],
        ),
        NamedQuery::new(
            SPECIALIZATION_NAMES,
            "MATCH (n:Specialization) RETURN n.name AS SpecializationName ORDER BY SpecializationName",
            &[],
        ),
        NamedQuery::new(
            LOCATION_NAMES,
            "MATCH (n:Location) RETURN n.name AS LocationName ORDER BY LocationName",
            &[],
        ),
        NamedQuery::new(
            PROVIDER_PATIENTS,
            "MATCH (hp:HealthcareProvider {name: $provider})-[:TREATS]->(p:Patient) \
             RETURN p.name AS PatientName ORDER BY PatientName",
            &["provider"],
        ),
        NamedQuery::new(
            PROVIDER_SPECIALIZATIONS,
            "MATCH (hp:HealthcareProvider {name: $provider})-[:SPECIALIZES_IN]->(s:Specialization) \
             RETURN s.name AS SpecializationName ORDER BY SpecializationName",
            &["provider"],
        ),
        NamedQuery::new(
            PROVIDERS_IN_LOCATION,
            "MATCH (hp:HealthcareProvider)-[:LOCATED_AT]->(l:Location {name: $location}) \
             RETURN hp.name AS ProviderName ORDER BY ProviderName",
            &["location"],
        ),
        NamedQuery::new(
            PATIENTS_BY_SPECIALIZATION,
            "MATCH (p:Patient)<-[:TREATS]-(hp:HealthcareProvider)-[:SPECIALIZES_IN]->(s:Specialization {name: $specialization}) \
             RETURN DISTINCT p.name AS PatientName ORDER BY PatientName",
            &["specialization"],
        ),
        NamedQuery::new(
            PROVIDERS_BY_LOCATION_AND_SPECIALIZATION,
            "MATCH (hp:HealthcareProvider)-[:LOCATED_AT]->(l:Location {name: $location}), \
             (hp)-[:SPECIALIZES_IN]->(s:Specialization {name: $specialization}) \
             RETURN DISTINCT hp.name AS ProviderName ORDER BY ProviderName",
            &["location", "specialization"],
        ),
        NamedQuery::new(
            PATIENTS_BY_SPECIALIZATION_AND_LOCATION,
            "MATCH (hp:HealthcareProvider)-[:SPECIALIZES_IN]->(s:Specialization {name: $specialization}), \
             (hp)-[:LOCATED_AT]->(l:Location {name: $location}), (hp)-[:TREATS]->(p:Patient) \
             RETURN DISTINCT p.name AS PatientName ORDER BY PatientName",
            &["specialization", "location"],
        ),
        NamedQuery::new(
            PATIENTS_BY_CONDITION,
            "MATCH (p:Patient {condition: $condition}) RETURN p.name AS PatientName ORDER BY PatientName",
            &["condition"],
        ),
        NamedQuery::new(ALL_NAMES, "MATCH (n) RETURN n.name AS name ORDER BY name", &[]),
        NamedQuery::new(
            LAUREATE_FACTS,
            "MATCH (p:Person {name: $person})-[r]->(n) \
             RETURN type(r) AS relationship, n.name AS name ORDER BY relationship, name",
            &["person"],
        ),
    ]
}

pub fn find(name: &str) -> Option<NamedQuery> {
    catalog().into_iter().find(|q| q.name == name)
}

/// Parameters used by the healthcare report
pub fn report_params() -> Params {
    let mut params = Params::new();
    params.insert("provider".to_string(), "Dr. Smith".into());
    params.insert("location".to_string(), "Houston".into());
    params.insert("specialization".to_string(), "Cardiology".into());
    params.insert("condition".to_string(), "Migraine".into());
    params.insert("limit".to_string(), PropertyValue::Integer(10));
    params
}
