//! Conjunctive traversal queries over the healthcare graph
//!
//! Every constraint adds a pattern anchored on the same `hp` provider node, so
//! a provider matches only when all of them hold at once.

use crate::query::Params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalTarget {
    Providers,
    Patients,
}

impl TraversalTarget {
    /// Name of the single returned column
    pub fn column(&self) -> &'static str {
        match self {
            TraversalTarget::Providers => "ProviderName",
            TraversalTarget::Patients => "PatientName",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traversal {
    pub target: TraversalTarget,
    pub provider: Option<String>,
    pub location: Option<String>,
    pub specialization: Option<String>,
    pub condition: Option<String>,
    pub limit: Option<usize>,
}

impl Traversal {
    pub fn new(target: TraversalTarget) -> Self {
        Self {
            target,
            provider: None,
            location: None,
            specialization: None,
            condition: None,
            limit: None,
        }
    }

    pub fn providers() -> Self {
        Self::new(TraversalTarget::Providers)
    }

    pub fn patients() -> Self {
        Self::new(TraversalTarget::Patients)
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.provider = Some(name.into());
        self
    }

    pub fn location(mut self, name: impl Into<String>) -> Self {
        self.location = Some(name.into());
        self
    }

    pub fn specialization(mut self, name: impl Into<String>) -> Self {
        self.specialization = Some(name.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn needs_provider(&self) -> bool {
        self.target == TraversalTarget::Providers
            || self.provider.is_some()
            || self.location.is_some()
            || self.specialization.is_some()
    }

    fn needs_patient(&self) -> bool {
        self.target == TraversalTarget::Patients || self.condition.is_some()
    }

    /// Query template for this traversal
    pub fn template(&self) -> String {
        let provider = if self.provider.is_some() {
            "(hp:HealthcareProvider {name: $provider})"
        } else {
            "(hp:HealthcareProvider)"
        };
        let patient = if self.condition.is_some() {
            "(p:Patient {condition: $condition})"
        } else {
            "(p:Patient)"
        };

        let mut patterns = Vec::new();
        match (self.needs_provider(), self.needs_patient()) {
            (true, true) => patterns.push(format!("{}-[:TREATS]->{}", provider, patient)),
            (true, false) => patterns.push(provider.to_string()),
            (false, _) => patterns.push(patient.to_string()),
        }
        if self.location.is_some() {
            patterns.push("(hp)-[:LOCATED_AT]->(:Location {name: $location})".to_string());
        }
        if self.specialization.is_some() {
            patterns.push("(hp)-[:SPECIALIZES_IN]->(:Specialization {name: $specialization})".to_string());
        }

        let variable = match self.target {
            TraversalTarget::Providers => "hp",
            TraversalTarget::Patients => "p",
        };
        let column = self.target.column();
        let mut template = format!(
            "MATCH {} RETURN DISTINCT {}.name AS {} ORDER BY {}",
            patterns.join(", "),
            variable,
            column,
            column
        );
        if self.limit.is_some() {
            template.push_str(" LIMIT $limit");
        }
        template
    }

    pub fn params(&self) -> Params {
        let mut params = Params::new();
        for (name, value) in [
            ("provider", &self.provider),
            ("location", &self.location),
            ("specialization", &self.specialization),
            ("condition", &self.condition),
        ] {
            if let Some(value) = value {
                params.insert(name.to_string(), value.as_str().into());
            }
        }
        if let Some(limit) = self.limit {
            params.insert("limit".to_string(), limit.into());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;
    use crate::query::parse_query;

    #[test]
    fn test_conjunctive_template() {
        let traversal = Traversal::providers()
            .location("Houston")
            .specialization("Cardiology");
        assert_eq!(
            traversal.template(),
            "MATCH (hp:HealthcareProvider), (hp)-[:LOCATED_AT]->(:Location {name: $location}), \
             (hp)-[:SPECIALIZES_IN]->(:Specialization {name: $specialization}) \
             RETURN DISTINCT hp.name AS ProviderName ORDER BY ProviderName"
        );
        let params = traversal.params();
        assert_eq!(params.len(), 2);
        assert_eq!(params["location"], PropertyValue::from("Houston"));
    }

    #[test]
    fn test_patients_by_condition_starts_at_patient() {
        let traversal = Traversal::patients().condition("Migraine");
        assert_eq!(
            traversal.template(),
            "MATCH (p:Patient {condition: $condition}) RETURN DISTINCT p.name AS PatientName ORDER BY PatientName"
        );
    }

    #[test]
    fn test_every_combination_parses() {
        for bits in 0..32u8 {
            let mut traversal = if bits & 1 == 0 {
                Traversal::providers()
            } else {
                Traversal::patients()
            };
            if bits & 2 != 0 {
                traversal = traversal.provider("Dr. Smith");
            }
            if bits & 4 != 0 {
                traversal = traversal.location("Houston");
            }
            if bits & 8 != 0 {
                traversal = traversal.specialization("Cardiology");
            }
            if bits & 16 != 0 {
                traversal = traversal.condition("Migraine").limit(5);
            }
            let template = traversal.template();
            assert!(parse_query(&template).is_ok(), "{}", template);
        }
    }
}
