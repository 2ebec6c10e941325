//! Graph schemas: which entities a source record yields and how they connect
//!
//! Labels, relationship types and property keys are spliced into query
//! templates, so `validate` only admits plain identifiers. Record values always
//! travel as parameters.

use super::record::SourceRecord;
use super::{IngestError, IngestResult};
use crate::graph::{is_identifier, EdgeType, Label};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A non-identity property copied from a record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub property: String,
    pub field: String,
}

/// One node type produced per record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Name used by relationships to refer to this entity
    pub alias: String,
    pub label: Label,
    /// Identity property, matched by MERGE
    pub key_property: String,
    /// Record field holding the identity value
    pub key_field: String,
    /// Written with SET on every ingestion
    pub attributes: Vec<AttributeSpec>,
}

impl EntitySpec {
    /// An entity identified by `name`, taken from `key_field`
    pub fn new(alias: &str, label: &str, key_field: &str) -> Self {
        Self {
            alias: alias.to_string(),
            label: Label::new(label),
            key_property: "name".to_string(),
            key_field: key_field.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, property: &str, field: &str) -> Self {
        self.attributes.push(AttributeSpec {
            property: property.to_string(),
            field: field.to_string(),
        });
        self
    }

    /// `MERGE (n:Label {key: $key}) SET n.attr = $attr_<attr>, ...`
    pub fn upsert_template(&self) -> String {
        let mut template = format!(
            "MERGE (n:{} {{{}: $key}})",
            self.label, self.key_property
        );
        for (i, attr) in self.attributes.iter().enumerate() {
            template.push_str(if i == 0 { " SET " } else { ", " });
            template.push_str(&format!("n.{} = ${}", attr.property, attribute_param(&attr.property)));
        }
        template
    }
}

/// Parameter name carrying an attribute value
pub fn attribute_param(property: &str) -> String {
    format!("attr_{}", property)
}

/// A directed relationship between two entities of the same record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub source: String,
    pub edge_type: EdgeType,
    pub target: String,
}

/// Entities and relationships derived from each record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub name: String,
    pub entities: Vec<EntitySpec>,
    pub relationships: Vec<RelationshipSpec>,
}

impl GraphSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entities: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn entity(mut self, entity: EntitySpec) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn relationship(mut self, source: &str, edge_type: &str, target: &str) -> Self {
        self.relationships.push(RelationshipSpec {
            source: source.to_string(),
            edge_type: EdgeType::new(edge_type),
            target: target.to_string(),
        });
        self
    }

    /// Providers, patients, specializations and locations from `healthcare.csv`
    pub fn healthcare() -> Self {
        GraphSchema::new("healthcare")
            .entity(EntitySpec::new("provider", "HealthcareProvider", "Provider").attribute("bio", "Bio"))
            .entity(
                EntitySpec::new("patient", "Patient", "Patient")
                    .attribute("age", "Patient_Age")
                    .attribute("gender", "Patient_Gender")
                    .attribute("condition", "Patient_Condition"),
            )
            .entity(EntitySpec::new("specialization", "Specialization", "Specialization"))
            .entity(EntitySpec::new("location", "Location", "Location"))
            .relationship("provider", "TREATS", "patient")
            .relationship("provider", "SPECIALIZES_IN", "specialization")
            .relationship("provider", "LOCATED_AT", "location")
    }

    /// A laureate with the subject they studied, the prize they won and the
    /// countries they were born and died in
    pub fn laureate() -> Self {
        GraphSchema::new("laureate")
            .entity(EntitySpec::new("person", "Person", "person"))
            .entity(EntitySpec::new("subject", "Subject", "subject"))
            .entity(EntitySpec::new("prize", "NobelPrize", "prize"))
            .entity(EntitySpec::new("birth_country", "Country", "born_in"))
            .entity(EntitySpec::new("death_country", "Country", "died_in"))
            .relationship("person", "STUDIED", "subject")
            .relationship("person", "WON", "prize")
            .relationship("person", "BORN_IN", "birth_country")
            .relationship("person", "DIED_IN", "death_country")
    }

    pub fn find_entity(&self, alias: &str) -> Option<&EntitySpec> {
        self.entities.iter().find(|e| e.alias == alias)
    }

    /// Record fields every record must carry
    pub fn required_fields(&self) -> Vec<&str> {
        let mut fields = IndexSet::new();
        for entity in &self.entities {
            fields.insert(entity.key_field.as_str());
            fields.extend(entity.attributes.iter().map(|a| a.field.as_str()));
        }
        fields.into_iter().collect()
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.entities.is_empty() {
            return Err(IngestError::InvalidSchema(format!(
                "schema '{}' declares no entities",
                self.name
            )));
        }

        let mut aliases = HashSet::new();
        for entity in &self.entities {
            if !aliases.insert(entity.alias.as_str()) {
                return Err(IngestError::InvalidSchema(format!(
                    "duplicate entity alias '{}'",
                    entity.alias
                )));
            }
            check_identifier("label", entity.label.as_str())?;
            check_identifier("property", &entity.key_property)?;
            let mut properties = HashSet::new();
            properties.insert(entity.key_property.as_str());
            for attr in &entity.attributes {
                check_identifier("property", &attr.property)?;
                if !properties.insert(attr.property.as_str()) {
                    return Err(IngestError::InvalidSchema(format!(
                        "property '{}' declared twice on '{}'",
                        attr.property, entity.alias
                    )));
                }
            }
        }

        for rel in &self.relationships {
            check_identifier("relationship type", rel.edge_type.as_str())?;
            for alias in [&rel.source, &rel.target] {
                if self.find_entity(alias).is_none() {
                    return Err(IngestError::InvalidSchema(format!(
                        "relationship {} refers to unknown entity '{}'",
                        rel.edge_type, alias
                    )));
                }
            }
        }
        Ok(())
    }

    /// `MATCH` both endpoints by identity, then `MERGE` the edge.
    ///
    /// Returns `linked = 0` when either endpoint is absent.
    pub fn link_template(&self, rel: &RelationshipSpec) -> IngestResult<String> {
        let source = self.endpoint(&rel.source)?;
        let target = self.endpoint(&rel.target)?;
        Ok(format!(
            "MATCH (a:{} {{{}: $source}}), (b:{} {{{}: $target}}) MERGE (a)-[r:{}]->(b) RETURN count(r) AS linked",
            source.label, source.key_property, target.label, target.key_property, rel.edge_type
        ))
    }

    fn endpoint(&self, alias: &str) -> IngestResult<&EntitySpec> {
        self.find_entity(alias)
            .ok_or_else(|| IngestError::InvalidSchema(format!("unknown entity '{}'", alias)))
    }
}

fn check_identifier(kind: &str, name: &str) -> IngestResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(IngestError::InvalidSchema(format!(
            "{} '{}' is not a plain identifier",
            kind, name
        )))
    }
}

/// The Albert Einstein record for `GraphSchema::laureate`
pub fn laureate_facts() -> SourceRecord {
    SourceRecord::new()
        .with("person", "Albert Einstein")
        .with("subject", "Physics")
        .with("prize", "Nobel Prize in Physics")
        .with("born_in", "Germany")
        .with("died_in", "USA")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;

    #[test]
    fn test_builtin_schemas_validate() {
        GraphSchema::healthcare().validate().unwrap();
        GraphSchema::laureate().validate().unwrap();
    }

    #[test]
    fn test_templates_parse() {
        let schema = GraphSchema::healthcare();
        for entity in &schema.entities {
            let template = entity.upsert_template();
            assert!(parse_query(&template).is_ok(), "{}", template);
        }
        for rel in &schema.relationships {
            let template = schema.link_template(rel).unwrap();
            assert!(parse_query(&template).is_ok(), "{}", template);
        }

        let patient = schema.find_entity("patient").unwrap();
        assert_eq!(
            patient.upsert_template(),
            "MERGE (n:Patient {name: $key}) SET n.age = $attr_age, n.gender = $attr_gender, n.condition = $attr_condition"
        );
        assert_eq!(
            schema.find_entity("location").unwrap().upsert_template(),
            "MERGE (n:Location {name: $key})"
        );
    }

    #[test]
    fn test_validate_rejects_unsafe_names() {
        let schema = GraphSchema::new("bad")
            .entity(EntitySpec::new("a", "Patient", "Patient"))
            .relationship("a", "TREATS]->(x) DETACH DELETE x //", "a");
        assert!(matches!(schema.validate(), Err(IngestError::InvalidSchema(_))));

        let schema = GraphSchema::new("bad").entity(EntitySpec::new("a", "Bad Label", "x"));
        assert!(schema.validate().is_err());

        let schema = GraphSchema::new("bad")
            .entity(EntitySpec::new("a", "Patient", "Patient"))
            .relationship("a", "TREATS", "missing");
        assert!(schema.validate().is_err());

        assert!(GraphSchema::new("empty").validate().is_err());
    }

    #[test]
    fn test_required_fields() {
        let schema = GraphSchema::healthcare();
        let fields = schema.required_fields();
        assert_eq!(fields.len(), 8);
        assert!(fields.contains(&"Patient_Condition"));
        assert_eq!(laureate_facts().get("died_in"), Some(&"USA".into()));
    }

    #[test]
    fn test_required_fields_lists_shared_field_once() {
        let schema = GraphSchema::new("shared")
            .entity(EntitySpec::new("a", "Patient", "Name"))
            .entity(EntitySpec::new("b", "Location", "City"))
            .entity(EntitySpec::new("c", "Person", "Name"));
        assert_eq!(schema.required_fields(), vec!["Name", "City"]);
    }
}
