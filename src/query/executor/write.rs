//! MERGE, SET and CREATE VECTOR INDEX against a mutable store

use super::expression::{evaluate, to_property};
use super::operator::evaluate_properties;
use super::record::{Record, Value};
use super::{ExecutionError, ExecutionResult};
use crate::graph::{GraphStore, NodeId, PropertyMap, PropertyValue};
use crate::query::ast::{CreateVectorIndexClause, Direction, NodePattern, PathPattern, Query, SetItem};
use crate::vector::DistanceMetric;
use tracing::debug;

/// Embedding size assumed when an index definition omits `vector.dimensions`
pub const DEFAULT_VECTOR_DIMENSIONS: usize = 1536;

/// Apply the query's MERGE and SET clauses to each input row.
///
/// Returns the rows as seen after the writes, one per merged match.
pub fn apply_writes(
    store: &mut GraphStore,
    query: &Query,
    rows: Vec<Record>,
) -> ExecutionResult<Vec<Record>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let merged = match &query.merge_clause {
            Some(merge) => merge_path(store, &merge.path, row)?,
            None => vec![row],
        };
        for record in merged {
            for item in &query.set_clauses {
                apply_set(store, &record, item)?;
            }
            out.push(record);
        }
    }
    Ok(out)
}

fn merge_path(
    store: &mut GraphStore,
    path: &PathPattern,
    row: Record,
) -> ExecutionResult<Vec<Record>> {
    if path.segments.is_empty() {
        return merge_node(store, &path.start, row);
    }

    let mut row = row;
    let mut current = bound_endpoint(&row, &path.start)?;
    for segment in &path.segments {
        let next = bound_endpoint(&row, &segment.node)?;
        let edge_type = match segment.edge.types.as_slice() {
            [only] => only.clone(),
            _ => {
                return Err(ExecutionError::PlanningError(
                    "MERGE needs exactly one relationship type".to_string(),
                ))
            }
        };
        let (source, target) = match segment.edge.direction {
            Direction::Incoming => (next, current),
            Direction::Outgoing | Direction::Both => (current, next),
        };

        let properties = evaluate_properties(&segment.edge.properties, &row, store)?;
        reject_nulls(&properties)?;
        let edge_id = if properties.is_empty() {
            let (edge_id, created) = store.merge_edge(source, target, edge_type.clone())?;
            if created {
                debug!("MERGE created {} -[{}]-> {}", source, edge_type, target);
            }
            edge_id
        } else {
            let existing = store
                .get_outgoing_edges(source)
                .into_iter()
                .find(|e| {
                    e.target == target
                        && e.edge_type == edge_type
                        && properties
                            .iter()
                            .all(|(k, v)| e.get_property(k).map(|p| p.matches(v)).unwrap_or(false))
                })
                .map(|e| e.id);
            match existing {
                Some(id) => id,
                None => {
                    let id = store.create_edge(source, target, edge_type)?;
                    for (key, value) in properties {
                        store.set_edge_property(id, key, value)?;
                    }
                    id
                }
            }
        };

        if let Some(var) = &segment.edge.variable {
            row.bind(var.clone(), Value::Edge(edge_id));
        }
        current = next;
    }
    Ok(vec![row])
}

fn merge_node(
    store: &mut GraphStore,
    pattern: &NodePattern,
    row: Record,
) -> ExecutionResult<Vec<Record>> {
    if let Some(var) = &pattern.variable {
        if row.has(var) {
            return Err(ExecutionError::PlanningError(format!(
                "Variable '{}' is already bound and cannot be merged",
                var
            )));
        }
    }

    let properties = evaluate_properties(&pattern.properties, &row, store)?;
    reject_nulls(&properties)?;

    let matches: Vec<NodeId> = match pattern.labels.first() {
        Some(label) => store
            .find_nodes(label, &properties)
            .into_iter()
            .filter(|id| {
                store
                    .get_node(*id)
                    .map(|n| pattern.labels.iter().all(|l| n.has_label(l)))
                    .unwrap_or(false)
            })
            .collect(),
        None => {
            let mut ids: Vec<NodeId> = store
                .all_nodes()
                .into_iter()
                .filter(|n| n.matches_properties(&properties))
                .map(|n| n.id)
                .collect();
            ids.sort();
            ids
        }
    };

    let ids = if matches.is_empty() {
        let id = store.create_node_with_properties(pattern.labels.clone(), properties);
        debug!("MERGE created {}", id);
        vec![id]
    } else {
        matches
    };

    Ok(ids
        .into_iter()
        .map(|id| {
            let mut record = row.clone();
            if let Some(var) = &pattern.variable {
                record.bind(var.clone(), Value::Node(id));
            }
            record
        })
        .collect())
}

fn bound_endpoint(row: &Record, pattern: &NodePattern) -> ExecutionResult<NodeId> {
    let var = pattern.variable.as_deref().ok_or_else(|| {
        ExecutionError::PlanningError(
            "MERGE of a relationship needs named endpoints bound by MATCH".to_string(),
        )
    })?;
    match row.get(var) {
        Some(Value::Node(id)) => Ok(*id),
        Some(other) => Err(ExecutionError::TypeError(format!(
            "'{}' is not a node: {:?}",
            var, other
        ))),
        None => Err(ExecutionError::VariableNotFound(var.to_string())),
    }
}

fn reject_nulls(properties: &PropertyMap) -> ExecutionResult<()> {
    match properties.iter().find(|(_, v)| v.is_null()) {
        Some((key, _)) => Err(ExecutionError::RuntimeError(format!(
            "Cannot merge using null property value for '{}'",
            key
        ))),
        None => Ok(()),
    }
}

fn apply_set(store: &mut GraphStore, record: &Record, item: &SetItem) -> ExecutionResult<()> {
    let target = record
        .get(&item.variable)
        .ok_or_else(|| ExecutionError::VariableNotFound(item.variable.clone()))?
        .clone();
    let value = to_property(evaluate(&item.value, record, store)?)?;
    match target {
        Value::Node(id) => {
            store.set_node_property(id, item.property.clone(), value)?;
        }
        Value::Edge(id) => {
            store.set_edge_property(id, item.property.clone(), value)?;
        }
        Value::Null => {}
        Value::Property(other) => {
            return Err(ExecutionError::TypeError(format!(
                "Cannot set property '{}' on {}",
                item.property,
                other.type_name()
            )))
        }
    }
    Ok(())
}

/// Run `CREATE VECTOR INDEX`; returns whether a new index was built
pub fn create_vector_index(
    store: &mut GraphStore,
    clause: &CreateVectorIndexClause,
) -> ExecutionResult<bool> {
    let name = clause
        .index_name
        .clone()
        .unwrap_or_else(|| format!("{}_{}", clause.label, clause.property_key));

    let options = match &clause.options {
        Some(expr) => to_property(evaluate(expr, &Record::new(), store)?)?,
        None => PropertyValue::Null,
    };
    let config = match &options {
        PropertyValue::Map(map) => map.get("indexConfig").cloned(),
        PropertyValue::Null => None,
        other => {
            return Err(ExecutionError::TypeError(format!(
                "OPTIONS must be a map, got {}",
                other.type_name()
            )))
        }
    };
    let lookup = |key: &str| match &config {
        Some(PropertyValue::Map(map)) => map.get(key).cloned(),
        _ => None,
    };

    let dimensions = match lookup("vector.dimensions") {
        None => DEFAULT_VECTOR_DIMENSIONS,
        Some(value) => match value.as_integer() {
            Some(n) if n > 0 => n as usize,
            _ => {
                return Err(ExecutionError::TypeError(format!(
                    "vector.dimensions must be a positive integer, got {}",
                    value
                )))
            }
        },
    };
    let metric = match lookup("vector.similarity_function") {
        None => DistanceMetric::default(),
        Some(value) => {
            let name = value.as_string().ok_or_else(|| {
                ExecutionError::TypeError("vector.similarity_function must be a string".to_string())
            })?;
            DistanceMetric::parse(name).map_err(crate::graph::GraphError::from)?
        }
    };

    let created = store.create_vector_index(
        &name,
        clause.label.as_str(),
        &clause.property_key,
        dimensions,
        metric,
    )?;
    if !created && !clause.if_not_exists {
        return Err(ExecutionError::RuntimeError(format!(
            "Vector index '{}' already exists",
            name
        )));
    }
    debug!(index = %name, dimensions, created, "vector index ensured");
    Ok(created)
}
