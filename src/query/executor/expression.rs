//! Expression evaluation against a record

use super::record::{Record, Value};
use super::{ExecutionError, ExecutionResult};
use crate::graph::{GraphStore, PropertyValue};
use crate::query::ast::{BinaryOp, Expression, UnaryOp};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Evaluate a non-aggregate expression
pub fn evaluate(expr: &Expression, record: &Record, store: &GraphStore) -> ExecutionResult<Value> {
    match expr {
        Expression::Literal(value) => Ok(Value::from_property(value.clone())),
        Expression::Parameter(name) => Err(ExecutionError::MissingParameter(name.clone())),
        Expression::Variable(name) => record
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutionError::VariableNotFound(name.clone())),
        Expression::Property { variable, property } => {
            let target = record
                .get(variable)
                .ok_or_else(|| ExecutionError::VariableNotFound(variable.clone()))?;
            match target {
                Value::Null => Ok(Value::Null),
                Value::Node(_) | Value::Edge(_) | Value::Property(PropertyValue::Map(_)) => {
                    Ok(Value::from_property(target.resolve_property(property, store)))
                }
                Value::Property(other) => Err(ExecutionError::TypeError(format!(
                    "Cannot read property '{}' of {}",
                    property,
                    other.type_name()
                ))),
            }
        }
        Expression::List(items) => {
            let values = items
                .iter()
                .map(|item| evaluate(item, record, store).and_then(to_property))
                .collect::<ExecutionResult<Vec<_>>>()?;
            Ok(Value::Property(PropertyValue::Array(values)))
        }
        Expression::Map(entries) => {
            let mut map = HashMap::new();
            for (key, item) in entries {
                map.insert(key.clone(), to_property(evaluate(item, record, store)?)?);
            }
            Ok(Value::Property(PropertyValue::Map(map)))
        }
        Expression::Function { name, args, .. } => {
            if expr.is_aggregate() {
                return Err(ExecutionError::PlanningError(format!(
                    "Aggregate {}() is only allowed as a RETURN item",
                    name
                )));
            }
            let values = args
                .iter()
                .map(|arg| evaluate(arg, record, store))
                .collect::<ExecutionResult<Vec<_>>>()?;
            call_function(name, values, store)
        }
        Expression::CountStar => Err(ExecutionError::PlanningError(
            "count(*) is only allowed as a RETURN item".to_string(),
        )),
        Expression::Binary { left, op, right } => {
            let left = evaluate(left, record, store)?;
            // AND / OR evaluate both sides; there are no side effects to skip
            let right = evaluate(right, record, store)?;
            evaluate_binary(*op, &left, &right)
        }
        Expression::Unary { op, expr } => {
            let value = evaluate(expr, record, store)?;
            match op {
                UnaryOp::IsNull => Ok(boolean(value.is_null())),
                UnaryOp::IsNotNull => Ok(boolean(!value.is_null())),
                UnaryOp::Not => Ok(match truth(&value)? {
                    Some(b) => boolean(!b),
                    None => Value::Null,
                }),
            }
        }
    }
}

/// Evaluate a predicate; only `true` passes (null and false filter the row out)
pub fn is_true(expr: &Expression, record: &Record, store: &GraphStore) -> ExecutionResult<bool> {
    Ok(truth(&evaluate(expr, record, store)?)? == Some(true))
}

/// Convert to a storable property value; nodes and edges are rejected
pub fn to_property(value: Value) -> ExecutionResult<PropertyValue> {
    match value {
        Value::Property(p) => Ok(p),
        Value::Null => Ok(PropertyValue::Null),
        Value::Node(id) => Err(ExecutionError::TypeError(format!(
            "Node {} cannot be used as a property value",
            id
        ))),
        Value::Edge(id) => Err(ExecutionError::TypeError(format!(
            "Edge {} cannot be used as a property value",
            id
        ))),
    }
}

/// Ordering used by ORDER BY: nulls sort last, mixed types by type name
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Property(x), Value::Property(y)) => x
            .compare(y)
            .unwrap_or_else(|| x.type_name().cmp(y.type_name())),
        (Value::Node(x), Value::Node(y)) => x.cmp(y),
        (Value::Edge(x), Value::Edge(y)) => x.cmp(y),
        _ => a.key().cmp(&b.key()),
    }
}

fn boolean(b: bool) -> Value {
    Value::Property(PropertyValue::Boolean(b))
}

fn truth(value: &Value) -> ExecutionResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Property(PropertyValue::Boolean(b)) => Ok(Some(*b)),
        other => Err(ExecutionError::TypeError(format!(
            "Expected a boolean, found {:?}",
            other
        ))),
    }
}

fn evaluate_binary(op: BinaryOp, left: &Value, right: &Value) -> ExecutionResult<Value> {
    match op {
        BinaryOp::And => Ok(match (truth(left)?, truth(right)?) {
            (Some(false), _) | (_, Some(false)) => boolean(false),
            (Some(true), Some(true)) => boolean(true),
            _ => Value::Null,
        }),
        BinaryOp::Or => Ok(match (truth(left)?, truth(right)?) {
            (Some(true), _) | (_, Some(true)) => boolean(true),
            (Some(false), Some(false)) => boolean(false),
            _ => Value::Null,
        }),
        _ if left.is_null() || right.is_null() => Ok(Value::Null),
        BinaryOp::Eq => Ok(boolean(values_equal(left, right))),
        BinaryOp::Ne => Ok(boolean(!values_equal(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::Property(a), Value::Property(b)) => a.compare(b),
                _ => None,
            };
            Ok(match ordering {
                Some(ord) => boolean(match op {
                    BinaryOp::Lt => ord == Ordering::Less,
                    BinaryOp::Le => ord != Ordering::Greater,
                    BinaryOp::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }),
                None => Value::Null,
            })
        }
        BinaryOp::Contains | BinaryOp::StartsWith | BinaryOp::EndsWith => {
            let (Some(haystack), Some(needle)) = (as_str(left), as_str(right)) else {
                return Ok(Value::Null);
            };
            Ok(boolean(match op {
                BinaryOp::Contains => haystack.contains(needle),
                BinaryOp::StartsWith => haystack.starts_with(needle),
                _ => haystack.ends_with(needle),
            }))
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Property(a), Value::Property(b)) => a.matches(b),
        (Value::Node(a), Value::Node(b)) => a == b,
        (Value::Edge(a), Value::Edge(b)) => a == b,
        _ => false,
    }
}

fn as_str(value: &Value) -> Option<&str> {
    value.as_property().and_then(|p| p.as_string())
}

fn call_function(name: &str, args: Vec<Value>, store: &GraphStore) -> ExecutionResult<Value> {
    let lowered = name.to_ascii_lowercase();
    let arity = |n: usize| -> ExecutionResult<()> {
        if args.len() != n {
            return Err(ExecutionError::TypeError(format!(
                "{}() takes {} argument(s), got {}",
                name,
                n,
                args.len()
            )));
        }
        Ok(())
    };

    match lowered.as_str() {
        "coalesce" => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
        "type" => {
            arity(1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Edge(id) => Ok(store
                    .get_edge(*id)
                    .map(|e| Value::Property(e.edge_type.as_str().into()))
                    .unwrap_or(Value::Null)),
                other => Err(ExecutionError::TypeError(format!(
                    "type() expects a relationship, found {:?}",
                    other
                ))),
            }
        }
        "properties" => {
            arity(1)?;
            let properties = match &args[0] {
                Value::Null => return Ok(Value::Null),
                Value::Node(id) => store.get_node(*id).map(|n| n.properties.clone()),
                Value::Edge(id) => store.get_edge(*id).map(|e| e.properties.clone()),
                Value::Property(PropertyValue::Map(map)) => Some(map.clone()),
                other => {
                    return Err(ExecutionError::TypeError(format!(
                        "properties() expects a node, relationship or map, found {:?}",
                        other
                    )))
                }
            };
            Ok(properties
                .map(|p| Value::Property(PropertyValue::Map(p)))
                .unwrap_or(Value::Null))
        }
        "labels" => {
            arity(1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Node(id) => Ok(store
                    .get_node(*id)
                    .map(|n| {
                        Value::Property(PropertyValue::Array(
                            n.labels.iter().map(|l| l.as_str().into()).collect(),
                        ))
                    })
                    .unwrap_or(Value::Null)),
                other => Err(ExecutionError::TypeError(format!(
                    "labels() expects a node, found {:?}",
                    other
                ))),
            }
        }
        "id" => {
            arity(1)?;
            match &args[0] {
                Value::Node(id) => Ok(Value::Property((id.as_u64() as i64).into())),
                Value::Edge(id) => Ok(Value::Property((id.as_u64() as i64).into())),
                Value::Null => Ok(Value::Null),
                other => Err(ExecutionError::TypeError(format!(
                    "id() expects a node or relationship, found {:?}",
                    other
                ))),
            }
        }
        "tolower" | "toupper" => {
            arity(1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Property(PropertyValue::String(s)) => {
                    let converted = if lowered == "tolower" {
                        s.to_lowercase()
                    } else {
                        s.to_uppercase()
                    };
                    Ok(Value::Property(converted.into()))
                }
                other => Err(ExecutionError::TypeError(format!(
                    "{}() expects a string, found {:?}",
                    name, other
                ))),
            }
        }
        "tostring" => {
            arity(1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Property(PropertyValue::String(s)) => Ok(Value::Property(s.clone().into())),
                Value::Property(p) => Ok(Value::Property(p.to_string().into())),
                other => Err(ExecutionError::TypeError(format!(
                    "toString() cannot convert {:?}",
                    other
                ))),
            }
        }
        "size" => {
            arity(1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Property(PropertyValue::String(s)) => {
                    Ok(Value::Property(s.chars().count().into()))
                }
                Value::Property(PropertyValue::Array(items)) => Ok(Value::Property(items.len().into())),
                Value::Property(PropertyValue::Vector(items)) => {
                    Ok(Value::Property(items.len().into()))
                }
                other => Err(ExecutionError::TypeError(format!(
                    "size() expects a string or list, found {:?}",
                    other
                ))),
            }
        }
        _ => Err(ExecutionError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;

    fn where_predicate(text: &str) -> Expression {
        parse_query(&format!("MATCH (n) WHERE {} RETURN n", text))
            .unwrap()
            .where_clause
            .unwrap()
            .predicate
    }

    #[test]
    fn test_three_valued_logic() {
        let store = GraphStore::new();
        let record = Record::new();
        assert!(!is_true(&where_predicate("null = 1"), &record, &store).unwrap());
        assert!(!is_true(&where_predicate("NOT (null = 1)"), &record, &store).unwrap());
        assert!(is_true(&where_predicate("null = 1 OR true"), &record, &store).unwrap());
        assert!(!is_true(&where_predicate("null = 1 AND true"), &record, &store).unwrap());
        assert!(is_true(&where_predicate("null IS NULL"), &record, &store).unwrap());
        assert!(is_true(&where_predicate("1 = 1.0"), &record, &store).unwrap());
    }

    #[test]
    fn test_property_access_and_functions() {
        let mut store = GraphStore::new();
        let a = store.create_node("HealthcareProvider");
        store.set_node_property(a, "name", "Dr. Smith").unwrap();
        let b = store.create_node("Patient");
        let edge = store.create_edge(a, b, "TREATS").unwrap();

        let mut record = Record::new();
        record.bind("hp", Value::Node(a));
        record.bind("r", Value::Edge(edge));

        let query = parse_query(
            "MATCH (n) RETURN toUpper(hp.name), type(r), hp.missing, properties(hp), coalesce(hp.missing, 'x')",
        )
        .unwrap();
        let items = query.return_clause.unwrap().items;
        let eval = |i: usize| evaluate(&items[i].expression, &record, &store).unwrap();

        assert_eq!(eval(0), Value::Property("DR. SMITH".into()));
        assert_eq!(eval(1), Value::Property("TREATS".into()));
        assert_eq!(eval(2), Value::Null);
        assert_eq!(eval(3).to_json(&store)["name"], "Dr. Smith");
        assert_eq!(eval(4), Value::Property("x".into()));
    }

    #[test]
    fn test_errors() {
        let store = GraphStore::new();
        let record = Record::new();
        let unknown = Expression::Function {
            name: "frobnicate".to_string(),
            args: vec![],
            distinct: false,
        };
        assert!(matches!(
            evaluate(&unknown, &record, &store),
            Err(ExecutionError::UnknownFunction(_))
        ));
        assert!(matches!(
            evaluate(&Expression::Variable("x".to_string()), &record, &store),
            Err(ExecutionError::VariableNotFound(_))
        ));
        assert!(matches!(
            evaluate(&Expression::Parameter("p".to_string()), &record, &store),
            Err(ExecutionError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_compare_values_puts_nulls_last() {
        let one = Value::Property(1i64.into());
        let two = Value::Property(2.5.into());
        assert_eq!(compare_values(&one, &two), Ordering::Less);
        assert_eq!(compare_values(&Value::Null, &one), Ordering::Greater);
    }
}
