//! Property values carried by nodes and edges, and by query parameters

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A typed property value
///
/// `Vector` holds embeddings; it is kept apart from `Array` so vector
/// indexes can pick it up without inspecting list contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Vector(Vec<f32>),
    Array(Vec<PropertyValue>),
    Map(HashMap<String, PropertyValue>),
    Null,
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view: integers widen to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(f) => Some(*f),
            PropertyValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Vector view: a `Vector`, or an `Array` made only of numbers
    pub fn as_vector(&self) -> Option<Vec<f32>> {
        match self {
            PropertyValue::Vector(v) => Some(v.clone()),
            PropertyValue::Array(items) => items
                .iter()
                .map(|item| item.as_float().map(|f| f as f32))
                .collect(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "String",
            PropertyValue::Integer(_) => "Integer",
            PropertyValue::Float(_) => "Float",
            PropertyValue::Boolean(_) => "Boolean",
            PropertyValue::Vector(_) => "Vector",
            PropertyValue::Array(_) => "Array",
            PropertyValue::Map(_) => "Map",
            PropertyValue::Null => "Null",
        }
    }

    /// Equality as a query sees it: `30 = 30.0` holds, `null = x` never does
    pub fn matches(&self, other: &PropertyValue) -> bool {
        match (self, other) {
            (PropertyValue::Null, _) | (_, PropertyValue::Null) => false,
            (PropertyValue::Integer(a), PropertyValue::Float(b))
            | (PropertyValue::Float(b), PropertyValue::Integer(a)) => (*a as f64) == *b,
            (PropertyValue::Vector(_), PropertyValue::Array(_))
            | (PropertyValue::Array(_), PropertyValue::Vector(_)) => {
                self.as_vector() == other.as_vector()
            }
            _ => self == other,
        }
    }

    /// Ordering between comparable values; `None` for mixed or unordered types
    pub fn compare(&self, other: &PropertyValue) -> Option<Ordering> {
        match (self, other) {
            (PropertyValue::String(a), PropertyValue::String(b)) => Some(a.cmp(b)),
            (PropertyValue::Boolean(a), PropertyValue::Boolean(b)) => Some(a.cmp(b)),
            (PropertyValue::Integer(a), PropertyValue::Integer(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// Convert into a JSON value for result records
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::String(s) => serde_json::Value::String(s.clone()),
            PropertyValue::Integer(i) => serde_json::Value::from(*i),
            PropertyValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PropertyValue::Boolean(b) => serde_json::Value::Bool(*b),
            PropertyValue::Vector(v) => serde_json::Value::Array(
                v.iter()
                    .map(|f| {
                        serde_json::Number::from_f64(*f as f64)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null)
                    })
                    .collect(),
            ),
            PropertyValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json()).collect())
            }
            PropertyValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            PropertyValue::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "\"{}\"", s),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Float(fl) => write!(f, "{}", fl),
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Vector(v) => write!(f, "<vector dim={}>", v.len()),
            PropertyValue::Array(arr) => {
                write!(f, "[")?;
                for (i, val) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", val)?;
                }
                write!(f, "]")
            }
            PropertyValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, val)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, val)?;
                }
                write!(f, "}}")
            }
            PropertyValue::Null => write!(f, "null"),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Integer(i as i64)
    }
}

impl From<u32> for PropertyValue {
    fn from(i: u32) -> Self {
        PropertyValue::Integer(i as i64)
    }
}

impl From<usize> for PropertyValue {
    fn from(i: usize) -> Self {
        PropertyValue::Integer(i as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<Vec<f32>> for PropertyValue {
    fn from(v: Vec<f32>) -> Self {
        PropertyValue::Vector(v)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(arr: Vec<PropertyValue>) -> Self {
        PropertyValue::Array(arr)
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(PropertyValue::Null)
    }
}

/// Property map for node and edge properties
pub type PropertyMap = HashMap<String, PropertyValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_widens_numbers() {
        assert!(PropertyValue::Integer(40).matches(&PropertyValue::Float(40.0)));
        assert!(PropertyValue::from("Houston").matches(&"Houston".into()));
        assert!(!PropertyValue::from("Houston").matches(&"Dallas".into()));
        assert!(!PropertyValue::Null.matches(&PropertyValue::Null));
    }

    #[test]
    fn test_compare() {
        let a: PropertyValue = "Alice".into();
        let b: PropertyValue = "Bob".into();
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(
            PropertyValue::Float(0.9).compare(&PropertyValue::Integer(1)),
            Some(Ordering::Less)
        );
        assert_eq!(a.compare(&PropertyValue::Integer(1)), None);
    }

    #[test]
    fn test_as_vector_from_numeric_array() {
        let arr = PropertyValue::Array(vec![1i64.into(), 0.5.into()]);
        assert_eq!(arr.as_vector(), Some(vec![1.0, 0.5]));

        let mixed = PropertyValue::Array(vec![1i64.into(), "x".into()]);
        assert_eq!(mixed.as_vector(), None);
    }

    #[test]
    fn test_to_json() {
        let mut map = HashMap::new();
        map.insert("name".to_string(), PropertyValue::from("Dr. Smith"));
        let json = PropertyValue::Map(map).to_json();
        assert_eq!(json["name"], "Dr. Smith");

        assert_eq!(PropertyValue::Integer(3).to_json(), serde_json::json!(3));
        assert_eq!(PropertyValue::Null.to_json(), serde_json::Value::Null);
        assert_eq!(PropertyValue::from(None::<i64>), PropertyValue::Null);
    }
}
