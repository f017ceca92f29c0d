//! Free-form, JSON-compatible property values (customer preferences, vehicle metadata).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Keyed bag of properties, ordered by key.
pub type PropertyBag = BTreeMap<String, PropertyValue>;

/// A single property value.
///
/// Serializes as plain JSON, so a bag stored as `JSONB` reads back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(PropertyBag),
}

/// Whole numbers up to 2^53 are written back as JSON integers.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

impl PropertyValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Null => Value::Null,
            PropertyValue::Bool(b) => Value::Bool(b),
            PropertyValue::Number(n) => number_to_json(n),
            PropertyValue::String(s) => Value::String(s),
            PropertyValue::List(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            PropertyValue::Map(bag) => Value::Object(bag_into_object(bag)),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for PropertyValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT_INT {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

fn bag_into_object(bag: PropertyBag) -> Map<String, Value> {
    bag.into_iter().map(|(k, v)| (k, v.into())).collect()
}

/// Build a bag from a JSON object; any other JSON value yields an empty bag.
#[must_use]
pub fn bag_from_json(value: Value) -> PropertyBag {
    match value {
        Value::Object(map) => map.into_iter().map(|(k, v)| (k, v.into())).collect(),
        _ => PropertyBag::new(),
    }
}

/// Render a bag as a JSON object.
#[must_use]
pub fn bag_to_json(bag: &PropertyBag) -> Value {
    Value::Object(bag_into_object(bag.clone()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip_keeps_shape_and_integers() {
        let original = json!({
            "contact": "email",
            "visits": 12,
            "discount": 0.15,
            "vip": true,
            "tags": ["fleet", null],
            "address": { "floor": 3 }
        });

        let bag = bag_from_json(original.clone());
        assert_eq!(bag["visits"], PropertyValue::Number(12.0));
        assert_eq!(bag_to_json(&bag), original);
    }

    #[test]
    fn serde_goes_through_plain_json() {
        let mut bag = PropertyBag::new();
        bag.insert("lang".to_owned(), "es".into());
        bag.insert("count".to_owned(), 2.into());

        let text = serde_json::to_string(&bag).unwrap();
        assert_eq!(text, r#"{"count":2,"lang":"es"}"#);

        let back: PropertyBag = serde_json::from_str(&text).unwrap();
        assert_eq!(back, bag);
    }

    #[test]
    fn non_object_json_is_an_empty_bag() {
        assert!(bag_from_json(json!([1, 2])).is_empty());
        assert!(bag_from_json(Value::Null).is_empty());
    }

    #[test]
    fn non_finite_numbers_become_null() {
        assert_eq!(Value::from(PropertyValue::Number(f64::NAN)), Value::Null);
    }
}
