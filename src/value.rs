//! Filter values.
//!
//! `FilterValue` is the closed set of values a predicate fragment can carry.
//! Values stay in this form while selectors are composed and are only turned
//! into SeaQuery `Value`s (and from there into `ToSql` parameters) when a
//! selector is rendered against a statement.

use chrono::{DateTime, Utc};
use sea_query::Value;
use serde::{Deserialize, Serialize};

/// A value bound into a predicate fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl FilterValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null | FilterValue::Json(serde_json::Value::Null))
    }

    /// Convert into the SeaQuery value used for parameter binding.
    ///
    /// JSON values are bound as their serialized text; fragments comparing
    /// against a JSONB column cast the parameter with `::text::jsonb`.
    pub fn to_sea_value(&self) -> Value {
        match self {
            FilterValue::Null => Value::from(Option::<String>::None),
            FilterValue::Bool(b) => Value::from(*b),
            FilterValue::Int(i) => Value::from(*i),
            FilterValue::Float(f) => Value::from(*f),
            FilterValue::Text(s) => Value::from(s.clone()),
            FilterValue::Timestamp(ts) => Value::from(*ts),
            FilterValue::Bytes(b) => Value::from(b.clone()),
            FilterValue::Json(j) => Value::from(j.to_string()),
        }
    }

    /// The JSON representation, used when building JSONB containment documents.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FilterValue::Null => serde_json::Value::Null,
            FilterValue::Bool(b) => serde_json::Value::Bool(*b),
            FilterValue::Int(i) => serde_json::Value::from(*i),
            FilterValue::Float(f) => serde_json::Value::from(*f),
            FilterValue::Text(s) => serde_json::Value::String(s.clone()),
            FilterValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            FilterValue::Bytes(b) => serde_json::Value::Array(
                b.iter().map(|byte| serde_json::Value::from(*byte)).collect(),
            ),
            FilterValue::Json(j) => j.clone(),
        }
    }

    /// The text PostgreSQL's `->>` operator yields for this value when it is
    /// stored as a JSON scalar.
    ///
    /// Returns `None` for null, which `->>` surfaces as SQL `NULL`. Objects
    /// and arrays have no stable text form; compare them with
    /// [`json_document`](Self::json_document) instead.
    pub fn to_text(&self) -> Option<String> {
        match self {
            FilterValue::Null => None,
            FilterValue::Text(s) => Some(s.clone()),
            FilterValue::Timestamp(ts) => Some(ts.to_rfc3339()),
            FilterValue::Json(serde_json::Value::Null) => None,
            FilterValue::Json(serde_json::Value::String(s)) => Some(s.clone()),
            other => Some(other.to_json().to_string()),
        }
    }

    /// The JSON object or array this value stands for, if it is one.
    ///
    /// Such values compare as `jsonb` documents, since `->>` renders them in
    /// jsonb's canonical spacing rather than as they were written.
    pub fn json_document(&self) -> Option<serde_json::Value> {
        use serde_json::Value as Json;

        match self {
            FilterValue::Json(doc @ (Json::Object(_) | Json::Array(_))) => Some(doc.clone()),
            FilterValue::Bytes(_) => Some(self.to_json()),
            _ => None,
        }
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for FilterValue {
    fn from(value: f32) -> Self {
        FilterValue::Float(f64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<&String> for FilterValue {
    fn from(value: &String) -> Self {
        FilterValue::Text(value.clone())
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(value)
    }
}

impl From<Vec<u8>> for FilterValue {
    fn from(value: Vec<u8>) -> Self {
        FilterValue::Bytes(value)
    }
}

impl From<serde_json::Value> for FilterValue {
    fn from(value: serde_json::Value) -> Self {
        FilterValue::Json(value)
    }
}

impl<T> From<Option<T>> for FilterValue
where
    T: Into<FilterValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(FilterValue::Null, Into::into)
    }
}
