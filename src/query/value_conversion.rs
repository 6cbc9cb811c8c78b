//! Value conversion utilities for SeaQuery to may_postgres.
//!
//! This module provides functions to convert SeaQuery `Value` enums into
//! `ToSql` trait objects that can be used with `may_postgres` queries.
//!
//! The conversion follows a two-pass pattern:
//! 1. First pass: convert every value into an owned, typed parameter
//! 2. Second pass: borrow each stored parameter as `&dyn ToSql`
//!
//! This pattern ensures that references remain valid within the closure scope.

use crate::executor::LifeError;
use chrono::{DateTime, Utc};
use may_postgres::types::ToSql;
use sea_query::Value;

/// An owned parameter. NULLs keep their SQL type so the driver's type
/// check accepts them for the column they are compared against.
#[derive(Debug, Clone, PartialEq)]
enum Param {
    Bool(Option<bool>),
    Int(Option<i32>),
    BigInt(Option<i64>),
    Float(Option<f32>),
    Double(Option<f64>),
    Text(Option<String>),
    Bytes(Option<Vec<u8>>),
    Timestamp(Option<DateTime<Utc>>),
}

impl Param {
    fn from_value(value: &Value) -> Result<Self, LifeError> {
        let param = match value {
            Value::Bool(b) => Param::Bool(*b),
            Value::TinyInt(i) => Param::Int(i.map(i32::from)),
            Value::SmallInt(i) => Param::Int(i.map(i32::from)),
            Value::Int(i) => Param::Int(*i),
            Value::BigInt(i) => Param::BigInt(*i),
            Value::TinyUnsigned(u) => Param::Int(u.map(i32::from)),
            Value::SmallUnsigned(u) => Param::Int(u.map(i32::from)),
            Value::Unsigned(u) => Param::BigInt(u.map(i64::from)),
            Value::BigUnsigned(u) => match u {
                Some(u) => Param::BigInt(Some(i64::try_from(*u).map_err(|_| {
                    LifeError::Other(format!(
                        "BigUnsigned value {u} exceeds i64::MAX ({}), cannot be safely cast to i64",
                        i64::MAX
                    ))
                })?)),
                None => Param::BigInt(None),
            },
            Value::Float(f) => Param::Float(*f),
            Value::Double(d) => Param::Double(*d),
            Value::String(s) => Param::Text(s.as_ref().map(|s| s.to_string())),
            Value::Bytes(b) => Param::Bytes(b.as_ref().map(|b| b.to_vec())),
            Value::ChronoDateTimeUtc(ts) => {
                Param::Timestamp(ts.as_ref().map(|ts| DateTime::<Utc>::clone(ts)))
            }
            Value::Json(Some(j)) => Param::Text(Some(serde_json::to_string(&**j).map_err(|e| {
                LifeError::Other(format!("Failed to serialize JSON: {e}"))
            })?)),
            Value::Json(None) => Param::Text(None),
            _ => {
                return Err(LifeError::Other(format!(
                    "Unsupported value type in query: {value:?}"
                )));
            }
        };
        Ok(param)
    }

    fn as_sql(&self) -> &dyn ToSql {
        match self {
            Param::Bool(v) => v as &dyn ToSql,
            Param::Int(v) => v as &dyn ToSql,
            Param::BigInt(v) => v as &dyn ToSql,
            Param::Float(v) => v as &dyn ToSql,
            Param::Double(v) => v as &dyn ToSql,
            Param::Text(v) => v as &dyn ToSql,
            Param::Bytes(v) => v as &dyn ToSql,
            Param::Timestamp(v) => v as &dyn ToSql,
        }
    }
}

/// Convert SeaQuery values to may_postgres ToSql parameters.
///
/// Converts `values` into `ToSql` trait objects, then executes `f` with the
/// converted parameters. The references handed to `f` are only valid for the
/// duration of the call.
///
/// # Errors
///
/// Returns `LifeError::Other` if an unsupported value type is encountered,
/// otherwise whatever `f` returns.
pub fn with_converted_params<F, R>(values: &sea_query::Values, f: F) -> Result<R, LifeError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, LifeError>,
{
    let owned = values
        .0
        .iter()
        .map(Param::from_value)
        .collect::<Result<Vec<_>, _>>()?;

    let params: Vec<&dyn ToSql> = owned.iter().map(Param::as_sql).collect();
    f(&params)
}
