//! Predicate fragments.
//!
//! A [`Fragment`] is one leaf predicate over one column. Fragments carry
//! their values as [`FilterValue`]s and render to SeaQuery conditions with
//! every value bound as a parameter. Predicates SeaQuery has no typed
//! operator for (ILIKE, JSONB traversal and containment, bit tests) are
//! rendered as custom expressions over the validated, quoted column name.

use super::{RenderOptions, Rendered};
use crate::column::ColumnName;
use crate::errors::SelectorError;
use crate::value::FilterValue;
use sea_query::{Expr, ExprTrait, Value};
use serde::{Deserialize, Serialize};

/// How a membership test over an empty list renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyListPolicy {
    /// Set semantics: `IN ()` matches nothing, `NOT IN ()` matches everything.
    #[default]
    MatchNone,
    /// The fragment contributes nothing to the query.
    Skip,
}

/// Where the user's text must occur in a `Like` fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Contains,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Equal {
        column: ColumnName,
        value: FilterValue,
    },
    NotEqual {
        column: ColumnName,
        value: FilterValue,
    },
    IsNull {
        column: ColumnName,
    },
    IsNotNull {
        column: ColumnName,
    },
    In {
        column: ColumnName,
        values: Vec<FilterValue>,
        /// Falls back to the query's `RenderOptions` when `None`.
        on_empty: Option<EmptyListPolicy>,
    },
    NotIn {
        column: ColumnName,
        values: Vec<FilterValue>,
        on_empty: Option<EmptyListPolicy>,
    },
    /// Case-insensitive match; `pattern` is literal text, not a LIKE pattern.
    Like {
        column: ColumnName,
        pattern: String,
        mode: MatchMode,
    },
    Before {
        column: ColumnName,
        value: FilterValue,
    },
    After {
        column: ColumnName,
        value: FilterValue,
    },
    JsonFieldEqual {
        column: ColumnName,
        key: String,
        value: FilterValue,
    },
    JsonPathEqual {
        column: ColumnName,
        path: Vec<String>,
        value: FilterValue,
    },
    JsonArrayContains {
        column: ColumnName,
        field: String,
        value: FilterValue,
    },
    JsonPathArrayContains {
        column: ColumnName,
        path: Vec<String>,
        field: String,
        value: FilterValue,
    },
    HasFlag {
        column: ColumnName,
        flag: i64,
    },
    HasNotFlag {
        column: ColumnName,
        flag: i64,
    },
}

/// Escape `%`, `_` and the escape character itself so user text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn like_pattern(text: &str, mode: MatchMode) -> String {
    let escaped = escape_like(text);
    match mode {
        MatchMode::Contains => format!("%{escaped}%"),
        MatchMode::Prefix => format!("{escaped}%"),
        MatchMode::Suffix => format!("%{escaped}"),
    }
}

pub(crate) fn validate_key(key: &str) -> Result<(), SelectorError> {
    if key.is_empty() {
        return Err(SelectorError::EmptyJsonKey);
    }
    Ok(())
}

pub(crate) fn validate_path(path: &[String]) -> Result<(), SelectorError> {
    if path.is_empty() {
        return Err(SelectorError::EmptyJsonPath);
    }
    path.iter().try_for_each(|key| validate_key(key))
}

fn cond(expr: Expr) -> Rendered {
    Rendered::Cond(sea_query::Condition::all().add(expr))
}

/// Appends `-> $n::text` hops for `keys` to `sql`, binding each key.
fn push_hops(sql: &mut String, values: &mut Vec<Value>, keys: &[String]) {
    for key in keys {
        values.push(Value::from(key.clone()));
        sql.push_str(&format!(" -> ${}::text", values.len()));
    }
}

fn json_text_equal(column: &ColumnName, path: &[String], value: &FilterValue) -> Rendered {
    let Some((last, init)) = path.split_last() else {
        log::warn!("JSON path fragment on {column} has an empty path, matching nothing");
        return Rendered::Never;
    };

    let mut values = Vec::with_capacity(path.len() + 1);
    let mut sql = format!("({}", column.quoted());

    if let Some(document) = value.json_document() {
        push_hops(&mut sql, &mut values, path);
        values.push(Value::from(document.to_string()));
        sql.push_str(&format!(") = ${}::text::jsonb", values.len()));
        return cond(Expr::cust_with_values(sql, values));
    }

    push_hops(&mut sql, &mut values, init);
    values.push(Value::from(last.clone()));
    sql.push_str(&format!(" ->> ${}::text)", values.len()));

    match value.to_text() {
        Some(text) => {
            values.push(Value::from(text));
            sql.push_str(&format!(" = ${}", values.len()));
        }
        None => sql.push_str(" IS NULL"),
    }
    cond(Expr::cust_with_values(sql, values))
}

fn json_contains(
    column: &ColumnName,
    path: &[String],
    field: &str,
    value: &FilterValue,
) -> Rendered {
    let mut element = serde_json::Map::new();
    element.insert(field.to_string(), value.to_json());
    let document = serde_json::Value::Array(vec![serde_json::Value::Object(element)]);

    let mut values = Vec::with_capacity(path.len() + 1);
    let mut sql = if path.is_empty() {
        column.quoted()
    } else {
        let mut target = format!("({}", column.quoted());
        push_hops(&mut target, &mut values, path);
        target.push(')');
        target
    };
    values.push(Value::from(document.to_string()));
    sql.push_str(&format!(" @> ${}::text::jsonb", values.len()));
    cond(Expr::cust_with_values(sql, values))
}

impl Fragment {
    /// The column this fragment constrains.
    pub fn column(&self) -> &ColumnName {
        match self {
            Fragment::Equal { column, .. }
            | Fragment::NotEqual { column, .. }
            | Fragment::IsNull { column }
            | Fragment::IsNotNull { column }
            | Fragment::In { column, .. }
            | Fragment::NotIn { column, .. }
            | Fragment::Like { column, .. }
            | Fragment::Before { column, .. }
            | Fragment::After { column, .. }
            | Fragment::JsonFieldEqual { column, .. }
            | Fragment::JsonPathEqual { column, .. }
            | Fragment::JsonArrayContains { column, .. }
            | Fragment::JsonPathArrayContains { column, .. }
            | Fragment::HasFlag { column, .. }
            | Fragment::HasNotFlag { column, .. } => column,
        }
    }

    pub(crate) fn render(&self, opts: &RenderOptions) -> Rendered {
        match self {
            Fragment::Equal { column, value } => match value {
                v if v.is_null() => cond(column.expr().is_null()),
                FilterValue::Json(doc) => cond(Expr::cust_with_values(
                    format!("{} = $1::text::jsonb", column.quoted()),
                    [doc.to_string()],
                )),
                v => cond(column.expr().eq(v.to_sea_value())),
            },
            Fragment::NotEqual { column, value } => match value {
                v if v.is_null() => cond(column.expr().is_not_null()),
                FilterValue::Json(doc) => cond(Expr::cust_with_values(
                    format!("{} <> $1::text::jsonb", column.quoted()),
                    [doc.to_string()],
                )),
                v => cond(column.expr().ne(v.to_sea_value())),
            },
            Fragment::IsNull { column } => cond(column.expr().is_null()),
            Fragment::IsNotNull { column } => cond(column.expr().is_not_null()),
            Fragment::In { column, values, on_empty } => {
                if values.is_empty() {
                    return match on_empty.unwrap_or(opts.empty_list) {
                        EmptyListPolicy::MatchNone => Rendered::Never,
                        EmptyListPolicy::Skip => Rendered::Omit,
                    };
                }
                cond(column.expr().is_in(values.iter().map(FilterValue::to_sea_value)))
            }
            Fragment::NotIn { column, values, on_empty } => {
                if values.is_empty() {
                    return match on_empty.unwrap_or(opts.empty_list) {
                        EmptyListPolicy::MatchNone => Rendered::Always,
                        EmptyListPolicy::Skip => Rendered::Omit,
                    };
                }
                cond(column.expr().is_not_in(values.iter().map(FilterValue::to_sea_value)))
            }
            Fragment::Like { column, pattern, mode } => cond(Expr::cust_with_values(
                format!("{} ILIKE $1", column.quoted()),
                [like_pattern(pattern, *mode)],
            )),
            Fragment::Before { column, value } => cond(column.expr().lt(value.to_sea_value())),
            Fragment::After { column, value } => cond(column.expr().gt(value.to_sea_value())),
            Fragment::JsonFieldEqual { column, key, value } => {
                json_text_equal(column, std::slice::from_ref(key), value)
            }
            Fragment::JsonPathEqual { column, path, value } => json_text_equal(column, path, value),
            Fragment::JsonArrayContains {
                column,
                field,
                value,
            } => json_contains(column, &[], field, value),
            Fragment::JsonPathArrayContains {
                column,
                path,
                field,
                value,
            } => {
                if path.is_empty() {
                    log::warn!(
                        "JSON array fragment on {column} has an empty path, matching nothing"
                    );
                    return Rendered::Never;
                }
                json_contains(column, path, field, value)
            }
            Fragment::HasFlag { column, flag } => cond(Expr::cust_with_values(
                format!("({} & $1::bigint) = $2::bigint", column.quoted()),
                [*flag, *flag],
            )),
            Fragment::HasNotFlag { column, flag } => cond(Expr::cust_with_values(
                format!("({} & $1::bigint) = 0", column.quoted()),
                [*flag],
            )),
        }
    }
}
