//! In-memory evaluation of selectors against row fixtures.
//!
//! Mirrors what PostgreSQL does with the rendered SQL, including
//! three-valued logic for NULLs, so the algebra can be checked without a
//! database. Evaluation walks the `Selector` tree itself; the fixtures that
//! depend on grouping also pin the WHERE clause the same tree renders to.

use super::{EmptyListPolicy, Fragment, GroupKind, MatchMode, RenderOptions, Selector};
use crate::value::FilterValue;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub(crate) type Row = BTreeMap<String, FilterValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Truth {
    True,
    False,
    Unknown,
    /// Contributes nothing, like a skipped fragment.
    Omit,
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }
}

/// Whether a query filtered by `selector` returns `row`.
pub(crate) fn matches(selector: &Selector, row: &Row, opts: &RenderOptions) -> bool {
    matches!(eval(selector, row, opts), Truth::True | Truth::Omit)
}

fn eval(selector: &Selector, row: &Row, opts: &RenderOptions) -> Truth {
    match selector {
        Selector::Fragment(fragment) => eval_fragment(fragment, row, opts),
        Selector::DistinctOn(_) | Selector::Noop => Truth::Omit,
        Selector::Apply(children) => {
            combine(GroupKind::And, children.iter().map(|c| eval(c, row, opts)))
        }
        Selector::Group { kind, children } => {
            combine(*kind, children.iter().map(|c| eval(c, row, opts)))
        }
    }
}

fn combine(kind: GroupKind, parts: impl Iterator<Item = Truth>) -> Truth {
    let parts: Vec<Truth> = parts.filter(|t| *t != Truth::Omit).collect();
    if parts.is_empty() {
        return Truth::Omit;
    }
    let (dominant, identity) = match kind {
        GroupKind::And => (Truth::False, Truth::True),
        GroupKind::Or => (Truth::True, Truth::False),
    };
    if parts.contains(&dominant) {
        dominant
    } else if parts.contains(&Truth::Unknown) {
        Truth::Unknown
    } else {
        identity
    }
}

static NULL: FilterValue = FilterValue::Null;

fn cell<'a>(row: &'a Row, fragment: &Fragment) -> &'a FilterValue {
    row.get(&fragment.column().to_string()).unwrap_or(&NULL)
}

fn compare(a: &FilterValue, b: &FilterValue) -> Option<Ordering> {
    match (a, b) {
        (FilterValue::Int(x), FilterValue::Int(y)) => Some(x.cmp(y)),
        (FilterValue::Float(x), FilterValue::Float(y)) => x.partial_cmp(y),
        (FilterValue::Int(x), FilterValue::Float(y)) => (*x as f64).partial_cmp(y),
        (FilterValue::Float(x), FilterValue::Int(y)) => x.partial_cmp(&(*y as f64)),
        (FilterValue::Text(x), FilterValue::Text(y)) => Some(x.cmp(y)),
        (FilterValue::Timestamp(x), FilterValue::Timestamp(y)) => Some(x.cmp(y)),
        (FilterValue::Bool(x), FilterValue::Bool(y)) => Some(x.cmp(y)),
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

fn equal(a: &FilterValue, b: &FilterValue) -> Truth {
    if a.is_null() || b.is_null() {
        return Truth::Unknown;
    }
    Truth::from(compare(a, b) == Some(Ordering::Equal))
}

fn ordered(a: &FilterValue, b: &FilterValue, want: Ordering) -> Truth {
    if a.is_null() || b.is_null() {
        return Truth::Unknown;
    }
    Truth::from(compare(a, b) == Some(want))
}

fn membership(x: &FilterValue, values: &[FilterValue]) -> Truth {
    let hits: Vec<Truth> = values.iter().map(|v| equal(x, v)).collect();
    combine(GroupKind::Or, hits.into_iter())
}

fn negate(t: Truth) -> Truth {
    match t {
        Truth::True => Truth::False,
        Truth::False => Truth::True,
        other => other,
    }
}

fn walk<'a>(doc: &'a serde_json::Value, path: &[String]) -> Option<&'a serde_json::Value> {
    path.iter().try_fold(doc, |node, key| node.get(key))
}

fn extract_text(node: Option<&serde_json::Value>) -> Option<String> {
    match node? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_text_equal(cell: &FilterValue, path: &[String], value: &FilterValue) -> Truth {
    let FilterValue::Json(doc) = cell else {
        return Truth::Unknown;
    };
    if let Some(wanted) = value.json_document() {
        return walk(doc, path).map_or(Truth::Unknown, |node| Truth::from(*node == wanted));
    }
    match (extract_text(walk(doc, path)), value.to_text()) {
        (extracted, None) => Truth::from(extracted.is_none()),
        (None, Some(_)) => Truth::Unknown,
        (Some(extracted), Some(wanted)) => Truth::from(extracted == wanted),
    }
}

fn json_array_contains(
    cell: &FilterValue,
    path: &[String],
    field: &str,
    value: &FilterValue,
) -> Truth {
    let FilterValue::Json(doc) = cell else {
        return Truth::Unknown;
    };
    let Some(target) = walk(doc, path) else {
        return Truth::Unknown;
    };
    let wanted = value.to_json();
    Truth::from(
        target
            .as_array()
            .is_some_and(|items| items.iter().any(|item| item.get(field) == Some(&wanted))),
    )
}

fn like(cell: &FilterValue, pattern: &str, mode: MatchMode) -> Truth {
    let Some(text) = cell.to_text() else {
        return Truth::Unknown;
    };
    let (text, pattern) = (text.to_lowercase(), pattern.to_lowercase());
    Truth::from(match mode {
        MatchMode::Contains => text.contains(&pattern),
        MatchMode::Prefix => text.starts_with(&pattern),
        MatchMode::Suffix => text.ends_with(&pattern),
    })
}

fn flags(cell: &FilterValue, test: impl Fn(i64) -> bool) -> Truth {
    match cell {
        FilterValue::Int(bits) => Truth::from(test(*bits)),
        _ => Truth::Unknown,
    }
}

fn eval_fragment(fragment: &Fragment, row: &Row, opts: &RenderOptions) -> Truth {
    let x = cell(row, fragment);
    match fragment {
        Fragment::Equal { value, .. } if value.is_null() => Truth::from(x.is_null()),
        Fragment::Equal { value, .. } => equal(x, value),
        Fragment::NotEqual { value, .. } if value.is_null() => Truth::from(!x.is_null()),
        Fragment::NotEqual { value, .. } => negate(equal(x, value)),
        Fragment::IsNull { .. } => Truth::from(x.is_null()),
        Fragment::IsNotNull { .. } => Truth::from(!x.is_null()),
        Fragment::In { values, on_empty, .. } => {
            if values.is_empty() {
                return match on_empty.unwrap_or(opts.empty_list) {
                    EmptyListPolicy::MatchNone => Truth::False,
                    EmptyListPolicy::Skip => Truth::Omit,
                };
            }
            membership(x, values)
        }
        Fragment::NotIn { values, on_empty, .. } => {
            if values.is_empty() {
                return match on_empty.unwrap_or(opts.empty_list) {
                    EmptyListPolicy::MatchNone => Truth::True,
                    EmptyListPolicy::Skip => Truth::Omit,
                };
            }
            negate(membership(x, values))
        }
        Fragment::Like { pattern, mode, .. } => like(x, pattern, *mode),
        Fragment::Before { value, .. } => ordered(x, value, Ordering::Less),
        Fragment::After { value, .. } => ordered(x, value, Ordering::Greater),
        Fragment::JsonFieldEqual { key, value, .. } => {
            json_text_equal(x, std::slice::from_ref(key), value)
        }
        Fragment::JsonPathEqual { path, value, .. } => json_text_equal(x, path, value),
        Fragment::JsonArrayContains { field, value, .. } => {
            json_array_contains(x, &[], field, value)
        }
        Fragment::JsonPathArrayContains {
            path,
            field,
            value,
            ..
        } => json_array_contains(x, path, field, value),
        Fragment::HasFlag { flag, .. } => flags(x, |bits| (bits & flag) == *flag),
        Fragment::HasNotFlag { flag, .. } => flags(x, |bits| (bits & flag) == 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use sea_query::{Asterisk, PostgresQueryBuilder, Query};
    use serde_json::json;

    fn where_sql(selector: &Selector) -> String {
        let mut query = Query::select();
        query.column(Asterisk).from("t");
        selector.apply_to(&mut query);
        let (sql, _) = query.build(PostgresQueryBuilder);
        sql.split_once(" WHERE ").map(|(_, clause)| clause.to_string()).unwrap_or_default()
    }

    fn row(cells: &[(&str, FilterValue)]) -> Row {
        cells.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn default_opts() -> RenderOptions {
        RenderOptions::default()
    }

    fn skip_opts() -> RenderOptions {
        RenderOptions {
            empty_list: EmptyListPolicy::Skip,
        }
    }

    #[test]
    fn test_or_group_does_not_leak_precedence() {
        let selector = apply([
            or_group([where_equal("status", "active"), where_equal("status", "pending")]),
            and_group([where_equal("region", "eu")]),
        ]);
        let fixtures = [
            ("active", "eu", true),
            ("pending", "eu", true),
            ("active", "us", false),
            ("pending", "us", false),
            ("closed", "eu", false),
        ];
        for (status, region, expected) in fixtures {
            let r = row(&[("status", status.into()), ("region", region.into())]);
            assert_eq!(matches(&selector, &r, &default_opts()), expected, "{status}/{region}");
        }
        assert_eq!(
            where_sql(&selector),
            r#"("status" = $1 OR "status" = $2) AND "region" = $3"#
        );
    }

    #[test]
    fn test_empty_not_in_inside_or_group() {
        let selector = apply([
            or_group([where_not_in("id", Vec::<i64>::new()), where_equal("status", "archived")]),
            where_equal("region", "eu"),
        ]);
        let r = row(&[
            ("id", FilterValue::Int(1)),
            ("status", "open".into()),
            ("region", "eu".into()),
        ]);
        assert!(matches(&selector, &r, &default_opts()));
        assert_eq!(where_sql(&selector), r#""region" = $1"#);
    }

    #[test]
    fn test_null_rows_match_neither_equal_nor_not_equal() {
        let r = row(&[("status", FilterValue::Null)]);
        assert!(!matches(&where_equal("status", "a"), &r, &default_opts()));
        assert!(!matches(&where_not_equal("status", "a"), &r, &default_opts()));
        assert!(matches(&where_null("status"), &r, &default_opts()));
    }

    #[test]
    fn test_json_fixtures() {
        let r = row(&[(
            "doc",
            FilterValue::Json(json!({
                "color": "red",
                "size": {"unit": "cm", "value": 3},
                "tags": [{"name": "urgent"}, {"name": "later"}],
            })),
        )]);
        let opts = default_opts();
        assert!(matches(&where_json_field("doc", "color", "red").unwrap(), &r, &opts));
        assert!(matches(&where_json_path("doc", ["size", "value"], 3).unwrap(), &r, &opts));
        assert!(!matches(&where_json_path("doc", ["size", "unit"], "mm").unwrap(), &r, &opts));
        assert!(matches(
            &where_json_path_array_contains("doc", ["tags"], "name", "urgent").unwrap(),
            &r,
            &opts
        ));
        assert!(!matches(
            &where_json_path_array_contains("doc", ["tags"], "name", "never").unwrap(),
            &r,
            &opts
        ));
    }

    #[test]
    fn test_json_timestamp_and_document_values() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let r = row(&[(
            "doc",
            FilterValue::Json(json!({
                "seen_at": "2024-01-02T03:04:05+00:00",
                "dims": {"w": 1, "h": 2},
            })),
        )]);
        let opts = default_opts();
        assert!(matches(&where_json_field("doc", "seen_at", ts).unwrap(), &r, &opts));
        let same_object = where_json_field("doc", "dims", json!({"h": 2, "w": 1})).unwrap();
        assert!(matches(&same_object, &r, &opts));
        assert!(!matches(&where_json_field("doc", "dims", json!({"w": 1})).unwrap(), &r, &opts));
    }

    #[test]
    fn test_like_matches_literally() {
        let r = row(&[("name", "Half 50% Off".into())]);
        assert!(matches(&where_contains("name", "50%"), &r, &default_opts()));
        assert!(matches(&where_prefix("name", "half"), &r, &default_opts()));
        assert!(!matches(&where_suffix("name", "half"), &r, &default_opts()));
    }

    proptest! {
        #[test]
        fn equal_and_not_equal_are_exclusive(x in any::<i64>(), v in any::<i64>()) {
            let r = row(&[("n", x.into())]);
            let eq = matches(&where_equal("n", v), &r, &default_opts());
            let ne = matches(&where_not_equal("n", v), &r, &default_opts());
            prop_assert!(eq != ne);
            prop_assert_eq!(eq, x == v);
        }

        #[test]
        fn membership_follows_set_semantics(
            x in 0i64..8,
            values in proptest::collection::vec(0i64..8, 0..4),
        ) {
            let r = row(&[("n", x.into())]);
            let contained = values.contains(&x);
            let opts = default_opts();
            prop_assert_eq!(matches(&where_in("n", values.clone()), &r, &opts), contained);
            prop_assert_eq!(matches(&where_not_in("n", values.clone()), &r, &opts), !contained);

            // Skip only differs from set semantics for the empty list.
            let skip_in = matches(&where_in("n", values.clone()), &r, &skip_opts());
            let skip_not_in = matches(&where_not_in("n", values.clone()), &r, &skip_opts());
            if values.is_empty() {
                prop_assert!(skip_in && skip_not_in);
            } else {
                prop_assert_eq!(skip_in, contained);
                prop_assert_eq!(skip_not_in, !contained);
            }
        }

        #[test]
        fn flags_partition_rows(bits in any::<i64>(), shift in 0u32..62) {
            let flag = 1i64 << shift;
            let r = row(&[("flags", bits.into())]);
            let set = matches(&where_has_flag("flags", flag), &r, &default_opts());
            let clear = matches(&where_has_not_flag("flags", flag), &r, &default_opts());
            prop_assert!(set != clear);
        }

        #[test]
        fn apply_is_conjunction(a in any::<bool>(), b in any::<bool>()) {
            let r = row(&[("a", a.into()), ("b", b.into())]);
            let selector = apply([where_equal("a", true), where_equal("b", true)]);
            prop_assert_eq!(matches(&selector, &r, &default_opts()), a && b);
        }
    }
}
