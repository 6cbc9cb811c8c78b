//! Composable filter predicates.
//!
//! A [`Selector`] is a small tree: leaf [`Fragment`]s, explicit AND/OR
//! groups, sequences and a `DISTINCT ON` marker. Building a selector never
//! touches a query; [`Selector::apply_to`] renders the tree onto anything
//! [`Filterable`].
//!
//! Grouping is always explicit. At the top level every selector passed to
//! [`apply`] is ANDed onto the query's existing conditions in order; OR only
//! appears inside an [`or_group`] node, which renders parenthesised.
//!
//! ```
//! use lifeguard_scope::selector::{and_group, apply, or_group, where_equal, Selector};
//! use sea_query::{PostgresQueryBuilder, Query};
//!
//! let active_or_pending = or_group([
//!     where_equal("status", "active"),
//!     where_equal("status", "pending"),
//! ]);
//! let selector = apply([active_or_pending, and_group([where_equal("tenant_id", 7)])]);
//!
//! let mut query = Query::select();
//! query.column(sea_query::Asterisk).from("orders");
//! selector.apply_to(&mut query);
//! let (sql, _) = query.build(PostgresQueryBuilder);
//! assert!(sql.contains(r#"("status" = $1 OR "status" = $2) AND "tenant_id" = $3"#));
//! ```

mod fragment;

#[cfg(test)]
pub(crate) mod eval;

pub use fragment::{escape_like, EmptyListPolicy, Fragment, MatchMode};

use crate::column::ColumnName;
use crate::errors::SelectorError;
use crate::filter::Where;
use crate::value::FilterValue;
use fragment::{validate_key, validate_path};
use sea_query::{
    Condition, ConditionalStatement, DeleteStatement, Expr, SelectStatement, UpdateStatement,
};

/// Rendering settings supplied by the query a selector is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Policy for `IN`/`NOT IN` fragments that do not carry their own.
    pub empty_list: EmptyListPolicy,
}

/// The result of rendering one node.
///
/// `Always` and `Omit` both add nothing at the top level; they differ inside
/// an OR group, where an always-true branch makes the whole group true but
/// an omitted branch simply drops out.
#[derive(Debug, Clone)]
pub(crate) enum Rendered {
    Always,
    Never,
    Omit,
    Cond(Condition),
}

impl Rendered {
    fn into_condition(self) -> Option<Condition> {
        match self {
            Rendered::Never => Some(Condition::all().add(Expr::cust("FALSE"))),
            Rendered::Cond(condition) => Some(condition),
            Rendered::Always | Rendered::Omit => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    And,
    Or,
}

fn combine(kind: GroupKind, parts: impl IntoIterator<Item = Rendered>) -> Rendered {
    let mut conditions = Vec::new();
    let mut saw_identity = false;
    for part in parts {
        match (kind, part) {
            (_, Rendered::Omit) => {}
            (GroupKind::And, Rendered::Never) => return Rendered::Never,
            (GroupKind::Or, Rendered::Always) => return Rendered::Always,
            (GroupKind::And, Rendered::Always) | (GroupKind::Or, Rendered::Never) => {
                saw_identity = true
            }
            (_, Rendered::Cond(condition)) => conditions.push(condition),
        }
    }

    if conditions.is_empty() {
        return match (saw_identity, kind) {
            (false, _) => Rendered::Omit,
            (true, GroupKind::And) => Rendered::Always,
            (true, GroupKind::Or) => Rendered::Never,
        };
    }

    let group = match kind {
        GroupKind::And => Condition::all(),
        GroupKind::Or => Condition::any(),
    };
    Rendered::Cond(conditions.into_iter().fold(group, Condition::add))
}

/// A composable filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Fragment(Fragment),
    /// Select-only de-duplication marker; contributes no WHERE condition.
    DistinctOn(Vec<ColumnName>),
    /// A sequence. At the top level each child is ANDed onto the query in
    /// order; inside a group the sequence renders as one AND group.
    Apply(Vec<Selector>),
    Group {
        kind: GroupKind,
        children: Vec<Selector>,
    },
    Noop,
}

impl Selector {
    /// Whether applying this selector leaves every query unchanged.
    pub fn is_noop(&self) -> bool {
        match self {
            Selector::Noop => true,
            Selector::Apply(children) | Selector::Group { children, .. } => {
                children.iter().all(Selector::is_noop)
            }
            Selector::Fragment(_) | Selector::DistinctOn(_) => false,
        }
    }

    pub(crate) fn render(&self, opts: &RenderOptions) -> Rendered {
        match self {
            Selector::Fragment(fragment) => fragment.render(opts),
            Selector::DistinctOn(_) | Selector::Noop => Rendered::Omit,
            Selector::Apply(children) => {
                combine(GroupKind::And, children.iter().map(|c| c.render(opts)))
            }
            Selector::Group { kind, children } => {
                combine(*kind, children.iter().map(|c| c.render(opts)))
            }
        }
    }

    /// The WHERE condition this selector contributes, if any.
    pub fn to_condition(&self, opts: &RenderOptions) -> Option<Condition> {
        self.render(opts).into_condition()
    }

    fn collect_distinct_on(&self, out: &mut Vec<ColumnName>) {
        match self {
            Selector::DistinctOn(columns) => out.extend(columns.iter().cloned()),
            Selector::Apply(children) | Selector::Group { children, .. } => {
                children.iter().for_each(|c| c.collect_distinct_on(out));
            }
            Selector::Fragment(_) | Selector::Noop => {}
        }
    }

    /// Append this selector's conditions to `query`.
    pub fn apply_to<Q: Filterable + ?Sized>(&self, query: &mut Q) {
        match self {
            Selector::Apply(children) => children.iter().for_each(|child| child.apply_to(query)),
            Selector::DistinctOn(columns) => query.add_distinct_on(columns),
            Selector::Noop => {}
            Selector::Fragment(_) | Selector::Group { .. } => {
                let mut distinct = Vec::new();
                self.collect_distinct_on(&mut distinct);
                if !distinct.is_empty() {
                    query.add_distinct_on(&distinct);
                }
                if let Some(condition) = self.to_condition(&query.render_options()) {
                    query.add_condition(condition);
                }
            }
        }
    }
}

impl From<Fragment> for Selector {
    fn from(fragment: Fragment) -> Self {
        Selector::Fragment(fragment)
    }
}

/// A query that selectors can append conditions to.
pub trait Filterable {
    /// AND `condition` onto the query's WHERE clause.
    fn add_condition(&mut self, condition: Condition);

    /// Set `DISTINCT ON` columns. Only select statements support this; the
    /// default ignores the request.
    fn add_distinct_on(&mut self, columns: &[ColumnName]) {
        log::debug!(
            "ignoring DISTINCT ON ({}) for a statement that is not a SELECT",
            columns.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions::default()
    }
}

impl Filterable for SelectStatement {
    fn add_condition(&mut self, condition: Condition) {
        self.cond_where(condition);
    }

    /// Replaces any `DISTINCT ON` set earlier.
    fn add_distinct_on(&mut self, columns: &[ColumnName]) {
        self.distinct_on(columns.iter().map(ColumnName::to_column_ref));
    }
}

impl Filterable for UpdateStatement {
    fn add_condition(&mut self, condition: Condition) {
        self.cond_where(condition);
    }
}

impl Filterable for DeleteStatement {
    fn add_condition(&mut self, condition: Condition) {
        self.cond_where(condition);
    }
}

fn fragment(fragment: Fragment) -> Selector {
    Selector::Fragment(fragment)
}

fn collect_path<K: Into<String>>(
    path: impl IntoIterator<Item = K>,
) -> Result<Vec<String>, SelectorError> {
    let path: Vec<String> = path.into_iter().map(Into::into).collect();
    validate_path(&path)?;
    Ok(path)
}

/// `column = value`; a null value renders `column IS NULL`.
pub fn where_equal(column: impl Into<ColumnName>, value: impl Into<FilterValue>) -> Selector {
    fragment(Fragment::Equal {
        column: column.into(),
        value: value.into(),
    })
}

/// `column <> value`; a null value renders `column IS NOT NULL`.
pub fn where_not_equal(column: impl Into<ColumnName>, value: impl Into<FilterValue>) -> Selector {
    fragment(Fragment::NotEqual {
        column: column.into(),
        value: value.into(),
    })
}

pub fn where_null(column: impl Into<ColumnName>) -> Selector {
    fragment(Fragment::IsNull { column: column.into() })
}

pub fn where_not_null(column: impl Into<ColumnName>) -> Selector {
    fragment(Fragment::IsNotNull { column: column.into() })
}

/// `column IN (values)`. An empty list follows the query's [`RenderOptions`].
pub fn where_in<V: Into<FilterValue>>(
    column: impl Into<ColumnName>,
    values: impl IntoIterator<Item = V>,
) -> Selector {
    fragment(Fragment::In {
        column: column.into(),
        values: values.into_iter().map(Into::into).collect(),
        on_empty: None,
    })
}

/// `column IN (values)` with an explicit empty-list policy.
pub fn where_in_with<V: Into<FilterValue>>(
    column: impl Into<ColumnName>,
    values: impl IntoIterator<Item = V>,
    on_empty: EmptyListPolicy,
) -> Selector {
    fragment(Fragment::In {
        column: column.into(),
        values: values.into_iter().map(Into::into).collect(),
        on_empty: Some(on_empty),
    })
}

pub fn where_not_in<V: Into<FilterValue>>(
    column: impl Into<ColumnName>,
    values: impl IntoIterator<Item = V>,
) -> Selector {
    fragment(Fragment::NotIn {
        column: column.into(),
        values: values.into_iter().map(Into::into).collect(),
        on_empty: None,
    })
}

pub fn where_not_in_with<V: Into<FilterValue>>(
    column: impl Into<ColumnName>,
    values: impl IntoIterator<Item = V>,
    on_empty: EmptyListPolicy,
) -> Selector {
    fragment(Fragment::NotIn {
        column: column.into(),
        values: values.into_iter().map(Into::into).collect(),
        on_empty: Some(on_empty),
    })
}

fn like(column: impl Into<ColumnName>, text: impl Into<String>, mode: MatchMode) -> Selector {
    fragment(Fragment::Like {
        column: column.into(),
        pattern: text.into(),
        mode,
    })
}

/// Case-insensitive substring match. `text` is matched literally.
pub fn where_contains(column: impl Into<ColumnName>, text: impl Into<String>) -> Selector {
    like(column, text, MatchMode::Contains)
}

pub fn where_prefix(column: impl Into<ColumnName>, text: impl Into<String>) -> Selector {
    like(column, text, MatchMode::Prefix)
}

pub fn where_suffix(column: impl Into<ColumnName>, text: impl Into<String>) -> Selector {
    like(column, text, MatchMode::Suffix)
}

/// `column < value`
pub fn where_before(column: impl Into<ColumnName>, value: impl Into<FilterValue>) -> Selector {
    fragment(Fragment::Before {
        column: column.into(),
        value: value.into(),
    })
}

/// `column > value`
pub fn where_after(column: impl Into<ColumnName>, value: impl Into<FilterValue>) -> Selector {
    fragment(Fragment::After {
        column: column.into(),
        value: value.into(),
    })
}

/// Text equality on one field of a JSONB column: `(column ->> key) = value`.
///
/// # Errors
///
/// Returns `SelectorError::EmptyJsonKey` if `key` is empty.
pub fn where_json_field(
    column: impl Into<ColumnName>,
    key: impl Into<String>,
    value: impl Into<FilterValue>,
) -> Result<Selector, SelectorError> {
    let key = key.into();
    validate_key(&key)?;
    Ok(fragment(Fragment::JsonFieldEqual {
        column: column.into(),
        key,
        value: value.into(),
    }))
}

/// Text equality on a nested JSONB field, following `path` key by key.
///
/// # Errors
///
/// Returns `SelectorError::EmptyJsonPath` for an empty path and
/// `SelectorError::EmptyJsonKey` if any key is empty.
pub fn where_json_path<K: Into<String>>(
    column: impl Into<ColumnName>,
    path: impl IntoIterator<Item = K>,
    value: impl Into<FilterValue>,
) -> Result<Selector, SelectorError> {
    Ok(fragment(Fragment::JsonPathEqual {
        column: column.into(),
        path: collect_path(path)?,
        value: value.into(),
    }))
}

/// Matches when the JSONB array in `column` has an object element whose
/// `field` equals `value`.
///
/// # Errors
///
/// Returns `SelectorError::EmptyJsonKey` if `field` is empty.
pub fn where_json_array_contains(
    column: impl Into<ColumnName>,
    field: impl Into<String>,
    value: impl Into<FilterValue>,
) -> Result<Selector, SelectorError> {
    let field = field.into();
    validate_key(&field)?;
    Ok(fragment(Fragment::JsonArrayContains {
        column: column.into(),
        field,
        value: value.into(),
    }))
}

/// Like [`where_json_array_contains`], for an array nested under `path`.
///
/// # Errors
///
/// Returns `SelectorError::EmptyJsonPath` for an empty path and
/// `SelectorError::EmptyJsonKey` if `field` or any key is empty.
pub fn where_json_path_array_contains<K: Into<String>>(
    column: impl Into<ColumnName>,
    path: impl IntoIterator<Item = K>,
    field: impl Into<String>,
    value: impl Into<FilterValue>,
) -> Result<Selector, SelectorError> {
    let path = collect_path(path)?;
    let field = field.into();
    validate_key(&field)?;
    Ok(fragment(Fragment::JsonPathArrayContains {
        column: column.into(),
        path,
        field,
        value: value.into(),
    }))
}

/// Every bit of `flag` is set in `column`.
pub fn where_has_flag(column: impl Into<ColumnName>, flag: i64) -> Selector {
    fragment(Fragment::HasFlag {
        column: column.into(),
        flag,
    })
}

/// No bit of `flag` is set in `column`.
pub fn where_has_not_flag(column: impl Into<ColumnName>, flag: i64) -> Selector {
    fragment(Fragment::HasNotFlag {
        column: column.into(),
        flag,
    })
}

pub fn distinct_on<C: Into<ColumnName>>(columns: impl IntoIterator<Item = C>) -> Selector {
    Selector::DistinctOn(columns.into_iter().map(Into::into).collect())
}

/// Apply each selector in order, ANDing each onto the query.
pub fn apply(selectors: impl IntoIterator<Item = Selector>) -> Selector {
    Selector::Apply(selectors.into_iter().collect())
}

/// [`apply`] over `selectors` when `condition` holds, otherwise a no-op.
pub fn apply_if(condition: bool, selectors: impl IntoIterator<Item = Selector>) -> Selector {
    if condition {
        apply(selectors)
    } else {
        Selector::Noop
    }
}

/// One parenthesised AND group.
pub fn and_group(selectors: impl IntoIterator<Item = Selector>) -> Selector {
    Selector::Group {
        kind: GroupKind::And,
        children: selectors.into_iter().collect(),
    }
}

/// One parenthesised OR group.
pub fn or_group(selectors: impl IntoIterator<Item = Selector>) -> Selector {
    Selector::Group {
        kind: GroupKind::Or,
        children: selectors.into_iter().collect(),
    }
}

/// `a OR b OR ...`, the same as [`or_group`].
pub fn or(selectors: impl IntoIterator<Item = Selector>) -> Selector {
    or_group(selectors)
}

/// A [`Where`] filter's conditions as one group, for embedding in other groups.
pub fn nested_where(filter: &Where) -> Selector {
    and_group([filter.selector()])
}
