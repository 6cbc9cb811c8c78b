//! Declarative filters.
//!
//! [`Where`] captures the query shapes list endpoints keep asking for (id
//! include/exclude lists, soft-delete visibility, bit flags, creation time
//! bounds, paging, projection and sort-key indirection) as plain data that
//! can be deserialized straight from a request. [`Where::selector`]
//! translates the predicate part into the selector algebra;
//! [`Where::apply_select`] handles projection, paging and ordering.
//!
//! ```
//! use lifeguard_scope::Where;
//! use sea_query::{PostgresQueryBuilder, Query};
//!
//! let filter: Where = serde_json::from_value(serde_json::json!({
//!     "ids": ["a", "b"],
//!     "has_flags": [4],
//!     "limit": 20,
//!     "sort_by": 1,
//!     "order": { "1": "created_at" },
//!     "sort_desc": true
//! }))
//! .unwrap();
//!
//! let mut query = Query::select();
//! query.column(sea_query::Asterisk).from("posts");
//! filter.apply(&mut query);
//! let (sql, _) = query.build(PostgresQueryBuilder);
//! assert!(sql.ends_with(r#"ORDER BY "created_at" DESC LIMIT $5"#));
//! ```

use crate::column::ColumnName;
use crate::errors::SelectorError;
use crate::selector::{self, Filterable, Selector};
use chrono::{DateTime, Utc};
use sea_query::{Order, SelectStatement};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The columns a [`Where`] targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterColumns {
    pub id: ColumnName,
    pub deleted_at: ColumnName,
    pub flags: ColumnName,
    pub created_at: ColumnName,
    /// Hide soft-deleted rows when neither `with_deleted` nor `only_deleted` is set.
    pub exclude_deleted_by_default: bool,
}

impl Default for FilterColumns {
    fn default() -> Self {
        Self {
            id: ColumnName::from("id"),
            deleted_at: ColumnName::from("deleted_at"),
            flags: ColumnName::from("flags"),
            created_at: ColumnName::from("created_at"),
            exclude_deleted_by_default: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Where {
    pub ids: BTreeSet<String>,
    pub not_in_ids: BTreeSet<String>,
    /// Takes precedence over `with_deleted`.
    pub only_deleted: bool,
    pub with_deleted: bool,
    pub has_flags: Vec<i64>,
    pub has_not_flags: Vec<i64>,
    /// Exclusive lower bound on the creation time.
    pub created_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the creation time.
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub select_columns: Vec<String>,
    /// Key into `order`; keys missing from it apply no ordering.
    pub sort_by: Option<i32>,
    pub sort_desc: bool,
    pub order: BTreeMap<i32, String>,
    #[serde(skip)]
    pub columns: FilterColumns,
}

impl Where {
    pub fn with_columns(mut self, columns: FilterColumns) -> Self {
        self.columns = columns;
        self
    }

    /// The predicate part of this filter as a selector.
    ///
    /// Every unset field contributes nothing, so `Where::default()` yields a
    /// no-op selector (unless the columns exclude deleted rows by default).
    pub fn selector(&self) -> Selector {
        let columns = &self.columns;
        let mut parts = Vec::new();

        if !self.ids.is_empty() {
            parts.push(selector::where_in(&columns.id, &self.ids));
        }
        if !self.not_in_ids.is_empty() {
            parts.push(selector::where_not_in(&columns.id, &self.not_in_ids));
        }

        if self.only_deleted {
            parts.push(selector::where_not_null(&columns.deleted_at));
        } else if !self.with_deleted && columns.exclude_deleted_by_default {
            parts.push(selector::where_null(&columns.deleted_at));
        }

        parts.extend(
            self.has_flags
                .iter()
                .map(|&flag| selector::where_has_flag(&columns.flags, flag)),
        );
        parts.extend(
            self.has_not_flags
                .iter()
                .map(|&flag| selector::where_has_not_flag(&columns.flags, flag)),
        );

        if let Some(after) = self.created_after {
            parts.push(selector::where_after(&columns.created_at, after));
        }
        if let Some(before) = self.created_before {
            parts.push(selector::where_before(&columns.created_at, before));
        }

        selector::apply(parts)
    }

    /// Append this filter's conditions to `query`.
    pub fn apply_where<Q: Filterable + ?Sized>(&self, query: &mut Q) {
        self.selector().apply_to(query);
    }

    /// Apply projection, paging and ordering to `query`.
    ///
    /// Identifiers that fail validation are dropped with a warning; use
    /// [`Where::validate`] to reject them instead.
    pub fn apply_select(&self, query: &mut SelectStatement) {
        let projection = self.projection();
        if !projection.is_empty() {
            query.clear_selects();
            query.columns(projection.iter().map(ColumnName::to_column_ref));
        }

        if let Some(limit) = self.limit {
            query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query.offset(offset);
        }

        if let Some(column) = self.sort_column() {
            let direction = if self.sort_desc { Order::Desc } else { Order::Asc };
            query.order_by(column.to_column_ref(), direction);
        }
    }

    /// The valid `select_columns`; invalid names are dropped with a warning.
    pub(crate) fn projection(&self) -> Vec<ColumnName> {
        self.select_columns
            .iter()
            .filter_map(|name| match ColumnName::new(name.as_str()) {
                Ok(column) => Some(column),
                Err(e) => {
                    log::warn!("dropping projection column: {e}");
                    None
                }
            })
            .collect()
    }

    /// `apply_where` followed by `apply_select`.
    pub fn apply(&self, query: &mut SelectStatement) {
        self.apply_where(query);
        self.apply_select(query);
    }

    /// Report the first projection or order identifier that is not a valid column name.
    pub fn validate(&self) -> Result<(), SelectorError> {
        self.select_columns
            .iter()
            .chain(self.order.values())
            .try_for_each(|name| ColumnName::new(name.as_str()).map(drop))
    }

    fn sort_column(&self) -> Option<ColumnName> {
        let key = self.sort_by?;
        let Some(name) = self.order.get(&key) else {
            log::debug!("sort key {key} has no column mapping, leaving order unchanged");
            return None;
        };
        match ColumnName::new(name.as_str()) {
            Ok(column) => Some(column),
            Err(e) => {
                log::warn!("ignoring sort key {key}: {e}");
                None
            }
        }
    }
}
