//! Validated column identifiers.
//!
//! Selectors only ever reference columns through [`ColumnName`], which
//! guarantees the name is a plain (optionally table-qualified) SQL
//! identifier. This lets fragments that need custom SQL (ILIKE, JSONB
//! operators, bit tests) embed the quoted name safely.

use crate::errors::SelectorError;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::{ColumnRef, DynIden, Expr, IntoColumnRef};
use std::fmt;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("identifier pattern is valid")
});

/// A column name, optionally qualified with its table (`users.id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnName {
    table: Option<String>,
    column: String,
}

impl ColumnName {
    /// Validate and parse a column name.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::InvalidColumn` if `name` is not an identifier
    /// or a `table.column` pair of identifiers.
    pub fn new(name: impl Into<String>) -> Result<Self, SelectorError> {
        let name = name.into();
        if !IDENTIFIER.is_match(&name) {
            return Err(SelectorError::InvalidColumn(name));
        }
        Ok(match name.split_once('.') {
            Some((table, column)) => Self {
                table: Some(table.to_string()),
                column: column.to_string(),
            },
            None => Self {
                table: None,
                column: name,
            },
        })
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn to_column_ref(&self) -> ColumnRef {
        let column = DynIden::from(self.column.clone());
        match &self.table {
            Some(table) => (DynIden::from(table.clone()), column).into_column_ref(),
            None => column.into_column_ref(),
        }
    }

    /// The unqualified column identifier, for INSERT column lists and UPDATE SET.
    pub(crate) fn iden(&self) -> DynIden {
        DynIden::from(self.column.clone())
    }

    /// Column expression for SeaQuery's typed operators.
    pub fn expr(&self) -> Expr {
        Expr::col(self.to_column_ref())
    }

    /// PostgreSQL-quoted form for use inside custom expressions.
    pub fn quoted(&self) -> String {
        match &self.table {
            Some(table) => format!("\"{table}\".\"{}\"", self.column),
            None => format!("\"{}\"", self.column),
        }
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{table}.{}", self.column),
            None => f.write_str(&self.column),
        }
    }
}

/// Column literals written in code.
///
/// # Panics
///
/// Panics if the literal is not a valid identifier. Use [`ColumnName::new`]
/// for names that come from outside the program.
impl From<&'static str> for ColumnName {
    fn from(name: &'static str) -> Self {
        match ColumnName::new(name) {
            Ok(column) => column,
            Err(e) => panic!("{e}"),
        }
    }
}

impl From<&ColumnName> for ColumnName {
    fn from(column: &ColumnName) -> Self {
        column.clone()
    }
}
