//! Bound query builders.
//!
//! Queries come from a [`Querier`](crate::Querier), which fixes their
//! [`Binding`] from the creating context: the ambient transaction if there
//! is one, the base connection otherwise. Builders wrap the matching
//! SeaQuery statement, so anything SeaQuery can express stays reachable
//! through `statement_mut()`; selectors and [`Where`](crate::Where) filters
//! apply through [`Filterable`](crate::selector::Filterable) with the
//! querier's render options.
//!
//! # Architecture
//!
//! - **Binding**: executor resolution (`Binding`)
//! - **Select**: SELECT builder and execution (`SelectQuery`)
//! - **Modify**: INSERT/UPDATE/DELETE builders (`InsertQuery`, `UpdateQuery`, `DeleteQuery`)
//! - **Value Conversion**: SeaQuery Value to ToSql parameter conversion
//! - **Error Handling**: Error detection and classification utilities

pub mod binding;
pub(crate) mod error_handling;
pub mod modify;
pub mod select;
pub(crate) mod value_conversion;

#[doc(inline)]
pub use binding::Binding;
pub use error_handling::{is_constraint_error, is_not_found_error};
#[doc(inline)]
pub use modify::{DeleteQuery, InsertQuery, UpdateQuery};
#[doc(inline)]
pub use select::SelectQuery;
pub use value_conversion::with_converted_params;

use crate::context::Context;
use crate::executor::LifeError;
use error_handling::classify;
use may_postgres::types::ToSql;
use may_postgres::Row;
use sea_query::Values;

/// Decode a result row into a typed value.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, may_postgres::Error>;
}

pub(crate) fn parse_row<T: FromRow>(row: &Row) -> Result<T, LifeError> {
    T::from_row(row).map_err(|e| LifeError::ParseError(format!("Failed to parse row: {e}")))
}

/// Run a built statement: refuse if `ctx` is done, convert the parameters,
/// and classify whatever error comes back.
pub(crate) fn run<T>(
    ctx: &Context,
    values: &Values,
    op: impl FnOnce(&[&dyn ToSql]) -> Result<T, LifeError>,
) -> Result<T, LifeError> {
    if let Some(err) = ctx.err() {
        log::debug!("not executing query: {err}");
        return Err(err.into());
    }
    with_converted_params(values, op).map_err(classify)
}
