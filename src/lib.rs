//! # Lifeguard Scope
//!
//! Context-scoped transactions and composable filters for PostgreSQL on the
//! `may` coroutine runtime.
//!
//! - [`Context`] carries the ambient transaction (and cancellation) through
//!   a request; [`in_tx`] begins, joins, commits and rolls back.
//! - [`Querier`] creates queries bound to the ambient transaction when the
//!   context has one, and to the base connection otherwise.
//! - [`ConnectionPool`] gives every base query and every transaction its
//!   own database session.
//! - [`selector`] is the predicate algebra; [`Where`] is the declarative
//!   filter built on it.
//!
//! ```no_run
//! use lifeguard_scope::selector::{or_group, where_equal, where_prefix};
//! use lifeguard_scope::{Context, DatabaseConfig, LifeError, Querier, Where};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let querier = Querier::connect(&DatabaseConfig::load()?)?;
//! let ctx = Context::background();
//!
//! let filter: Where = serde_json::from_str(r#"{"has_flags": [2], "limit": 50}"#)?;
//! let rows = querier
//!     .new_select_query(&ctx)
//!     .from("accounts")
//!     .apply(&or_group([where_equal("plan", "pro"), where_prefix("email", "admin@")]))
//!     .apply_where(&filter)
//!     .all()?;
//!
//! querier.in_tx(&ctx, |tx_ctx| -> Result<(), LifeError> {
//!     querier.new_update_query(tx_ctx).table("accounts").value("audited", true).exec()?;
//!     Ok(())
//! })?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

pub mod column;
pub mod config;
pub mod connection;
pub mod context;
pub mod errors;
pub mod executor;
pub mod filter;
pub mod metrics;
pub mod pool;
pub mod querier;
pub mod query;
pub mod selector;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod test_helpers;

pub use column::ColumnName;
pub use config::DatabaseConfig;
pub use connection::{connect, ConnectionError};
pub use context::{CancelHandle, Context, ContextError};
pub use errors::{RequestError, SelectorError};
pub use executor::{Connection, LifeError, LifeExecutor, MayPostgresExecutor};
pub use filter::{FilterColumns, Where};
pub use pool::ConnectionPool;
pub use querier::Querier;
pub use query::{
    is_constraint_error, is_not_found_error, Binding, DeleteQuery, FromRow, InsertQuery,
    SelectQuery, UpdateQuery,
};
pub use selector::{RenderOptions, Selector};
pub use transaction::{
    has_tx, in_tx, in_tx_with, tx_from_context, tx_to_context, IsolationLevel, Transaction,
    TransactionError, TransactionHandle, TxOptions, TxRef,
};
pub use value::FilterValue;
