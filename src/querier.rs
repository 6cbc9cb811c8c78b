//! Context-aware query factory.
//!
//! A [`Querier`] owns the base connection, normally a
//! [`ConnectionPool`](crate::ConnectionPool). Every query it creates is bound
//! to the ambient transaction of the context it was created with, or to the
//! base connection when there is none, so repository code runs unchanged
//! inside and outside [`Querier::in_tx`].
//!
//! ```no_run
//! use lifeguard_scope::selector::where_equal;
//! use lifeguard_scope::{Context, DatabaseConfig, LifeError, Querier};
//!
//! fn deactivate(querier: &Querier, ctx: &Context, user_id: i64) -> Result<u64, LifeError> {
//!     querier
//!         .new_update_query(ctx)
//!         .table("users")
//!         .value("active", false)
//!         .apply(&where_equal("id", user_id))
//!         .exec()
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let querier = Querier::connect(&DatabaseConfig::load()?)?;
//! let ctx = Context::background();
//!
//! // Standalone: runs on the base connection.
//! deactivate(&querier, &ctx, 1)?;
//!
//! // Both updates commit or roll back together.
//! querier.in_tx(&ctx, |tx_ctx| {
//!     deactivate(&querier, tx_ctx, 2)?;
//!     deactivate(&querier, tx_ctx, 3)
//! })?;
//! # Ok(())
//! # }
//! ```

use crate::config::DatabaseConfig;
use crate::connection::ConnectionError;
use crate::context::Context;
use crate::executor::Connection;
use crate::pool::ConnectionPool;
use crate::query::{Binding, DeleteQuery, InsertQuery, SelectQuery, UpdateQuery};
use crate::selector::RenderOptions;
use crate::transaction::{self, TransactionError, TxOptions};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Querier {
    conn: Arc<dyn Connection>,
    options: RenderOptions,
    tx_options: TxOptions,
}

impl Querier {
    pub fn new(conn: Arc<dyn Connection>) -> Self {
        Self {
            conn,
            options: RenderOptions::default(),
            tx_options: TxOptions::default(),
        }
    }

    /// Open a session pool to `config.url` and apply the configured
    /// empty-list policy and transaction options.
    ///
    /// Each base query and each outermost `in_tx` checks out its own session,
    /// so concurrent chains sharing this querier never share a transaction.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, ConnectionError> {
        let pool = ConnectionPool::connect(config)?;
        Ok(Self::new(Arc::new(pool))
            .with_render_options(config.render_options())
            .with_tx_options(config.tx_options()))
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Options for transactions begun by [`in_tx`](Self::in_tx).
    pub fn with_tx_options(mut self, tx_options: TxOptions) -> Self {
        self.tx_options = tx_options;
        self
    }

    /// The base connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub fn render_options(&self) -> RenderOptions {
        self.options
    }

    fn bind(&self, ctx: &Context) -> Binding {
        Binding::resolve(ctx, &self.conn)
    }

    pub fn new_select_query(&self, ctx: &Context) -> SelectQuery {
        SelectQuery::new(self.bind(ctx), ctx.clone(), self.options)
    }

    pub fn new_insert_query(&self, ctx: &Context) -> InsertQuery {
        InsertQuery::new(self.bind(ctx), ctx.clone())
    }

    pub fn new_update_query(&self, ctx: &Context) -> UpdateQuery {
        UpdateQuery::new(self.bind(ctx), ctx.clone(), self.options)
    }

    pub fn new_delete_query(&self, ctx: &Context) -> DeleteQuery {
        DeleteQuery::new(self.bind(ctx), ctx.clone(), self.options)
    }

    /// Run `f` in a transaction on the base connection, or in the ambient
    /// one if `ctx` already carries it. See [`transaction::in_tx_with`].
    pub fn in_tx<T, E, F>(&self, ctx: &Context, f: F) -> Result<T, E>
    where
        F: FnOnce(&Context) -> Result<T, E>,
        E: From<TransactionError>,
    {
        transaction::in_tx_with(ctx, self.conn.as_ref(), &self.tx_options, f)
    }

    pub fn in_tx_with<T, E, F>(&self, ctx: &Context, options: &TxOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(&Context) -> Result<T, E>,
        E: From<TransactionError>,
    {
        transaction::in_tx_with(ctx, self.conn.as_ref(), options, f)
    }
}

impl fmt::Debug for Querier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Querier")
            .field("options", &self.options)
            .field("tx_options", &self.tx_options)
            .finish_non_exhaustive()
    }
}
