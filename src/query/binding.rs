//! Executor resolution for bound queries.

use crate::context::Context;
use crate::executor::{Connection, LifeError, LifeExecutor};
use crate::transaction::{tx_from_context, TxRef};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::fmt;
use std::sync::Arc;

/// The executor a query runs on, fixed when the query is created.
#[derive(Clone)]
pub enum Binding {
    /// The ambient transaction of the creating context.
    Transaction(TxRef),
    /// The querier's base connection.
    Connection(Arc<dyn Connection>),
}

impl Binding {
    /// The ambient transaction of `ctx` if there is one, `base` otherwise.
    pub fn resolve(ctx: &Context, base: &Arc<dyn Connection>) -> Self {
        match tx_from_context(ctx) {
            Some(tx) => Binding::Transaction(tx),
            None => Binding::Connection(Arc::clone(base)),
        }
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, Binding::Transaction(_))
    }

    pub fn transaction(&self) -> Option<&TxRef> {
        match self {
            Binding::Transaction(tx) => Some(tx),
            Binding::Connection(_) => None,
        }
    }

    /// Whether this binding is the base connection `conn` itself.
    pub fn is_connection(&self, conn: &Arc<dyn Connection>) -> bool {
        match self {
            Binding::Connection(bound) => {
                std::ptr::eq(Arc::as_ptr(bound).cast::<()>(), Arc::as_ptr(conn).cast::<()>())
            }
            Binding::Transaction(_) => false,
        }
    }

    pub fn executor(&self) -> &dyn LifeExecutor {
        match self {
            Binding::Transaction(tx) => tx,
            Binding::Connection(conn) => conn.as_ref(),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Transaction(tx) => f.debug_tuple("Transaction").field(tx).finish(),
            Binding::Connection(conn) => f
                .debug_tuple("Connection")
                .field(&Arc::as_ptr(conn).cast::<()>())
                .finish(),
        }
    }
}

impl LifeExecutor for Binding {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.executor().execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.executor().query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        self.executor().query_all(query, params)
    }
}
