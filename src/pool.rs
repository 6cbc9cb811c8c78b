//! Session pool.
//!
//! A `may_postgres::Client` is a single database session, and a transaction
//! lives on the session that ran `BEGIN`. [`ConnectionPool`] hands every base
//! query and every transaction a session of its own: a query borrows one for
//! the statement, a transaction keeps its session until it commits or rolls
//! back. Idle sessions wait in a bounded channel for the next checkout.

use crate::config::DatabaseConfig;
use crate::connection::{connect, validate_connection_string, ConnectionError};
use crate::executor::{Connection, LifeError, LifeExecutor, MayPostgresExecutor};
use crate::transaction::{TransactionError, TransactionHandle, TxOptions};
use crossbeam_channel::{bounded, Receiver, Sender};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

type Opener<C> = Box<dyn Fn() -> Result<C, ConnectionError> + Send + Sync>;

/// Bookkeeping shared with transactions that still hold a session.
struct Slots<C> {
    idle: Sender<C>,
    open: AtomicUsize,
}

impl<C> Slots<C> {
    fn release(&self, session: C) {
        if self.idle.try_send(session).is_err() {
            self.discard();
        }
    }

    fn discard(&self) {
        self.open.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A bounded pool of sessions that implements [`Connection`].
pub struct ConnectionPool<C> {
    opener: Opener<C>,
    idle: Receiver<C>,
    slots: Arc<Slots<C>>,
    max_size: usize,
    timeout: Duration,
}

impl ConnectionPool<MayPostgresExecutor> {
    /// Pool of `may_postgres` sessions to `config.url`.
    ///
    /// One session is opened up front so a bad URL or unreachable server
    /// fails here rather than on the first query.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, ConnectionError> {
        validate_connection_string(&config.url)?;
        let url = config.url.clone();
        let pool = Self::new(config.max_connections, config.pool_timeout(), move || {
            connect(&url).map(MayPostgresExecutor::new)
        });
        let first = (pool.opener)()?;
        pool.slots.open.fetch_add(1, Ordering::AcqRel);
        pool.slots.release(first);
        Ok(pool)
    }
}

impl<C: Send + 'static> ConnectionPool<C> {
    /// Pool of at most `max_size` sessions made by `opener`. Checkouts wait
    /// up to `timeout` for a session when all of them are busy.
    pub fn new<F>(max_size: usize, timeout: Duration, opener: F) -> Self
    where
        F: Fn() -> Result<C, ConnectionError> + Send + Sync + 'static,
    {
        let max_size = max_size.max(1);
        let (idle_tx, idle_rx) = bounded(max_size);
        Self {
            opener: Box::new(opener),
            idle: idle_rx,
            slots: Arc::new(Slots {
                idle: idle_tx,
                open: AtomicUsize::new(0),
            }),
            max_size,
            timeout,
        }
    }

    /// Sessions currently open, idle or checked out.
    pub fn size(&self) -> usize {
        self.slots.open.load(Ordering::Acquire)
    }

    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    fn checkout(&self) -> Result<Checkout<'_, C>, LifeError> {
        let session = self.acquire()?;
        Ok(Checkout {
            session: Some(session),
            slots: &self.slots,
        })
    }

    fn acquire(&self) -> Result<C, LifeError> {
        if let Ok(session) = self.idle.try_recv() {
            return Ok(session);
        }

        let reserved = self
            .slots
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < self.max_size).then_some(open + 1)
            })
            .is_ok();
        if reserved {
            log::debug!("opening pooled session {}/{}", self.size(), self.max_size);
            return (self.opener)().map_err(|e| {
                self.slots.discard();
                LifeError::Connect(e)
            });
        }

        self.idle.recv_timeout(self.timeout).map_err(|_| {
            log::warn!("no pooled session freed up within {:?}", self.timeout);
            LifeError::PoolTimeout(self.timeout)
        })
    }
}

impl<C> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("open", &self.slots.open.load(Ordering::Acquire))
            .field("idle", &self.idle.len())
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A session borrowed for one statement; returns to the pool on drop.
struct Checkout<'a, C> {
    session: Option<C>,
    slots: &'a Slots<C>,
}

impl<C> Checkout<'_, C> {
    fn session(&self) -> Result<&C, LifeError> {
        self.session
            .as_ref()
            .ok_or_else(|| LifeError::Other("pooled session already released".to_string()))
    }

    /// Keep the session past this checkout; the caller becomes responsible
    /// for releasing it.
    fn detach(mut self) -> Option<C> {
        self.session.take()
    }
}

impl<C> Drop for Checkout<'_, C> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.slots.release(session);
        }
    }
}

impl<C: LifeExecutor + Send + 'static> LifeExecutor for ConnectionPool<C> {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.checkout()?.session()?.execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.checkout()?.session()?.query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        self.checkout()?.session()?.query_all(query, params)
    }
}

impl<C: Connection + 'static> Connection for ConnectionPool<C> {
    fn begin(&self, options: &TxOptions) -> Result<Arc<dyn TransactionHandle>, TransactionError> {
        let checkout = self.checkout().map_err(TransactionError::Begin)?;
        let inner = checkout.session().map_err(TransactionError::Begin)?.begin(options)?;
        Ok(Arc::new(PooledTransaction {
            inner,
            session: Mutex::new(checkout.detach()),
            slots: Arc::clone(&self.slots),
        }))
    }
}

/// A transaction holding its session until it finishes.
///
/// The session goes back to the pool after a successful commit or rollback.
/// A failed finish, or a handle dropped while still open, discards it.
struct PooledTransaction<C> {
    inner: Arc<dyn TransactionHandle>,
    session: Mutex<Option<C>>,
    slots: Arc<Slots<C>>,
}

impl<C> PooledTransaction<C> {
    fn finish(&self, result: Result<(), TransactionError>) -> Result<(), TransactionError> {
        if matches!(result, Err(TransactionError::TransactionClosed)) {
            return result;
        }
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(session) = session {
            if result.is_ok() {
                self.slots.release(session);
            } else {
                log::warn!("discarding pooled session after a failed transaction end");
                self.slots.discard();
            }
        }
        result
    }
}

impl<C: Send> TransactionHandle for PooledTransaction<C> {
    fn commit(&self) -> Result<(), TransactionError> {
        self.finish(self.inner.commit())
    }

    fn rollback(&self) -> Result<(), TransactionError> {
        self.finish(self.inner.rollback())
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<C> LifeExecutor for PooledTransaction<C> {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.inner.execute(query, params)
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.inner.query_one(query, params)
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        self.inner.query_all(query, params)
    }
}

impl<C> Drop for PooledTransaction<C> {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if session.is_some() {
            log::warn!("transaction dropped while open, discarding its session");
            self.slots.discard();
        }
    }
}
