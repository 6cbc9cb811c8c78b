//! Recording connection and transaction stubs shared by the integration tests.

#![allow(dead_code)]

use lifeguard_scope::{
    Connection, ConnectionPool, LifeError, LifeExecutor, TransactionError, TransactionHandle,
    TxOptions,
};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Log {
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    statements: Mutex<Vec<String>>,
}

impl Log {
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.begins.load(Ordering::SeqCst),
            self.commits.load(Ordering::SeqCst),
            self.rollbacks.load(Ordering::SeqCst),
        )
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    fn record(&self, who: &str, sql: &str) {
        self.statements.lock().unwrap().push(format!("{who}: {sql}"));
    }
}

pub struct RecordingTx {
    log: Arc<Log>,
    label: String,
    closed: AtomicBool,
}

impl TransactionHandle for RecordingTx {
    fn commit(&self) -> Result<(), TransactionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(TransactionError::TransactionClosed);
        }
        self.log.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> Result<(), TransactionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(TransactionError::TransactionClosed);
        }
        self.log.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl LifeExecutor for RecordingTx {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.log.record(&self.label, query);
        Ok(1)
    }

    fn query_one(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.log.record(&self.label, query);
        Err(LifeError::NotFound)
    }

    fn query_all(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        self.log.record(&self.label, query);
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct RecordingConnection {
    pub log: Arc<Log>,
    suffix: String,
}

impl RecordingConnection {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// One numbered session writing to `log`; statements read `conn#id` / `tx#id`.
    pub fn session(log: Arc<Log>, id: usize) -> Self {
        Self {
            log,
            suffix: format!("#{id}"),
        }
    }

    fn label(&self) -> String {
        format!("conn{}", self.suffix)
    }
}

/// A pool of numbered recording sessions sharing one log.
pub fn recording_pool(max_size: usize) -> (Arc<ConnectionPool<RecordingConnection>>, Arc<Log>) {
    let log = Arc::new(Log::default());
    let next_id = AtomicUsize::new(1);
    let opener_log = Arc::clone(&log);
    let pool = ConnectionPool::new(max_size, Duration::from_millis(50), move || {
        Ok(RecordingConnection::session(
            Arc::clone(&opener_log),
            next_id.fetch_add(1, Ordering::SeqCst),
        ))
    });
    (Arc::new(pool), log)
}

impl LifeExecutor for RecordingConnection {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.log.record(&self.label(), query);
        Ok(1)
    }

    fn query_one(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.log.record(&self.label(), query);
        Err(LifeError::NotFound)
    }

    fn query_all(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        self.log.record(&self.label(), query);
        Ok(Vec::new())
    }
}

impl Connection for RecordingConnection {
    fn begin(&self, options: &TxOptions) -> Result<Arc<dyn TransactionHandle>, TransactionError> {
        self.log.begins.fetch_add(1, Ordering::SeqCst);
        self.log.record(&self.label(), &options.begin_sql());
        Ok(Arc::new(RecordingTx {
            log: Arc::clone(&self.log),
            label: format!("tx{}", self.suffix),
            closed: AtomicBool::new(false),
        }))
    }
}
