//! In-memory connection and transaction stubs for unit tests.
//!
//! Statements are recorded rather than executed; `query_one` always reports
//! no rows since a `may_postgres::Row` cannot be built outside the driver.

use crate::executor::{Connection, LifeError, LifeExecutor};
use crate::transaction::{TransactionError, TransactionHandle, TxOptions};
use may_postgres::types::ToSql;
use may_postgres::Row;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct Counters {
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    statements: Mutex<Vec<String>>,
}

impl Counters {
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    fn record(&self, sql: String) {
        self.statements.lock().unwrap().push(sql);
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Failures {
    begin: bool,
    commit: bool,
    rollback: bool,
}

fn injected(stage: &str) -> LifeError {
    LifeError::Other(format!("injected {stage} failure"))
}

#[derive(Debug, Default)]
pub struct StubTransaction {
    counters: Arc<Counters>,
    closed: AtomicBool,
    failures: Failures,
}

impl StubTransaction {
    fn close(&self) -> Result<(), TransactionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(TransactionError::TransactionClosed);
        }
        Ok(())
    }
}

impl TransactionHandle for StubTransaction {
    fn commit(&self) -> Result<(), TransactionError> {
        self.close()?;
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        if self.failures.commit {
            return Err(TransactionError::Commit(injected("commit")));
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), TransactionError> {
        self.close()?;
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.failures.rollback {
            return Err(TransactionError::Rollback(injected("rollback")));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl LifeExecutor for StubTransaction {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.counters.record(format!("tx: {query}"));
        Ok(1)
    }

    fn query_one(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.counters.record(format!("tx: {query}"));
        Err(LifeError::NotFound)
    }

    fn query_all(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        self.counters.record(format!("tx: {query}"));
        Ok(Vec::new())
    }
}

#[derive(Debug, Default)]
pub struct StubConnection {
    counters: Arc<Counters>,
    failures: Failures,
}

impl StubConnection {
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn failing_begin(mut self) -> Self {
        self.failures.begin = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.failures.commit = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.failures.rollback = true;
        self
    }
}

impl LifeExecutor for StubConnection {
    fn execute(&self, query: &str, _params: &[&dyn ToSql]) -> Result<u64, LifeError> {
        self.counters.record(format!("conn: {query}"));
        Ok(1)
    }

    fn query_one(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Row, LifeError> {
        self.counters.record(format!("conn: {query}"));
        Err(LifeError::NotFound)
    }

    fn query_all(&self, query: &str, _params: &[&dyn ToSql]) -> Result<Vec<Row>, LifeError> {
        self.counters.record(format!("conn: {query}"));
        Ok(Vec::new())
    }
}

impl Connection for StubConnection {
    fn begin(&self, options: &TxOptions) -> Result<Arc<dyn TransactionHandle>, TransactionError> {
        if self.failures.begin {
            return Err(TransactionError::Begin(injected("begin")));
        }
        self.counters.begins.fetch_add(1, Ordering::SeqCst);
        self.counters.record(options.begin_sql());
        Ok(Arc::new(StubTransaction {
            counters: Arc::clone(&self.counters),
            closed: AtomicBool::new(false),
            failures: self.failures,
        }))
    }
}
