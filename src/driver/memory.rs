//! Scripted in-memory driver.
//!
//! Stands in for a real data store in unit and integration tests, and
//! doubles as a dry-run driver for validating scripts without a live
//! target. Outcomes are served from a queue (default: success with one
//! row); every executed statement is recorded for inspection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{Connection, Driver, DriverError, QueryOutcome};
use crate::script::Target;

/// One recorded statement execution.
#[derive(Debug, Clone)]
pub struct ExecutedQuery {
    pub statement: String,
    pub args: Vec<Value>,
}

#[derive(Default)]
struct Inner {
    outcomes: Mutex<VecDeque<Result<QueryOutcome, DriverError>>>,
    executed: Mutex<Vec<ExecutedQuery>>,
    refuse_connections: AtomicBool,
}

/// In-memory [`Driver`] serving scripted outcomes.
#[derive(Default)]
pub struct MemoryDriver {
    inner: Arc<Inner>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome for the next unanswered query. Once the queue
    /// is empty, queries succeed with a row count of 1.
    pub fn push_outcome(&self, outcome: Result<QueryOutcome, DriverError>) {
        self.inner.outcomes.lock().unwrap().push_back(outcome);
    }

    /// Make subsequent `connect` calls fail.
    pub fn refuse_connections(&self) {
        self.inner.refuse_connections.store(true, Ordering::SeqCst);
    }

    /// Every statement executed so far, across all connections, in
    /// execution order.
    pub fn executed(&self) -> Vec<ExecutedQuery> {
        self.inner.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn connect(&self, target: &Target) -> Result<Arc<dyn Connection>, DriverError> {
        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(DriverError::Connect {
                message: format!("refused connection to {}", target.connection_url()),
            });
        }
        Ok(Arc::new(MemoryConnection {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemoryConnection {
    inner: Arc<Inner>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn query(&self, statement: &str, args: &[Value]) -> Result<QueryOutcome, DriverError> {
        self.inner.executed.lock().unwrap().push(ExecutedQuery {
            statement: statement.to_string(),
            args: args.to_vec(),
        });
        self.inner
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(QueryOutcome { row_count: 1 }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
