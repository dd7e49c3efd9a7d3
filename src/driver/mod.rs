//! Connection contract.
//!
//! The engine never talks wire protocol itself: it asks a [`Driver`] for
//! a connection at pipeline start and runs parameterized statements
//! through the [`Connection`] it gets back. A connection is exclusively
//! owned by one scenario invocation for that invocation's whole
//! lifetime; pooling and reuse policy live behind the driver, not here.
//!
//! Two drivers ship with the crate: [`postgres::PostgresDriver`] (sqlx,
//! behind the `database` feature) and [`memory::MemoryDriver`] for tests
//! and dry runs.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::script::Target;

pub use memory::MemoryDriver;
#[cfg(feature = "database")]
pub use postgres::PostgresDriver;

/// Result of one successful query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Rows affected or returned, as reported by the data store.
    pub row_count: u64,
}

/// A driver failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    #[error("connection to target failed: {message}")]
    Connect { message: String },

    #[error("query failed: {message}")]
    Query {
        /// Store-specific error code, when the driver exposes one
        /// (e.g. a SQLSTATE).
        code: Option<String>,
        message: String,
    },
}

impl DriverError {
    /// Short identifier for telemetry: the store-specific code when
    /// present, the message otherwise.
    pub fn identifier(&self) -> String {
        match self {
            DriverError::Connect { message } => message.clone(),
            DriverError::Query { code, message } => {
                code.clone().unwrap_or_else(|| message.clone())
            }
        }
    }
}

/// Opens connections to a target data store.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn connect(&self, target: &Target) -> Result<Arc<dyn Connection>, DriverError>;
}

/// A live connection, exclusively owned by one scenario invocation.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute one parameterized statement.
    async fn query(&self, statement: &str, args: &[Value]) -> Result<QueryOutcome, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_prefers_the_error_code() {
        let err = DriverError::Query {
            code: Some("23505".into()),
            message: "duplicate key value violates unique constraint".into(),
        };
        assert_eq!(err.identifier(), "23505");
    }

    #[test]
    fn identifier_falls_back_to_the_message() {
        let err = DriverError::Query {
            code: None,
            message: "connection reset".into(),
        };
        assert_eq!(err.identifier(), "connection reset");

        let err = DriverError::Connect {
            message: "refused".into(),
        };
        assert_eq!(err.identifier(), "refused");
    }
}
