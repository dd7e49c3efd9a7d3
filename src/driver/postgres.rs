//! Postgres driver over sqlx.
//!
//! Opens one dedicated `PgConnection` per scenario invocation: the
//! engine's ownership model wants a connection per virtual user, so no
//! pool sits in between. Argument values bind by JSON type; arrays and
//! objects bind as JSONB.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgConnection};
use sqlx::query::Query;
use sqlx::{Connection as _, Postgres};
use tokio::sync::Mutex;

use super::{Connection, Driver, DriverError, QueryOutcome};
use crate::script::Target;

/// [`Driver`] for PostgreSQL targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    async fn connect(&self, target: &Target) -> Result<Arc<dyn Connection>, DriverError> {
        let conn = PgConnection::connect(&target.connection_url())
            .await
            .map_err(|err| DriverError::Connect {
                message: err.to_string(),
            })?;
        Ok(Arc::new(PostgresConnection {
            inner: Mutex::new(conn),
        }))
    }
}

struct PostgresConnection {
    // The engine serializes queries within an invocation, so this lock
    // is uncontended; it only satisfies the &self contract.
    inner: Mutex<PgConnection>,
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn query(&self, statement: &str, args: &[Value]) -> Result<QueryOutcome, DriverError> {
        let mut query = sqlx::query(statement);
        for arg in args {
            query = bind_value(query, arg);
        }
        let mut conn = self.inner.lock().await;
        let result = query
            .execute(&mut *conn)
            .await
            .map_err(map_query_error)?;
        Ok(QueryOutcome {
            row_count: result.rows_affected(),
        })
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.clone()),
    }
}

fn map_query_error(err: sqlx::Error) -> DriverError {
    let code = match &err {
        sqlx::Error::Database(db) => db.code().map(|c| c.to_string()),
        _ => None,
    };
    DriverError::Query {
        code,
        message: err.to_string(),
    }
}
