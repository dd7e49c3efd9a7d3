//! Per-invocation variable scope.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::driver::Connection;

/// Mutable variable scope for one scenario invocation.
///
/// Created fresh per invocation and discarded at its end, success or
/// failure; never shared between concurrent invocations. Holds the
/// user-visible variables consumed by templating (and written by hooks
/// and loop variables) plus the invocation's connection, attached by
/// the pipeline's initialization step.
#[derive(Default)]
pub struct Context {
    vars: HashMap<String, Value>,
    connection: Option<Arc<dyn Connection>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-seeded variables (e.g. host-assigned user ids).
    pub fn with_vars(vars: HashMap<String, Value>) -> Self {
        Self {
            vars,
            connection: None,
        }
    }

    /// The variable map, as templating sees it.
    pub fn vars(&self) -> &HashMap<String, Value> {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Attach the invocation's connection. Called once by the pipeline's
    /// initialization step.
    pub fn attach_connection(&mut self, connection: Arc<dyn Connection>) {
        self.connection = Some(connection);
    }

    pub fn connection(&self) -> Option<&Arc<dyn Connection>> {
        self.connection.as_ref()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("vars", &self.vars)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}
