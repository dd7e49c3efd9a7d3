//! Query step executor.
//!
//! The most involved step kind. Execution follows a fixed protocol per
//! invocation:
//!
//! ```text
//! render templates → beforeRequest hook → `request` event
//!   → timed Connection::query
//!       ├─ failure → `error` event, abort
//!       └─ success → afterResponse hook → `response` event, advance
//! ```
//!
//! Hooks interpose on both sides of the protocol call so user code can
//! rewrite parameters or post-process results into the context without
//! the executor knowing the domain semantics. A hook failure is treated
//! exactly like a query failure: one `error` event, then abort.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::error::EngineError;
use crate::events::TelemetryEvent;
use crate::hooks::{AfterQueryHook, BeforeQueryHook};
use crate::script::{QueryBody, Target};

use super::compiler::{CompiledStep, ScenarioEngine, StepResult};
use super::context::Context;

/// Rendered query parameters, as hooks see them.
///
/// The `beforeRequest` hook receives this mutably and may rewrite any
/// field before the statement is sent.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub statement: String,
    pub args: Vec<Value>,
    pub target: Target,
}

/// Compile-time normalization of both script forms of a query step.
struct CompiledQuery {
    statement: String,
    values: Vec<Value>,
    target: Target,
    before: Option<(String, Arc<dyn BeforeQueryHook>)>,
    after: Option<(String, Arc<dyn AfterQueryHook>)>,
}

impl ScenarioEngine {
    pub(crate) fn compile_query(&self, body: &QueryBody) -> CompiledStep {
        // Normalize: the bare-string and structured forms compile
        // identically.
        let (statement, values, before_name, after_name) = match body {
            QueryBody::Statement(statement) => (statement.clone(), Vec::new(), None, None),
            QueryBody::Full(q) => (
                q.statement.clone(),
                q.values.clone(),
                q.before_request.clone(),
                q.after_response.clone(),
            ),
        };
        let before = before_name.and_then(|name| {
            self.hooks
                .before_query(&name)
                .cloned()
                .map(|hook| (name, hook))
        });
        let after = after_name.and_then(|name| {
            self.hooks
                .after_query(&name)
                .cloned()
                .map(|hook| (name, hook))
        });

        let compiled = Arc::new(CompiledQuery {
            statement,
            values,
            target: self.config.target.clone(),
            before,
            after,
        });
        let templates = Arc::clone(&self.templates);
        let events = Arc::clone(&self.events);

        Arc::new(move |mut ctx: Context| -> BoxFuture<'static, StepResult> {
            let query = Arc::clone(&compiled);
            let templates = Arc::clone(&templates);
            let events = Arc::clone(&events);
            Box::pin(async move {
                // Rendering is pure; the context is only read here.
                let mut params = QueryParams {
                    statement: templates.render(&query.statement, &ctx),
                    args: query
                        .values
                        .iter()
                        .map(|value| templates.render_value(value, &ctx))
                        .collect(),
                    target: query.target.clone(),
                };
                debug!(statement = %params.statement, "running query step");

                if let Some((name, hook)) = &query.before {
                    if let Err(source) = hook.call(&mut params, &mut ctx, &events).await {
                        events.emit(TelemetryEvent::error(source.to_string()));
                        return Err(EngineError::Hook {
                            hook: name.clone(),
                            source,
                        });
                    }
                }

                events.emit(TelemetryEvent::Request);
                let started = Instant::now();

                let connection = match ctx.connection().cloned() {
                    Some(connection) => connection,
                    None => {
                        events.emit(TelemetryEvent::error("no active connection"));
                        return Err(EngineError::NoConnection);
                    }
                };
                let outcome = match connection.query(&params.statement, &params.args).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        debug!(error = %err, "query step failed");
                        events.emit(TelemetryEvent::error(err.identifier()));
                        return Err(err.into());
                    }
                };
                let elapsed_ns = started.elapsed().as_nanos() as u64;

                if let Some((name, hook)) = &query.after {
                    if let Err(source) = hook.call(&params, &outcome, &mut ctx, &events).await {
                        events.emit(TelemetryEvent::error(source.to_string()));
                        return Err(EngineError::Hook {
                            hook: name.clone(),
                            source,
                        });
                    }
                }

                events.emit(TelemetryEvent::Response {
                    elapsed_ns,
                    status: 0,
                    rows: outcome.row_count,
                });
                Ok(ctx)
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
