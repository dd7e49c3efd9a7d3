//! Scenario pipeline: the execution gate.
//!
//! A [`Scenario`] is the compiled artifact: an implicit initialization
//! step (resolve target, connect, emit `started`) followed by the
//! compiled flow, run as a strict waterfall. Each step receives the
//! context the previous step produced; the first error short-circuits
//! everything after it and becomes the invocation's result.
//!
//! `run` is `&self` and stateless across invocations: the host may call
//! it from any number of concurrent tasks, one per virtual user, each
//! with its own fresh [`Context`]. Within one invocation execution is
//! strictly sequential.

use std::sync::Arc;

use tracing::debug;

use crate::driver::Driver;
use crate::events::{EventEmitter, TelemetryEvent};
use crate::script::Target;

use super::compiler::{CompiledStep, StepResult};
use super::context::Context;

/// A compiled, runnable scenario.
pub struct Scenario {
    name: Option<String>,
    steps: Vec<CompiledStep>,
    target: Target,
    driver: Arc<dyn Driver>,
    events: Arc<EventEmitter>,
}

impl Scenario {
    pub(crate) fn new(
        name: Option<String>,
        steps: Vec<CompiledStep>,
        target: Target,
        driver: Arc<dyn Driver>,
        events: Arc<EventEmitter>,
    ) -> Self {
        Self {
            name,
            steps,
            target,
            driver,
            events,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of compiled steps, excluding the implicit initialization
    /// step.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Run one scenario invocation to completion.
    ///
    /// The context is exclusively owned by this invocation: it is
    /// threaded through every step and returned (possibly mutated) on
    /// success, or dropped with the error on failure.
    pub async fn run(&self, mut ctx: Context) -> StepResult {
        debug!(scenario = self.name.as_deref().unwrap_or("unnamed"), "starting invocation");

        let connection = match self.driver.connect(&self.target).await {
            Ok(connection) => connection,
            Err(err) => {
                self.events.emit(TelemetryEvent::error(err.identifier()));
                return Err(err.into());
            }
        };
        ctx.attach_connection(connection);
        self.events.emit(TelemetryEvent::Started);

        for step in &self.steps {
            ctx = step.as_ref()(ctx).await?;
        }
        Ok(ctx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
