//! Named hooks: the engine's extension points.
//!
//! A script references hooks by name (`beforeRequest`, `afterResponse`,
//! `whileTrue`, `function`); the host supplies the implementations in a
//! [`HookRegistry`]. Names are resolved **at compile time**: the compiler
//! looks each name up once and captures the result as an `Option` inside
//! the compiled step, so absence is an ordinary no-op passthrough, never
//! a run-time existence check and never an error.
//!
//! Hooks are async and signal completion through their return value:
//! `Ok(())` continues the pipeline (with whatever Context/params
//! mutations the hook made), `Err(HookError)` aborts the current
//! invocation. Loop-condition hooks return a plain `bool`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::driver::QueryOutcome;
use crate::engine::{Context, QueryParams};
use crate::events::EventEmitter;

/// Outcome of a hook invocation.
pub type HookResult = Result<(), HookError>;

/// Failure reported by a hook.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Hook traits — one per extension point
// ---------------------------------------------------------------------------

/// Hook behind a `function` step. May mutate the context (e.g. set
/// variables consumed by later templating) and emit its own events.
#[async_trait]
pub trait FunctionHook: Send + Sync {
    async fn call(&self, ctx: &mut Context, events: &EventEmitter) -> HookResult;
}

/// Hook run before a query is sent. Receives the rendered parameters and
/// may rewrite them (e.g. inject computed values).
#[async_trait]
pub trait BeforeQueryHook: Send + Sync {
    async fn call(
        &self,
        params: &mut QueryParams,
        ctx: &mut Context,
        events: &EventEmitter,
    ) -> HookResult;
}

/// Hook run after a query succeeds, before the `response` event. May
/// post-process the outcome into the context for later steps.
#[async_trait]
pub trait AfterQueryHook: Send + Sync {
    async fn call(
        &self,
        params: &QueryParams,
        outcome: &QueryOutcome,
        ctx: &mut Context,
        events: &EventEmitter,
    ) -> HookResult;
}

/// Loop-condition hook consulted before each pass; `false` stops the
/// loop.
#[async_trait]
pub trait LoopConditionHook: Send + Sync {
    async fn check(&self, ctx: &Context) -> bool;
}

// ---------------------------------------------------------------------------
// HookRegistry — name-indexed, typed hook maps
// ---------------------------------------------------------------------------

/// The host-supplied "processor" configuration: hook implementations
/// indexed by the names scripts refer to them by.
#[derive(Default, Clone)]
pub struct HookRegistry {
    functions: HashMap<String, Arc<dyn FunctionHook>>,
    before_query: HashMap<String, Arc<dyn BeforeQueryHook>>,
    after_query: HashMap<String, Arc<dyn AfterQueryHook>>,
    loop_conditions: HashMap<String, Arc<dyn LoopConditionHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function(&mut self, name: impl Into<String>, hook: Arc<dyn FunctionHook>) {
        self.functions.insert(name.into(), hook);
    }

    pub fn register_before_query(
        &mut self,
        name: impl Into<String>,
        hook: Arc<dyn BeforeQueryHook>,
    ) {
        self.before_query.insert(name.into(), hook);
    }

    pub fn register_after_query(
        &mut self,
        name: impl Into<String>,
        hook: Arc<dyn AfterQueryHook>,
    ) {
        self.after_query.insert(name.into(), hook);
    }

    pub fn register_loop_condition(
        &mut self,
        name: impl Into<String>,
        hook: Arc<dyn LoopConditionHook>,
    ) {
        self.loop_conditions.insert(name.into(), hook);
    }

    pub fn function(&self, name: &str) -> Option<&Arc<dyn FunctionHook>> {
        self.functions.get(name)
    }

    pub fn before_query(&self, name: &str) -> Option<&Arc<dyn BeforeQueryHook>> {
        self.before_query.get(name)
    }

    pub fn after_query(&self, name: &str) -> Option<&Arc<dyn AfterQueryHook>> {
        self.after_query.get(name)
    }

    pub fn loop_condition(&self, name: &str) -> Option<&Arc<dyn LoopConditionHook>> {
        self.loop_conditions.get(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
