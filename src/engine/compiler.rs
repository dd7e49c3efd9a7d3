//! Step compiler: the compile surface of the engine.
//!
//! `ScenarioEngine::compile()` turns a [`ScenarioSpec`] into a
//! [`Scenario`]: every step spec maps to one [`CompiledStep`], loop
//! bodies compile recursively, and hook names resolve against the
//! registry **here**, at compile time. A compiled step carries
//! `Option`s, never name lookups.
//!
//! Compilation performs no I/O and cannot fail. A step shape the
//! compiler does not recognize becomes an identity passthrough (logged
//! at debug), so forward-incompatible script syntax degrades instead of
//! crashing a run.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use rand::Rng;
use tracing::debug;

use crate::driver::Driver;
use crate::error::EngineError;
use crate::events::EventEmitter;
use crate::hooks::HookRegistry;
use crate::script::{ScenarioSpec, ScriptConfig, StepSpec, ThinkDefaults, ThinkSpec};
use crate::template::TemplateEngine;

use super::context::Context;
use super::loops::{self, LoopOptions};
use super::pipeline::Scenario;

/// Result of running one compiled step: the context to hand to the next
/// step, or the error that aborts the invocation.
pub type StepResult = Result<Context, EngineError>;

/// One executable unit of a scenario, opaque to the caller.
///
/// Steps take the context by value and give it back, which is what makes
/// the pipeline a waterfall: exactly one owner at a time, no sharing
/// across concurrent invocations.
pub type CompiledStep = Arc<dyn Fn(Context) -> BoxFuture<'static, StepResult> + Send + Sync>;

// ---------------------------------------------------------------------------
// ScenarioEngine — compile surface
// ---------------------------------------------------------------------------

/// Compiles scenario specs against one immutable configuration.
///
/// Everything a compiled step needs (target, defaults, hooks, template
/// registry, event channel, driver) is captured here at construction
/// and shared by `Arc`; there is no process-wide mutable state.
pub struct ScenarioEngine {
    pub(crate) config: Arc<ScriptConfig>,
    pub(crate) hooks: Arc<HookRegistry>,
    pub(crate) events: Arc<EventEmitter>,
    pub(crate) templates: Arc<TemplateEngine>,
    pub(crate) driver: Arc<dyn Driver>,
}

impl ScenarioEngine {
    pub fn new(
        config: ScriptConfig,
        driver: Arc<dyn Driver>,
        hooks: HookRegistry,
        events: Arc<EventEmitter>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            hooks: Arc::new(hooks),
            events,
            templates: Arc::new(TemplateEngine::new()),
            driver,
        }
    }

    /// Compile one scenario into a runnable pipeline.
    pub fn compile(&self, spec: &ScenarioSpec) -> Scenario {
        let steps = spec.flow.iter().map(|step| self.compile_step(step)).collect();
        Scenario::new(
            spec.name.clone(),
            steps,
            self.config.target.clone(),
            Arc::clone(&self.driver),
            Arc::clone(&self.events),
        )
    }

    /// Compile a single step spec. Exactly one variant matches; the
    /// `Unknown` catch-all degrades to a passthrough.
    pub(crate) fn compile_step(&self, spec: &StepSpec) -> CompiledStep {
        match spec {
            StepSpec::Query(step) => self.compile_query(&step.query),
            StepSpec::Loop(step) => {
                let body = step.body.iter().map(|s| self.compile_step(s)).collect();
                let while_hook = step
                    .while_true
                    .as_deref()
                    .and_then(|name| self.hooks.loop_condition(name).cloned());
                loops::make_loop(
                    body,
                    LoopOptions {
                        count: step.count,
                        over: step.over.clone(),
                        loop_value: step.loop_value.clone(),
                        while_hook,
                    },
                )
            }
            StepSpec::Think(step) => self.compile_think(&step.think),
            StepSpec::Function(step) => self.compile_function(&step.function),
            StepSpec::Log(step) => Self::compile_log(&step.log),
            StepSpec::Unknown(raw) => {
                debug!(?raw, "unrecognized step shape; compiling to a passthrough");
                Self::passthrough()
            }
        }
    }

    /// A `think` step: suspend the invocation for the templated number
    /// of seconds. No protocol I/O, no telemetry.
    fn compile_think(&self, spec: &ThinkSpec) -> CompiledStep {
        let spec = spec.clone();
        let templates = Arc::clone(&self.templates);
        let defaults = self.config.defaults.think.clone();
        Arc::new(move |ctx: Context| -> BoxFuture<'static, StepResult> {
            let spec = spec.clone();
            let templates = Arc::clone(&templates);
            let defaults = defaults.clone();
            Box::pin(async move {
                let seconds = match &spec {
                    ThinkSpec::Seconds(seconds) => *seconds,
                    ThinkSpec::Template(template) => {
                        let rendered = templates.render(template, &ctx);
                        rendered.trim().parse::<f64>().unwrap_or_else(|_| {
                            debug!(%rendered, "think duration did not parse; skipping pause");
                            0.0
                        })
                    }
                };
                let seconds = apply_jitter(seconds, &defaults);
                if seconds > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                }
                Ok(ctx)
            })
        })
    }

    /// A `function` step: run the named hook, or pass through when no
    /// hook is registered under that name.
    ///
    /// The hook owns event signaling for this step (it received the
    /// emitter), so the engine emits nothing here; an `Err` from the
    /// hook still aborts the invocation.
    fn compile_function(&self, name: &str) -> CompiledStep {
        let hook = self.hooks.function(name).cloned();
        let name = name.to_string();
        let events = Arc::clone(&self.events);
        Arc::new(move |mut ctx: Context| -> BoxFuture<'static, StepResult> {
            let hook = hook.clone();
            let name = name.clone();
            let events = Arc::clone(&events);
            Box::pin(async move {
                match hook {
                    Some(hook) => {
                        debug!(hook = %name, "running function step");
                        match hook.call(&mut ctx, &events).await {
                            Ok(()) => Ok(ctx),
                            Err(source) => Err(EngineError::Hook { hook: name, source }),
                        }
                    }
                    None => Ok(ctx),
                }
            })
        })
    }

    /// A `log` step: message delivery is the host's concern, so this is
    /// a passthrough with a debug trace.
    fn compile_log(message: &str) -> CompiledStep {
        let message = message.to_string();
        Arc::new(move |ctx: Context| -> BoxFuture<'static, StepResult> {
            let message = message.clone();
            Box::pin(async move {
                debug!(%message, "log step");
                Ok(ctx)
            })
        })
    }

    /// Identity step.
    fn passthrough() -> CompiledStep {
        Arc::new(|ctx: Context| -> BoxFuture<'static, StepResult> {
            Box::pin(async move { Ok(ctx) })
        })
    }
}

/// Spread a think duration by the configured jitter percentage.
fn apply_jitter(seconds: f64, defaults: &ThinkDefaults) -> f64 {
    match defaults.jitter {
        Some(pct) if pct > 0.0 && seconds > 0.0 => {
            let spread = seconds * pct / 100.0;
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            (seconds + offset).max(0.0)
        }
        _ => seconds,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
