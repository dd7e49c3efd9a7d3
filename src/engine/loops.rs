//! Loop constructor.
//!
//! Wraps a compiled body into a single step that repeats it under
//! count/collection/conditional semantics. Termination is decided afresh
//! before every pass, in precedence order:
//!
//! 1. the loop-condition hook, when configured: a false result stops
//!    the loop before the body runs;
//! 2. the iteration collection, when configured: one pass per element,
//!    in order, with `count` as an additional cap;
//! 3. the pass count, where `-1` or absent means unbounded.
//!
//! An unbounded loop with no loop-condition hook never terminates; that
//! is a caller configuration error, surfaced as a warning at run time
//! and deliberately not auto-corrected.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::warn;

use crate::hooks::LoopConditionHook;
use crate::script::OverSource;

use super::compiler::{CompiledStep, StepResult};
use super::context::Context;

/// Options for one compiled loop.
pub(crate) struct LoopOptions {
    pub count: Option<i64>,
    pub over: Option<OverSource>,
    /// Context key written with the current index or element before each
    /// pass.
    pub loop_value: String,
    /// Loop-condition hook, already resolved by the compiler.
    pub while_hook: Option<Arc<dyn LoopConditionHook>>,
}

/// Wrap a compiled body into a single repeating step.
pub(crate) fn make_loop(body: Vec<CompiledStep>, opts: LoopOptions) -> CompiledStep {
    let body = Arc::new(body);
    let opts = Arc::new(opts);
    Arc::new(move |mut ctx: Context| -> BoxFuture<'static, StepResult> {
        let body = Arc::clone(&body);
        let opts = Arc::clone(&opts);
        Box::pin(async move {
            let cap = opts.count.filter(|n| *n >= 0).map(|n| n as usize);

            // The collection is resolved once, at loop entry; body
            // mutations of the source variable do not retarget an
            // iteration already underway.
            let items: Option<Vec<Value>> = match &opts.over {
                Some(OverSource::Key(key)) => Some(
                    ctx.get(key)
                        .and_then(|v| v.as_array().cloned())
                        .unwrap_or_default(),
                ),
                Some(OverSource::List(values)) => Some(values.clone()),
                None => None,
            };

            if cap.is_none() && items.is_none() && opts.while_hook.is_none() {
                warn!(
                    loop_value = %opts.loop_value,
                    "unbounded loop without a whileTrue condition; this loop will never terminate"
                );
            }

            let mut index = 0usize;
            loop {
                if let Some(hook) = &opts.while_hook {
                    if !hook.check(&ctx).await {
                        break;
                    }
                }
                if let Some(cap) = cap {
                    if index >= cap {
                        break;
                    }
                }
                let current = match &items {
                    Some(list) => match list.get(index) {
                        Some(element) => element.clone(),
                        None => break,
                    },
                    None => Value::from(index as u64),
                };
                ctx.set(opts.loop_value.clone(), current);

                for step in body.iter() {
                    ctx = step.as_ref()(ctx).await?;
                }
                index += 1;
            }
            Ok(ctx)
        })
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Body step that records the loop variable it observes.
    fn recording_step(seen: Arc<Mutex<Vec<Value>>>, key: &'static str) -> CompiledStep {
        Arc::new(move |ctx: Context| -> BoxFuture<'static, StepResult> {
            let seen = Arc::clone(&seen);
            Box::pin(async move {
                seen.lock()
                    .unwrap()
                    .push(ctx.get(key).cloned().unwrap_or(Value::Null));
                Ok(ctx)
            })
        })
    }

    fn failing_step() -> CompiledStep {
        Arc::new(|_ctx: Context| -> BoxFuture<'static, StepResult> {
            Box::pin(async move {
                Err(crate::driver::DriverError::Query {
                    code: None,
                    message: "body exploded".into(),
                }
                .into())
            })
        })
    }

    #[tokio::test]
    async fn count_loop_runs_exactly_count_times_with_zero_based_indices() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let step = make_loop(
            vec![recording_step(Arc::clone(&seen), "$loopCount")],
            LoopOptions {
                count: Some(3),
                over: None,
                loop_value: "$loopCount".into(),
                while_hook: None,
            },
        );

        step.as_ref()(Context::new()).await.expect("loop should finish");
        assert_eq!(*seen.lock().unwrap(), vec![json!(0), json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn zero_count_loop_never_runs_its_body() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let step = make_loop(
            vec![recording_step(Arc::clone(&seen), "$loopCount")],
            LoopOptions {
                count: Some(0),
                over: None,
                loop_value: "$loopCount".into(),
                while_hook: None,
            },
        );
        step.as_ref()(Context::new()).await.expect("loop should finish");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn collection_loop_runs_once_per_element_without_a_count() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let step = make_loop(
            vec![recording_step(Arc::clone(&seen), "table")],
            LoopOptions {
                count: None,
                over: Some(OverSource::Key("tables".into())),
                loop_value: "table".into(),
                while_hook: None,
            },
        );

        let mut ctx = Context::new();
        ctx.set("tables", json!(["users", "orders"]));
        step.as_ref()(ctx).await.expect("loop should finish");
        assert_eq!(*seen.lock().unwrap(), vec![json!("users"), json!("orders")]);
    }

    #[tokio::test]
    async fn count_caps_collection_iteration() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let step = make_loop(
            vec![recording_step(Arc::clone(&seen), "item")],
            LoopOptions {
                count: Some(2),
                over: Some(OverSource::List(vec![json!("a"), json!("b"), json!("c")])),
                loop_value: "item".into(),
                while_hook: None,
            },
        );
        step.as_ref()(Context::new()).await.expect("loop should finish");
        assert_eq!(*seen.lock().unwrap(), vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn missing_collection_key_means_zero_passes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let step = make_loop(
            vec![recording_step(Arc::clone(&seen), "item")],
            LoopOptions {
                count: None,
                over: Some(OverSource::Key("absent".into())),
                loop_value: "item".into(),
                while_hook: None,
            },
        );
        step.as_ref()(Context::new()).await.expect("loop should finish");
        assert!(seen.lock().unwrap().is_empty());
    }

    struct StopAfter {
        remaining: AtomicUsize,
    }

    #[async_trait]
    impl LoopConditionHook for StopAfter {
        async fn check(&self, _ctx: &Context) -> bool {
            // fetch_update returns the previous value.
            self.remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[tokio::test]
    async fn while_hook_stops_an_unbounded_loop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let step = make_loop(
            vec![recording_step(Arc::clone(&seen), "$loopCount")],
            LoopOptions {
                count: Some(-1),
                over: None,
                loop_value: "$loopCount".into(),
                while_hook: Some(Arc::new(StopAfter {
                    remaining: AtomicUsize::new(4),
                })),
            },
        );
        step.as_ref()(Context::new()).await.expect("loop should finish");
        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn while_hook_is_checked_before_the_first_pass() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let step = make_loop(
            vec![recording_step(Arc::clone(&seen), "$loopCount")],
            LoopOptions {
                count: Some(5),
                over: None,
                loop_value: "$loopCount".into(),
                while_hook: Some(Arc::new(StopAfter {
                    remaining: AtomicUsize::new(0),
                })),
            },
        );
        step.as_ref()(Context::new()).await.expect("loop should finish");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn body_error_aborts_the_loop_and_propagates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let step = make_loop(
            vec![recording_step(Arc::clone(&seen), "$loopCount"), failing_step()],
            LoopOptions {
                count: Some(3),
                over: None,
                loop_value: "$loopCount".into(),
                while_hook: None,
            },
        );
        let err = step.as_ref()(Context::new()).await.err().expect("body error propagates");
        assert!(matches!(err, crate::error::EngineError::Driver(_)));
        // First pass reached the failing step; no second pass.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn loop_variable_remains_visible_after_the_loop() {
        let step = make_loop(
            vec![],
            LoopOptions {
                count: Some(2),
                over: None,
                loop_value: "i".into(),
                while_hook: None,
            },
        );
        let ctx = step.as_ref()(Context::new()).await.expect("loop should finish");
        assert_eq!(ctx.get("i"), Some(&json!(1)));
    }
}
