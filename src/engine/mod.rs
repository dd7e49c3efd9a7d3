//! The execution core: step compiler, loop constructor, query step
//! executor, and scenario pipeline.
//!
//! [`ScenarioEngine::compile`] is the compile surface; the [`Scenario`]
//! it returns is the execution gate. Compilation dispatches once on each
//! step's variant and never fails; execution is a strict sequential
//! waterfall that short-circuits on the first error.

pub mod compiler;
pub mod context;
pub(crate) mod loops;
pub mod pipeline;
pub mod query;

pub use compiler::{CompiledStep, ScenarioEngine, StepResult};
pub use context::Context;
pub use pipeline::Scenario;
pub use query::QueryParams;
