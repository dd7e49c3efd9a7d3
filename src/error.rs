//! Error taxonomy for the scenario engine.
//!
//! There are only two ways a scenario run can fail: a hook reports an
//! error, or the driver does. Malformed step shapes are **not** errors;
//! they compile to passthrough steps so a forward-incompatible script
//! cannot abort a whole run at load time. The one load-time failure mode
//! is a document that does not parse at all (`ScriptError`).

use crate::driver::DriverError;
use crate::hooks::HookError;

/// A failure inside one scenario invocation.
///
/// Errors are local to the invocation that produced them: the pipeline
/// short-circuits, the host receives the error, and no other concurrent
/// invocation is affected.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A registered hook signalled failure.
    #[error("hook `{hook}` failed: {source}")]
    Hook {
        /// Name the hook was registered under.
        hook: String,
        #[source]
        source: HookError,
    },

    /// The driver reported a connect or query failure.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A query step ran on a context that never went through pipeline
    /// initialization.
    #[error("no connection attached to context; run the scenario through the pipeline")]
    NoConnection,
}

/// A scenario document that could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to parse scenario script: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse scenario script: {0}")]
    Json(#[from] serde_json::Error),
}
