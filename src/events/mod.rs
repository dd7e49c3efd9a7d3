//! Telemetry event infrastructure.
//!
//! Executors report what happened, nothing more. Aggregation, rate
//! math, and report rendering belong to the host process on the other
//! end of the [`EventReceiver`].

pub mod emitter;
pub mod types;

pub use emitter::{EmitterStats, EventEmitter, EventReceiver};
pub use types::TelemetryEvent;
