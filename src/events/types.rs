//! Telemetry event types.
//!
//! Events are created in the step-execution hot path, so they are cheap
//! to construct and cheap to clone. Serialization is for hosts that ship
//! events across a process boundary; in-process aggregators consume them
//! directly.

use serde::{Deserialize, Serialize};

/// One telemetry event from a scenario invocation.
///
/// Per invocation the engine emits `started` once after connection
/// setup, then per query attempt a `request` followed by exactly one of
/// `response` or `error`. Hook failures also surface as `error`. Events
/// are emitted in real execution order and never batched or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Connection established, scenario underway. No payload.
    Started,

    /// A query attempt is starting. No payload.
    Request,

    /// A query completed successfully.
    Response {
        /// Monotonic elapsed time of the query call, in nanoseconds.
        elapsed_ns: u64,
        /// Fixed status indicator (always `0` for this engine).
        status: u32,
        /// Rows affected or returned, as reported by the driver.
        rows: u64,
    },

    /// A query or hook failed. The invocation's pipeline aborts after
    /// this event.
    Error { detail: String },
}

impl TelemetryEvent {
    /// Convenience constructor for error events.
    pub fn error(detail: impl Into<String>) -> Self {
        TelemetryEvent::Error {
            detail: detail.into(),
        }
    }

    /// Event kind as a string, for counters and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryEvent::Started => "started",
            TelemetryEvent::Request => "request",
            TelemetryEvent::Response { .. } => "response",
            TelemetryEvent::Error { .. } => "error",
        }
    }
}
