//! Lock-free, non-blocking event emitter.
//!
//! `emit()` runs between a query's timing points, so it must never
//! block, never fail, and never panic. Events go over a bounded
//! crossbeam channel to the host's aggregator; if the buffer is full the
//! event is dropped and counted rather than stalling the scenario.
//! Within one invocation the channel preserves emission order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::types::TelemetryEvent;

/// Emission side of the telemetry channel.
///
/// One emitter is shared by every scenario invocation of a run; the
/// host holds the matching [`EventReceiver`] and aggregates.
pub struct EventEmitter {
    sender: Sender<TelemetryEvent>,

    // Stats (atomic, no locks)
    emitted: AtomicU64,
    dropped: AtomicU64,
}

impl EventEmitter {
    /// Create an emitter with the given buffer size, returning the
    /// receiving end for the host's aggregator.
    ///
    /// A few thousand slots absorbs bursts from many concurrent virtual
    /// users without noticeable memory cost.
    pub fn new(buffer: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = bounded(buffer);
        (
            Self {
                sender,
                emitted: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            },
            EventReceiver { receiver },
        )
    }

    /// Emit an event. Never blocks, never fails.
    ///
    /// A full buffer (or a hung-up receiver) drops the event and bumps
    /// the drop counter instead of slowing the pipeline down.
    #[inline]
    pub fn emit(&self, event: TelemetryEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {
                self.emitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Current emission counters.
    pub fn stats(&self) -> EmitterStats {
        EmitterStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Emission counters, for run health checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitterStats {
    pub emitted: u64,
    pub dropped: u64,
}

impl EmitterStats {
    /// Fraction of events dropped, 0.0 to 1.0.
    pub fn drop_rate(&self) -> f64 {
        let total = self.emitted + self.dropped;
        if total == 0 {
            0.0
        } else {
            self.dropped as f64 / total as f64
        }
    }
}

/// Receiving end of the telemetry channel, held by the host aggregator.
pub struct EventReceiver {
    receiver: Receiver<TelemetryEvent>,
}

impl EventReceiver {
    /// Pop the next queued event without waiting.
    pub fn try_recv(&self) -> Option<TelemetryEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TelemetryEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Drain every currently queued event, in emission order.
    pub fn drain(&self) -> Vec<TelemetryEvent> {
        self.receiver.try_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_emission_order() {
        let (emitter, receiver) = EventEmitter::new(8);
        emitter.emit(TelemetryEvent::Started);
        emitter.emit(TelemetryEvent::Request);
        emitter.emit(TelemetryEvent::error("boom"));

        let kinds: Vec<_> = receiver.drain().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["started", "request", "error"]);
    }

    #[test]
    fn full_buffer_drops_instead_of_blocking() {
        let (emitter, receiver) = EventEmitter::new(2);
        emitter.emit(TelemetryEvent::Request);
        emitter.emit(TelemetryEvent::Request);
        emitter.emit(TelemetryEvent::Request);

        let stats = emitter.stats();
        assert_eq!(stats.emitted, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(receiver.drain().len(), 2);
    }

    #[test]
    fn drop_rate_is_zero_when_nothing_emitted() {
        let (emitter, _receiver) = EventEmitter::new(2);
        assert_eq!(emitter.stats().drop_rate(), 0.0);
    }
}
