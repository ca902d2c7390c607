//! Synchronous log destinations
//!
//! A [`LogSink`] receives every log event the layer emits as a message plus a
//! field bag. It is fire and forget: nothing it returns is consumed.

use crate::fields::Fields;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Level;

/// Tracing target used by [`TracingSink`]
pub const LOG_TARGET: &str = "fieldlog";

/// Destination for log events.
pub trait LogSink: Send + Sync + 'static {
    /// Record one event
    fn log(&self, message: &str, fields: &Fields);

    /// Whether events would be recorded at all.
    ///
    /// The layer skips all work for a request when this is false.
    fn enabled(&self) -> bool {
        true
    }
}

/// Sink that emits INFO events through `tracing`.
///
/// The field bag is attached as a JSON string under `fields`, so any
/// subscriber (plain text or JSON) can render it.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Create a tracing sink
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn log(&self, message: &str, fields: &Fields) {
        let rendered = serde_json::to_string(fields).unwrap_or_default();
        tracing::info!(target: LOG_TARGET, fields = %rendered, "{}", message);
    }

    fn enabled(&self) -> bool {
        tracing::enabled!(target: LOG_TARGET, Level::INFO)
    }
}

/// A recorded log event
#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    /// Event message
    pub message: String,
    /// Field bag at the time of the event
    pub fields: Fields,
}

/// Sink that keeps every event in memory.
///
/// Clones share storage, so a clone handed to the layer can be inspected
/// from the test or the embedding application.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    /// Create an empty memory sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first
    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().clone()
    }

    /// Messages of all recorded events, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|e| e.message.clone()).collect()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget all recorded events
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str, fields: &Fields) {
        self.lock().push(LogEvent {
            message: message.to_string(),
            fields: fields.clone(),
        });
    }
}
