use crate::errors::EventError;

use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Counters reported at the end of a completed run, keyed by label
/// (e.g. `"Vendor 1"`, `"Total tickets sold"`).
pub type RunSummary = BTreeMap<String, u64>;

/// Destination for the simulation's informational events.
///
/// The core fires events on every notable transition: ticket produced or
/// consumed, pool full/empty, worker added or interrupted, run stopped,
/// and the final summary. Collaborators decide how to transport them —
/// push over a socket, write to a log, collect in memory for assertions.
///
/// Implementations must be cheap and non-blocking; events are emitted from
/// inside worker loops and (for produce/consume) while the pool lock is
/// held.
pub trait EventSink: Send + Sync {
    /// Delivers a plain text event.
    fn message(&self, text: &str);

    /// Delivers the structured end-of-run summary.
    fn summary(&self, summary: &RunSummary);
}

/// An [`EventSink`] that forwards everything to the `log` facade.
///
/// The default sink for binaries and tests that only need console output.
#[derive(Debug)]
pub struct LogSink;

impl EventSink for LogSink {
    fn message(&self, text: &str) {
        log::info!("{}", text);
    }

    fn summary(&self, summary: &RunSummary) {
        for (label, count) in summary {
            log::info!("{}: {}", label, count);
        }
    }
}

/// An [`EventSink`] that forwards events to a user-provided callback.
///
/// Text events are delivered verbatim; summaries are serialized to a JSON
/// object first. A callback error is logged and swallowed — delivery
/// failures never disturb the simulation.
pub struct CallbackSink {
    /// User-provided callback executed for every event.
    callback: Arc<dyn Fn(String) -> Result<(), EventError> + Send + Sync + 'static>,
}

impl CallbackSink {
    /// Creates a sink around the given callback.
    pub fn new(
        callback: impl Fn(String) -> Result<(), EventError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl EventSink for CallbackSink {
    fn message(&self, text: &str) {
        if let Err(e) = (self.callback)(text.to_string()) {
            log::warn!("Event callback rejected message: {}", e);
        }
    }

    fn summary(&self, summary: &RunSummary) {
        let payload = json!(summary).to_string();
        if let Err(e) = (self.callback)(payload) {
            log::warn!("Event callback rejected summary: {}", e);
        }
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink")
            // exclude callback
            .finish()
    }
}
