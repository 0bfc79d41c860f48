//! Bounded, observable buffer of engine log lines.

use std::collections::VecDeque;

use bridge_traits::engine::{EngineLogSink, EngineSeverity};
use tokio::sync::watch;

/// Formats an engine log line as `"<code>/<message>"`.
pub fn format_line(severity: EngineSeverity, message: &str) -> String {
    format!("{}/{}", severity.code(), message)
}

/// FIFO ring of formatted engine log lines.
///
/// Every append publishes the whole bounded sequence; subscribers always
/// observe complete history, never a diff. Rapid appends may coalesce into
/// one notification, but the last one observed is always the latest state.
///
/// The buffer has its own synchronization and is independent of the
/// lifecycle lock, so appends from the engine never wait on a transition.
pub struct LogBuffer {
    capacity: usize,
    lines: watch::Sender<VecDeque<String>>,
}

impl LogBuffer {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "log buffer capacity must be non-zero");
        let (lines, _) = watch::channel(VecDeque::with_capacity(capacity + 1));
        Self { capacity, lines }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends one line, evicting the oldest line once over capacity.
    pub fn append(&self, severity: EngineSeverity, message: &str) {
        let line = format_line(severity, message);
        let capacity = self.capacity;
        self.lines.send_modify(|lines| {
            lines.push_back(line);
            if lines.len() > capacity {
                lines.pop_front();
            }
        });
    }

    /// Current ordered sequence, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.borrow().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> LogSubscription {
        LogSubscription {
            receiver: self.lines.subscribe(),
        }
    }
}

impl EngineLogSink for LogBuffer {
    fn log(&self, severity: EngineSeverity, message: &str) {
        self.append(severity, message);
    }
}

/// Observer handle for a [`LogBuffer`].
pub struct LogSubscription {
    receiver: watch::Receiver<VecDeque<String>>,
}

impl LogSubscription {
    /// The full current sequence, marking it as seen.
    pub fn current(&mut self) -> Vec<String> {
        self.receiver.borrow_and_update().iter().cloned().collect()
    }

    /// Waits for the next append and returns the full sequence after it.
    ///
    /// Returns `None` once the buffer has been dropped.
    pub async fn changed(&mut self) -> Option<Vec<String>> {
        self.receiver.changed().await.ok()?;
        Some(self.current())
    }
}
