//! Append-only session log shown to the user.
//!
//! Not to be confused with `tracing` output (see `crate::logging`). The
//! recorder does no locking of its own; its owner serializes writes.

use crate::core::timestamp::iso_now;
use crate::core::types::LogEntry;

#[derive(Debug, Clone, Default)]
pub struct LogRecorder {
    entries: Vec<LogEntry>,
}

impl LogRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message`, stamped with the current UTC time.
    pub fn append(&mut self, message: impl Into<String>) {
        self.entries.push(LogEntry {
            timestamp: iso_now(),
            message: message.into(),
        });
    }

    /// Snapshot of every entry in recording order.
    pub fn all(&self) -> Vec<LogEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
