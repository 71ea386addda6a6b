//! Structured diagnostic sink for reconciliation events.
//!
//! Reconciliation calls receive an explicit sink instead of writing to a
//! global logger, so a test harness can capture change records as values.

use serde::Serialize;
use serde_json::Value;

/// What happened to one field or collection entry during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChangeEvent {
    /// Local and remote already agree
    Unchanged {
        /// The agreed value, when the event concerns a single field
        value: Option<Value>,
    },
    /// Local differs from remote; an update will carry the local value
    Changed {
        /// Remote-derived value being replaced
        from: Value,
        /// Local value being applied
        to: Value,
    },
    /// Entry exists locally but not remotely and will be created
    Created,
    /// Remote entry was deleted
    Deleted,
    /// Remote entry has no local counterpart and deletion is not enabled
    Unmanaged,
}

/// A single structured reconciliation event, anchored at a tree path such
/// as `sonarr.settings.indexers.definitions[Nyaa]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    /// Tree path of the field or entry the event concerns
    pub path: String,
    /// The event itself
    pub event: ChangeEvent,
}

impl ChangeRecord {
    /// Record an already-converged field or entry.
    pub fn unchanged(path: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            path: path.into(),
            event: ChangeEvent::Unchanged { value },
        }
    }

    /// Record a field whose local value will replace the remote one.
    pub fn changed(path: impl Into<String>, from: Value, to: Value) -> Self {
        Self {
            path: path.into(),
            event: ChangeEvent::Changed { from, to },
        }
    }

    /// Record a created collection entry.
    pub fn created(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            event: ChangeEvent::Created,
        }
    }

    /// Record a deleted collection entry.
    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            event: ChangeEvent::Deleted,
        }
    }

    /// Record a remote entry left alone because it is unmanaged.
    pub fn unmanaged(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            event: ChangeEvent::Unmanaged,
        }
    }
}

/// Receiver for reconciliation events.
pub trait DiagnosticSink {
    /// Record one event.
    fn record(&mut self, record: ChangeRecord);
}

/// Sink that forwards events to the `log` facade.
///
/// Converged and unmanaged entries log at debug, everything that changes
/// remote state logs at info, matching the verbosity split a human wants
/// when tailing a run.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&mut self, record: ChangeRecord) {
        match &record.event {
            ChangeEvent::Unchanged { value: Some(v) } => {
                log::debug!("{}: {} (up to date)", record.path, v);
            }
            ChangeEvent::Unchanged { value: None } => {
                log::debug!("{} (up to date)", record.path);
            }
            ChangeEvent::Changed { from, to } => {
                log::info!("{}: {} -> {}", record.path, from, to);
            }
            ChangeEvent::Created => log::info!("{}: (created)", record.path),
            ChangeEvent::Deleted => log::info!("{}: (deleted)", record.path),
            ChangeEvent::Unmanaged => log::debug!("{}: (unmanaged)", record.path),
        }
    }
}

/// Sink that discards every event.
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&mut self, _record: ChangeRecord) {}
}

/// Sink that keeps every event, for assertions in tests and for rendering
/// a dry-run report after the pass completes.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Recorded events, in emission order
    pub records: Vec<ChangeRecord>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events that represent an actual change to remote state.
    pub fn changes(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.iter().filter(|r| {
            matches!(
                r.event,
                ChangeEvent::Changed { .. } | ChangeEvent::Created | ChangeEvent::Deleted
            )
        })
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_sink_filters_changes() {
        let mut sink = RecordingSink::new();
        sink.record(ChangeRecord::unchanged("a.b", Some(json!(1))));
        sink.record(ChangeRecord::changed("a.c", json!(1), json!(2)));
        sink.record(ChangeRecord::created("a.d"));
        sink.record(ChangeRecord::unmanaged("a.e"));
        assert_eq!(sink.records.len(), 4);
        assert_eq!(sink.changes().count(), 2);
    }
}
