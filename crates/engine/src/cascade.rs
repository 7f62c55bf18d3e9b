//! Cascaded value-change notification between live editors.
//!
//! A commit on one field may change sibling fields of the same row (via the
//! commit event's `update_row`). Editors that need to reflect such derived
//! updates without re-opening register a callback here, keyed by their own
//! field name. Subscriptions are per-session state: they are cleared
//! deterministically when the session ends, so a later update to the same
//! row identity can never fire a stale callback.

use rustc_hash::FxHashMap;

use gridedit_core::Row;

/// Callback invoked with the row's post-commit state.
pub type CascadeCallback = Box<dyn FnMut(&Row)>;

/// Per-session subscriber lists, keyed by the subscribing field.
#[derive(Default)]
pub struct CascadeHub {
    subscribers: FxHashMap<String, Vec<CascadeCallback>>,
}

impl CascadeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, field: impl Into<String>, callback: CascadeCallback) {
        self.subscribers.entry(field.into()).or_default().push(callback);
    }

    /// Notify every subscribed field except the one that issued the commit
    /// (no feedback to self).
    pub fn notify(&mut self, origin_field: &str, row: &Row) {
        for (field, callbacks) in self.subscribers.iter_mut() {
            if field == origin_field {
                continue;
            }
            for callback in callbacks.iter_mut() {
                callback(row);
            }
        }
    }

    /// Drop all subscriptions. Called at session teardown (commit or cancel).
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn subscriber_count(&self, field: &str) -> usize {
        self.subscribers.get(field).map_or(0, |v| v.len())
    }
}
