//! Change tracker: the dirty registry layered over the baseline store.
//!
//! Dirty state is derived, not stored: a row is dirty when its current data
//! differs structurally from its baseline, or it is in the new set (inserted
//! during the session, no baseline), or it was explicitly forced dirty. The
//! changed set is a separate record of which identities received cell
//! commits; a vetoed commit never lands there.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use gridedit_core::{Row, RowId};

use crate::baseline::BaselineStore;

/// Kind of dirty-state transition, carried by `DirtyChange` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirtyKind {
    /// Row data diverged from its baseline.
    Modified,
    /// Row was inserted during the session; it has no baseline.
    New,
    /// Row data was restored to its baseline.
    Reverted,
    /// Current data was accepted as the new baseline.
    Pristine,
}

/// A dirty-state transition for one row, reported by tracker operations for
/// the facade to emit as an event.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtyChange {
    pub row_id: RowId,
    pub kind: DirtyKind,
}

#[derive(Debug, Default)]
pub struct ChangeTracker {
    baselines: BaselineStore,
    changed: FxHashSet<RowId>,
    new_rows: FxHashSet<RowId>,
    forced: FxHashSet<RowId>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    /// Observe a collection: capture baselines for rows not yet tracked.
    pub fn capture(&mut self, rows: &[Row], resolver: &dyn Fn(&Row) -> Option<RowId>) -> usize {
        self.baselines.capture_if_absent(rows, resolver)
    }

    /// Observe a single row (e.g. at session open). First write wins.
    pub fn observe_row(&mut self, id: RowId, row: &Row) -> bool {
        self.baselines.capture_row(id, row)
    }

    /// Record that a cell commit landed on this identity. Returns true the
    /// first time.
    pub fn record_change(&mut self, id: RowId) -> bool {
        self.changed.insert(id)
    }

    /// Track a row inserted during the session. New rows have no baseline
    /// and read as dirty until marked pristine.
    pub fn mark_new(&mut self, id: RowId) -> DirtyChange {
        self.new_rows.insert(id.clone());
        DirtyChange {
            row_id: id,
            kind: DirtyKind::New,
        }
    }

    /// Force a row dirty regardless of its data.
    pub fn mark_dirty(&mut self, id: RowId) -> DirtyChange {
        self.forced.insert(id.clone());
        self.changed.insert(id.clone());
        DirtyChange {
            row_id: id,
            kind: DirtyKind::Modified,
        }
    }

    /// Accept current data as the new normal: overwrite the baseline and
    /// clear every flag for this identity.
    pub fn mark_pristine(&mut self, id: RowId, current: &Row) -> DirtyChange {
        self.baselines.mark_pristine(id.clone(), current);
        self.changed.remove(&id);
        self.new_rows.remove(&id);
        self.forced.remove(&id);
        DirtyChange {
            row_id: id,
            kind: DirtyKind::Pristine,
        }
    }

    /// Restore a row to its baseline in place. `None` when untracked (new
    /// rows included — nothing to restore to) or already pristine (no
    /// transition to report).
    pub fn revert_row(&mut self, id: RowId, current: &mut Row) -> Option<DirtyChange> {
        if !self.baselines.contains(&id) {
            return None;
        }
        let was_dirty = self.is_row_dirty(&id, current);
        self.baselines.revert(&id, current);
        self.changed.remove(&id);
        self.forced.remove(&id);
        if !was_dirty {
            return None;
        }
        Some(DirtyChange {
            row_id: id,
            kind: DirtyKind::Reverted,
        })
    }

    /// Drop every trace of an identity (row removed upstream).
    pub fn forget(&mut self, id: &RowId) {
        self.baselines.remove(id);
        self.changed.remove(id);
        self.new_rows.remove(id);
        self.forced.remove(id);
    }

    /// Drop all tracking state and re-capture the given collection as fresh
    /// baselines. First-write-wins protects baselines from incoming data,
    /// not from this explicit operation.
    pub fn reset(&mut self, rows: &[Row], resolver: &dyn Fn(&Row) -> Option<RowId>) {
        self.baselines.clear();
        self.changed.clear();
        self.new_rows.clear();
        self.forced.clear();
        self.baselines.capture_if_absent(rows, resolver);
    }

    /// Derived dirty state: baseline divergence, newness, or forced.
    pub fn is_row_dirty(&self, id: &RowId, current: &Row) -> bool {
        self.new_rows.contains(id)
            || self.forced.contains(id)
            || self.baselines.is_dirty(id, current)
    }

    pub fn is_field_dirty(&self, id: &RowId, current: &Row, field: &str) -> bool {
        self.baselines.is_field_dirty(id, current, field)
    }

    pub fn is_new(&self, id: &RowId) -> bool {
        self.new_rows.contains(id)
    }

    pub fn changed_row_ids(&self) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self.changed.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn original_row(&self, id: &RowId) -> Option<Row> {
        self.baselines.original(id)
    }
}
