//! Baseline store: first-observation snapshots for dirty detection.
//!
//! Key invariants:
//! - First write wins: once captured, a baseline is never overwritten by
//!   incoming data for the same identity. Only explicit operations
//!   (mark_pristine, reset) replace it. This guards against reactive hosts
//!   re-delivering stale server data over a user's in-flight edit.
//! - Absence is normal: every query on an untracked identity returns a
//!   neutral result, never an error.

use rustc_hash::FxHashMap;

use gridedit_core::compare::{field_equal, rows_equal};
use gridedit_core::{Row, RowId};

/// Keyed map from row identity to a deep clone of the row as first seen.
#[derive(Debug, Clone, Default)]
pub struct BaselineStore {
    baselines: FxHashMap<RowId, Row>,
}

impl BaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }

    pub fn contains(&self, id: &RowId) -> bool {
        self.baselines.contains_key(id)
    }

    /// Capture a baseline for every row with a resolvable identity that has
    /// none yet. Rows the resolver cannot identify are skipped. Existing
    /// baselines are never overwritten.
    pub fn capture_if_absent(
        &mut self,
        rows: &[Row],
        resolver: &dyn Fn(&Row) -> Option<RowId>,
    ) -> usize {
        let mut captured = 0;
        for row in rows {
            if let Some(id) = resolver(row) {
                if self.capture_row(id, row) {
                    captured += 1;
                }
            }
        }
        captured
    }

    /// Capture a single row's baseline. Returns false if one already exists.
    pub fn capture_row(&mut self, id: RowId, row: &Row) -> bool {
        if self.baselines.contains_key(&id) {
            return false;
        }
        self.baselines.insert(id, row.clone());
        true
    }

    /// Whole-row dirty check. Untracked rows read as not dirty; newness is
    /// tracked separately.
    pub fn is_dirty(&self, id: &RowId, current: &Row) -> bool {
        match self.baselines.get(id) {
            Some(baseline) => !rows_equal(baseline, current),
            None => false,
        }
    }

    /// Single-field dirty check against the baseline.
    pub fn is_field_dirty(&self, id: &RowId, current: &Row, field: &str) -> bool {
        match self.baselines.get(id) {
            Some(baseline) => !field_equal(baseline, current, field),
            None => false,
        }
    }

    /// Accept the current data as the new normal: overwrite the baseline
    /// with a fresh clone.
    pub fn mark_pristine(&mut self, id: RowId, current: &Row) {
        self.baselines.insert(id, current.clone());
    }

    /// Deep clone of the stored baseline, if any.
    pub fn original(&self, id: &RowId) -> Option<Row> {
        self.baselines.get(id).cloned()
    }

    pub fn original_ref(&self, id: &RowId) -> Option<&Row> {
        self.baselines.get(id)
    }

    /// Copy every baseline field back onto the current row in place, and
    /// drop fields the baseline does not know, so the row deep-equals its
    /// baseline afterwards. Returns false (no mutation) when untracked.
    pub fn revert(&self, id: &RowId, current: &mut Row) -> bool {
        let Some(baseline) = self.baselines.get(id) else {
            return false;
        };
        let extra: Vec<String> = current
            .field_names()
            .filter(|name| !baseline.contains(name))
            .cloned()
            .collect();
        for name in extra {
            current.remove(&name);
        }
        current.merge(baseline);
        true
    }

    pub fn remove(&mut self, id: &RowId) -> Option<Row> {
        self.baselines.remove(id)
    }

    pub fn clear(&mut self) {
        self.baselines.clear();
    }
}
