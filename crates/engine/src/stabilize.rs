//! Row-identity stabilization across wholesale collection replacement.
//!
//! Reactive hosts replace the entire row collection freely (sort, filter,
//! server refresh) while an edit session is open. With an identity resolver
//! configured, the session follows its logical row to the row's new
//! position; in-progress field mutations are carried onto the incoming data
//! rather than overwritten by it. A row whose identity vanished upstream
//! forces the session closed. Without a resolver there is nothing to match
//! on, and the caller cancels rather than desynchronize.

use rustc_hash::FxHashMap;

use gridedit_core::{Row, RowId};

/// How an active session fared across a collection replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StabilizeOutcome {
    /// Same identity found at a new position; session retargeted.
    Retargeted { from: usize, to: usize },
    /// Identity found at the same position.
    Unchanged,
    /// Identity absent from the new collection; session must cancel.
    Lost,
    /// No resolver configured; matching impossible.
    Skipped,
}

/// Index every resolvable identity in a collection. Duplicate identities
/// keep the first occurrence, matching baseline capture order.
pub fn index_by_id(
    rows: &[Row],
    resolver: &dyn Fn(&Row) -> Option<RowId>,
) -> FxHashMap<RowId, usize> {
    let mut index = FxHashMap::default();
    for (pos, row) in rows.iter().enumerate() {
        if let Some(id) = resolver(row) {
            index.entry(id).or_insert(pos);
        }
    }
    index
}

/// Position of one identity in a collection.
pub fn locate(
    id: &RowId,
    rows: &[Row],
    resolver: &dyn Fn(&Row) -> Option<RowId>,
) -> Option<usize> {
    rows.iter()
        .position(|row| resolver(row).as_ref() == Some(id))
}

/// Match a session's tracked identity against a replacement collection.
pub fn stabilize(
    session_id: Option<&RowId>,
    current_index: usize,
    new_rows: &[Row],
    resolver: Option<&dyn Fn(&Row) -> Option<RowId>>,
) -> StabilizeOutcome {
    let Some(resolver) = resolver else {
        return StabilizeOutcome::Skipped;
    };
    let Some(id) = session_id else {
        // Resolver configured but the edited row never had an identity:
        // nothing to match, treat as lost.
        return StabilizeOutcome::Lost;
    };
    match locate(id, new_rows, resolver) {
        Some(to) if to == current_index => StabilizeOutcome::Unchanged,
        Some(to) => StabilizeOutcome::Retargeted {
            from: current_index,
            to,
        },
        None => StabilizeOutcome::Lost,
    }
}

/// Carry a session's in-progress field values from the outgoing row onto the
/// incoming data for the same identity, so a host refresh cannot overwrite
/// unsaved edits.
pub fn carry_fields(old_row: &Row, new_row: &mut Row, fields: &[String]) {
    for field in fields {
        match old_row.get(field) {
            Some(value) => new_row.set(field.clone(), value.clone()),
            None => {
                new_row.remove(field);
            }
        }
    }
}
