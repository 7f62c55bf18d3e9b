//! Event types for edit-session change notifications.
//!
//! These events are the contract between the editing engine and its host:
//! renderers observe them to redraw, applications observe them to persist or
//! veto changes. They're also used by the test harness to verify invariants
//! about event ordering around session close.
//!
//! Cancelable events (`CellCommit`, `BeforeEditClose`) are dispatched by
//! mutable reference so listeners can prevent the default or feed values
//! back; mutating a non-cancelable payload has no effect.

use gridedit_core::{FieldValue, Row, RowId};

use crate::cascade::CascadeCallback;
use crate::dirty::DirtyKind;

/// Events emitted by `Grid` during editing and dirty tracking.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// A single field's value is about to be applied. Cancelable.
    CellCommit(CellCommitEvent),

    /// A row-level edit session finished via the commit path.
    RowCommit(RowCommitEvent),

    /// The session is about to close, and is still fully live. Cancelable
    /// per-editor: listeners flush pending values, they cannot abort the
    /// close.
    BeforeEditClose(BeforeEditCloseEvent),

    /// The session closed and its editor handles are gone.
    EditClose(EditCloseEvent),

    /// A tracked row's dirty state changed.
    DirtyChange(DirtyChangeEvent),
}

/// Emitted when a changed field value is about to be applied in place.
///
/// `prevent_default()` vetoes the commit: the value is not applied and the
/// row is not recorded as changed. `update_row` cascades derived updates to
/// sibling fields of the same row. `on_value_change` registers a cascade
/// subscriber for the remainder of the session.
pub struct CellCommitEvent {
    pub field: String,
    /// The incoming value, already coerced to the column's declared type.
    pub value: FieldValue,
    pub old_value: FieldValue,
    pub row_index: usize,
    prevented: bool,
    row_updates: Row,
    subscriptions: Vec<(String, CascadeCallback)>,
}

impl CellCommitEvent {
    pub(crate) fn new(
        field: impl Into<String>,
        value: FieldValue,
        old_value: FieldValue,
        row_index: usize,
    ) -> Self {
        Self {
            field: field.into(),
            value,
            old_value,
            row_index,
            prevented: false,
            row_updates: Row::new(),
            subscriptions: Vec::new(),
        }
    }

    /// Veto the commit. The value is not applied and no dirty state changes.
    pub fn prevent_default(&mut self) {
        self.prevented = true;
    }

    pub fn is_prevented(&self) -> bool {
        self.prevented
    }

    /// Stage derived updates for sibling fields of the same row. Applied
    /// after the commit value, then cascaded to live editors.
    pub fn update_row(&mut self, partial: &Row) {
        self.row_updates.merge(partial);
    }

    /// Register a cascade subscriber for `field`, living until session end.
    pub fn on_value_change(&mut self, field: impl Into<String>, callback: CascadeCallback) {
        self.subscriptions.push((field.into(), callback));
    }

    pub(crate) fn take_effects(&mut self) -> (Row, Vec<(String, CascadeCallback)>) {
        (
            std::mem::take(&mut self.row_updates),
            std::mem::take(&mut self.subscriptions),
        )
    }
}

// Callbacks are not comparable or clonable; snapshots carry the data fields
// only. Collected events therefore always show empty updates/subscriptions.
impl Clone for CellCommitEvent {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            value: self.value.clone(),
            old_value: self.old_value.clone(),
            row_index: self.row_index,
            prevented: self.prevented,
            row_updates: self.row_updates.clone(),
            subscriptions: Vec::new(),
        }
    }
}

impl std::fmt::Debug for CellCommitEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellCommitEvent")
            .field("field", &self.field)
            .field("value", &self.value)
            .field("old_value", &self.old_value)
            .field("row_index", &self.row_index)
            .field("prevented", &self.prevented)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl PartialEq for CellCommitEvent {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
            && self.value == other.value
            && self.old_value == other.old_value
            && self.row_index == other.row_index
            && self.prevented == other.prevented
    }
}

/// Emitted once per row-level commit, after any `BeforeEditClose` flushes.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCommitEvent {
    pub row_index: usize,
    pub row_id: Option<RowId>,
    /// Whether any field changed during the session.
    pub changed: bool,
}

/// Emitted synchronously while the session is still live, before
/// `RowCommit`/`EditClose`. Externally-managed editors get a last chance to
/// flush a pending value through the normal commit path, since their
/// internal state is invisible to the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeforeEditCloseEvent {
    pub row_index: usize,
    flushes: Vec<(String, FieldValue)>,
}

impl BeforeEditCloseEvent {
    pub(crate) fn new(row_index: usize) -> Self {
        Self {
            row_index,
            flushes: Vec::new(),
        }
    }

    /// Queue a pending editor value. It is committed through the normal
    /// cell-commit path (events, coercion, cascade) before the session
    /// closes.
    pub fn flush(&mut self, field: impl Into<String>, value: FieldValue) {
        self.flushes.push((field.into(), value));
    }

    pub(crate) fn take_flushes(&mut self) -> Vec<(String, FieldValue)> {
        std::mem::take(&mut self.flushes)
    }
}

/// Emitted after the session's editor handles are destroyed.
#[derive(Debug, Clone, PartialEq)]
pub struct EditCloseEvent {
    pub row_index: usize,
}

/// Emitted when a tracked row transitions between dirty states.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtyChangeEvent {
    pub row_id: RowId,
    /// Current row data at the time of the transition.
    pub row: Row,
    /// Baseline snapshot, if one exists (new rows have none).
    pub original: Option<Row>,
    pub kind: DirtyKind,
}

/// Callback type for receiving grid events.
pub type EventCallback = Box<dyn FnMut(&mut GridEvent)>;

/// Simple event collector for testing.
#[derive(Debug, Clone, Default)]
pub struct EventCollector {
    events: Vec<GridEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: GridEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[GridEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only CellCommit events.
    pub fn cell_commits(&self) -> Vec<&CellCommitEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::CellCommit(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Filter to only RowCommit events.
    pub fn row_commits(&self) -> Vec<&RowCommitEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::RowCommit(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Filter to only BeforeEditClose events.
    pub fn before_edit_closes(&self) -> Vec<&BeforeEditCloseEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::BeforeEditClose(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// Filter to only EditClose events.
    pub fn edit_closes(&self) -> Vec<&EditCloseEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::EditClose(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Filter to only DirtyChange events.
    pub fn dirty_changes(&self) -> Vec<&DirtyChangeEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::DirtyChange(d) => Some(d),
                _ => None,
            })
            .collect()
    }
}
