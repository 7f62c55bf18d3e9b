//! Edit-session state.
//!
//! The machine has three states: `Idle`, a transient `Editing` session
//! anchored to one row, and a persistent `Grid` state where every editable
//! cell stays in edit state and only focus moves. Transitions and the
//! commit/cancel protocol are driven by [`crate::grid::Grid`]; this module
//! owns the state itself.
//!
//! Editor handles are created once per session and carry a stable instance
//! id. A re-render sync must find and reuse the live handle, never rebuild
//! it, or custom editor state (focus, partial keystrokes) would be lost.

use rustc_hash::{FxHashMap, FxHashSet};

use gridedit_core::{Row, RowId};

/// What opened the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTrigger {
    Click,
    DblClick,
    Key,
    /// Programmatic call; the only trigger honored in manual mode.
    Manual,
}

/// A mounted editor for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorHandle {
    pub field: String,
    /// Stable per-mount id; proves handle reuse across re-render syncs.
    pub instance: u64,
    /// Typed contract from the column's editor binding: staged raw input is
    /// never read back for externally managed editors.
    pub externally_managed: bool,
    /// Staged text from the editor's input control, for built-in editors.
    pub raw_input: Option<String>,
}

/// A live row-level edit session.
#[derive(Debug)]
pub struct EditingSession {
    pub row_index: usize,
    pub row_id: Option<RowId>,
    pub trigger: EditTrigger,
    /// Field the interaction targeted, when it named one.
    pub focused: Option<String>,
    editors: Vec<EditorHandle>,
    entry_snapshot: Row,
    touched: FxHashSet<String>,
}

impl EditingSession {
    pub fn new(
        row_index: usize,
        row_id: Option<RowId>,
        trigger: EditTrigger,
        entry_snapshot: Row,
    ) -> Self {
        Self {
            row_index,
            row_id,
            trigger,
            focused: None,
            editors: Vec::new(),
            entry_snapshot,
            touched: FxHashSet::default(),
        }
    }

    /// Find the live editor for `field`, or mount a new one. Reuse keeps the
    /// instance id stable across intervening re-renders.
    pub fn ensure_editor(
        &mut self,
        field: &str,
        externally_managed: bool,
        next_instance: &mut u64,
    ) -> &mut EditorHandle {
        if let Some(pos) = self.editors.iter().position(|e| e.field == field) {
            return &mut self.editors[pos];
        }
        *next_instance += 1;
        self.editors.push(EditorHandle {
            field: field.to_string(),
            instance: *next_instance,
            externally_managed,
            raw_input: None,
        });
        let last = self.editors.len() - 1;
        &mut self.editors[last]
    }

    pub fn editor(&self, field: &str) -> Option<&EditorHandle> {
        self.editors.iter().find(|e| e.field == field)
    }

    pub fn editor_mut(&mut self, field: &str) -> Option<&mut EditorHandle> {
        self.editors.iter_mut().find(|e| e.field == field)
    }

    pub fn editors(&self) -> &[EditorHandle] {
        &self.editors
    }

    /// Record that a field's value was written during this session.
    pub fn touch(&mut self, field: &str) {
        self.touched.insert(field.to_string());
    }

    pub fn touched_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.touched.iter().cloned().collect();
        fields.sort();
        fields
    }

    pub fn has_changes(&self) -> bool {
        !self.touched.is_empty()
    }

    pub fn entry_snapshot(&self) -> &Row {
        &self.entry_snapshot
    }
}

/// Logical key for a grid-mode editor cache entry: row identity when the
/// host supplies one, positional index otherwise. Identity keys survive
/// collection replacement; index keys do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    Id(RowId),
    Index(usize),
}

/// Always-on editing: editors for every editable cell, mounted on attach and
/// never unmounted on blur or Escape. Explicit cache keyed by (row key,
/// field) with explicit eviction; no reliance on collection timing.
#[derive(Debug, Default)]
pub struct GridModeState {
    editors: FxHashMap<(RowKey, String), EditorHandle>,
    pub focused: Option<(usize, String)>,
}

impl GridModeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_editor(
        &mut self,
        key: RowKey,
        field: &str,
        externally_managed: bool,
        next_instance: &mut u64,
    ) -> &mut EditorHandle {
        self.editors
            .entry((key, field.to_string()))
            .or_insert_with(|| {
                *next_instance += 1;
                EditorHandle {
                    field: field.to_string(),
                    instance: *next_instance,
                    externally_managed,
                    raw_input: None,
                }
            })
    }

    pub fn editor(&self, key: &RowKey, field: &str) -> Option<&EditorHandle> {
        self.editors.get(&(key.clone(), field.to_string()))
    }

    pub fn editor_mut(&mut self, key: &RowKey, field: &str) -> Option<&mut EditorHandle> {
        self.editors.get_mut(&(key.clone(), field.to_string()))
    }

    /// Evict editors whose row no longer exists.
    pub fn retain_rows(&mut self, keep: impl Fn(&RowKey) -> bool) {
        self.editors.retain(|(key, _), _| keep(key));
    }

    pub fn clear(&mut self) {
        self.editors.clear();
        self.focused = None;
    }

    pub fn editor_count(&self) -> usize {
        self.editors.len()
    }
}

/// Current state of the edit machine.
#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Editing(EditingSession),
    /// Persistent variant: the machine never returns to `Idle`; only
    /// per-cell focus moves.
    Grid(GridModeState),
}

impl SessionState {
    pub fn is_editing(&self) -> bool {
        matches!(self, SessionState::Editing(_))
    }

    pub fn is_grid(&self) -> bool {
        matches!(self, SessionState::Grid(_))
    }

    /// Row index of the active edit, if any. In grid mode, the focused row.
    pub fn active_row_index(&self) -> Option<usize> {
        match self {
            SessionState::Idle => None,
            SessionState::Editing(session) => Some(session.row_index),
            SessionState::Grid(state) => state.focused.as_ref().map(|(row, _)| *row),
        }
    }
}
