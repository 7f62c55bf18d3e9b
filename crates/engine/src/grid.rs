//! The `Grid` facade: owns row data, column specs, the edit-session state
//! machine, the change tracker and the event listeners, and drives the
//! commit/cancel/stabilize protocols between them.
//!
//! Key invariants:
//! - `BeforeEditClose` fires-and-completes before `RowCommit`, which
//!   precedes `EditClose`; all three before session state clears.
//! - A vetoed cell commit applies nothing and records nothing.
//! - Escape restores touched fields to baseline values synchronously.
//! - Replacing the row collection never overwrites in-progress edits for a
//!   row whose identity survives the replacement.

use rustc_hash::FxHashSet;

use gridedit_core::compare::deep_equal;
use gridedit_core::{Column, FieldValue, Row, RowId, RowIdResolver, ValueKind};

use crate::cascade::{CascadeCallback, CascadeHub};
use crate::config::{EditConfig, EditOn};
use crate::dirty::{ChangeTracker, DirtyChange, DirtyKind};
use crate::events::{
    BeforeEditCloseEvent, CellCommitEvent, DirtyChangeEvent, EditCloseEvent, EventCallback,
    GridEvent, RowCommitEvent,
};
use crate::render::{NullRenderHost, RenderHost, RowFlag};
use crate::session::{EditTrigger, EditingSession, GridModeState, RowKey, SessionState};
use crate::stabilize::{carry_fields, index_by_id, locate, stabilize, StabilizeOutcome};

/// Where a committed value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitSource {
    /// The editor handed the value over explicitly (custom editor callback
    /// or a `BeforeEditClose` flush).
    Editor(FieldValue),
    /// Read the handle's staged raw input and coerce it to the column's
    /// declared type. Never honored for externally managed editors.
    Input,
}

pub struct Grid {
    columns: Vec<Column>,
    rows: Vec<Row>,
    config: EditConfig,
    resolver: Option<RowIdResolver>,
    tracker: Option<ChangeTracker>,
    session: SessionState,
    cascades: CascadeHub,
    listeners: Vec<EventCallback>,
    render: Box<dyn RenderHost>,
    next_editor_instance: u64,
}

impl Grid {
    pub fn new(columns: Vec<Column>, config: EditConfig) -> Self {
        let session = if config.grid_mode {
            SessionState::Grid(GridModeState::new())
        } else {
            SessionState::Idle
        };
        Self {
            columns,
            rows: Vec::new(),
            config,
            resolver: None,
            tracker: config.dirty_tracking.then(ChangeTracker::new),
            session,
            cascades: CascadeHub::new(),
            listeners: Vec::new(),
            render: Box::new(NullRenderHost),
            next_editor_instance: 0,
        }
    }

    pub fn with_resolver(
        mut self,
        resolver: impl Fn(&Row) -> Option<RowId> + 'static,
    ) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    pub fn with_render_host(mut self, render: Box<dyn RenderHost>) -> Self {
        self.render = render;
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self.capture_all();
        if self.session.is_grid() {
            self.mount_grid_editors();
        }
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn row(&self, row_index: usize) -> Option<&Row> {
        self.rows.get(row_index)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn config(&self) -> &EditConfig {
        &self.config
    }

    pub fn is_editing(&self) -> bool {
        self.session.is_editing()
    }

    /// The active edit, if any: row position and identity. In grid mode,
    /// the focused cell's row.
    pub fn active_edit(&self) -> Option<(usize, Option<RowId>)> {
        match &self.session {
            SessionState::Idle => None,
            SessionState::Editing(session) => Some((session.row_index, session.row_id.clone())),
            SessionState::Grid(state) => state
                .focused
                .as_ref()
                .map(|(row, _)| (*row, self.resolve_id_at(*row))),
        }
    }

    /// Grid-mode focused cell.
    pub fn focused_cell(&self) -> Option<(usize, String)> {
        match &self.session {
            SessionState::Grid(state) => state.focused.clone(),
            _ => None,
        }
    }

    /// Stable instance id of the live editor for a cell, if one is mounted.
    pub fn editor_instance(&self, row_index: usize, field: &str) -> Option<u64> {
        match &self.session {
            SessionState::Editing(session) if session.row_index == row_index => {
                session.editor(field).map(|h| h.instance)
            }
            SessionState::Grid(state) => {
                let key = self.row_key(row_index);
                state.editor(&key, field).map(|h| h.instance)
            }
            _ => None,
        }
    }

    pub fn on_event(&mut self, listener: impl FnMut(&mut GridEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // =========================================================================
    // UI Triggers
    // =========================================================================

    pub fn pointer_click(&mut self, row_index: usize, field: &str) -> bool {
        if self.session.is_grid() {
            return self.focus_cell(row_index, field);
        }
        if let SessionState::Editing(session) = &self.session {
            if session.row_index == row_index {
                // Focus move within the open row.
                let editable = self.column(field).is_some_and(|c| c.editable);
                if editable {
                    if let SessionState::Editing(session) = &mut self.session {
                        session.focused = Some(field.to_string());
                    }
                }
                return true;
            }
            // Clicking outside the active row closes it through the commit
            // path.
            self.commit_active_edit();
        }
        if self.config.edit_on == EditOn::Click {
            self.begin_cell_edit_with(row_index, field, EditTrigger::Click)
        } else {
            false
        }
    }

    pub fn pointer_dbl_click(&mut self, row_index: usize, field: &str) -> bool {
        if self.session.is_grid() {
            return self.focus_cell(row_index, field);
        }
        if let SessionState::Editing(session) = &self.session {
            if session.row_index == row_index {
                // Same-row handling is identical to a single click.
                return self.pointer_click(row_index, field);
            }
            self.commit_active_edit();
        }
        if self.config.edit_on == EditOn::DblClick {
            self.begin_cell_edit_with(row_index, field, EditTrigger::DblClick)
        } else {
            false
        }
    }

    /// Enter on a focused cell. Commits an open session on the same row;
    /// otherwise opens the row for editing even when the focused cell
    /// itself is not editable, as long as the row has at least one
    /// editable field. Manual mode ignores it.
    pub fn key_enter(&mut self, row_index: usize, field: &str) -> bool {
        if self.session.is_grid() {
            return self.commit_cell(field, CommitSource::Input);
        }
        if let SessionState::Editing(session) = &self.session {
            if session.row_index == row_index {
                return self.commit_active_edit();
            }
            self.commit_active_edit();
        }
        if self.config.edit_on == EditOn::Manual {
            return false;
        }
        self.begin_row_edit_with(row_index, EditTrigger::Key, Some(field))
    }

    pub fn key_escape(&mut self) -> bool {
        self.cancel_active_edit()
    }

    /// Field-level blur: commit that field from its staged input.
    pub fn blur_field(&mut self, field: &str) -> bool {
        self.commit_cell(field, CommitSource::Input)
    }

    /// Row-level blur (focus left the row entirely): close via commit.
    pub fn blur_row(&mut self) -> bool {
        self.commit_active_edit()
    }

    // =========================================================================
    // Session Entry
    // =========================================================================

    /// Programmatically open a row for editing, focusing `field`. The field
    /// must be editable.
    pub fn begin_cell_edit(&mut self, row_index: usize, field: &str) -> bool {
        self.begin_cell_edit_with(row_index, field, EditTrigger::Manual)
    }

    /// Programmatically open a row for editing.
    pub fn begin_row_edit(&mut self, row_index: usize) -> bool {
        self.begin_row_edit_with(row_index, EditTrigger::Manual, None)
    }

    fn begin_cell_edit_with(
        &mut self,
        row_index: usize,
        field: &str,
        trigger: EditTrigger,
    ) -> bool {
        if !self.column(field).is_some_and(|c| c.editable) {
            return false;
        }
        self.begin_row_edit_with(row_index, trigger, Some(field))
    }

    fn begin_row_edit_with(
        &mut self,
        row_index: usize,
        trigger: EditTrigger,
        focus: Option<&str>,
    ) -> bool {
        if self.session.is_grid() || row_index >= self.rows.len() {
            return false;
        }
        if let SessionState::Editing(session) = &self.session {
            if session.row_index == row_index {
                // Already live: reuse the session, never rebuild editors.
                self.sync_editors();
                if let Some(field) = focus {
                    let editable = self.column(field).is_some_and(|c| c.editable);
                    if editable {
                        if let SessionState::Editing(session) = &mut self.session {
                            session.focused = Some(field.to_string());
                        }
                    }
                }
                return true;
            }
            self.commit_active_edit();
        }

        let editable = self.editable_fields();
        if editable.is_empty() {
            return false;
        }
        let row_id = self.resolve_id_at(row_index);
        let row = self.rows[row_index].clone();
        if let (Some(tracker), Some(id)) = (&mut self.tracker, &row_id) {
            tracker.observe_row(id.clone(), &row);
        }

        let mut session = EditingSession::new(row_index, row_id, trigger, row);
        for (field, externally_managed) in &editable {
            session.ensure_editor(field, *externally_managed, &mut self.next_editor_instance);
        }
        session.focused = focus
            .filter(|f| editable.iter().any(|(e, _)| e.as_str() == *f))
            .map(str::to_string)
            .or_else(|| editable.first().map(|(f, _)| f.clone()));

        log::debug!(
            "edit session opened on row {} ({} editors)",
            row_index,
            editable.len()
        );
        self.session = SessionState::Editing(session);
        self.render.set_row_flag(row_index, RowFlag::Editing, true);
        self.render.request_render();
        true
    }

    /// Re-render sync: make sure every editable field has a live editor,
    /// reusing existing handles so editor state survives unrelated
    /// refreshes.
    pub fn sync_editors(&mut self) {
        if self.session.is_grid() {
            self.mount_grid_editors();
            return;
        }
        let editable = self.editable_fields();
        if let SessionState::Editing(session) = &mut self.session {
            for (field, externally_managed) in &editable {
                session.ensure_editor(field, *externally_managed, &mut self.next_editor_instance);
            }
        }
    }

    /// Stage raw text from an editor's input control.
    pub fn stage_input(&mut self, field: &str, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.session.is_grid() {
            let Some((row_index, _)) = self.focused_cell() else {
                return false;
            };
            let key = self.row_key(row_index);
            if let SessionState::Grid(state) = &mut self.session {
                if let Some(handle) = state.editor_mut(&key, field) {
                    handle.raw_input = Some(text);
                    return true;
                }
            }
            return false;
        }
        if let SessionState::Editing(session) = &mut self.session {
            if let Some(handle) = session.editor_mut(field) {
                handle.raw_input = Some(text);
                return true;
            }
        }
        false
    }

    /// Register a cascade subscriber for `field`, discarded at session end.
    pub fn subscribe_field(&mut self, field: impl Into<String>, callback: CascadeCallback) -> bool {
        match &self.session {
            SessionState::Idle => false,
            _ => {
                self.cascades.subscribe(field, callback);
                true
            }
        }
    }

    // =========================================================================
    // Commit / Cancel
    // =========================================================================

    /// Commit one field of the active edit (or the grid-mode focused row).
    pub fn commit_cell(&mut self, field: &str, source: CommitSource) -> bool {
        let target = match &self.session {
            SessionState::Editing(session) => Some(session.row_index),
            SessionState::Grid(state) => state.focused.as_ref().map(|(row, _)| *row),
            SessionState::Idle => None,
        };
        match target {
            Some(row_index) => self.commit_cell_at(row_index, field, source),
            None => false,
        }
    }

    fn commit_cell_at(&mut self, row_index: usize, field: &str, source: CommitSource) -> bool {
        if row_index >= self.rows.len() {
            return false;
        }
        let Some(column) = self.column(field).cloned() else {
            return false;
        };
        if !column.editable {
            return false;
        }
        let Some((externally_managed, raw_input)) = self.editor_state(row_index, field) else {
            return false;
        };

        let new_value = match source {
            CommitSource::Editor(value) => Some(coerce_committed(&column, value)),
            CommitSource::Input => {
                if externally_managed {
                    // Adapter-managed editors may display a formatted
                    // representation; copying it back verbatim would corrupt
                    // the typed value. Only explicit hand-over commits.
                    None
                } else {
                    raw_input.map(|raw| column.value_kind.coerce(&raw))
                }
            }
        };
        let Some(new_value) = new_value else {
            return false;
        };
        let old_value = self.rows[row_index]
            .get(field)
            .cloned()
            .unwrap_or(FieldValue::Null);
        if deep_equal(&old_value, &new_value) {
            return false;
        }

        let row_id = self.resolve_id_at(row_index);
        let was_dirty = match (&self.tracker, &row_id) {
            (Some(tracker), Some(id)) => tracker.is_row_dirty(id, &self.rows[row_index]),
            _ => false,
        };

        let mut event = GridEvent::CellCommit(CellCommitEvent::new(
            field,
            new_value.clone(),
            old_value,
            row_index,
        ));
        self.emit(&mut event);
        let GridEvent::CellCommit(mut commit) = event else {
            return false;
        };
        if commit.is_prevented() {
            log::trace!("cell commit on row {} field {} vetoed", row_index, field);
            return false;
        }

        let (updates, subscriptions) = commit.take_effects();
        self.rows[row_index].set(field, new_value);
        self.touch_field(row_index, field);
        self.clear_staged(row_index, field);
        if !updates.is_empty() {
            let update_fields: Vec<String> = updates.field_names().cloned().collect();
            self.rows[row_index].merge(&updates);
            for updated in &update_fields {
                self.touch_field(row_index, updated);
            }
        }
        for (sub_field, callback) in subscriptions {
            self.cascades.subscribe(sub_field, callback);
        }
        if let (Some(tracker), Some(id)) = (&mut self.tracker, &row_id) {
            tracker.record_change(id.clone());
        }

        // Sibling editors see the post-commit row; the committing field
        // gets no feedback to itself.
        let snapshot = self.rows[row_index].clone();
        self.cascades.notify(field, &snapshot);

        if let (Some(tracker), Some(id)) = (&self.tracker, &row_id) {
            if !was_dirty && tracker.is_row_dirty(id, &self.rows[row_index]) {
                let change = DirtyChange {
                    row_id: id.clone(),
                    kind: DirtyKind::Modified,
                };
                let row = self.rows[row_index].clone();
                self.emit_dirty_change(change, row, Some(row_index));
            }
        }
        self.render.request_render();
        log::trace!("cell commit applied on row {} field {}", row_index, field);
        true
    }

    /// Close the active row session through the commit path: flush
    /// externally managed editors, emit `RowCommit` and `EditClose`, then
    /// tear down.
    pub fn commit_active_edit(&mut self) -> bool {
        let SessionState::Editing(session) = &self.session else {
            return false;
        };
        let row_index = session.row_index;
        let row_id = session.row_id.clone();

        // The session is still fully live here: queries report the edited
        // row, and flushes below run the normal cell-commit path.
        let mut event = GridEvent::BeforeEditClose(BeforeEditCloseEvent::new(row_index));
        self.emit(&mut event);
        if let GridEvent::BeforeEditClose(mut before) = event {
            for (field, value) in before.take_flushes() {
                self.commit_cell_at(row_index, &field, CommitSource::Editor(value));
            }
        }

        let changed = match &self.session {
            SessionState::Editing(session) => session.has_changes(),
            _ => false,
        };
        let mut event = GridEvent::RowCommit(RowCommitEvent {
            row_index,
            row_id,
            changed,
        });
        self.emit(&mut event);

        let mut event = GridEvent::EditClose(EditCloseEvent { row_index });
        self.emit(&mut event);

        self.cascades.clear();
        self.session = SessionState::Idle;
        self.render.set_row_flag(row_index, RowFlag::Editing, false);
        self.render.request_render();
        log::debug!(
            "edit session committed on row {} (changed: {})",
            row_index,
            changed
        );
        true
    }

    /// Escape: revert, not commit. Touched fields restore to their baseline
    /// values (session entry snapshot when tracking is off) synchronously;
    /// no `BeforeEditClose`, no `RowCommit`.
    pub fn cancel_active_edit(&mut self) -> bool {
        if self.session.is_grid() {
            return self.revert_focused_field();
        }
        let SessionState::Editing(session) = &self.session else {
            return false;
        };
        let row_index = session.row_index;
        let row_id = session.row_id.clone();
        let touched = session.touched_fields();
        let entry_snapshot = session.entry_snapshot().clone();

        let restore = match (&self.tracker, &row_id) {
            (Some(tracker), Some(id)) => tracker.original_row(id),
            _ => None,
        }
        .unwrap_or(entry_snapshot);
        if row_index < self.rows.len() {
            let row = &mut self.rows[row_index];
            for field in &touched {
                match restore.get(field) {
                    Some(value) => row.set(field.clone(), value.clone()),
                    None => {
                        row.remove(field);
                    }
                }
            }
        }
        self.cascades.clear();

        let mut event = GridEvent::EditClose(EditCloseEvent { row_index });
        self.emit(&mut event);
        self.session = SessionState::Idle;
        self.render.set_row_flag(row_index, RowFlag::Editing, false);
        if let (Some(tracker), Some(id)) = (&self.tracker, &row_id) {
            if let Some(row) = self.rows.get(row_index) {
                let dirty = tracker.is_row_dirty(id, row);
                self.render.set_row_flag(row_index, RowFlag::Dirty, dirty);
            }
        }
        self.render.request_render();
        log::debug!("edit session cancelled on row {}", row_index);
        true
    }

    /// Close without commit or revert; the edited row no longer exists.
    fn force_cancel(&mut self, reason: &str) {
        let SessionState::Editing(session) =
            std::mem::replace(&mut self.session, SessionState::Idle)
        else {
            return;
        };
        let row_index = session.row_index;
        self.cascades.clear();
        log::warn!("edit session force-cancelled on row {}: {}", row_index, reason);
        let mut event = GridEvent::EditClose(EditCloseEvent { row_index });
        self.emit(&mut event);
        self.render.request_render();
    }

    // =========================================================================
    // Grid Mode
    // =========================================================================

    /// Move grid-mode focus to a cell. The cell must be editable.
    pub fn focus_cell(&mut self, row_index: usize, field: &str) -> bool {
        if row_index >= self.rows.len() || !self.column(field).is_some_and(|c| c.editable) {
            return false;
        }
        if let SessionState::Grid(state) = &mut self.session {
            state.focused = Some((row_index, field.to_string()));
            self.render.request_render();
            return true;
        }
        false
    }

    fn mount_grid_editors(&mut self) {
        let editable = self.editable_fields();
        let keys: Vec<RowKey> = (0..self.rows.len()).map(|i| self.row_key(i)).collect();
        if let SessionState::Grid(state) = &mut self.session {
            for key in &keys {
                for (field, externally_managed) in &editable {
                    state.ensure_editor(
                        key.clone(),
                        field,
                        *externally_managed,
                        &mut self.next_editor_instance,
                    );
                }
            }
        }
    }

    /// Grid-mode Escape: revert only the focused field; editors stay
    /// mounted.
    fn revert_focused_field(&mut self) -> bool {
        let Some((row_index, field)) = self.focused_cell() else {
            return false;
        };
        self.clear_staged(row_index, &field);
        let Some(id) = self.resolve_id_at(row_index) else {
            return false;
        };
        let Some(original) = self.tracker.as_ref().and_then(|t| t.original_row(&id)) else {
            return false;
        };
        match original.get(&field) {
            Some(value) => self.rows[row_index].set(field, value.clone()),
            None => {
                self.rows[row_index].remove(&field);
            }
        }
        self.render.request_render();
        true
    }

    // =========================================================================
    // Collection Changes
    // =========================================================================

    /// Wholesale replacement of the displayed collection. An active session
    /// follows its row identity to the new position (in-progress edits
    /// carried over); a vanished identity, or a replacement with no
    /// resolver configured, force-cancels the session.
    pub fn replace_rows(&mut self, mut new_rows: Vec<Row>) {
        // Grid-mode focus is re-anchored by identity after the swap.
        let focused_id = match &self.session {
            SessionState::Grid(state) => state
                .focused
                .as_ref()
                .and_then(|(row, field)| {
                    self.resolve_id_at(*row).map(|id| (id, field.clone()))
                }),
            _ => None,
        };

        let plan = match &self.session {
            SessionState::Editing(session) => Some((
                stabilize(
                    session.row_id.as_ref(),
                    session.row_index,
                    &new_rows,
                    self.resolver.as_deref(),
                ),
                session.row_index,
                session.touched_fields(),
            )),
            _ => None,
        };
        if let Some((outcome, from, touched)) = plan {
            match outcome {
                StabilizeOutcome::Unchanged => {
                    if let Some(old_row) = self.rows.get(from) {
                        carry_fields(old_row, &mut new_rows[from], &touched);
                    }
                }
                StabilizeOutcome::Retargeted { to, .. } => {
                    if let Some(old_row) = self.rows.get(from) {
                        carry_fields(old_row, &mut new_rows[to], &touched);
                    }
                    if let SessionState::Editing(session) = &mut self.session {
                        session.row_index = to;
                    }
                    self.render.set_row_flag(from, RowFlag::Editing, false);
                    self.render.set_row_flag(to, RowFlag::Editing, true);
                    log::debug!("edit session retargeted from row {} to row {}", from, to);
                }
                StabilizeOutcome::Lost => {
                    self.force_cancel("edited row absent from replacement collection");
                }
                StabilizeOutcome::Skipped => {
                    self.force_cancel("rows replaced with no identity resolver configured");
                }
            }
        }

        self.rows = new_rows;

        if self.session.is_grid() {
            if let Some(resolver) = &self.resolver {
                let live: FxHashSet<RowId> =
                    index_by_id(&self.rows, &**resolver).into_keys().collect();
                if let SessionState::Grid(state) = &mut self.session {
                    state.retain_rows(|key| match key {
                        RowKey::Id(id) => live.contains(id),
                        RowKey::Index(_) => false,
                    });
                }
            } else if let SessionState::Grid(state) = &mut self.session {
                state.clear();
            }
            if let SessionState::Grid(state) = &mut self.session {
                state.focused = None;
            }
            if let Some((id, field)) = focused_id {
                let position = self
                    .resolver
                    .as_ref()
                    .and_then(|r| locate(&id, &self.rows, &**r));
                if let (Some(row), SessionState::Grid(state)) = (position, &mut self.session) {
                    state.focused = Some((row, field));
                }
            }
            self.mount_grid_editors();
        }

        self.capture_all();
        self.render.request_render();
    }

    /// Insert a row. Under dirty tracking it is recorded as new (no
    /// baseline) and reads dirty until marked pristine.
    pub fn insert_row(&mut self, index: usize, row: Row) {
        let index = index.min(self.rows.len());
        if let SessionState::Editing(session) = &mut self.session {
            if session.row_index >= index {
                session.row_index += 1;
            }
        }
        self.rows.insert(index, row);
        if let Some(id) = self.resolve_id_at(index) {
            if let Some(tracker) = &mut self.tracker {
                let change = tracker.mark_new(id);
                let row = self.rows[index].clone();
                self.emit_dirty_change(change, row, Some(index));
            }
        }
        if self.session.is_grid() {
            self.mount_grid_editors();
        }
        self.render.request_render();
    }

    /// Remove a row. An active session on it is force-cancelled; sessions
    /// below it shift up. All tracking state for its identity is dropped.
    pub fn remove_row(&mut self, index: usize) -> Option<Row> {
        if index >= self.rows.len() {
            return None;
        }
        let editing_this =
            matches!(&self.session, SessionState::Editing(s) if s.row_index == index);
        if editing_this {
            self.force_cancel("edited row removed");
        }
        if let SessionState::Editing(session) = &mut self.session {
            if session.row_index > index {
                session.row_index -= 1;
            }
        }
        let id = self.resolve_id_at(index);
        let row = self.rows.remove(index);
        if let (Some(tracker), Some(id)) = (&mut self.tracker, &id) {
            tracker.forget(id);
        }
        if self.session.is_grid() {
            if let SessionState::Grid(state) = &mut self.session {
                state.retain_rows(|key| match key {
                    RowKey::Id(key_id) => Some(key_id) != id.as_ref(),
                    RowKey::Index(i) => *i < index,
                });
                if state.focused.as_ref().is_some_and(|(row, _)| *row == index) {
                    state.focused = None;
                }
            }
            self.mount_grid_editors();
        }
        self.render.request_render();
        Some(row)
    }

    // =========================================================================
    // Dirty Tracking Commands
    // =========================================================================

    pub fn mark_row_pristine(&mut self, row_index: usize) -> bool {
        let Some(id) = self.resolve_id_at(row_index) else {
            return false;
        };
        let row = self.rows[row_index].clone();
        let Some(tracker) = &mut self.tracker else {
            return false;
        };
        let change = tracker.mark_pristine(id, &row);
        self.emit_dirty_change(change, row, Some(row_index));
        true
    }

    pub fn mark_row_dirty(&mut self, row_index: usize) -> bool {
        let Some(id) = self.resolve_id_at(row_index) else {
            return false;
        };
        let row = self.rows[row_index].clone();
        let Some(tracker) = &mut self.tracker else {
            return false;
        };
        let change = tracker.mark_dirty(id);
        self.emit_dirty_change(change, row, Some(row_index));
        true
    }

    pub fn mark_row_new(&mut self, row_index: usize) -> bool {
        let Some(id) = self.resolve_id_at(row_index) else {
            return false;
        };
        let row = self.rows[row_index].clone();
        let Some(tracker) = &mut self.tracker else {
            return false;
        };
        let change = tracker.mark_new(id);
        self.emit_dirty_change(change, row, Some(row_index));
        true
    }

    /// Restore one row to its baseline. False when untracked.
    pub fn revert_row(&mut self, row_index: usize) -> bool {
        let Some(id) = self.resolve_id_at(row_index) else {
            return false;
        };
        let Some(tracker) = &mut self.tracker else {
            return false;
        };
        let Some(row) = self.rows.get_mut(row_index) else {
            return false;
        };
        let Some(change) = tracker.revert_row(id, row) else {
            return false;
        };
        let row = self.rows[row_index].clone();
        self.emit_dirty_change(change, row, Some(row_index));
        true
    }

    /// Restore every dirty tracked row to its baseline. Returns how many
    /// rows were reverted.
    pub fn revert_all(&mut self) -> usize {
        let dirty: Vec<RowId> = self.dirty_row_ids();
        let mut reverted = 0;
        for id in dirty {
            if let Some(row_index) = self.row_position(&id) {
                if self.revert_row(row_index) {
                    reverted += 1;
                }
            }
        }
        reverted
    }

    /// Identities whose current data diverges from baseline, plus new rows.
    pub fn dirty_row_ids(&self) -> Vec<RowId> {
        let (Some(tracker), Some(resolver)) = (&self.tracker, &self.resolver) else {
            return Vec::new();
        };
        let mut ids = Vec::new();
        for row in &self.rows {
            if let Some(id) = resolver(row) {
                if tracker.is_row_dirty(&id, row) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    /// Identities that received cell commits (vetoed commits excluded).
    pub fn changed_row_ids(&self) -> Vec<RowId> {
        self.tracker
            .as_ref()
            .map(|t| t.changed_row_ids())
            .unwrap_or_default()
    }

    pub fn is_row_dirty(&self, id: &RowId) -> bool {
        let Some(tracker) = &self.tracker else {
            return false;
        };
        match self.row_position(id) {
            Some(row_index) => tracker.is_row_dirty(id, &self.rows[row_index]),
            None => tracker.is_new(id),
        }
    }

    pub fn is_field_dirty(&self, id: &RowId, field: &str) -> bool {
        let Some(tracker) = &self.tracker else {
            return false;
        };
        match self.row_position(id) {
            Some(row_index) => tracker.is_field_dirty(id, &self.rows[row_index], field),
            None => false,
        }
    }

    /// Deep clone of the baseline for an identity, if tracked.
    pub fn original_row(&self, id: &RowId) -> Option<Row> {
        self.tracker.as_ref().and_then(|t| t.original_row(id))
    }

    /// Drop all tracking state and re-capture the current collection as
    /// fresh baselines.
    pub fn reset_tracking(&mut self) {
        let Some(tracker) = &mut self.tracker else {
            return;
        };
        match &self.resolver {
            Some(resolver) => tracker.reset(&self.rows, &**resolver),
            None => tracker.reset(&[], &(|_: &Row| None)),
        }
    }

    /// Position of an identity in the current collection.
    pub fn row_position(&self, id: &RowId) -> Option<usize> {
        let resolver = self.resolver.as_ref()?;
        locate(id, &self.rows, &**resolver)
    }

    /// Explicit teardown: close any session, then release listeners,
    /// cascades and tracking state so stale closures cannot leak.
    pub fn detach(&mut self) {
        match std::mem::take(&mut self.session) {
            SessionState::Editing(session) => {
                let mut event = GridEvent::EditClose(EditCloseEvent {
                    row_index: session.row_index,
                });
                self.emit(&mut event);
            }
            SessionState::Grid(state) => {
                if let Some((row_index, _)) = state.focused {
                    let mut event = GridEvent::EditClose(EditCloseEvent { row_index });
                    self.emit(&mut event);
                }
            }
            SessionState::Idle => {}
        }
        self.cascades.clear();
        self.listeners.clear();
        self.tracker = None;
        log::debug!("editing subsystem detached");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn emit(&mut self, event: &mut GridEvent) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in listeners.iter_mut() {
            listener(event);
        }
        // Listeners registered during dispatch land behind existing ones.
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }

    fn emit_dirty_change(&mut self, change: DirtyChange, row: Row, row_index: Option<usize>) {
        let original = self
            .tracker
            .as_ref()
            .and_then(|t| t.original_row(&change.row_id));
        let dirty_now = matches!(change.kind, DirtyKind::Modified | DirtyKind::New);
        if let Some(row_index) = row_index {
            self.render.set_row_flag(row_index, RowFlag::Dirty, dirty_now);
        }
        let mut event = GridEvent::DirtyChange(DirtyChangeEvent {
            row_id: change.row_id,
            row,
            original,
            kind: change.kind,
        });
        self.emit(&mut event);
    }

    fn editable_fields(&self) -> Vec<(String, bool)> {
        self.columns
            .iter()
            .filter(|c| c.editable)
            .map(|c| (c.field.clone(), c.editor.is_externally_managed()))
            .collect()
    }

    fn resolve_id_at(&self, row_index: usize) -> Option<RowId> {
        let resolver = self.resolver.as_ref()?;
        self.rows.get(row_index).and_then(|row| resolver(row))
    }

    fn row_key(&self, row_index: usize) -> RowKey {
        self.resolve_id_at(row_index)
            .map(RowKey::Id)
            .unwrap_or(RowKey::Index(row_index))
    }

    fn editor_state(&self, row_index: usize, field: &str) -> Option<(bool, Option<String>)> {
        match &self.session {
            SessionState::Editing(session) if session.row_index == row_index => session
                .editor(field)
                .map(|h| (h.externally_managed, h.raw_input.clone())),
            SessionState::Grid(state) => {
                let key = self.row_key(row_index);
                state
                    .editor(&key, field)
                    .map(|h| (h.externally_managed, h.raw_input.clone()))
            }
            _ => None,
        }
    }

    fn touch_field(&mut self, row_index: usize, field: &str) {
        if let SessionState::Editing(session) = &mut self.session {
            if session.row_index == row_index {
                session.touch(field);
            }
        }
    }

    fn clear_staged(&mut self, row_index: usize, field: &str) {
        if self.session.is_grid() {
            let key = self.row_key(row_index);
            if let SessionState::Grid(state) = &mut self.session {
                if let Some(handle) = state.editor_mut(&key, field) {
                    handle.raw_input = None;
                }
            }
            return;
        }
        if let SessionState::Editing(session) = &mut self.session {
            if session.row_index == row_index {
                if let Some(handle) = session.editor_mut(field) {
                    handle.raw_input = None;
                }
            }
        }
    }

    fn capture_all(&mut self) {
        let Some(resolver) = &self.resolver else {
            return;
        };
        if let Some(tracker) = &mut self.tracker {
            tracker.capture(&self.rows, &**resolver);
        }
    }
}

/// Typed-value preservation on the commit path: a numeric column never
/// receives a string, even from an explicit editor hand-over.
fn coerce_committed(column: &Column, value: FieldValue) -> FieldValue {
    match (&column.value_kind, &value) {
        (ValueKind::Number, FieldValue::Text(text)) => column.value_kind.coerce(text),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::config::EditOn;
    use crate::dirty::DirtyKind;
    use crate::harness::GridHarness;
    use gridedit_core::Editor;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    // =========================================================================
    // Cell Commit
    // =========================================================================

    #[test]
    fn test_cell_commit_marks_row_dirty() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));

        let events = h.collected();
        let commits = events.cell_commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].field, "name");
        assert_eq!(commits[0].old_value, text("Alice"));
        assert_eq!(commits[0].value, text("Bob"));
        assert_eq!(commits[0].row_index, 0);

        let id = RowId::new("1");
        assert!(h.grid.is_row_dirty(&id));
        assert!(h.grid.is_field_dirty(&id, "name"));
        assert!(!h.grid.is_field_dirty(&id, "bonus"));
        assert_eq!(h.grid.dirty_row_ids(), vec![id.clone()]);
        assert_eq!(h.grid.changed_row_ids(), vec![id]);
    }

    #[test]
    fn test_prevented_commit_changes_nothing() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        h.grid.on_event(|event| {
            if let GridEvent::CellCommit(commit) = event {
                commit.prevent_default();
            }
        });
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(!h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));

        assert_eq!(h.grid.row(0).unwrap().get("name"), Some(&text("Alice")));
        assert!(h.grid.changed_row_ids().is_empty());
        assert!(h.grid.dirty_row_ids().is_empty());
        assert!(h.collected().dirty_changes().is_empty());
    }

    #[test]
    fn test_unchanged_value_commits_nothing() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(!h.grid.commit_cell("name", CommitSource::Editor(text("Alice"))));
        assert!(h.collected().cell_commits().is_empty());
        assert!(h.grid.dirty_row_ids().is_empty());
    }

    #[test]
    fn test_numeric_input_commits_as_number() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "bonus"));
        assert!(h.grid.stage_input("bonus", "25000"));
        assert!(h.grid.blur_field("bonus"));

        assert_eq!(
            h.grid.row(0).unwrap().get("bonus"),
            Some(&FieldValue::Number(25000.0))
        );
        let events = h.collected();
        assert_eq!(events.cell_commits()[0].value, FieldValue::Number(25000.0));
    }

    #[test]
    fn test_numeric_coercion_applies_to_explicit_values_too() {
        let mut h = GridHarness::with_people(EditConfig::new());
        assert!(h.grid.begin_cell_edit(0, "bonus"));
        assert!(h
            .grid
            .commit_cell("bonus", CommitSource::Editor(text("500"))));
        assert_eq!(
            h.grid.row(0).unwrap().get("bonus"),
            Some(&FieldValue::Number(500.0))
        );
    }

    #[test]
    fn test_externally_managed_editor_skips_input_readback() {
        let mut columns = GridHarness::people_columns();
        columns.push(
            Column::editable("note").with_editor(Editor::external("adapter-note")),
        );
        let mut rows = GridHarness::people_rows();
        for row in &mut rows {
            row.set("note", "plain");
        }
        let mut h = GridHarness::build(
            columns,
            EditConfig::new().with_dirty_tracking(true),
            rows,
            Some("id"),
        );

        assert!(h.grid.begin_cell_edit(0, "note"));
        assert!(h.grid.stage_input("note", "$1,000.00 formatted"));
        // Raw display text is never copied back onto the row.
        assert!(!h.grid.blur_field("note"));
        assert_eq!(h.grid.row(0).unwrap().get("note"), Some(&text("plain")));

        // The editor's own commit path still works.
        assert!(h.grid.commit_cell("note", CommitSource::Editor(text("1000"))));
        assert_eq!(h.grid.row(0).unwrap().get("note"), Some(&text("1000")));
    }

    // =========================================================================
    // Row Close Protocol
    // =========================================================================

    #[test]
    fn test_row_close_event_ordering() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert!(h.grid.commit_active_edit());

        let events = h.collected();
        let kinds: Vec<&str> = events
            .events()
            .iter()
            .map(|e| match e {
                GridEvent::CellCommit(_) => "cell-commit",
                GridEvent::RowCommit(_) => "row-commit",
                GridEvent::BeforeEditClose(_) => "before-edit-close",
                GridEvent::EditClose(_) => "edit-close",
                GridEvent::DirtyChange(_) => "dirty-change",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "cell-commit",
                "dirty-change",
                "before-edit-close",
                "row-commit",
                "edit-close"
            ]
        );
        assert!(events.row_commits()[0].changed);
        assert_eq!(events.row_commits()[0].row_id, Some(RowId::new("1")));
        assert!(h.grid.active_edit().is_none());
    }

    #[test]
    fn test_before_edit_close_flush_runs_commit_path() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        h.grid.on_event(|event| {
            if let GridEvent::BeforeEditClose(before) = event {
                before.flush("name", FieldValue::Text("Flushed".into()));
            }
        });
        assert!(h.grid.begin_row_edit(0));
        assert!(h.grid.commit_active_edit());

        assert_eq!(h.grid.row(0).unwrap().get("name"), Some(&text("Flushed")));
        let events = h.collected();
        // The flush went through the normal cell-commit path and is visible
        // in the row-commit changed flag.
        assert_eq!(events.cell_commits().len(), 1);
        assert!(events.row_commits()[0].changed);
    }

    #[test]
    fn test_row_commit_unchanged_when_nothing_edited() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_row_edit(1));
        assert!(h.grid.commit_active_edit());
        let events = h.collected();
        assert!(!events.row_commits()[0].changed);
        assert!(events.cell_commits().is_empty());
    }

    // =========================================================================
    // Cancel (Escape)
    // =========================================================================

    #[test]
    fn test_escape_restores_baseline_values() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert!(h.grid.is_row_dirty(&RowId::new("1")));

        assert!(h.grid.key_escape());
        assert_eq!(h.grid.row(0).unwrap().get("name"), Some(&text("Alice")));
        assert!(!h.grid.is_row_dirty(&RowId::new("1")));
        assert!(h.grid.active_edit().is_none());

        let events = h.collected();
        assert!(events.before_edit_closes().is_empty());
        assert!(events.row_commits().is_empty());
        assert_eq!(events.edit_closes().len(), 1);
    }

    #[test]
    fn test_escape_without_tracking_uses_entry_snapshot() {
        let mut h = GridHarness::with_people(EditConfig::new());
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert!(h.grid.key_escape());
        assert_eq!(h.grid.row(0).unwrap().get("name"), Some(&text("Alice")));
    }

    // =========================================================================
    // Editor Reuse
    // =========================================================================

    #[test]
    fn test_editor_instances_survive_rerender_sync() {
        let mut h = GridHarness::with_people(EditConfig::new());
        assert!(h.grid.begin_row_edit(0));
        let name_instance = h.grid.editor_instance(0, "name");
        let bonus_instance = h.grid.editor_instance(0, "bonus");
        assert!(name_instance.is_some());

        // Unrelated refreshes and a repeated open must reuse live handles.
        h.grid.sync_editors();
        h.grid.sync_editors();
        assert!(h.grid.begin_row_edit(0));
        assert_eq!(h.grid.editor_instance(0, "name"), name_instance);
        assert_eq!(h.grid.editor_instance(0, "bonus"), bonus_instance);
    }

    #[test]
    fn test_staged_input_survives_sync() {
        let mut h = GridHarness::with_people(EditConfig::new());
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.stage_input("name", "Bo"));
        h.grid.sync_editors();
        assert!(h.grid.blur_field("name"));
        assert_eq!(h.grid.row(0).unwrap().get("name"), Some(&text("Bo")));
    }

    // =========================================================================
    // Cascade
    // =========================================================================

    #[test]
    fn test_cascade_notifies_siblings_not_self() {
        let mut h = GridHarness::with_people(EditConfig::new());
        assert!(h.grid.begin_row_edit(0));

        let bonus_seen: Rc<RefCell<Vec<FieldValue>>> = Rc::new(RefCell::new(Vec::new()));
        let name_hits = Rc::new(RefCell::new(0usize));
        {
            let seen = Rc::clone(&bonus_seen);
            h.grid.subscribe_field(
                "bonus",
                Box::new(move |row| {
                    if let Some(v) = row.get("name") {
                        seen.borrow_mut().push(v.clone());
                    }
                }),
            );
        }
        {
            let hits = Rc::clone(&name_hits);
            h.grid
                .subscribe_field("name", Box::new(move |_row| *hits.borrow_mut() += 1));
        }

        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert_eq!(bonus_seen.borrow().as_slice(), &[text("Bob")]);
        // The committing field receives no feedback to itself.
        assert_eq!(*name_hits.borrow(), 0);
    }

    #[test]
    fn test_cascade_subscriptions_die_with_session() {
        let mut h = GridHarness::with_people(EditConfig::new());
        assert!(h.grid.begin_row_edit(0));
        let hits = Rc::new(RefCell::new(0usize));
        {
            let hits = Rc::clone(&hits);
            h.grid
                .subscribe_field("bonus", Box::new(move |_row| *hits.borrow_mut() += 1));
        }
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert_eq!(*hits.borrow(), 1);
        assert!(h.grid.commit_active_edit());

        // A new session on the same row must not fire the stale callback.
        assert!(h.grid.begin_row_edit(0));
        assert!(h
            .grid
            .commit_cell("name", CommitSource::Editor(text("Carl"))));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_update_row_cascades_derived_fields() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        h.grid.on_event(|event| {
            if let GridEvent::CellCommit(commit) = event {
                if commit.field == "name" {
                    let mut partial = Row::new();
                    partial.set("bonus", 9999.0);
                    commit.update_row(&partial);
                }
            }
        });
        assert!(h.grid.begin_row_edit(0));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert_eq!(
            h.grid.row(0).unwrap().get("bonus"),
            Some(&FieldValue::Number(9999.0))
        );

        // Escape rolls the derived update back too.
        assert!(h.grid.key_escape());
        assert_eq!(
            h.grid.row(0).unwrap().get("bonus"),
            Some(&FieldValue::Number(1000.0))
        );
    }

    #[test]
    fn test_on_value_change_registers_for_session() {
        let mut h = GridHarness::with_people(EditConfig::new());
        let hits = Rc::new(RefCell::new(0usize));
        {
            let hits = Rc::clone(&hits);
            h.grid.on_event(move |event| {
                if let GridEvent::CellCommit(commit) = event {
                    if commit.field == "name" {
                        let hits = Rc::clone(&hits);
                        commit.on_value_change(
                            "bonus",
                            Box::new(move |_row| *hits.borrow_mut() += 1),
                        );
                    }
                }
            });
        }
        assert!(h.grid.begin_row_edit(0));
        // Registered during the name commit, which then notifies the bonus
        // subscriber as a sibling.
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert_eq!(*hits.borrow(), 1);
        // A bonus commit is the subscriber's own field: no feedback to self.
        assert!(h
            .grid
            .commit_cell("bonus", CommitSource::Editor(FieldValue::Number(5.0))));
        assert_eq!(*hits.borrow(), 1);
    }

    // =========================================================================
    // Collection Replacement
    // =========================================================================

    #[test]
    fn test_replace_rows_follows_reordered_identity() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(1, "name"));
        assert!(h
            .grid
            .commit_cell("name", CommitSource::Editor(text("Edited"))));

        // Host reorders the same identities and re-delivers fresh data.
        h.grid.replace_rows(vec![
            GridHarness::person(3, "Carol", 3000.0),
            GridHarness::person(1, "Alice", 1000.0),
            GridHarness::person(2, "Server Bob", 2222.0),
        ]);

        assert_eq!(h.grid.active_edit(), Some((2, Some(RowId::new("2")))));
        // The in-progress edit survives; untouched fields take host data.
        assert_eq!(h.grid.row(2).unwrap().get("name"), Some(&text("Edited")));
        assert_eq!(
            h.grid.row(2).unwrap().get("bonus"),
            Some(&FieldValue::Number(2222.0))
        );
    }

    #[test]
    fn test_replace_rows_cancels_when_identity_vanishes() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(1, "name"));
        h.grid.replace_rows(vec![
            GridHarness::person(1, "Alice", 1000.0),
            GridHarness::person(3, "Carol", 3000.0),
        ]);
        assert!(h.grid.active_edit().is_none());
        assert_eq!(h.collected().edit_closes().len(), 1);
    }

    #[test]
    fn test_replace_rows_without_resolver_cancels_session() {
        let mut h = GridHarness::build(
            GridHarness::people_columns(),
            EditConfig::new(),
            GridHarness::people_rows(),
            None,
        );
        assert!(h.grid.begin_cell_edit(1, "name"));
        h.grid.replace_rows(GridHarness::people_rows());
        // No identity to match on: the session closes rather than desync.
        assert!(h.grid.active_edit().is_none());
    }

    #[test]
    fn test_replace_rows_keeps_first_write_baselines() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        h.grid
            .replace_rows(vec![GridHarness::person(1, "Replaced", 0.0)]);
        assert_eq!(
            h.grid.original_row(&RowId::new("1")),
            Some(GridHarness::person(1, "Alice", 1000.0))
        );
        // The replacement data itself now reads dirty against the baseline.
        assert!(h.grid.is_row_dirty(&RowId::new("1")));
    }

    #[test]
    fn test_remove_row_cancels_its_session() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(1, "name"));
        assert!(h.grid.remove_row(1).is_some());
        assert!(h.grid.active_edit().is_none());
        assert_eq!(h.grid.row_count(), 2);
    }

    #[test]
    fn test_remove_earlier_row_shifts_session_index() {
        let mut h = GridHarness::with_people(EditConfig::new());
        assert!(h.grid.begin_cell_edit(2, "name"));
        assert!(h.grid.remove_row(0).is_some());
        assert_eq!(h.grid.active_edit(), Some((1, Some(RowId::new("3")))));
    }

    // =========================================================================
    // Triggers and Modes
    // =========================================================================

    #[test]
    fn test_manual_mode_only_opens_programmatically() {
        let mut h = GridHarness::with_people(
            EditConfig::new().with_edit_on(EditOn::Manual),
        );
        assert!(!h.grid.pointer_click(0, "name"));
        assert!(!h.grid.pointer_dbl_click(0, "name"));
        assert!(!h.grid.key_enter(0, "name"));
        assert!(h.grid.active_edit().is_none());

        assert!(h.grid.begin_row_edit(0));
        assert!(h.grid.active_edit().is_some());
    }

    #[test]
    fn test_click_mode_opens_on_single_click() {
        let mut h =
            GridHarness::with_people(EditConfig::new().with_edit_on(EditOn::Click));
        assert!(h.grid.pointer_click(0, "name"));
        assert_eq!(h.grid.active_edit(), Some((0, Some(RowId::new("1")))));
    }

    #[test]
    fn test_dblclick_mode_ignores_single_click() {
        let mut h = GridHarness::with_people(EditConfig::new());
        assert!(!h.grid.pointer_click(0, "name"));
        assert!(h.grid.active_edit().is_none());
        assert!(h.grid.pointer_dbl_click(0, "name"));
        assert!(h.grid.active_edit().is_some());
    }

    #[test]
    fn test_enter_on_non_editable_cell_opens_row() {
        let mut h = GridHarness::with_people(EditConfig::new());
        // "id" itself is not editable, but the row has editable fields.
        assert!(h.grid.key_enter(0, "id"));
        assert_eq!(h.grid.active_edit(), Some((0, Some(RowId::new("1")))));
        assert!(h.grid.editor_instance(0, "name").is_some());
        assert!(h.grid.editor_instance(0, "bonus").is_some());
    }

    #[test]
    fn test_click_outside_active_row_closes_via_commit() {
        let mut h =
            GridHarness::with_people(EditConfig::new().with_edit_on(EditOn::Click));
        assert!(h.grid.pointer_click(0, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert!(h.grid.pointer_click(2, "name"));

        let events = h.collected();
        assert_eq!(events.row_commits().len(), 1);
        assert!(events.row_commits()[0].changed);
        // The click then opened the other row.
        assert_eq!(h.grid.active_edit(), Some((2, Some(RowId::new("3")))));
    }

    #[test]
    fn test_enter_on_open_row_commits_it() {
        let mut h = GridHarness::with_people(EditConfig::new());
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.stage_input("name", "Bob"));
        assert!(h.grid.blur_field("name"));
        assert!(h.grid.key_enter(0, "name"));
        assert!(h.grid.active_edit().is_none());
        assert_eq!(h.collected().row_commits().len(), 1);
    }

    // =========================================================================
    // Grid Mode
    // =========================================================================

    #[test]
    fn test_grid_mode_editors_mounted_for_all_editable_cells() {
        let h = GridHarness::with_people(
            EditConfig::new().with_grid_mode(true).with_dirty_tracking(true),
        );
        for row in 0..3 {
            assert!(h.grid.editor_instance(row, "name").is_some());
            assert!(h.grid.editor_instance(row, "bonus").is_some());
            assert!(h.grid.editor_instance(row, "id").is_none());
        }
    }

    #[test]
    fn test_grid_mode_commit_and_escape_keep_editors() {
        let mut h = GridHarness::with_people(
            EditConfig::new().with_grid_mode(true).with_dirty_tracking(true),
        );
        assert!(h.grid.focus_cell(0, "name"));
        assert!(h.grid.stage_input("name", "GridBob"));
        assert!(h.grid.key_enter(0, "name"));
        assert_eq!(h.grid.row(0).unwrap().get("name"), Some(&text("GridBob")));

        let instance = h.grid.editor_instance(0, "name");
        // Escape reverts the focused field to baseline but unmounts nothing.
        assert!(h.grid.key_escape());
        assert_eq!(h.grid.row(0).unwrap().get("name"), Some(&text("Alice")));
        assert_eq!(h.grid.editor_instance(0, "name"), instance);
        assert!(h.collected().edit_closes().is_empty());
    }

    #[test]
    fn test_grid_mode_editors_survive_replacement_by_identity() {
        let mut h = GridHarness::with_people(
            EditConfig::new().with_grid_mode(true).with_dirty_tracking(true),
        );
        assert!(h.grid.focus_cell(1, "name"));
        let instance = h.grid.editor_instance(1, "name");

        h.grid.replace_rows(vec![
            GridHarness::person(2, "Bob", 2000.0),
            GridHarness::person(1, "Alice", 1000.0),
        ]);
        // Same identity, new position: same cached editor, focus follows.
        assert_eq!(h.grid.editor_instance(0, "name"), instance);
        assert_eq!(h.grid.focused_cell(), Some((0, "name".to_string())));
    }

    #[test]
    fn test_detach_silences_and_releases() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "name"));
        h.grid.detach();
        let closed = h.collected().edit_closes().len();
        assert_eq!(closed, 1);

        // Nothing emitted after teardown, and tracking state is gone.
        assert!(h.grid.begin_row_edit(0));
        h.grid.commit_cell("name", CommitSource::Editor(text("Bob")));
        assert_eq!(h.collected().edit_closes().len(), closed);
        assert!(h.grid.dirty_row_ids().is_empty());
    }

    // =========================================================================
    // Dirty Tracking Commands
    // =========================================================================

    #[test]
    fn test_mark_pristine_accepts_changes_as_new_normal() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert!(h.grid.commit_active_edit());
        assert!(h.grid.is_row_dirty(&RowId::new("1")));

        assert!(h.grid.mark_row_pristine(0));
        assert!(!h.grid.is_row_dirty(&RowId::new("1")));
        assert_eq!(
            h.grid.original_row(&RowId::new("1")).unwrap().get("name"),
            Some(&text("Bob"))
        );
        let kinds: Vec<DirtyKind> = h
            .collected()
            .dirty_changes()
            .iter()
            .map(|d| d.kind)
            .collect();
        assert_eq!(kinds, vec![DirtyKind::Modified, DirtyKind::Pristine]);
    }

    #[test]
    fn test_revert_row_restores_and_reports() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert!(h.grid.commit_active_edit());

        assert!(h.grid.revert_row(0));
        assert_eq!(h.grid.row(0).unwrap().get("name"), Some(&text("Alice")));
        assert!(!h.grid.is_row_dirty(&RowId::new("1")));
        let kinds: Vec<DirtyKind> = h
            .collected()
            .dirty_changes()
            .iter()
            .map(|d| d.kind)
            .collect();
        assert_eq!(kinds, vec![DirtyKind::Modified, DirtyKind::Reverted]);
        // A second revert is a no-op: nothing left to restore.
        assert!(!h.grid.revert_row(0));
    }

    #[test]
    fn test_revert_all_restores_every_dirty_row() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("X"))));
        assert!(h.grid.commit_active_edit());
        assert!(h.grid.begin_cell_edit(2, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Y"))));
        assert!(h.grid.commit_active_edit());

        assert_eq!(h.grid.revert_all(), 2);
        assert!(h.grid.dirty_row_ids().is_empty());
        assert_eq!(h.grid.row(0).unwrap().get("name"), Some(&text("Alice")));
        assert_eq!(h.grid.row(2).unwrap().get("name"), Some(&text("Carol")));
    }

    #[test]
    fn test_insert_row_tracked_as_new() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        h.grid.insert_row(3, GridHarness::person(9, "Zoe", 0.0));
        let id = RowId::new("9");
        assert!(h.grid.is_row_dirty(&id));
        assert!(h.grid.dirty_row_ids().contains(&id));
        // New rows have no baseline.
        assert!(h.grid.original_row(&id).is_none());
        let kinds: Vec<DirtyKind> = h
            .collected()
            .dirty_changes()
            .iter()
            .map(|d| d.kind)
            .collect();
        assert_eq!(kinds, vec![DirtyKind::New]);
    }

    #[test]
    fn test_reset_tracking_starts_over() {
        let mut h = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(h.grid.begin_cell_edit(0, "name"));
        assert!(h.grid.commit_cell("name", CommitSource::Editor(text("Bob"))));
        assert!(h.grid.commit_active_edit());
        assert!(!h.grid.dirty_row_ids().is_empty());

        h.grid.reset_tracking();
        assert!(h.grid.dirty_row_ids().is_empty());
        assert!(h.grid.changed_row_ids().is_empty());
        // Current data is the new baseline.
        assert_eq!(
            h.grid.original_row(&RowId::new("1")).unwrap().get("name"),
            Some(&text("Bob"))
        );
    }
}
