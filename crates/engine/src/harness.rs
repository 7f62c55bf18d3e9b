//! Test harness for grid editing with event tracking.
//!
//! This module provides `GridHarness`, a wrapper around `Grid` that:
//! - Collects every emitted event (snapshots; listener callbacks drained)
//! - Records render requests and row-flag changes
//! - Provides a canned people fixture (id / name / bonus)
//!
//! Use this harness to test session and dirty-tracking invariants without a
//! rendering frontend.

use std::cell::RefCell;
use std::rc::Rc;

use gridedit_core::row::field_resolver;
use gridedit_core::{Column, Editor, Row, ValueKind};

use crate::config::EditConfig;
use crate::events::EventCollector;
use crate::grid::Grid;
use crate::render::{RenderHost, RowFlag};

/// Render host that records what the engine asked of the frontend.
#[derive(Debug, Clone, Default)]
pub struct RenderLog {
    pub render_requests: usize,
    pub flag_changes: Vec<(usize, RowFlag, bool)>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingRenderHost {
    log: Rc<RefCell<RenderLog>>,
}

impl RenderHost for RecordingRenderHost {
    fn request_render(&mut self) {
        self.log.borrow_mut().render_requests += 1;
    }

    fn set_row_flag(&mut self, row_index: usize, flag: RowFlag, on: bool) {
        self.log.borrow_mut().flag_changes.push((row_index, flag, on));
    }
}

/// Test harness wrapping Grid with event and render tracking.
pub struct GridHarness {
    pub grid: Grid,
    events: Rc<RefCell<EventCollector>>,
    render_log: Rc<RefCell<RenderLog>>,
}

impl GridHarness {
    /// Create a harness around a fully built grid, attaching the collector
    /// listener and a recording render host.
    pub fn build(
        columns: Vec<Column>,
        config: EditConfig,
        rows: Vec<Row>,
        id_field: Option<&str>,
    ) -> Self {
        let render_log = Rc::new(RefCell::new(RenderLog::default()));
        let host = RecordingRenderHost {
            log: Rc::clone(&render_log),
        };
        let mut grid = Grid::new(columns, config).with_render_host(Box::new(host));
        if let Some(field) = id_field {
            let resolver = field_resolver(field);
            grid = grid.with_resolver(move |row| resolver(row));
        }
        let grid = grid.with_rows(rows);

        let events = Rc::new(RefCell::new(EventCollector::new()));
        let mut harness = Self {
            grid,
            events,
            render_log,
        };
        let sink = Rc::clone(&harness.events);
        harness
            .grid
            .on_event(move |event| sink.borrow_mut().push(event.clone()));
        harness
    }

    /// Columns for the people fixture: editable text `name`, editable
    /// numeric `bonus`, non-editable `id`.
    pub fn people_columns() -> Vec<Column> {
        vec![
            Column::new("id"),
            Column::editable("name"),
            Column::editable("bonus")
                .with_value_kind(ValueKind::Number)
                .with_editor(Editor::Number),
        ]
    }

    pub fn person(id: i64, name: &str, bonus: f64) -> Row {
        let mut row = Row::new();
        row.set("id", id);
        row.set("name", name);
        row.set("bonus", bonus);
        row
    }

    pub fn people_rows() -> Vec<Row> {
        vec![
            Self::person(1, "Alice", 1000.0),
            Self::person(2, "Bob", 2000.0),
            Self::person(3, "Carol", 3000.0),
        ]
    }

    /// People fixture with an id resolver and the given config.
    pub fn with_people(config: EditConfig) -> Self {
        Self::build(
            Self::people_columns(),
            config,
            Self::people_rows(),
            Some("id"),
        )
    }

    /// Snapshot of everything collected so far.
    pub fn collected(&self) -> EventCollector {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn render_log(&self) -> RenderLog {
        self.render_log.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CommitSource;
    use gridedit_core::FieldValue;

    #[test]
    fn test_harness_collects_events_and_render_requests() {
        let mut harness = GridHarness::with_people(EditConfig::new().with_dirty_tracking(true));
        assert!(harness.grid.begin_cell_edit(0, "name"));
        assert!(harness.grid.commit_cell(
            "name",
            CommitSource::Editor(FieldValue::Text("Bob".into()))
        ));
        assert!(harness.grid.commit_active_edit());

        let events = harness.collected();
        assert_eq!(events.cell_commits().len(), 1);
        assert_eq!(events.row_commits().len(), 1);
        assert!(harness.render_log().render_requests > 0);
    }
}
