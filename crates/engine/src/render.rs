//! Seam to the rendering collaborator.
//!
//! The editing engine does not own rendering. It needs exactly two things
//! from the frontend: a way to request a redraw, and a way to toggle
//! per-row visual state (the "this row is dirty" class). Both go through
//! this trait; the default methods make a null host trivial.

/// Per-row visual state the engine can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowFlag {
    Dirty,
    Editing,
}

pub trait RenderHost {
    /// Ask the frontend to redraw. May be called redundantly.
    fn request_render(&mut self) {}

    /// Toggle a visual flag on one displayed row.
    fn set_row_flag(&mut self, _row_index: usize, _flag: RowFlag, _on: bool) {}
}

/// Host that ignores all rendering requests. Default for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderHost;

impl RenderHost for NullRenderHost {}
