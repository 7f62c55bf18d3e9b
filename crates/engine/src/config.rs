//! Editing configuration.

use serde::{Deserialize, Serialize};

/// Which pointer/keyboard trigger opens an edit session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOn {
    Click,
    #[default]
    DblClick,
    /// No pointer or keyboard trigger opens editing; only programmatic
    /// calls do.
    Manual,
}

/// Recognized editing options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    pub edit_on: EditOn,
    /// Always-on editing: every editable cell stays in edit state and the
    /// session machine never returns to idle.
    pub grid_mode: bool,
    /// Enable the baseline store and dirty registry.
    pub dirty_tracking: bool,
}

impl EditConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edit_on(mut self, edit_on: EditOn) -> Self {
        self.edit_on = edit_on;
        self
    }

    pub fn with_grid_mode(mut self, grid_mode: bool) -> Self {
        self.grid_mode = grid_mode;
        self
    }

    pub fn with_dirty_tracking(mut self, dirty_tracking: bool) -> Self {
        self.dirty_tracking = dirty_tracking;
        self
    }
}
