//! Column specifications for editing.
//!
//! A column names a field, declares whether it is editable, which editor
//! handles it, and how staged editor text coerces back to a typed value.
//! Editor params are constraint carriers handed to editors; the engine does
//! not validate value semantics itself (hosts veto through the preventable
//! commit event).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// Declared value type of a column. Drives commit-time coercion of staged
/// editor text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    #[default]
    Text,
    /// Numeric column. Staged text is coerced to a number before it reaches
    /// the row or the commit event; it is never committed as a string.
    Number,
    /// Date column holding a real date value (RFC 3339 or YYYY-MM-DD input).
    Date,
    /// Date kept as text. Stays a string even when staged by a date-typed
    /// control.
    DateText,
    Bool,
    Select,
}

impl ValueKind {
    /// Coerce raw editor text to this column's value type.
    ///
    /// Unparseable numeric input becomes NaN rather than an error; whether
    /// to accept it is a host-level concern via the preventable commit
    /// event. Unparseable dates and bools pass through as text.
    pub fn coerce(&self, raw: &str) -> FieldValue {
        match self {
            ValueKind::Text | ValueKind::Select | ValueKind::DateText => {
                FieldValue::Text(raw.to_string())
            }
            ValueKind::Number => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    FieldValue::Null
                } else {
                    FieldValue::Number(trimmed.parse().unwrap_or(f64::NAN))
                }
            }
            ValueKind::Date => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return FieldValue::Null;
                }
                if let Ok(d) = DateTime::parse_from_rfc3339(trimmed) {
                    return FieldValue::Date(d.with_timezone(&Utc));
                }
                if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                    if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                        return FieldValue::Date(dt.and_utc());
                    }
                }
                FieldValue::Text(trimmed.to_string())
            }
            ValueKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => FieldValue::Bool(true),
                "false" | "0" | "no" | "off" => FieldValue::Bool(false),
                other if other.is_empty() => FieldValue::Null,
                other => FieldValue::Text(other.to_string()),
            },
        }
    }
}

/// Which editor handles a column.
///
/// Custom editors carry an explicit `externally_managed` flag: a typed
/// contract, not a marker sniffed off a rendered node. An externally
/// managed editor may display a formatted representation, so the engine
/// never reads its staged raw input back — only values it hands over
/// explicitly are committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Editor {
    Input,
    Number,
    Date,
    Select,
    Checkbox,
    Custom {
        name: String,
        externally_managed: bool,
    },
}

impl Default for Editor {
    fn default() -> Self {
        Editor::Input
    }
}

impl Editor {
    pub fn custom(name: impl Into<String>) -> Self {
        Editor::Custom {
            name: name.into(),
            externally_managed: false,
        }
    }

    pub fn external(name: impl Into<String>) -> Self {
        Editor::Custom {
            name: name.into(),
            externally_managed: true,
        }
    }

    pub fn is_externally_managed(&self) -> bool {
        matches!(
            self,
            Editor::Custom {
                externally_managed: true,
                ..
            }
        )
    }
}

/// One option of a select editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Numeric editor constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumberParams {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

impl NumberParams {
    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }
}

/// Text editor constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextParams {
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
}

impl TextParams {
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// Date editor constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DateParams {
    pub min: Option<DateTime<Utc>>,
    pub max: Option<DateTime<Utc>>,
}

impl DateParams {
    pub fn with_min(mut self, min: DateTime<Utc>) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: DateTime<Utc>) -> Self {
        self.max = Some(max);
        self
    }
}

/// Select editor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectParams {
    pub options: Vec<SelectOption>,
    pub include_empty: bool,
    pub empty_label: Option<String>,
}

impl SelectParams {
    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    pub fn with_include_empty(mut self, include: bool) -> Self {
        self.include_empty = include;
        self
    }

    pub fn with_empty_label(mut self, label: impl Into<String>) -> Self {
        self.empty_label = Some(label.into());
        self
    }
}

/// Type-specific editor constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum EditorParams {
    #[default]
    None,
    Number(NumberParams),
    Text(TextParams),
    Date(DateParams),
    Select(SelectParams),
}

/// Per-column editing specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub field: String,
    pub title: Option<String>,
    pub editable: bool,
    pub value_kind: ValueKind,
    pub editor: Editor,
    pub params: EditorParams,
}

impl Column {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            title: None,
            editable: false,
            value_kind: ValueKind::default(),
            editor: Editor::default(),
            params: EditorParams::default(),
        }
    }

    /// Shorthand for an editable text column.
    pub fn editable(field: impl Into<String>) -> Self {
        Self::new(field).with_editable(true)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_value_kind(mut self, kind: ValueKind) -> Self {
        self.value_kind = kind;
        self
    }

    pub fn with_editor(mut self, editor: Editor) -> Self {
        self.editor = editor;
        self
    }

    pub fn with_params(mut self, params: EditorParams) -> Self {
        self.params = params;
        self
    }

    pub fn is_numeric(&self) -> bool {
        self.value_kind == ValueKind::Number
    }
}
