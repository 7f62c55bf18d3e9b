//! Rows and row identity.
//!
//! A `Row` is an opaque record: the engine never defines its shape, only
//! addresses it by position in the displayed collection and by a `RowId`
//! derived through a host-supplied resolver. Rows are mutated in place
//! during editing; there is no copy-on-write.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// A host-supplied record: named fields mapped to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    fields: BTreeMap<String, FieldValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Copy every field of `partial` onto this row in place.
    /// Fields not named by `partial` are untouched.
    pub fn merge(&mut self, partial: &Row) {
        for (name, value) in partial.fields() {
            self.fields.insert(name.clone(), value.clone());
        }
    }

    /// Build a row from a JSON object. Non-object values have no row shape
    /// and yield `None`.
    pub fn from_json(value: serde_json::Value) -> Option<Row> {
        match value {
            serde_json::Value::Object(map) => Some(Row {
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::from_json(v)))
                    .collect(),
            }),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Stable, host-defined key for a logical row. Unlike a positional index it
/// survives collection replacement and reordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        RowId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        RowId(s.to_string())
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        RowId(s)
    }
}

/// Host-supplied identity function. Returning `None` means the row has no
/// derivable identity; such rows are skipped by tracking, never an error.
pub type RowIdResolver = Box<dyn Fn(&Row) -> Option<RowId>>;

/// The common resolver: identity is the display form of one field.
/// Rows missing the field (or holding null) resolve to `None`.
pub fn field_resolver(field: impl Into<String>) -> RowIdResolver {
    let field = field.into();
    Box::new(move |row: &Row| match row.get(&field) {
        None | Some(FieldValue::Null) => None,
        Some(value) => Some(RowId::new(value.display())),
    })
}
