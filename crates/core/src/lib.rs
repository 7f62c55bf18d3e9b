pub mod column;
pub mod compare;
pub mod row;
pub mod value;

pub use column::{Column, Editor, EditorParams, ValueKind};
pub use compare::{deep_equal, field_equal, rows_equal};
pub use row::{field_resolver, Row, RowId, RowIdResolver};
pub use value::FieldValue;
