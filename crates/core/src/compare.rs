//! Deep structural equality for field values and rows.
//!
//! This is the single comparison used for every dirty check, whole-row and
//! single-field. Key properties:
//! - Pure, no panics for any well-formed value
//! - Dates compare by timestamp (two distinct instances, same instant: equal)
//! - Arrays are order-sensitive; maps are not
//! - Numbers compare through `OrderedFloat`, so NaN == NaN (a failed numeric
//!   coercion must not leave a row eternally dirty)

use ordered_float::OrderedFloat;

use crate::row::Row;
use crate::value::FieldValue;

/// Structural equality of two field values to arbitrary depth.
pub fn deep_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Null, FieldValue::Null) => true,
        (FieldValue::Bool(x), FieldValue::Bool(y)) => x == y,
        (FieldValue::Number(x), FieldValue::Number(y)) => OrderedFloat(*x) == OrderedFloat(*y),
        (FieldValue::Text(x), FieldValue::Text(y)) => x == y,
        (FieldValue::Date(x), FieldValue::Date(y)) => {
            x.timestamp_millis() == y.timestamp_millis()
        }
        (FieldValue::Array(x), FieldValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| deep_equal(a, b))
        }
        (FieldValue::Map(x), FieldValue::Map(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| deep_equal(v, w)))
        }
        _ => false,
    }
}

/// Whole-row equality: same field set, every field deep-equal.
pub fn rows_equal(a: &Row, b: &Row) -> bool {
    a.len() == b.len()
        && a.fields()
            .all(|(name, v)| b.get(name).is_some_and(|w| deep_equal(v, w)))
}

/// Single-field equality between two rows. A field absent from both rows
/// counts as equal; absent from one only, not.
pub fn field_equal(a: &Row, b: &Row, field: &str) -> bool {
    match (a.get(field), b.get(field)) {
        (None, None) => true,
        (Some(x), Some(y)) => deep_equal(x, y),
        _ => false,
    }
}
