use serde_json::{Map, Value};
use std::cmp::Ordering;

/// A stored record: field name to JSON value.
pub type Document = Map<String, Value>;

/// Partial update payload: field name to new value, `Value::Null` clears.
pub type FieldMap = Map<String, Value>;

/// Ordering rank of a value kind, used when ordering heterogeneous fields.
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Number(_) => "NUMBER",
        Value::String(_) => "STRING",
        Value::Array(_) => "ARRAY",
        Value::Object(_) => "MAP",
    }
}

/// Compares two values of the same kind.
///
/// Returns `None` for mismatched kinds; range filters never match across kinds.
pub fn compare_same_kind(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Some(a.cmp(&b));
            }
            let a = a.as_f64()?;
            let b = b.as_f64()?;
            // NaN sorts before every other number
            match (a.is_nan(), b.is_nan()) {
                (true, true) => Some(Ordering::Equal),
                (true, false) => Some(Ordering::Less),
                (false, true) => Some(Ordering::Greater),
                (false, false) => a.partial_cmp(&b),
            }
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                match compare_total(x, y) {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        (Value::Object(a), Value::Object(b)) => Some(a.len().cmp(&b.len())),
        _ => None,
    }
}

/// Total order used for `order_by`: kinds first, then values within a kind.
pub fn compare_total(left: &Value, right: &Value) -> Ordering {
    match kind_rank(left).cmp(&kind_rank(right)) {
        Ordering::Equal => compare_same_kind(left, right).unwrap_or(Ordering::Equal),
        other => other,
    }
}

/// Equality with numeric normalization (`1` equals `1.0`).
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => {
            compare_same_kind(left, right) == Some(Ordering::Equal)
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        _ => left == right,
    }
}

/// Resolves a dotted field path inside a document.
pub fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
