//! Evaluation of a [`QuerySpec`] over in-memory records.
//!
//! Mirrors the semantics of hosted document stores: records missing the
//! filtered or ordered field never match, range comparisons only match
//! within one value kind, and unordered results come back in id order.

use super::DocumentSnapshot;
use crate::core::value::{compare_same_kind, compare_total, lookup_path, values_equal};
use crate::query::{Direction, FieldRef, Filter, FilterOp, Limit, QuerySpec};
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

fn field_value<'a>(snapshot: &'a DocumentSnapshot, field: &FieldRef) -> Option<Cow<'a, Value>> {
    match field {
        FieldRef::DocumentId => Some(Cow::Owned(Value::String(snapshot.id.clone()))),
        FieldRef::Field(path) => lookup_path(&snapshot.data, path).map(Cow::Borrowed),
    }
}

fn candidates(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    }
}

fn range_matches(actual: &Value, expected: &Value, accept: fn(Ordering) -> bool) -> bool {
    compare_same_kind(actual, expected).map(accept).unwrap_or(false)
}

pub fn matches(filter: &Filter, snapshot: &DocumentSnapshot) -> bool {
    let Some(actual) = field_value(snapshot, &filter.field) else {
        return false;
    };
    let actual = actual.as_ref();
    let expected = &filter.value;

    match filter.op {
        FilterOp::Equal => values_equal(actual, expected),
        FilterOp::NotEqual => !actual.is_null() && !values_equal(actual, expected),
        FilterOp::LessThan => range_matches(actual, expected, |o| o == Ordering::Less),
        FilterOp::LessThanOrEqual => range_matches(actual, expected, |o| o != Ordering::Greater),
        FilterOp::GreaterThan => range_matches(actual, expected, |o| o == Ordering::Greater),
        FilterOp::GreaterThanOrEqual => range_matches(actual, expected, |o| o != Ordering::Less),
        FilterOp::Contains => actual
            .as_array()
            .map(|items| items.iter().any(|item| values_equal(item, expected)))
            .unwrap_or(false),
        FilterOp::ContainsAny => actual
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .any(|item| candidates(expected).iter().any(|c| values_equal(item, c)))
            })
            .unwrap_or(false),
        FilterOp::In => candidates(expected).iter().any(|c| values_equal(actual, c)),
        FilterOp::NotIn => {
            !actual.is_null() && !candidates(expected).iter().any(|c| values_equal(actual, c))
        }
    }
}

/// Filters, orders and paginates `records`.
pub fn apply(spec: &QuerySpec, records: Vec<DocumentSnapshot>) -> Vec<DocumentSnapshot> {
    let mut selected: Vec<DocumentSnapshot> = records
        .into_iter()
        .filter(|snapshot| spec.filters.iter().all(|filter| matches(filter, snapshot)))
        .collect();

    match &spec.order {
        Some(order) => {
            selected.retain(|snapshot| lookup_path(&snapshot.data, &order.field).is_some());
            selected.sort_by(|a, b| {
                let left = lookup_path(&a.data, &order.field).unwrap_or(&Value::Null);
                let right = lookup_path(&b.data, &order.field).unwrap_or(&Value::Null);
                let ordering = compare_total(left, right).then_with(|| a.id.cmp(&b.id));
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        None => selected.sort_by(|a, b| a.id.cmp(&b.id)),
    }

    let remaining: Vec<DocumentSnapshot> = selected.into_iter().skip(spec.offset).collect();
    match spec.limit {
        Some(Limit::First(n)) => remaining.into_iter().take(n).collect(),
        Some(Limit::Last(n)) => {
            let start = remaining.len().saturating_sub(n);
            remaining.into_iter().skip(start).collect()
        }
        None => remaining,
    }
}
