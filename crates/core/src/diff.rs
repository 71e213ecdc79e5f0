// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Change detection between two row images.
//!
//! Only tracked columns are compared. NULL compared with NULL is equal; NULL
//! compared with any value, or two unequal values, is a difference. Values of
//! different storage classes are different.
//!
//! A comparison involving [`Value::Unsupported`] is [`Comparison::Incomparable`],
//! and incomparable columns count as changed: the engine would rather log a
//! spurious update than drop a real one. The same holds for a tracked column
//! that only one of the two images carries.

use rowtrail_domain::{RowImage, Value};
use std::cmp::Ordering;

/// Outcome of comparing one column's before and after values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// The values are the same.
    Equal,
    /// The values differ.
    Different,
    /// The values cannot be compared.
    Incomparable,
}

impl Comparison {
    /// Returns `true` unless the values are known to be equal.
    #[must_use]
    pub const fn is_change(self) -> bool {
        !matches!(self, Self::Equal)
    }
}

/// Compares two values of the same column.
#[must_use]
pub fn compare_values(before: &Value, after: &Value) -> Comparison {
    let equal: bool = match (before, after) {
        (Value::Unsupported { .. }, _) | (_, Value::Unsupported { .. }) => {
            return Comparison::Incomparable;
        }
        (Value::Null, Value::Null) => true,
        (Value::Integer(b), Value::Integer(a)) => b == a,
        (Value::Real(b), Value::Real(a)) => b.total_cmp(a) == Ordering::Equal,
        (Value::Text(b), Value::Text(a)) => b == a,
        (Value::Blob(b), Value::Blob(a)) => b == a,
        _ => false,
    };

    if equal {
        Comparison::Equal
    } else {
        Comparison::Different
    }
}

fn column_changed(before: &RowImage, after: &RowImage, column: &str) -> bool {
    match (before.get(column), after.get(column)) {
        (Some(b), Some(a)) => compare_values(b, a).is_change(),
        (None, None) => false,
        _ => true,
    }
}

/// Returns `true` if any tracked column differs between the two images.
///
/// This gates UPDATE records only; inserts and deletes are always logged.
#[must_use]
pub fn compare(before: &RowImage, after: &RowImage, tracked: &[String]) -> bool {
    tracked
        .iter()
        .any(|column| column_changed(before, after, column))
}

/// Returns the tracked columns that differ between the two images, in
/// tracking order.
#[must_use]
pub fn changed_columns(before: &RowImage, after: &RowImage, tracked: &[String]) -> Vec<String> {
    tracked
        .iter()
        .filter(|column| column_changed(before, after, column))
        .cloned()
        .collect()
}
