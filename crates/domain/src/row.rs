// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The business unique key of a monitored row.
///
/// This is the application's key (a column with a single-column unique
/// constraint), which is not necessarily the storage engine's row identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(i64);

impl RowKey {
    /// Wraps a key value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for RowKey {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for RowKey {
    fn from(value: i32) -> Self {
        Self(i64::from(value))
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A snapshot of column values of one row.
///
/// Columns are kept sorted by name so two images of the same row serialize
/// identically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowImage(BTreeMap<String, Value>);

impl RowImage {
    /// Creates an empty image.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets a column value, returning the image for chaining.
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Sets a column value.
    pub fn insert(&mut self, column: &str, value: impl Into<Value>) {
        self.0.insert(column.to_string(), value.into());
    }

    /// Returns the value of a column, if the image carries it.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Returns `true` if the image carries the column.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Returns the column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(column, value)| (column.as_str(), value))
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the image has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy restricted to the given columns.
    ///
    /// Columns the image does not carry are skipped.
    #[must_use]
    pub fn project(&self, columns: &[String]) -> Self {
        columns
            .iter()
            .filter_map(|column| {
                self.0
                    .get(column)
                    .map(|value| (column.clone(), value.clone()))
            })
            .collect()
    }
}

impl FromIterator<(String, Value)> for RowImage {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One row of a write request: the key plus the column values to store.
///
/// The key column itself is never part of `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct RowValues {
    /// The business key of the row.
    pub key: RowKey,
    /// The non-key column values.
    pub values: RowImage,
}

impl RowValues {
    /// Creates a request row with no column values yet.
    #[must_use]
    pub fn new(key: impl Into<RowKey>) -> Self {
        Self {
            key: key.into(),
            values: RowImage::new(),
        }
    }

    /// Sets a column value, returning the row for chaining.
    #[must_use]
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.values.insert(column, value);
        self
    }
}

/// The right-hand side of a column assignment in an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// Assign a literal value.
    Value(Value),
    /// Assign the current value of a column of the same row.
    ///
    /// `Assignment::Column("x")` on column `x` is a self-assignment, which
    /// never changes the row.
    Column(String),
}

impl Assignment {
    /// Creates a literal assignment.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Creates a column reference assignment.
    #[must_use]
    pub fn column(column: &str) -> Self {
        Self::Column(column.to_string())
    }
}
