// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod bootstrap_tests;
mod single_row_capture_tests;

use rowtrail_audit::Actor;
use rowtrail_domain::{RowValues, TableRef};

use crate::Persistence;

/// Mirrors a table keyed by its rowid-backed primary key.
pub const FIRST_TABLE_DDL: &str = "
    CREATE TABLE first_table (
        id INTEGER PRIMARY KEY,
        int_value INTEGER,
        varchar_value TEXT
    );";

/// Mirrors a table whose business key is a unique column next to a
/// surrogate primary key.
pub const FOO_DDL: &str = "
    CREATE TABLE foo (
        id INTEGER PRIMARY KEY,
        unique_int_value INTEGER NOT NULL UNIQUE,
        int_value INTEGER,
        varchar_value TEXT
    );";

pub fn first_table() -> TableRef {
    TableRef::main("first_table").expect("Valid table name")
}

pub fn foo_table() -> TableRef {
    TableRef::main("foo").expect("Valid table name")
}

pub fn actor(name: &str) -> Option<Actor> {
    Some(Actor::new(name))
}

/// Creates an in-memory database with both test tables, capture enabled on
/// each.
pub fn create_test_persistence() -> Persistence {
    let mut persistence: Persistence =
        Persistence::new_in_memory().expect("Failed to create persistence");
    persistence
        .execute_batch(&format!("{FIRST_TABLE_DDL}{FOO_DDL}"))
        .expect("Failed to create tables");
    persistence
        .enable_table_change_logging(&first_table())
        .expect("Failed to enable first_table");
    persistence
        .enable_table_change_logging(&foo_table())
        .expect("Failed to enable foo");
    persistence
}

/// Builds a row of either test table; `key` is `id` for `first_table` and
/// `unique_int_value` for `foo`.
pub fn test_row(key: i64, int_value: Option<i64>, varchar_value: &str) -> RowValues {
    RowValues::new(key)
        .with("int_value", int_value)
        .with("varchar_value", varchar_value)
}
