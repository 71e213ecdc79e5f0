// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Scripted runs against a fresh copy of the demo tables.
//!
//! Each scenario drops and recreates its table, enables change logging, runs
//! a fixed sequence of units of work, and returns the printed table and
//! change log.

use color_eyre::Result;
use rowtrail_audit::{Actor, ChangeLogRecord};
use rowtrail_domain::{Assignment, RowKey, RowValues, TableRef, Value};
use rowtrail_persistence::{MutationSummary, Persistence, PersistenceError, UnitOfWork};
use std::fmt::Write;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::render::{render_change_log, render_table};

const FIRST_TABLE_DDL: &str = "
    DROP TABLE IF EXISTS first_table;
    DROP TABLE IF EXISTS first_table_change_log;
    CREATE TABLE first_table (
        id INTEGER PRIMARY KEY,
        added_at TEXT NOT NULL,
        int_value INTEGER,
        varchar_value TEXT
    );";

const FOO_DDL: &str = "
    DROP TABLE IF EXISTS foo;
    DROP TABLE IF EXISTS foo_change_log;
    CREATE TABLE foo (
        id INTEGER PRIMARY KEY,
        unique_int_value INTEGER NOT NULL UNIQUE,
        int_value INTEGER,
        varchar_value TEXT
    );";

fn user(name: &str) -> Option<Actor> {
    Some(Actor::new(name))
}

fn added_at(uow: &UnitOfWork<'_>) -> Result<Value, PersistenceError> {
    uow.changed_at()
        .format(&Rfc3339)
        .map(Value::Text)
        .map_err(|e| PersistenceError::SerializationError(e.to_string()))
}

fn foo(unique_int_value: i64, int_value: Option<i64>, varchar_value: &str) -> RowValues {
    RowValues::new(unique_int_value)
        .with("int_value", int_value)
        .with("varchar_value", varchar_value)
}

fn report(out: &mut String, step: &str, summary: MutationSummary) -> std::fmt::Result {
    info!(step, ?summary, "Scenario step finished");
    writeln!(
        out,
        "{step}: affected={} logged={} suppressed={}",
        summary.affected, summary.logged, summary.suppressed
    )
}

fn print_state(out: &mut String, persistence: &mut Persistence, table: &TableRef) -> Result<()> {
    let tracked: Vec<String> = persistence
        .registration(table)?
        .map(|registration| registration.tracked_columns)
        .unwrap_or_default();
    let records: Vec<ChangeLogRecord> = persistence.list_change_log(table)?;

    render_table(out, &table.to_string(), &persistence.read_table(table)?)?;
    render_change_log(out, &table.change_log().to_string(), &records, &tracked)
}

/// Insert, self-assign, two updates, and a delete of one row, each in its
/// own unit of work.
///
/// # Errors
///
/// Returns an error if any step fails.
pub fn single_row(persistence: &mut Persistence) -> Result<String> {
    let table: TableRef = TableRef::main("first_table")?;
    let key: [RowKey; 1] = [RowKey::new(1)];
    let mut out: String = String::new();

    persistence.execute_batch(FIRST_TABLE_DDL)?;
    persistence.enable_table_change_logging(&table)?;

    let summary: MutationSummary = persistence.transaction(None, |uow| {
        let row: RowValues = RowValues::new(1)
            .with("added_at", added_at(uow)?)
            .with("int_value", 1)
            .with("varchar_value", "first");
        uow.insert(&table, &[row])
    })?;
    report(&mut out, "insert", summary)?;

    let summary: MutationSummary = persistence.transaction(None, |uow| {
        uow.update(&table, &[("int_value", Assignment::column("int_value"))], &key)
    })?;
    report(&mut out, "self-assign", summary)?;

    let summary: MutationSummary = persistence.transaction(user("first_user"), |uow| {
        uow.update(&table, &[("int_value", Assignment::value(2))], &key)
    })?;
    report(&mut out, "update to 2", summary)?;

    let summary: MutationSummary = persistence.transaction(user("first_user"), |uow| {
        uow.update(&table, &[("int_value", Assignment::Value(Value::Null))], &key)
    })?;
    report(&mut out, "update to NULL", summary)?;

    let summary: MutationSummary =
        persistence.transaction(user("second_user"), |uow| uow.delete(&table, &key))?;
    report(&mut out, "delete", summary)?;

    print_state(&mut out, persistence, &table)?;
    Ok(out)
}

/// Batch upsert, bulk update, bulk delete, and bulk copy against one table,
/// then truncation of its log.
///
/// # Errors
///
/// Returns an error if any step fails.
pub fn batch(persistence: &mut Persistence) -> Result<String> {
    let table: TableRef = TableRef::main("foo")?;
    let mut out: String = String::new();

    persistence.execute_batch(FOO_DDL)?;
    persistence.enable_table_change_logging(&table)?;

    let summary: MutationSummary = persistence.transaction(None, |uow| {
        uow.upsert(
            &table,
            &[foo(1, Some(1), "one"), foo(2, Some(2), "two"), foo(3, None, "three")],
        )
    })?;
    report(&mut out, "upsert new rows", summary)?;

    let summary: MutationSummary = persistence.transaction(user("first_user"), |uow| {
        uow.upsert(
            &table,
            &[foo(2, Some(20), "two"), foo(3, None, "three"), foo(4, Some(4), "four")],
        )
    })?;
    report(&mut out, "upsert mixed rows", summary)?;

    let summary: MutationSummary = persistence.transaction(user("second_user"), |uow| {
        uow.update_rows(&table, &[foo(1, None, "one"), foo(4, Some(4), "four")])
    })?;
    report(&mut out, "bulk update", summary)?;

    let summary: MutationSummary = persistence.transaction(user("second_user"), |uow| {
        uow.delete(&table, &[RowKey::new(1), RowKey::new(3)])
    })?;
    report(&mut out, "bulk delete", summary)?;

    let summary: MutationSummary = persistence.transaction(user("loader"), |uow| {
        uow.copy_in(&table, (5..=8).map(|key| foo(key, Some(key * 10), "copied")))
    })?;
    report(&mut out, "bulk copy", summary)?;

    print_state(&mut out, persistence, &table)?;

    let removed: usize = persistence.truncate_log(&table)?;
    writeln!(out, "truncated {removed} change log records")?;
    Ok(out)
}
