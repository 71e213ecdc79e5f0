// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The change log writer.
//!
//! Records are only ever appended. The writer runs on the connection of the
//! enclosing unit of work, so a record commits or rolls back together with
//! the mutation that produced it. `truncate_log` is the single
//! administrative exception and is not reachable from a unit of work.

use diesel::SqliteConnection;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use rowtrail_audit::{ChangeLogEntry, LogId};
use rowtrail_domain::{RowImage, TableRef};
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

use crate::backend::PersistenceBackend;
use crate::error::PersistenceError;

/// Creates the log store of a table if it does not exist yet.
///
/// `AUTOINCREMENT` keeps `log_id` from ever being reused, including after
/// the log is truncated.
///
/// # Errors
///
/// Returns an error if the DDL fails.
pub fn create_log_store(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<(), PersistenceError> {
    let log: TableRef = table.change_log();
    info!(log = %log, "Creating change log store");

    conn.batch_execute(&format!(
        "CREATE TABLE IF NOT EXISTS {qualified} (
            log_id INTEGER PRIMARY KEY AUTOINCREMENT,
            row_key INTEGER NOT NULL,
            action_type INTEGER NOT NULL CHECK (action_type IN (1, 2, 3)),
            changed_at TEXT NOT NULL,
            actor TEXT,
            before_image TEXT,
            after_image TEXT,
            CHECK ((action_type = 1) = (before_image IS NULL)),
            CHECK ((action_type = 3) = (after_image IS NULL))
        );
        CREATE INDEX IF NOT EXISTS {schema}.\"{name}_row_key\" ON {table} (row_key);",
        qualified = log.qualified(),
        schema = log.schema().quoted(),
        name = log.table(),
        table = log.table().quoted(),
    ))?;

    Ok(())
}

fn encode_image(image: Option<&RowImage>) -> Result<Option<String>, PersistenceError> {
    image
        .map(serde_json::to_string)
        .transpose()
        .map_err(PersistenceError::from)
}

/// Appends one record to a table's log and returns its id.
///
/// # Errors
///
/// Returns an error if serialization or the insert fails.
pub fn append(
    conn: &mut SqliteConnection,
    table: &TableRef,
    entry: &ChangeLogEntry,
) -> Result<LogId, PersistenceError> {
    let log: TableRef = table.change_log();
    let changed_at: String = entry
        .changed_at()
        .format(&Rfc3339)
        .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

    diesel::sql_query(format!(
        "INSERT INTO {} (row_key, action_type, changed_at, actor, before_image, after_image) \
         VALUES (?, ?, ?, ?, ?, ?)",
        log.qualified()
    ))
    .bind::<BigInt, _>(entry.row_key().value())
    .bind::<Integer, _>(entry.action_type().code())
    .bind::<Text, _>(changed_at)
    .bind::<Nullable<Text>, _>(entry.actor().map(|actor| actor.as_str().to_string()))
    .bind::<Nullable<Text>, _>(encode_image(entry.before_image())?)
    .bind::<Nullable<Text>, _>(encode_image(entry.after_image())?)
    .execute(conn)?;

    let log_id: LogId = LogId::new(conn.last_insert_rowid()?);

    debug!(
        log = %log,
        log_id = log_id.value(),
        row_key = entry.row_key().value(),
        action_type = %entry.action_type(),
        "Appended change log record"
    );

    Ok(log_id)
}

/// Appends records in order and returns their ids.
///
/// # Errors
///
/// Returns an error on the first record that cannot be written.
pub fn append_all(
    conn: &mut SqliteConnection,
    table: &TableRef,
    entries: &[ChangeLogEntry],
) -> Result<Vec<LogId>, PersistenceError> {
    entries
        .iter()
        .map(|entry| append(conn, table, entry))
        .collect()
}

/// Deletes every record of a table's log.
///
/// Returns the number of records removed. Ids are not reset.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn truncate_log(conn: &mut SqliteConnection, table: &TableRef) -> Result<usize, PersistenceError> {
    let log: TableRef = table.change_log();
    let removed: usize = diesel::sql_query(format!("DELETE FROM {}", log.qualified())).execute(conn)?;

    info!(log = %log, removed, "Truncated change log");
    Ok(removed)
}
