// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Change log readers.
//!
//! Log stores are created per table at registration time, so they have no
//! `table!` definition and are read through `sql_query`.

use diesel::SqliteConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use num_traits::ToPrimitive;
use rowtrail_audit::{ActionType, Actor, ChangeLogEntry, ChangeLogRecord, LogId};
use rowtrail_domain::{RowImage, RowKey, TableRef};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::error::PersistenceError;
use crate::queries::introspect::table_exists;

/// Columns of a log store, in storage order.
const LOG_COLUMNS: &str = "log_id, row_key, action_type, changed_at, actor, before_image, after_image";

#[derive(QueryableByName)]
struct LogRow {
    #[diesel(sql_type = BigInt)]
    log_id: i64,
    #[diesel(sql_type = BigInt)]
    row_key: i64,
    #[diesel(sql_type = Integer)]
    action_type: i32,
    #[diesel(sql_type = Text)]
    changed_at: String,
    #[diesel(sql_type = Nullable<Text>)]
    actor: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    before_image: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    after_image: Option<String>,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

fn parse_image(json: Option<&str>) -> Result<Option<RowImage>, PersistenceError> {
    json.map(serde_json::from_str::<RowImage>)
        .transpose()
        .map_err(PersistenceError::from)
}

impl LogRow {
    fn into_record(self) -> Result<ChangeLogRecord, PersistenceError> {
        let action_type: ActionType = ActionType::from_code(self.action_type)?;
        let changed_at: OffsetDateTime = OffsetDateTime::parse(&self.changed_at, &Rfc3339)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

        let entry: ChangeLogEntry = ChangeLogEntry::from_parts(
            RowKey::new(self.row_key),
            action_type,
            changed_at,
            self.actor.map(Actor::new),
            parse_image(self.before_image.as_deref())?,
            parse_image(self.after_image.as_deref())?,
        )?;

        Ok(ChangeLogRecord::new(LogId::new(self.log_id), entry))
    }
}

fn ensure_log_exists(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<TableRef, PersistenceError> {
    let log: TableRef = table.change_log();
    if table_exists(conn, &log)? {
        Ok(log)
    } else {
        Err(PersistenceError::TableNotFound(log.to_string()))
    }
}

/// Lists every record of a table's log in `log_id` order.
///
/// # Errors
///
/// Returns an error if the log store does not exist or a record is invalid.
pub fn list_change_log(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<Vec<ChangeLogRecord>, PersistenceError> {
    list_change_log_after(conn, table, LogId::new(0))
}

/// Lists the records of a table's log with a `log_id` greater than `after`.
///
/// # Errors
///
/// Returns an error if the log store does not exist or a record is invalid.
pub fn list_change_log_after(
    conn: &mut SqliteConnection,
    table: &TableRef,
    after: LogId,
) -> Result<Vec<ChangeLogRecord>, PersistenceError> {
    let log: TableRef = ensure_log_exists(conn, table)?;
    debug!(log = %log, after = %after, "Reading change log");

    let rows: Vec<LogRow> = diesel::sql_query(format!(
        "SELECT {LOG_COLUMNS} FROM {} WHERE log_id > ? ORDER BY log_id",
        log.qualified()
    ))
    .bind::<BigInt, _>(after.value())
    .load(conn)?;

    rows.into_iter().map(LogRow::into_record).collect()
}

/// Counts the records of a table's log.
///
/// # Errors
///
/// Returns an error if the log store does not exist.
pub fn count_change_log(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<usize, PersistenceError> {
    let log: TableRef = ensure_log_exists(conn, table)?;

    let row: CountRow =
        diesel::sql_query(format!("SELECT COUNT(*) AS count FROM {}", log.qualified()))
            .get_result(conn)?;

    row.count
        .to_usize()
        .ok_or_else(|| PersistenceError::DatabaseError("Count conversion failed".to_string()))
}
