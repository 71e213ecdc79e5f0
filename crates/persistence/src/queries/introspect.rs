// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Table introspection through `SQLite` PRAGMAs.
//!
//! Used at registration time to find the key column and the tracked columns
//! of a table. Diesel has no PRAGMA DSL, so these are raw `sql_query` calls
//! over validated identifiers.

use diesel::prelude::*;
use diesel::sql_types::{Integer, Nullable, Text};
use diesel::SqliteConnection;
use rowtrail_domain::TableRef;
use tracing::debug;

use crate::error::PersistenceError;

#[derive(QueryableByName)]
struct ColumnInfo {
    #[diesel(sql_type = Integer)]
    cid: i32,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    r#type: String,
    #[diesel(sql_type = Integer)]
    pk: i32,
}

#[derive(QueryableByName)]
struct IndexInfo {
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Integer)]
    unique: i32,
    #[diesel(sql_type = Text)]
    origin: String,
    #[diesel(sql_type = Integer)]
    partial: i32,
}

#[derive(QueryableByName)]
struct IndexColumnInfo {
    #[diesel(sql_type = Nullable<Text>)]
    name: Option<String>,
}

#[derive(QueryableByName)]
struct TableCount {
    #[diesel(sql_type = Integer)]
    count: i32,
}

/// A column of a table as `PRAGMA table_info` reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub position: i32,
    pub name: String,
    pub declared_type: String,
    /// Position within the primary key, 0 if not part of it.
    pub primary_key: i32,
}

impl TableColumn {
    /// Returns `true` if the declared type has INTEGER affinity.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.declared_type.to_ascii_uppercase().contains("INT")
    }
}

/// Returns `true` if the table exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn table_exists(conn: &mut SqliteConnection, table: &TableRef) -> Result<bool, PersistenceError> {
    let row: TableCount = diesel::sql_query(format!(
        "SELECT COUNT(*) AS count FROM {}.sqlite_master WHERE type = 'table' AND name = ?",
        table.schema().quoted()
    ))
    .bind::<Text, _>(table.table().as_str())
    .get_result(conn)?;

    Ok(row.count > 0)
}

/// Lists the columns of a table in declaration order.
///
/// # Errors
///
/// Returns `PersistenceError::TableNotFound` if the table does not exist.
pub fn list_columns(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<Vec<TableColumn>, PersistenceError> {
    // NOTE: PRAGMA is raw SQL (justified - Diesel has no PRAGMA DSL)
    let mut columns: Vec<ColumnInfo> = diesel::sql_query(format!(
        "PRAGMA {}.table_info({})",
        table.schema().quoted(),
        table.table().quoted()
    ))
    .load(conn)?;

    if columns.is_empty() {
        return Err(PersistenceError::TableNotFound(table.to_string()));
    }
    columns.sort_by_key(|column| column.cid);

    Ok(columns
        .into_iter()
        .map(|column| TableColumn {
            position: column.cid,
            name: column.name,
            declared_type: column.r#type,
            primary_key: column.pk,
        })
        .collect())
}

/// Lists the columns that carry a single-column unique constraint or index.
///
/// Partial indexes are skipped because they do not make the column unique.
fn single_column_unique(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<Vec<String>, PersistenceError> {
    let indexes: Vec<IndexInfo> = diesel::sql_query(format!(
        "PRAGMA {}.index_list({})",
        table.schema().quoted(),
        table.table().quoted()
    ))
    .load(conn)?;

    let mut columns: Vec<String> = Vec::new();
    for index in indexes {
        if index.unique == 0 || index.partial != 0 {
            continue;
        }

        let index_columns: Vec<IndexColumnInfo> = diesel::sql_query(format!(
            "PRAGMA {}.index_info(\"{}\")",
            table.schema().quoted(),
            index.name.replace('"', "\"\"")
        ))
        .load(conn)?;

        if let [IndexColumnInfo { name: Some(name) }] = index_columns.as_slice() {
            debug!(index = %index.name, origin = %index.origin, column = %name, "Found unique index");
            columns.push(name.clone());
        }
    }

    Ok(columns)
}

fn sole_primary_key(columns: &[TableColumn]) -> Option<&TableColumn> {
    match columns
        .iter()
        .filter(|column| column.primary_key > 0)
        .collect::<Vec<_>>()
        .as_slice()
    {
        [only] => Some(only),
        _ => None,
    }
}

fn ensure_integer(table: &TableRef, column: &TableColumn) -> Result<(), PersistenceError> {
    if column.is_integer() {
        Ok(())
    } else {
        Err(PersistenceError::KeyColumnNotInteger {
            table: table.to_string(),
            column: column.name.clone(),
        })
    }
}

/// Finds the business key column of a table.
///
/// A column with a single-column UNIQUE constraint or unique index is
/// preferred, since the business key is not necessarily the storage
/// identity. Among several, the first in declaration order wins. Without
/// one, a single-column PRIMARY KEY is used.
///
/// # Errors
///
/// Returns `PersistenceError::KeyColumnNotDetected` if neither exists, or
/// `PersistenceError::KeyColumnNotInteger` if the chosen column is not an
/// integer.
pub fn detect_key_column(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<TableColumn, PersistenceError> {
    let columns: Vec<TableColumn> = list_columns(conn, table)?;
    let unique: Vec<String> = single_column_unique(conn, table)?;

    let primary_key: Option<&TableColumn> = sole_primary_key(&columns);
    let chosen: &TableColumn = columns
        .iter()
        .find(|column| {
            unique.contains(&column.name)
                && primary_key.is_none_or(|pk| pk.name != column.name)
        })
        .or(primary_key)
        .ok_or_else(|| PersistenceError::KeyColumnNotDetected(table.to_string()))?;

    ensure_integer(table, chosen)?;
    debug!(table = %table, key_column = %chosen.name, "Detected key column");
    Ok(chosen.clone())
}

/// Checks that an explicitly requested key column can serve as the key.
///
/// # Errors
///
/// Returns an error if the column does not exist, is not an integer, or is
/// not unique on its own.
pub fn validate_key_column(
    conn: &mut SqliteConnection,
    table: &TableRef,
    key_column: &str,
) -> Result<TableColumn, PersistenceError> {
    let columns: Vec<TableColumn> = list_columns(conn, table)?;
    let column: &TableColumn = columns
        .iter()
        .find(|column| column.name == key_column)
        .ok_or_else(|| PersistenceError::ColumnNotFound {
            table: table.to_string(),
            column: key_column.to_string(),
        })?;

    let is_primary_key: bool =
        sole_primary_key(&columns).is_some_and(|pk| pk.name == column.name);
    if !is_primary_key && !single_column_unique(conn, table)?.contains(&column.name) {
        return Err(PersistenceError::KeyColumnNotUnique {
            table: table.to_string(),
            column: column.name.clone(),
        });
    }

    ensure_integer(table, column)?;
    Ok(column.clone())
}
