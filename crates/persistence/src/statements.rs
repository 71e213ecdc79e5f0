// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Parameterized multi-row statement builder.
//!
//! Statements are assembled from validated identifiers and `?` placeholders
//! only; every value travels as a bind parameter. Batches are split so that
//! no statement carries more than [`MAX_BIND_PARAMS`] parameters.

use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::query_dsl::RunQueryDsl;
use diesel::sql_types::{BigInt, Binary, Double, Nullable, Text};
use diesel::sqlite::Sqlite;
use diesel::{QueryableByName, SqliteConnection};
use rowtrail_domain::{Assignment, Identifier, RowKey, RowValues, TableRef, Value};

use crate::error::PersistenceError;

/// The lowest `SQLITE_MAX_VARIABLE_NUMBER` shipped by any supported `SQLite`.
pub const MAX_BIND_PARAMS: usize = 999;

/// What an INSERT does when the key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Let the unique constraint reject the row.
    Fail,
    /// Replace the written columns of the existing row.
    Update,
}

/// A SQL statement with its bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    /// Returns the SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bind parameters in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn into_query(self) -> Result<BoxedSqlQuery<'static, Sqlite, SqlQuery>, PersistenceError> {
        let mut query: BoxedSqlQuery<'static, Sqlite, SqlQuery> =
            diesel::sql_query(self.sql).into_boxed();
        for value in self.params {
            query = bind_value(query, value)?;
        }
        Ok(query)
    }

    /// Runs the statement and returns the number of rows it changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter cannot be bound or the statement fails.
    pub fn execute(self, conn: &mut SqliteConnection) -> Result<usize, PersistenceError> {
        Ok(self.into_query()?.execute(conn)?)
    }

    /// Runs the statement and loads its result rows.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter cannot be bound or the query fails.
    pub fn load<T>(self, conn: &mut SqliteConnection) -> Result<Vec<T>, PersistenceError>
    where
        T: QueryableByName<Sqlite> + 'static,
    {
        Ok(self.into_query()?.load::<T>(conn)?)
    }
}

fn bind_value(
    query: BoxedSqlQuery<'static, Sqlite, SqlQuery>,
    value: Value,
) -> Result<BoxedSqlQuery<'static, Sqlite, SqlQuery>, PersistenceError> {
    Ok(match value {
        Value::Null => query.bind::<Nullable<Text>, _>(None::<String>),
        Value::Integer(v) => query.bind::<BigInt, _>(v),
        Value::Real(v) => query.bind::<Double, _>(v),
        Value::Text(v) => query.bind::<Text, _>(v),
        Value::Blob(v) => query.bind::<Binary, _>(v),
        Value::Unsupported { unsupported } => {
            return Err(PersistenceError::UnsupportedValue(unsupported));
        }
    })
}

/// Validates and quotes a column name.
///
/// # Errors
///
/// Returns an error if the name is not a valid identifier.
pub fn quote(column: &str) -> Result<String, PersistenceError> {
    Ok(Identifier::new(column)?.quoted())
}

fn quote_all(columns: &[String]) -> Result<Vec<String>, PersistenceError> {
    columns.iter().map(|column| quote(column)).collect()
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn key_params(keys: &[RowKey]) -> Vec<Value> {
    keys.iter().map(|key| Value::Integer(key.value())).collect()
}

/// Returns how many rows fit in one statement when each row binds
/// `params_per_row` parameters and the statement binds `fixed` more.
#[must_use]
pub fn rows_per_statement(params_per_row: usize, fixed: usize) -> usize {
    (MAX_BIND_PARAMS.saturating_sub(fixed) / params_per_row.max(1)).max(1)
}

/// Renders the expression that reads a column as `[storage class, value]`.
///
/// Blobs are hex-encoded and reals are printed with full precision so that
/// both survive the trip through JSON text unchanged.
pub(crate) fn tagged_column(quoted: &str) -> String {
    format!(
        "json_array(typeof({quoted}), CASE typeof({quoted}) \
         WHEN 'blob' THEN hex({quoted}) \
         WHEN 'real' THEN printf('%!.17g', {quoted}) \
         ELSE {quoted} END)"
    )
}

/// Builds a multi-row INSERT, optionally resolving key conflicts as an update.
///
/// `columns` is the shared column list of every row, without the key.
///
/// # Errors
///
/// Returns an error if an identifier is invalid or a row lacks a column.
pub fn insert(
    table: &TableRef,
    key_column: &str,
    columns: &[String],
    rows: &[RowValues],
    on_conflict: OnConflict,
) -> Result<Statement, PersistenceError> {
    let key: String = quote(key_column)?;
    let quoted: Vec<String> = quote_all(columns)?;

    let mut column_list: Vec<String> = Vec::with_capacity(columns.len() + 1);
    column_list.push(key.clone());
    column_list.extend(quoted.iter().cloned());

    let tuple: String = format!("({})", placeholders(column_list.len()));
    let mut params: Vec<Value> = Vec::with_capacity(rows.len() * column_list.len());
    for row in rows {
        params.push(Value::Integer(row.key.value()));
        for column in columns {
            let value: &Value = row.values.get(column).ok_or_else(|| {
                PersistenceError::ColumnNotFound {
                    table: table.to_string(),
                    column: column.clone(),
                }
            })?;
            params.push(value.clone());
        }
    }

    let mut sql: String = format!(
        "INSERT INTO {} ({}) VALUES {}",
        table.qualified(),
        column_list.join(", "),
        vec![tuple; rows.len()].join(", ")
    );

    if on_conflict == OnConflict::Update {
        if quoted.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({key}) DO NOTHING"));
        } else {
            let set: Vec<String> = quoted
                .iter()
                .map(|column| format!("{column} = excluded.{column}"))
                .collect();
            sql.push_str(&format!(
                " ON CONFLICT ({key}) DO UPDATE SET {}",
                set.join(", ")
            ));
        }
    }

    Ok(Statement { sql, params })
}

/// Builds an UPDATE applying the same assignments to every listed key.
///
/// # Errors
///
/// Returns an error if an identifier is invalid.
pub fn update(
    table: &TableRef,
    key_column: &str,
    assignments: &[(&str, Assignment)],
    keys: &[RowKey],
) -> Result<Statement, PersistenceError> {
    let mut params: Vec<Value> = Vec::new();
    let mut set: Vec<String> = Vec::with_capacity(assignments.len());

    for (column, assignment) in assignments {
        let target: String = quote(column)?;
        match assignment {
            Assignment::Value(value) => {
                set.push(format!("{target} = ?"));
                params.push(value.clone());
            }
            Assignment::Column(source) => {
                set.push(format!("{target} = {}", quote(source)?));
            }
        }
    }
    params.extend(key_params(keys));

    let sql: String = format!(
        "UPDATE {} SET {} WHERE {} IN ({})",
        table.qualified(),
        set.join(", "),
        quote(key_column)?,
        placeholders(keys.len())
    );

    Ok(Statement { sql, params })
}

/// Builds an UPDATE writing different values to each listed row.
///
/// The rows are bound as a `VALUES` list joined to the table on the key.
///
/// # Errors
///
/// Returns an error if an identifier is invalid or a row lacks a column.
pub fn update_rows(
    table: &TableRef,
    key_column: &str,
    columns: &[String],
    rows: &[RowValues],
) -> Result<Statement, PersistenceError> {
    let key: String = quote(key_column)?;
    let set: Vec<String> = quote_all(columns)?
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{column} = v.column{}", index + 2))
        .collect();

    let tuple: String = format!("({})", placeholders(columns.len() + 1));
    let mut params: Vec<Value> = Vec::with_capacity(rows.len() * (columns.len() + 1));
    for row in rows {
        params.push(Value::Integer(row.key.value()));
        for column in columns {
            let value: &Value = row.values.get(column).ok_or_else(|| {
                PersistenceError::ColumnNotFound {
                    table: table.to_string(),
                    column: column.clone(),
                }
            })?;
            params.push(value.clone());
        }
    }

    let sql: String = format!(
        "UPDATE {} SET {} FROM (VALUES {}) AS v WHERE {}.{key} = v.column1",
        table.qualified(),
        set.join(", "),
        vec![tuple; rows.len()].join(", "),
        table.table().quoted()
    );

    Ok(Statement { sql, params })
}

/// Builds a DELETE of every listed key.
///
/// # Errors
///
/// Returns an error if the key column is not a valid identifier.
pub fn delete(
    table: &TableRef,
    key_column: &str,
    keys: &[RowKey],
) -> Result<Statement, PersistenceError> {
    let sql: String = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        table.qualified(),
        quote(key_column)?,
        placeholders(keys.len())
    );

    Ok(Statement {
        sql,
        params: key_params(keys),
    })
}

/// Builds a SELECT of the tracked columns of every listed key, one JSON
/// object per row.
///
/// # Errors
///
/// Returns an error if an identifier is invalid.
pub fn select_images(
    table: &TableRef,
    key_column: &str,
    tracked: &[String],
    keys: &[RowKey],
) -> Result<Statement, PersistenceError> {
    let key: String = quote(key_column)?;
    let mut pairs: Vec<String> = Vec::with_capacity(tracked.len());
    for column in tracked {
        let quoted: String = quote(column)?;
        // The identifier check guarantees the name needs no escaping.
        pairs.push(format!("'{column}', {}", tagged_column(&quoted)));
    }

    let sql: String = format!(
        "SELECT {key} AS row_key, json_object({}) AS image FROM {} WHERE {key} IN ({})",
        pairs.join(", "),
        table.qualified(),
        placeholders(keys.len())
    );

    Ok(Statement {
        sql,
        params: key_params(keys),
    })
}
