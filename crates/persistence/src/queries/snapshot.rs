// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Row image reads.
//!
//! Column values are read generically: every column is rendered by the
//! database as a `[storage class, value]` JSON pair and decoded into a
//! [`Value`] here. A storage class this reader does not know becomes
//! [`Value::Unsupported`], which the diff engine treats as changed.

use diesel::SqliteConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use rowtrail_domain::{RowImage, RowKey, TableRef, Value};
use std::collections::BTreeMap;

use crate::data_models::TableData;
use crate::error::PersistenceError;
use crate::queries::introspect::{TableColumn, list_columns};
use crate::statements::{self, Statement, quote, rows_per_statement, tagged_column};

#[derive(QueryableByName)]
struct ImageRow {
    #[diesel(sql_type = BigInt)]
    row_key: i64,
    #[diesel(sql_type = Text)]
    image: String,
}

#[derive(QueryableByName)]
struct TableRow {
    #[diesel(sql_type = Text)]
    row_json: String,
}

fn malformed(column: &str, detail: &str) -> PersistenceError {
    PersistenceError::MalformedImage(format!("column {column}: {detail}"))
}

/// Decodes one `[storage class, value]` pair.
///
/// # Errors
///
/// Returns `PersistenceError::MalformedImage` if the pair is not shaped as
/// the snapshot query renders it.
pub fn decode_tagged(column: &str, tagged: &serde_json::Value) -> Result<Value, PersistenceError> {
    let Some([tag, raw]) = tagged.as_array().map(Vec::as_slice) else {
        return Err(malformed(column, "expected a [type, value] pair"));
    };
    let tag: &str = tag
        .as_str()
        .ok_or_else(|| malformed(column, "type tag is not a string"))?;

    match tag {
        "null" => Ok(Value::Null),
        "integer" => raw
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| malformed(column, "integer out of range")),
        "real" => raw
            .as_str()
            .and_then(|text| text.parse::<f64>().ok())
            .or_else(|| raw.as_f64())
            .map(Value::Real)
            .ok_or_else(|| malformed(column, "unreadable real")),
        "text" => raw
            .as_str()
            .map(|text| Value::Text(text.to_string()))
            .ok_or_else(|| malformed(column, "text is not a string")),
        "blob" => raw
            .as_str()
            .and_then(|text| hex::decode(text).ok())
            .map(Value::Blob)
            .ok_or_else(|| malformed(column, "blob is not hex")),
        other => Ok(Value::Unsupported {
            unsupported: other.to_string(),
        }),
    }
}

/// Decodes a JSON object of tagged column values into a row image.
///
/// # Errors
///
/// Returns an error if the text is not a JSON object of tagged pairs.
pub fn decode_image(json: &str) -> Result<RowImage, PersistenceError> {
    let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
    parsed
        .iter()
        .map(|(column, tagged)| Ok((column.clone(), decode_tagged(column, tagged)?)))
        .collect()
}

/// Reads the tracked columns of the listed keys.
///
/// Keys with no matching row are absent from the result. Large key sets
/// are read in several statements.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be decoded.
pub fn read_images(
    conn: &mut SqliteConnection,
    table: &TableRef,
    key_column: &str,
    tracked: &[String],
    keys: &[RowKey],
) -> Result<BTreeMap<RowKey, RowImage>, PersistenceError> {
    let mut images: BTreeMap<RowKey, RowImage> = BTreeMap::new();

    for chunk in keys.chunks(rows_per_statement(1, 0)) {
        let statement: Statement = statements::select_images(table, key_column, tracked, chunk)?;
        for row in statement.load::<ImageRow>(conn)? {
            images.insert(RowKey::new(row.row_key), decode_image(&row.image)?);
        }
    }

    Ok(images)
}

/// Reads every row of a table, ordered by its first column.
///
/// # Errors
///
/// Returns an error if the table does not exist or a value cannot be decoded.
pub fn read_table(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<TableData, PersistenceError> {
    let columns: Vec<TableColumn> = list_columns(conn, table)?;
    let names: Vec<String> = columns.into_iter().map(|column| column.name).collect();

    let quoted: Vec<String> = names
        .iter()
        .map(|name| quote(name))
        .collect::<Result<_, _>>()?;
    let rendered: Vec<String> = quoted.iter().map(|column| tagged_column(column)).collect();
    let order_by: &str = quoted.first().map_or("rowid", String::as_str);

    let loaded: Vec<TableRow> = diesel::sql_query(format!(
        "SELECT json_array({}) AS row_json FROM {} ORDER BY {order_by}",
        rendered.join(", "),
        table.qualified()
    ))
    .load(conn)?;

    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(loaded.len());
    for row in loaded {
        let values: Vec<serde_json::Value> = serde_json::from_str(&row.row_json)?;
        rows.push(
            names
                .iter()
                .zip(values.iter())
                .map(|(column, tagged)| decode_tagged(column, tagged))
                .collect::<Result<_, _>>()?,
        );
    }

    Ok(TableData {
        columns: names,
        rows,
    })
}
