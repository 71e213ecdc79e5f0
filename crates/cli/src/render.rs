// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Tab-separated table printing.

use color_eyre::Result;
use rowtrail::diff::changed_columns;
use rowtrail_audit::ChangeLogRecord;
use rowtrail_domain::RowImage;
use rowtrail_persistence::TableData;
use std::fmt::Write;
use time::format_description::well_known::Rfc3339;

const SEPARATOR: &str = "\t";
const NULL: &str = "<NULL>";

const LOG_HEADER: [&str; 8] = [
    "log_id",
    "row_key",
    "action_type",
    "changed_at",
    "actor",
    "before_image",
    "after_image",
    "changed_columns",
];

fn banner(out: &mut String, title: &str) -> std::fmt::Result {
    writeln!(out, "----------- {title}")
}

/// Appends every row of a table, one line per row.
///
/// # Errors
///
/// Returns an error if writing to `out` fails.
pub fn render_table(out: &mut String, title: &str, data: &TableData) -> std::fmt::Result {
    banner(out, title)?;
    writeln!(out, "{}", data.columns.join(SEPARATOR))?;
    for row in &data.rows {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        writeln!(out, "{}", cells.join(SEPARATOR))?;
    }
    Ok(())
}

fn image_cell(image: Option<&RowImage>) -> Result<String> {
    Ok(match image {
        Some(image) => serde_json::to_string(image)?,
        None => NULL.to_string(),
    })
}

/// Appends a change log, one line per record.
///
/// UPDATE records also list the tracked columns that differ between their
/// images.
///
/// # Errors
///
/// Returns an error if a timestamp or image cannot be rendered.
pub fn render_change_log(
    out: &mut String,
    title: &str,
    records: &[ChangeLogRecord],
    tracked: &[String],
) -> Result<()> {
    banner(out, title)?;
    writeln!(out, "{}", LOG_HEADER.join(SEPARATOR))?;

    for record in records {
        let changed: String = match (record.before_image(), record.after_image()) {
            (Some(before), Some(after)) => changed_columns(before, after, tracked).join(","),
            _ => NULL.to_string(),
        };

        let cells: [String; 8] = [
            record.log_id().to_string(),
            record.row_key().to_string(),
            record.action_type().code().to_string(),
            record.changed_at().format(&Rfc3339)?,
            record
                .actor()
                .map_or_else(|| NULL.to_string(), |actor| actor.as_str().to_string()),
            image_cell(record.before_image())?,
            image_cell(record.after_image())?,
            changed,
        ];
        writeln!(out, "{}", cells.join(SEPARATOR))?;
    }
    Ok(())
}
