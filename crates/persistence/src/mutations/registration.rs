// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Attaching and detaching change capture.
//!
//! Enabling is idempotent: an enabled table keeps its registration, and a
//! disabled table is re-enabled with the key and tracked columns it was
//! first registered with. Either way a dropped log store is recreated.
//! Disabling never touches the log store.

use diesel::SqliteConnection;
use diesel::prelude::*;
use rowtrail_domain::TableRef;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use crate::data_models::RegistrationData;
use crate::diesel_schema::change_log_registrations;
use crate::error::PersistenceError;
use crate::mutations::change_log::create_log_store;
use crate::queries::introspect::{self, TableColumn};
use crate::queries::registration::find_registration;

fn now_rfc3339() -> Result<String, PersistenceError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| PersistenceError::SerializationError(e.to_string()))
}

fn require_found(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<RegistrationData, PersistenceError> {
    find_registration(conn, table)?
        .ok_or_else(|| PersistenceError::NotFound(format!("Registration for {table}")))
}

/// Enables change capture for a table.
///
/// With `key_column` set to `None` the key is detected from the table's
/// constraints; otherwise the named column is validated and used. Every
/// other column is tracked.
///
/// # Errors
///
/// Returns an error if the table or a usable key column does not exist, or
/// if the table is already registered with a different key column.
pub fn enable_table(
    conn: &mut SqliteConnection,
    table: &TableRef,
    key_column: Option<&str>,
) -> Result<RegistrationData, PersistenceError> {
    if let Some(existing) = find_registration(conn, table)? {
        if let Some(requested) = key_column
            && requested != existing.key_column
        {
            return Err(PersistenceError::RegistrationConflict {
                table: table.to_string(),
                registered: existing.key_column,
                requested: requested.to_string(),
            });
        }

        create_log_store(conn, table)?;
        if existing.enabled {
            debug!(table = %table, "Change logging already enabled");
            return Ok(existing);
        }

        diesel::update(change_log_registrations::table)
            .filter(change_log_registrations::registration_id.eq(existing.registration_id))
            .set((
                change_log_registrations::enabled.eq(1),
                change_log_registrations::updated_at.eq(now_rfc3339()?),
            ))
            .execute(conn)?;

        info!(table = %table, "Re-enabled change logging");
        return require_found(conn, table);
    }

    let key: TableColumn = match key_column {
        Some(column) => introspect::validate_key_column(conn, table, column)?,
        None => introspect::detect_key_column(conn, table)?,
    };
    let tracked: Vec<String> = introspect::list_columns(conn, table)?
        .into_iter()
        .filter(|column| column.name != key.name)
        .map(|column| column.name)
        .collect();
    let now: String = now_rfc3339()?;

    create_log_store(conn, table)?;
    diesel::insert_into(change_log_registrations::table)
        .values((
            change_log_registrations::schema_name.eq(table.schema().as_str()),
            change_log_registrations::table_name.eq(table.table().as_str()),
            change_log_registrations::key_column.eq(&key.name),
            change_log_registrations::tracked_columns_json.eq(serde_json::to_string(&tracked)?),
            change_log_registrations::enabled.eq(1),
            change_log_registrations::registered_at.eq(&now),
            change_log_registrations::updated_at.eq(&now),
        ))
        .execute(conn)?;

    info!(
        table = %table,
        key_column = %key.name,
        tracked = tracked.len(),
        "Enabled change logging"
    );
    require_found(conn, table)
}

/// Disables change capture for a table.
///
/// Returns `false` if the table was not registered. The log store and its
/// records are kept.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn disable_table(conn: &mut SqliteConnection, table: &TableRef) -> Result<bool, PersistenceError> {
    let updated: usize = diesel::update(change_log_registrations::table)
        .filter(change_log_registrations::schema_name.eq(table.schema().as_str()))
        .filter(change_log_registrations::table_name.eq(table.table().as_str()))
        .set((
            change_log_registrations::enabled.eq(0),
            change_log_registrations::updated_at.eq(now_rfc3339()?),
        ))
        .execute(conn)?;

    if updated == 0 {
        warn!(table = %table, "Cannot disable change logging: table is not registered");
        return Ok(false);
    }

    info!(table = %table, "Disabled change logging");
    Ok(true)
}
