// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Registration queries.

use diesel::SqliteConnection;
use diesel::prelude::*;
use rowtrail_domain::TableRef;
use tracing::debug;

use crate::data_models::RegistrationData;
use crate::diesel_schema::change_log_registrations;
use crate::error::PersistenceError;

/// Diesel Queryable struct for registration rows.
#[derive(Queryable, Selectable)]
#[diesel(table_name = change_log_registrations)]
struct RegistrationRow {
    registration_id: i64,
    schema_name: String,
    table_name: String,
    key_column: String,
    tracked_columns_json: String,
    enabled: i32,
    registered_at: String,
    updated_at: String,
}

impl RegistrationRow {
    fn into_data(self) -> Result<RegistrationData, PersistenceError> {
        Ok(RegistrationData {
            registration_id: self.registration_id,
            table: TableRef::new(&self.schema_name, &self.table_name)?,
            key_column: self.key_column,
            tracked_columns: serde_json::from_str(&self.tracked_columns_json)?,
            enabled: self.enabled != 0,
            registered_at: self.registered_at,
            updated_at: self.updated_at,
        })
    }
}

/// Retrieves the registration of a table, enabled or not.
///
/// # Errors
///
/// Returns an error if the query fails.
/// Returns `Ok(None)` if the table was never registered.
pub fn find_registration(
    conn: &mut SqliteConnection,
    table: &TableRef,
) -> Result<Option<RegistrationData>, PersistenceError> {
    debug!(table = %table, "Looking up registration");

    let result: Result<RegistrationRow, diesel::result::Error> = change_log_registrations::table
        .filter(change_log_registrations::schema_name.eq(table.schema().as_str()))
        .filter(change_log_registrations::table_name.eq(table.table().as_str()))
        .select(RegistrationRow::as_select())
        .first(conn);

    match result {
        Ok(row) => Ok(Some(row.into_data()?)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(e) => Err(PersistenceError::from(e)),
    }
}

/// Lists every registration in registration order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_registrations(
    conn: &mut SqliteConnection,
) -> Result<Vec<RegistrationData>, PersistenceError> {
    change_log_registrations::table
        .order(change_log_registrations::registration_id.asc())
        .select(RegistrationRow::as_select())
        .load::<RegistrationRow>(conn)?
        .into_iter()
        .map(RegistrationRow::into_data)
        .collect()
}
