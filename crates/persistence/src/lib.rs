// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Persistence layer for rowtrail.
//!
//! This crate owns the `SQLite` side of change capture: registering tables,
//! creating their log stores, running monitored mutations, and reading the
//! resulting change logs. It is built on Diesel.
//!
//! ## Capture model
//!
//! Change capture is write-through. Every monitored mutation runs inside a
//! [`UnitOfWork`], which wraps one `BEGIN IMMEDIATE` transaction. The unit of
//! work reads row images before and after each statement, hands them to the
//! capture logic in the `rowtrail` crate, and appends the resulting records
//! to `<table>_change_log` on the same connection. A rollback therefore
//! discards the mutation and its records together.
//!
//! Statements issued outside a unit of work (including
//! [`UnitOfWork::execute_raw`]) are not captured.
//!
//! ## Concurrency
//!
//! Writers are serialized by `SQLite`'s database lock. `BEGIN IMMEDIATE`
//! takes the write lock before the first before image is read, so the
//! classification of an upsert always reflects the rows the statement
//! actually sees. Connections wait up to five seconds for the lock.
//!
//! ## Testing Philosophy
//!
//! - Tests run against isolated in-memory databases
//! - Tests that need several connections use a temporary database file

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

use diesel::connection::SimpleConnection;
use diesel::SqliteConnection;
use rowtrail::SessionContext;
use rowtrail_audit::{Actor, ChangeLogRecord, LogId};
use rowtrail_domain::TableRef;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

mod backend;
mod data_models;
mod diesel_schema;
mod error;
mod mutations;
mod queries;
pub mod statements;
mod unit_of_work;

#[cfg(test)]
mod tests;

pub use backend::{PersistenceBackend, SqliteVersion, Storage};
pub use data_models::{MutationSummary, RegistrationData, TableData};
pub use error::PersistenceError;
pub use queries::snapshot::{decode_image, decode_tagged};
pub use statements::{MAX_BIND_PARAMS, OnConflict, Statement};
pub use unit_of_work::UnitOfWork;

/// Atomic counter for generating unique in-memory database names.
///
/// Each call to `new_in_memory()` receives a unique sequential ID, so tests
/// running in parallel never share a database.
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Persistence adapter for change capture.
///
/// Owns one connection. Registration and administrative operations each run
/// in their own transaction; monitored mutations run through
/// [`Persistence::transaction`].
pub struct Persistence {
    conn: SqliteConnection,
}

impl Persistence {
    /// Creates a new persistence adapter with a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new_in_memory() -> Result<Self, PersistenceError> {
        let db_id: u64 = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let shared_memory_url: String = format!("file:memdb_test_{db_id}?mode=memory&cache=shared");

        let conn: SqliteConnection = backend::sqlite::open(&shared_memory_url, Storage::Memory)?;

        Ok(Self { conn })
    }

    /// Creates a new persistence adapter with a file-based `SQLite` database.
    ///
    /// Several adapters may open the same file; their writers are serialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new_with_file<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path_str: &str = path.as_ref().to_str().ok_or_else(|| {
            PersistenceError::InitializationError("Invalid database path".to_string())
        })?;

        let conn: SqliteConnection = backend::sqlite::open(path_str, Storage::File)?;

        Ok(Self { conn })
    }

    /// Returns the version of the linked `SQLite` library.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn sqlite_version(&mut self) -> Result<SqliteVersion, PersistenceError> {
        self.conn.library_version()
    }

    /// Runs provisioning SQL (table DDL, fixtures) without capture.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), PersistenceError> {
        debug!("Executing batch SQL");
        Ok(self.conn.batch_execute(sql)?)
    }

    /// Enables change logging for a table, detecting its key column.
    ///
    /// The key is the first single-column unique index on an integer column,
    /// or else the table's sole integer primary key. Enabling an enabled
    /// table changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or has no usable key.
    pub fn enable_table_change_logging(
        &mut self,
        table: &TableRef,
    ) -> Result<RegistrationData, PersistenceError> {
        self.conn
            .immediate_transaction(|conn| mutations::registration::enable_table(conn, table, None))
    }

    /// Enables change logging for a table with an explicit key column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist, is not a unique integer
    /// column, or differs from the key the table was registered with.
    pub fn enable_table_change_logging_with_key(
        &mut self,
        table: &TableRef,
        key_column: &str,
    ) -> Result<RegistrationData, PersistenceError> {
        self.conn.immediate_transaction(|conn| {
            mutations::registration::enable_table(conn, table, Some(key_column))
        })
    }

    /// Disables change logging for a table. Its log is kept.
    ///
    /// Returns `false` if the table was never registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn disable_table_change_logging(&mut self, table: &TableRef) -> Result<bool, PersistenceError> {
        self.conn
            .immediate_transaction(|conn| mutations::registration::disable_table(conn, table))
    }

    /// Returns whether change logging is currently enabled for a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn is_enabled(&mut self, table: &TableRef) -> Result<bool, PersistenceError> {
        Ok(queries::registration::find_registration(&mut self.conn, table)?
            .is_some_and(|registration| registration.enabled))
    }

    /// Returns the registration of a table, enabled or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn registration(
        &mut self,
        table: &TableRef,
    ) -> Result<Option<RegistrationData>, PersistenceError> {
        queries::registration::find_registration(&mut self.conn, table)
    }

    /// Lists every registration in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_registrations(&mut self) -> Result<Vec<RegistrationData>, PersistenceError> {
        queries::registration::list_registrations(&mut self.conn)
    }

    /// Runs `f` as one unit of work.
    ///
    /// `actor` is bound for the duration of the unit of work and can be
    /// changed inside it with [`UnitOfWork::set_application_user`]. Every
    /// record it produces shares one `changed_at`. If `f` returns an error,
    /// every mutation and record of the unit of work is rolled back.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or an error if the transaction cannot begin
    /// or commit.
    pub fn transaction<T, F>(&mut self, actor: Option<Actor>, f: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<T, PersistenceError>,
    {
        let changed_at: OffsetDateTime = OffsetDateTime::now_utc();
        let session: SessionContext = SessionContext::with_actor(actor);

        let result: Result<T, PersistenceError> = self.conn.immediate_transaction(|conn| {
            let mut unit: UnitOfWork<'_> = UnitOfWork::new(conn, session, changed_at);
            f(&mut unit)
        });

        match &result {
            Ok(_) => info!(changed_at = %changed_at, "Committed unit of work"),
            Err(e) => warn!(error = %e, "Rolled back unit of work"),
        }
        result
    }

    /// Lists every record of a table's log in `log_id` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table has no log store or a record is invalid.
    pub fn list_change_log(
        &mut self,
        table: &TableRef,
    ) -> Result<Vec<ChangeLogRecord>, PersistenceError> {
        queries::change_log::list_change_log(&mut self.conn, table)
    }

    /// Lists the records of a table's log written after `after`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table has no log store or a record is invalid.
    pub fn list_change_log_after(
        &mut self,
        table: &TableRef,
        after: LogId,
    ) -> Result<Vec<ChangeLogRecord>, PersistenceError> {
        queries::change_log::list_change_log_after(&mut self.conn, table, after)
    }

    /// Counts the records of a table's log.
    ///
    /// # Errors
    ///
    /// Returns an error if the table has no log store.
    pub fn count_change_log(&mut self, table: &TableRef) -> Result<usize, PersistenceError> {
        queries::change_log::count_change_log(&mut self.conn, table)
    }

    /// Removes every record of a table's log. `log_id`s are not reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the table has no log store.
    pub fn truncate_log(&mut self, table: &TableRef) -> Result<usize, PersistenceError> {
        self.conn.immediate_transaction(|conn| {
            queries::change_log::count_change_log(conn, table)?;
            mutations::change_log::truncate_log(conn, table)
        })
    }

    /// Reads every row of a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn read_table(&mut self, table: &TableRef) -> Result<TableData, PersistenceError> {
        queries::snapshot::read_table(&mut self.conn, table)
    }
}
