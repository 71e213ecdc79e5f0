// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Opening and preparing `SQLite` connections.
//!
//! Every connection gets a busy timeout so concurrent units of work queue
//! for the write lock instead of failing. File databases also switch to WAL
//! so readers never block the single writer. The linked library must be
//! recent enough for `UPDATE ... FROM`, which per-row bulk updates use.

use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel::{Connection, RunQueryDsl, SqliteConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info};

use super::PersistenceBackend;
use crate::error::PersistenceError;

/// Migrations creating the registration table.
///
/// Log stores are not migrated; they are created when a table is enabled.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// How long a writer waits for the database lock before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Oldest library with `UPDATE ... FROM`.
pub const MIN_SQLITE_VERSION: SqliteVersion = SqliteVersion::new(3, 33, 0);

/// Where a connection keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// A private shared-cache memory database.
    Memory,
    /// A database file, opened in WAL mode.
    File,
}

/// A `major.minor.patch` `SQLite` library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SqliteVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl SqliteVersion {
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses the text `sqlite_version()` returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not three dot-separated numbers.
    pub fn parse(text: &str) -> Result<Self, PersistenceError> {
        let parts: Vec<u32> = text
            .split('.')
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| PersistenceError::InitializationError(format!("bad version {text}")))?;

        match parts.as_slice() {
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(PersistenceError::InitializationError(format!(
                "bad version {text}"
            ))),
        }
    }
}

impl std::fmt::Display for SqliteVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}

/// Returns the rowid of the last row inserted on this connection.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn last_insert_rowid(conn: &mut SqliteConnection) -> Result<i64, PersistenceError> {
    Ok(diesel::select(sql::<BigInt>("last_insert_rowid()")).get_result(conn)?)
}

/// Returns the version of the linked `SQLite` library.
///
/// # Errors
///
/// Returns an error if the query fails or its result cannot be parsed.
pub fn library_version(conn: &mut SqliteConnection) -> Result<SqliteVersion, PersistenceError> {
    let text: String = diesel::select(sql::<Text>("sqlite_version()")).get_result(conn)?;
    SqliteVersion::parse(&text)
}

/// Fails if `found` is older than [`MIN_SQLITE_VERSION`].
///
/// # Errors
///
/// Returns `PersistenceError::UnsupportedSqliteVersion` for an older library.
pub fn ensure_supported(found: SqliteVersion) -> Result<(), PersistenceError> {
    if found < MIN_SQLITE_VERSION {
        return Err(PersistenceError::UnsupportedSqliteVersion {
            found: found.to_string(),
            required: MIN_SQLITE_VERSION.to_string(),
        });
    }
    Ok(())
}

/// Returns the journal mode in effect, lowercased.
///
/// # Errors
///
/// Returns an error if the PRAGMA fails.
pub fn journal_mode(conn: &mut SqliteConnection) -> Result<String, PersistenceError> {
    let row: JournalMode = diesel::sql_query("PRAGMA journal_mode").get_result(conn)?;
    Ok(row.journal_mode.to_lowercase())
}

fn configure(conn: &mut SqliteConnection, storage: Storage) -> Result<(), PersistenceError> {
    // PRAGMAs have no Diesel DSL.
    diesel::sql_query(format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}")).execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys = ON").execute(conn)?;

    if storage == Storage::File {
        diesel::sql_query("PRAGMA journal_mode = WAL").execute(conn)?;
        debug!(journal_mode = %journal_mode(conn)?, "Set journal mode");
    }
    Ok(())
}

/// Opens a connection, prepares it, and applies pending migrations.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, the library is too
/// old, or a migration fails.
pub fn open(database_url: &str, storage: Storage) -> Result<SqliteConnection, PersistenceError> {
    info!(database_url, ?storage, "Opening SQLite database");

    let mut conn: SqliteConnection = SqliteConnection::establish(database_url)?;
    let version: SqliteVersion = conn.library_version()?;
    ensure_supported(version)?;
    configure(&mut conn, storage)?;

    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| PersistenceError::MigrationFailed(e.to_string()))?;

    info!(%version, "SQLite database ready");
    Ok(conn)
}
