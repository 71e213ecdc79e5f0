// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Connection setup and the few library calls Diesel has no DSL for.

pub mod sqlite;

use diesel::{Connection, SqliteConnection};

pub use sqlite::{SqliteVersion, Storage};

use crate::error::PersistenceError;

/// Library calls the change log writer and bootstrap rely on.
pub trait PersistenceBackend: Connection {
    /// Returns the rowid the last insert on this connection was given.
    ///
    /// The change log writer uses it as the appended record's `log_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn last_insert_rowid(&mut self) -> Result<i64, PersistenceError>;

    /// Returns the version of the linked `SQLite` library.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn library_version(&mut self) -> Result<SqliteVersion, PersistenceError>;
}

impl PersistenceBackend for SqliteConnection {
    fn last_insert_rowid(&mut self) -> Result<i64, PersistenceError> {
        sqlite::last_insert_rowid(self)
    }

    fn library_version(&mut self) -> Result<SqliteVersion, PersistenceError> {
        sqlite::library_version(self)
    }
}
