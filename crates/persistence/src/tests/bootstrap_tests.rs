// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::path::PathBuf;
use tempfile::TempDir;

use crate::backend::sqlite::{self, MIN_SQLITE_VERSION};
use crate::{Persistence, PersistenceError, SqliteVersion};

#[test]
fn test_new_in_memory_creates_registration_table() {
    let mut persistence: Persistence =
        Persistence::new_in_memory().expect("Failed to create persistence");

    assert!(persistence.list_registrations().unwrap().is_empty());
}

#[test]
fn test_linked_library_supports_update_from() {
    let mut persistence: Persistence = Persistence::new_in_memory().unwrap();

    assert!(persistence.sqlite_version().unwrap() >= MIN_SQLITE_VERSION);
}

#[test]
fn test_file_database_uses_wal() {
    let dir: TempDir = TempDir::new().unwrap();
    let path: PathBuf = dir.path().join("rowtrail.db");
    let mut persistence: Persistence = Persistence::new_with_file(&path).unwrap();

    assert_eq!(sqlite::journal_mode(&mut persistence.conn).unwrap(), "wal");
}

#[test]
fn test_memory_database_keeps_memory_journal() {
    let mut persistence: Persistence = Persistence::new_in_memory().unwrap();

    assert_eq!(sqlite::journal_mode(&mut persistence.conn).unwrap(), "memory");
}

#[test]
fn test_version_parsing() {
    assert_eq!(
        SqliteVersion::parse("3.45.1").unwrap(),
        SqliteVersion::new(3, 45, 1)
    );
    assert_eq!(SqliteVersion::new(3, 33, 0).to_string(), "3.33.0");
    assert!(matches!(
        SqliteVersion::parse("3.45"),
        Err(PersistenceError::InitializationError(_))
    ));
    assert!(matches!(
        SqliteVersion::parse("three.45.1"),
        Err(PersistenceError::InitializationError(_))
    ));
}

#[test]
fn test_library_without_update_from_is_rejected() {
    assert_eq!(
        sqlite::ensure_supported(SqliteVersion::new(3, 32, 3)),
        Err(PersistenceError::UnsupportedSqliteVersion {
            found: String::from("3.32.3"),
            required: String::from("3.33.0"),
        })
    );
    assert!(sqlite::ensure_supported(SqliteVersion::new(3, 33, 0)).is_ok());
    assert!(sqlite::ensure_supported(SqliteVersion::new(4, 0, 0)).is_ok());
}
