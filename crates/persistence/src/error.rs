// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use diesel::result::DatabaseErrorKind;
use rowtrail::CoreError;
use rowtrail_audit::AuditError;
use rowtrail_domain::DomainError;

/// Errors that can occur during persistence operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// A database error occurred.
    DatabaseError(String),
    /// Database connection failed.
    DatabaseConnectionFailed(String),
    /// Database migration failed.
    MigrationFailed(String),
    /// Serialization/deserialization error.
    SerializationError(String),
    /// Initialization error.
    InitializationError(String),
    /// The linked `SQLite` library is older than rowtrail supports.
    UnsupportedSqliteVersion { found: String, required: String },
    /// A uniqueness, foreign key, NOT NULL, or CHECK constraint rejected a
    /// write. The enclosing unit of work is rolled back.
    ConstraintViolation(String),
    /// The table does not exist.
    TableNotFound(String),
    /// The column does not exist in the table.
    ColumnNotFound { table: String, column: String },
    /// No single-column unique key could be found for the table.
    KeyColumnNotDetected(String),
    /// The requested key column is not covered by a single-column unique
    /// constraint.
    KeyColumnNotUnique { table: String, column: String },
    /// The key column is not declared as an integer.
    KeyColumnNotInteger { table: String, column: String },
    /// A write tried to assign the key column of a monitored table.
    KeyColumnNotAssignable { table: String, column: String },
    /// The table is already registered with a different key column.
    RegistrationConflict {
        table: String,
        registered: String,
        requested: String,
    },
    /// A value of this storage class cannot be bound to a statement.
    UnsupportedValue(String),
    /// A stored row image could not be decoded.
    MalformedImage(String),
    /// Capture planning failed.
    Capture(CoreError),
    /// A domain value was invalid.
    Domain(DomainError),
    /// A stored change log record was invalid.
    Audit(AuditError),
    /// The requested resource was not found.
    NotFound(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::DatabaseConnectionFailed(msg) => {
                write!(f, "Database connection failed: {msg}")
            }
            Self::MigrationFailed(msg) => write!(f, "Migration failed: {msg}"),
            Self::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            Self::InitializationError(msg) => write!(f, "Initialization error: {msg}"),
            Self::UnsupportedSqliteVersion { found, required } => {
                write!(f, "SQLite {found} is too old; {required} or newer is required")
            }
            Self::ConstraintViolation(msg) => write!(f, "Constraint violation: {msg}"),
            Self::TableNotFound(table) => write!(f, "Table not found: {table}"),
            Self::ColumnNotFound { table, column } => {
                write!(f, "Column {column} not found in table {table}")
            }
            Self::KeyColumnNotDetected(table) => {
                write!(f, "No single-column unique key found for table {table}")
            }
            Self::KeyColumnNotUnique { table, column } => write!(
                f,
                "Column {column} of table {table} has no single-column unique constraint"
            ),
            Self::KeyColumnNotInteger { table, column } => {
                write!(f, "Key column {column} of table {table} is not an integer")
            }
            Self::KeyColumnNotAssignable { table, column } => {
                write!(f, "Key column {column} of table {table} cannot be assigned")
            }
            Self::RegistrationConflict {
                table,
                registered,
                requested,
            } => write!(
                f,
                "Table {table} is registered with key column {registered}, not {requested}"
            ),
            Self::UnsupportedValue(type_name) => {
                write!(f, "Cannot bind a value of unsupported type {type_name}")
            }
            Self::MalformedImage(msg) => write!(f, "Malformed row image: {msg}"),
            Self::Capture(err) => write!(f, "Capture error: {err}"),
            Self::Domain(err) => write!(f, "Domain error: {err}"),
            Self::Audit(err) => write!(f, "Audit error: {err}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<diesel::result::Error> for PersistenceError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::NotFound("Record not found".to_string()),
            diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::CheckViolation,
                info,
            ) => Self::ConstraintViolation(info.message().to_string()),
            _ => Self::DatabaseError(err.to_string()),
        }
    }
}

impl From<diesel::ConnectionError> for PersistenceError {
    fn from(err: diesel::ConnectionError) -> Self {
        Self::DatabaseConnectionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<CoreError> for PersistenceError {
    fn from(err: CoreError) -> Self {
        Self::Capture(err)
    }
}

impl From<DomainError> for PersistenceError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<AuditError> for PersistenceError {
    fn from(err: AuditError) -> Self {
        Self::Audit(err)
    }
}
