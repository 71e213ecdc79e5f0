// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Suffix appended to a monitored table name to form its log store name.
const CHANGE_LOG_SUFFIX: &str = "_change_log";

/// A validated SQL identifier.
///
/// Identifiers are the only pieces of SQL text that are ever spliced into a
/// statement; every value travels as a bind parameter. Restricting them to
/// `[A-Za-z_][A-Za-z0-9_]*` keeps the quoted form injection-free.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validates and wraps an identifier.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidIdentifier` if the name is empty, starts
    /// with a digit, or contains anything other than ASCII letters, digits,
    /// and underscores.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name: String = name.into();
        let mut chars = name.chars();
        let valid: bool = match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };

        if valid {
            Ok(Self(name))
        } else {
            Err(DomainError::InvalidIdentifier(name))
        }
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier wrapped in double quotes, ready for SQL.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

/// A schema-qualified table reference.
///
/// For `SQLite` the schema is the attached database name (`main` unless
/// another database has been attached).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    schema: Identifier,
    table: Identifier,
}

impl TableRef {
    /// Creates a table reference from raw schema and table names.
    ///
    /// # Errors
    ///
    /// Returns an error if either name is not a valid identifier.
    pub fn new(schema: &str, table: &str) -> Result<Self, DomainError> {
        Ok(Self {
            schema: Identifier::new(schema)?,
            table: Identifier::new(table)?,
        })
    }

    /// Creates a reference to a table in the `main` schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the table name is not a valid identifier.
    pub fn main(table: &str) -> Result<Self, DomainError> {
        Self::new("main", table)
    }

    /// Returns the schema name.
    #[must_use]
    pub const fn schema(&self) -> &Identifier {
        &self.schema
    }

    /// Returns the table name.
    #[must_use]
    pub const fn table(&self) -> &Identifier {
        &self.table
    }

    /// Returns `"schema"."table"` for use in SQL.
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }

    /// Returns the companion log store of this table.
    ///
    /// The log store lives in the same schema and is named
    /// `<table>_change_log`.
    #[must_use]
    pub fn change_log(&self) -> Self {
        // Appending `[a-z_]` to a valid identifier keeps it valid.
        Self {
            schema: self.schema.clone(),
            table: Identifier(format!("{}{CHANGE_LOG_SUFFIX}", self.table)),
        }
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
