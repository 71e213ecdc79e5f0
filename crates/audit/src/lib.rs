// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Change log records and their invariants.
//!
//! A [`ChangeLogEntry`] is a record that has been decided on but not yet
//! written; the log store assigns it a [`LogId`] and it becomes a
//! [`ChangeLogRecord`]. The constructors are the only way to build an entry,
//! so the image shape of each action type is fixed:
//!
//! - INSERT: no before image, an after image
//! - UPDATE: both images
//! - DELETE: a before image, no after image

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]

#[cfg(test)]
mod tests;

use rowtrail_domain::{RowImage, RowKey};
use time::OffsetDateTime;

/// The application-level identity a change is attributed to.
///
/// This is distinct from the identity the database connection authenticated
/// with. A change without an actor is an anonymous or system change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor {
    /// The identifier supplied by the application.
    pub id: String,
}

impl Actor {
    /// Creates a new Actor.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Returns the actor identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Classification of a captured mutation.
///
/// The numeric codes are part of the log store format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// A row was inserted (code 1).
    Insert,
    /// A row was updated and at least one tracked column changed (code 2).
    Update,
    /// A row was deleted (code 3).
    Delete,
}

impl ActionType {
    /// Returns the stored numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Insert => 1,
            Self::Update => 2,
            Self::Delete => 3,
        }
    }

    /// Decodes a stored numeric code.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::UnknownActionType` for any code other than 1, 2, or 3.
    pub const fn from_code(code: i32) -> Result<Self, AuditError> {
        match code {
            1 => Ok(Self::Insert),
            2 => Ok(Self::Update),
            3 => Ok(Self::Delete),
            other => Err(AuditError::UnknownActionType(other)),
        }
    }

    /// Returns the upper-case SQL verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a persisted record, strictly increasing within one log store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogId(i64);

impl LogId {
    /// Wraps a raw log id.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw log id.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for LogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while decoding audit data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// A stored action type code is not 1, 2, or 3.
    UnknownActionType(i32),
    /// A stored record has images inconsistent with its action type.
    MalformedRecord {
        /// The action type of the record.
        action_type: ActionType,
        /// What was wrong with it.
        reason: &'static str,
    },
}

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownActionType(code) => write!(f, "Unknown action type code: {code}"),
            Self::MalformedRecord {
                action_type,
                reason,
            } => write!(f, "Malformed {action_type} record: {reason}"),
        }
    }
}

impl std::error::Error for AuditError {}

/// A change log record that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogEntry {
    row_key: RowKey,
    action_type: ActionType,
    changed_at: OffsetDateTime,
    actor: Option<Actor>,
    before_image: Option<RowImage>,
    after_image: Option<RowImage>,
}

impl ChangeLogEntry {
    /// Builds an INSERT entry.
    #[must_use]
    pub const fn insert(
        row_key: RowKey,
        after: RowImage,
        actor: Option<Actor>,
        changed_at: OffsetDateTime,
    ) -> Self {
        Self {
            row_key,
            action_type: ActionType::Insert,
            changed_at,
            actor,
            before_image: None,
            after_image: Some(after),
        }
    }

    /// Builds an UPDATE entry.
    #[must_use]
    pub const fn update(
        row_key: RowKey,
        before: RowImage,
        after: RowImage,
        actor: Option<Actor>,
        changed_at: OffsetDateTime,
    ) -> Self {
        Self {
            row_key,
            action_type: ActionType::Update,
            changed_at,
            actor,
            before_image: Some(before),
            after_image: Some(after),
        }
    }

    /// Builds a DELETE entry.
    #[must_use]
    pub const fn delete(
        row_key: RowKey,
        before: RowImage,
        actor: Option<Actor>,
        changed_at: OffsetDateTime,
    ) -> Self {
        Self {
            row_key,
            action_type: ActionType::Delete,
            changed_at,
            actor,
            before_image: Some(before),
            after_image: None,
        }
    }

    /// Rebuilds an entry from stored parts, checking the image shape.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::MalformedRecord` if the images present do not
    /// match what the action type requires.
    pub fn from_parts(
        row_key: RowKey,
        action_type: ActionType,
        changed_at: OffsetDateTime,
        actor: Option<Actor>,
        before_image: Option<RowImage>,
        after_image: Option<RowImage>,
    ) -> Result<Self, AuditError> {
        match (action_type, before_image, after_image) {
            (ActionType::Insert, None, Some(after)) => {
                Ok(Self::insert(row_key, after, actor, changed_at))
            }
            (ActionType::Update, Some(before), Some(after)) => {
                Ok(Self::update(row_key, before, after, actor, changed_at))
            }
            (ActionType::Delete, Some(before), None) => {
                Ok(Self::delete(row_key, before, actor, changed_at))
            }
            (ActionType::Insert, _, _) => Err(AuditError::MalformedRecord {
                action_type,
                reason: "INSERT requires only an after image",
            }),
            (ActionType::Update, _, _) => Err(AuditError::MalformedRecord {
                action_type,
                reason: "UPDATE requires both images",
            }),
            (ActionType::Delete, _, _) => Err(AuditError::MalformedRecord {
                action_type,
                reason: "DELETE requires only a before image",
            }),
        }
    }

    /// Returns the key of the affected row.
    #[must_use]
    pub const fn row_key(&self) -> RowKey {
        self.row_key
    }

    /// Returns the action type.
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        self.action_type
    }

    /// Returns the timestamp shared by every entry of the same unit of work.
    #[must_use]
    pub const fn changed_at(&self) -> OffsetDateTime {
        self.changed_at
    }

    /// Returns the actor, if one was bound.
    #[must_use]
    pub const fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    /// Returns the before image (absent for INSERT).
    #[must_use]
    pub const fn before_image(&self) -> Option<&RowImage> {
        self.before_image.as_ref()
    }

    /// Returns the after image (absent for DELETE).
    #[must_use]
    pub const fn after_image(&self) -> Option<&RowImage> {
        self.after_image.as_ref()
    }
}

/// An immutable, persisted change log record.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogRecord {
    log_id: LogId,
    entry: ChangeLogEntry,
}

impl ChangeLogRecord {
    /// Pairs a written entry with the id the log store assigned to it.
    #[must_use]
    pub const fn new(log_id: LogId, entry: ChangeLogEntry) -> Self {
        Self { log_id, entry }
    }

    /// Returns the log id.
    #[must_use]
    pub const fn log_id(&self) -> LogId {
        self.log_id
    }

    /// Returns the underlying entry.
    #[must_use]
    pub const fn entry(&self) -> &ChangeLogEntry {
        &self.entry
    }

    /// Returns the key of the affected row.
    #[must_use]
    pub const fn row_key(&self) -> RowKey {
        self.entry.row_key
    }

    /// Returns the action type.
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        self.entry.action_type
    }

    /// Returns the shared unit-of-work timestamp.
    #[must_use]
    pub const fn changed_at(&self) -> OffsetDateTime {
        self.entry.changed_at
    }

    /// Returns the actor, if one was bound.
    #[must_use]
    pub const fn actor(&self) -> Option<&Actor> {
        self.entry.actor.as_ref()
    }

    /// Returns the before image (absent for INSERT).
    #[must_use]
    pub const fn before_image(&self) -> Option<&RowImage> {
        self.entry.before_image.as_ref()
    }

    /// Returns the after image (absent for DELETE).
    #[must_use]
    pub const fn after_image(&self) -> Option<&RowImage> {
        self.entry.after_image.as_ref()
    }
}
