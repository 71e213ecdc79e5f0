// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The per-row capture decision.
//!
//! Every row touched by a monitored statement becomes exactly one
//! [`RowEvent`]. [`intercept`] turns it into a log entry, or suppresses it
//! when an update left every tracked column unchanged.

use crate::coordinator::MergeResolution;
use crate::diff;
use crate::error::{CoreError, ImagePhase};
use crate::session::SessionContext;
use rowtrail_audit::{ActionType, ChangeLogEntry};
use rowtrail_domain::{RowImage, RowKey};
use time::OffsetDateTime;

/// A single row affected by a statement, with the images captured around it.
#[derive(Debug, Clone, PartialEq)]
pub enum RowEvent {
    /// The row did not exist before the statement.
    Insert {
        /// The row key.
        key: RowKey,
        /// The row as stored after the statement.
        after: RowImage,
    },
    /// The row existed and was written by the statement.
    Update {
        /// The row key.
        key: RowKey,
        /// The row before the statement.
        before: RowImage,
        /// The row after the statement.
        after: RowImage,
    },
    /// The row was removed by the statement.
    Delete {
        /// The row key.
        key: RowKey,
        /// The row before the statement.
        before: RowImage,
    },
}

impl RowEvent {
    /// Classifies a row resolved by an upsert.
    ///
    /// A row with no prior match is an insert; a row that matched an existing
    /// key and had its values replaced is an update.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MissingImage` if an existing match has no before
    /// image.
    pub fn from_merge(
        key: RowKey,
        resolution: MergeResolution,
        before: Option<RowImage>,
        after: RowImage,
    ) -> Result<Self, CoreError> {
        match resolution {
            MergeResolution::NoPriorMatch => Ok(Self::Insert { key, after }),
            MergeResolution::ExistingMatch => {
                let before: RowImage = before.ok_or(CoreError::MissingImage {
                    key,
                    phase: ImagePhase::Before,
                })?;
                Ok(Self::Update { key, before, after })
            }
        }
    }

    /// Returns the affected key.
    #[must_use]
    pub const fn key(&self) -> RowKey {
        match self {
            Self::Insert { key, .. } | Self::Update { key, .. } | Self::Delete { key, .. } => *key,
        }
    }

    /// Returns the action type this event would be logged as.
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        match self {
            Self::Insert { .. } => ActionType::Insert,
            Self::Update { .. } => ActionType::Update,
            Self::Delete { .. } => ActionType::Delete,
        }
    }
}

/// The decision taken for one row event.
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    /// Append this entry to the log.
    Emit(ChangeLogEntry),
    /// The update changed no tracked column; nothing is logged.
    Suppressed(RowKey),
}

impl Interception {
    /// Returns the entry to append, if any.
    #[must_use]
    pub fn into_entry(self) -> Option<ChangeLogEntry> {
        match self {
            Self::Emit(entry) => Some(entry),
            Self::Suppressed(_) => None,
        }
    }
}

/// Decides whether a row event is logged and builds its entry.
///
/// Images are projected onto the tracked columns before being stored. The
/// entry is attributed to the actor currently bound in `session` and stamped
/// with the unit of work's shared `changed_at`.
#[must_use]
pub fn intercept(
    event: RowEvent,
    tracked: &[String],
    session: &SessionContext,
    changed_at: OffsetDateTime,
) -> Interception {
    let actor = session.actor().cloned();

    match event {
        RowEvent::Insert { key, after } => Interception::Emit(ChangeLogEntry::insert(
            key,
            after.project(tracked),
            actor,
            changed_at,
        )),
        RowEvent::Update { key, before, after } => {
            if diff::compare(&before, &after, tracked) {
                Interception::Emit(ChangeLogEntry::update(
                    key,
                    before.project(tracked),
                    after.project(tracked),
                    actor,
                    changed_at,
                ))
            } else {
                Interception::Suppressed(key)
            }
        }
        RowEvent::Delete { key, before } => Interception::Emit(ChangeLogEntry::delete(
            key,
            before.project(tracked),
            actor,
            changed_at,
        )),
    }
}
