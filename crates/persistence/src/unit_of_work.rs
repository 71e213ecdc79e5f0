// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The write-through capture layer.
//!
//! A [`UnitOfWork`] wraps one `BEGIN IMMEDIATE` transaction. Every mutation
//! issued through it on a monitored table runs the same steps on the
//! transaction's connection:
//!
//! 1. read the before images of the affected keys
//! 2. run one parameterized statement per chunk of rows
//! 3. read the after images
//! 4. classify each row and drop updates that changed nothing tracked
//! 5. append the surviving records to the table's log
//!
//! Each mutation runs inside its own savepoint. If any step fails, the
//! mutation is rolled back to that savepoint before the error reaches the
//! caller, so a mutation is never visible without its records or the other
//! way round, even when the caller handles the error and commits. Tables
//! that are not enabled are written without capture.

use diesel::SqliteConnection;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::query_dsl::RunQueryDsl;
use rowtrail::coordinator::{self, MergePlan};
use rowtrail::{CoreError, Interception, RowEvent, SessionContext, intercept};
use rowtrail_audit::{Actor, ChangeLogEntry, LogId};
use rowtrail_domain::{Assignment, RowImage, RowKey, RowValues, TableRef};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::data_models::{MutationSummary, RegistrationData};
use crate::error::PersistenceError;
use crate::mutations::change_log;
use crate::queries::introspect::detect_key_column;
use crate::queries::registration::find_registration;
use crate::queries::snapshot::read_images;
use crate::statements::{self, OnConflict, Statement, rows_per_statement};

/// The table a mutation writes to, with its capture settings.
struct Target {
    table: TableRef,
    key_column: String,
    /// `Some` only while change logging is enabled.
    tracked: Option<Vec<String>>,
}

impl Target {
    fn resolve(conn: &mut SqliteConnection, table: &TableRef) -> Result<Self, PersistenceError> {
        match find_registration(conn, table)? {
            Some(RegistrationData {
                key_column,
                tracked_columns,
                enabled,
                ..
            }) => Ok(Self {
                table: table.clone(),
                key_column,
                tracked: enabled.then_some(tracked_columns),
            }),
            None => Ok(Self {
                table: table.clone(),
                key_column: detect_key_column(conn, table)?.name,
                tracked: None,
            }),
        }
    }

    fn ensure_assignable<'c>(
        &self,
        columns: impl IntoIterator<Item = &'c str>,
    ) -> Result<(), PersistenceError> {
        for column in columns {
            if column == self.key_column {
                return Err(PersistenceError::KeyColumnNotAssignable {
                    table: self.table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One transaction's worth of monitored mutations.
///
/// Created by `Persistence::transaction`. The actor bound here lives only as
/// long as the unit of work; the next one starts from whatever actor its
/// caller passes in.
pub struct UnitOfWork<'a> {
    conn: &'a mut SqliteConnection,
    session: SessionContext,
    changed_at: OffsetDateTime,
}

impl<'a> UnitOfWork<'a> {
    pub(crate) const fn new(
        conn: &'a mut SqliteConnection,
        session: SessionContext,
        changed_at: OffsetDateTime,
    ) -> Self {
        Self {
            conn,
            session,
            changed_at,
        }
    }

    /// Binds the application-level actor for the rest of this unit of work.
    ///
    /// `None` marks subsequent changes as anonymous.
    pub fn set_application_user(&mut self, actor: Option<&str>) {
        self.session.set_actor(actor.map(Actor::new));
    }

    /// Returns the bound actor, if any.
    #[must_use]
    pub fn application_user(&self) -> Option<&str> {
        self.session.actor().map(Actor::as_str)
    }

    /// Returns the timestamp stamped on every record of this unit of work.
    #[must_use]
    pub const fn changed_at(&self) -> OffsetDateTime {
        self.changed_at
    }

    fn record(
        &mut self,
        target: &Target,
        tracked: &[String],
        events: Vec<RowEvent>,
        affected: usize,
    ) -> Result<MutationSummary, PersistenceError> {
        let mut entries: Vec<ChangeLogEntry> = Vec::with_capacity(events.len());
        let mut suppressed: usize = 0;

        for event in events {
            match intercept(event, tracked, &self.session, self.changed_at) {
                Interception::Emit(entry) => entries.push(entry),
                Interception::Suppressed(key) => {
                    debug!(
                        table = %target.table,
                        row_key = key.value(),
                        "Suppressed update with no tracked change"
                    );
                    suppressed += 1;
                }
            }
        }

        let log_ids: Vec<LogId> = change_log::append_all(self.conn, &target.table, &entries)?;

        Ok(MutationSummary {
            affected,
            logged: log_ids.len(),
            suppressed,
        })
    }

    fn images(
        &mut self,
        target: &Target,
        tracked: &[String],
        keys: &[RowKey],
    ) -> Result<BTreeMap<RowKey, RowImage>, PersistenceError> {
        read_images(self.conn, &target.table, &target.key_column, tracked, keys)
    }

    /// Runs one mutation inside a savepoint.
    ///
    /// A failed mutation is rolled back to the savepoint before its error is
    /// returned, so none of its rows or records survive a commit.
    fn savepoint<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        AnsiTransactionManager::begin_transaction(self.conn)?;
        match op(self) {
            Ok(value) => {
                AnsiTransactionManager::commit_transaction(self.conn)?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "Rolled back failed mutation");
                AnsiTransactionManager::rollback_transaction(self.conn)?;
                Err(err)
            }
        }
    }

    fn uncaptured(&mut self, statement: Statement) -> Result<MutationSummary, PersistenceError> {
        Ok(MutationSummary {
            affected: statement.execute(self.conn)?,
            ..MutationSummary::default()
        })
    }

    /// Inserts rows. Every inserted row is logged as an INSERT.
    ///
    /// A key that already exists fails the unit of work with a constraint
    /// violation.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch repeats a key, the rows do not share one
    /// column set, a row writes the key column, or the insert fails.
    pub fn insert(
        &mut self,
        table: &TableRef,
        rows: &[RowValues],
    ) -> Result<MutationSummary, PersistenceError> {
        self.savepoint(|uow| {
            coordinator::ensure_distinct_keys(rows)?;
            let target: Target = Target::resolve(uow.conn, table)?;
            let columns: Vec<String> = coordinator::ensure_uniform_columns(rows)?;
            target.ensure_assignable(columns.iter().map(String::as_str))?;

            let mut summary: MutationSummary = MutationSummary::default();
            for chunk in rows.chunks(rows_per_statement(columns.len() + 1, 0)) {
                summary.absorb(uow.insert_chunk(&target, &columns, chunk)?);
            }

            info!(table = %table, rows = rows.len(), logged = summary.logged, "Inserted rows");
            Ok(summary)
        })
    }

    fn insert_chunk(
        &mut self,
        target: &Target,
        columns: &[String],
        chunk: &[RowValues],
    ) -> Result<MutationSummary, PersistenceError> {
        let statement: Statement = statements::insert(
            &target.table,
            &target.key_column,
            columns,
            chunk,
            OnConflict::Fail,
        )?;
        let Some(tracked) = target.tracked.as_deref() else {
            return self.uncaptured(statement);
        };

        let keys: Vec<RowKey> = chunk.iter().map(|row| row.key).collect();
        let affected: usize = statement.execute(self.conn)?;
        let after: BTreeMap<RowKey, RowImage> = self.images(target, tracked, &keys)?;
        let events: Vec<RowEvent> = coordinator::resolve_insert(&keys, &after)?;

        self.record(target, tracked, events, affected)
    }

    /// Inserts new keys and replaces the written columns of existing ones.
    ///
    /// Each key is classified against the table as it stands inside this
    /// transaction: a new key is logged as an INSERT, an existing key as an
    /// UPDATE unless none of its tracked columns changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch repeats a key, the rows do not share one
    /// column set, a row writes the key column, or the statement fails.
    pub fn upsert(
        &mut self,
        table: &TableRef,
        rows: &[RowValues],
    ) -> Result<MutationSummary, PersistenceError> {
        self.savepoint(|uow| {
            coordinator::ensure_distinct_keys(rows)?;
            let target: Target = Target::resolve(uow.conn, table)?;
            let columns: Vec<String> = coordinator::ensure_uniform_columns(rows)?;
            target.ensure_assignable(columns.iter().map(String::as_str))?;

            let mut summary: MutationSummary = MutationSummary::default();
            for chunk in rows.chunks(rows_per_statement(columns.len() + 1, 0)) {
                summary.absorb(uow.upsert_chunk(&target, &columns, chunk)?);
            }

            info!(
                table = %table,
                rows = rows.len(),
                logged = summary.logged,
                suppressed = summary.suppressed,
                "Upserted rows"
            );
            Ok(summary)
        })
    }

    fn upsert_chunk(
        &mut self,
        target: &Target,
        columns: &[String],
        chunk: &[RowValues],
    ) -> Result<MutationSummary, PersistenceError> {
        let statement: Statement = statements::insert(
            &target.table,
            &target.key_column,
            columns,
            chunk,
            OnConflict::Update,
        )?;
        let Some(tracked) = target.tracked.as_deref() else {
            return self.uncaptured(statement);
        };

        let keys: Vec<RowKey> = chunk.iter().map(|row| row.key).collect();
        let before: BTreeMap<RowKey, RowImage> = self.images(target, tracked, &keys)?;
        let existing: BTreeSet<RowKey> = before.keys().copied().collect();
        let plan: MergePlan = coordinator::plan_upsert(chunk, &existing)?;
        debug!(
            table = %target.table,
            inserts = plan.inserts(),
            updates = plan.updates(),
            "Planned upsert"
        );

        let affected: usize = statement.execute(self.conn)?;
        let after: BTreeMap<RowKey, RowImage> = self.images(target, tracked, &keys)?;
        let events: Vec<RowEvent> = coordinator::resolve_upsert(&plan, &before, &after)?;

        self.record(target, tracked, events, affected)
    }

    /// Applies the same assignments to every listed key.
    ///
    /// Keys are a set: naming one twice updates it once, and keys with no
    /// matching row are ignored. Rows whose tracked columns did not change
    /// (`col = col`, or a value equal to the current one) are not logged.
    ///
    /// # Errors
    ///
    /// Returns an error if an assignment targets the key column or the
    /// statement fails.
    pub fn update(
        &mut self,
        table: &TableRef,
        assignments: &[(&str, Assignment)],
        keys: &[RowKey],
    ) -> Result<MutationSummary, PersistenceError> {
        self.savepoint(|uow| {
            let target: Target = Target::resolve(uow.conn, table)?;
            target.ensure_assignable(assignments.iter().map(|(column, _)| *column))?;

            let keys: Vec<RowKey> = coordinator::unique_keys(keys);
            if keys.is_empty() || assignments.is_empty() {
                return Ok(MutationSummary::default());
            }

            let literals: usize = assignments
                .iter()
                .filter(|(_, assignment)| matches!(assignment, Assignment::Value(_)))
                .count();

            let mut summary: MutationSummary = MutationSummary::default();
            for chunk in keys.chunks(rows_per_statement(1, literals)) {
                let statement: Statement =
                    statements::update(&target.table, &target.key_column, assignments, chunk)?;
                summary.absorb(uow.update_chunk(&target, statement, chunk)?);
            }

            info!(
                table = %table,
                logged = summary.logged,
                suppressed = summary.suppressed,
                "Updated rows"
            );
            Ok(summary)
        })
    }

    /// Writes different values to each listed row in one statement per chunk.
    ///
    /// Rows whose key does not exist are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch repeats a key, the rows do not share one
    /// column set, a row writes the key column, or the statement fails.
    pub fn update_rows(
        &mut self,
        table: &TableRef,
        rows: &[RowValues],
    ) -> Result<MutationSummary, PersistenceError> {
        self.savepoint(|uow| {
            coordinator::ensure_distinct_keys(rows)?;
            let target: Target = Target::resolve(uow.conn, table)?;
            let columns: Vec<String> = coordinator::ensure_uniform_columns(rows)?;
            target.ensure_assignable(columns.iter().map(String::as_str))?;

            if columns.is_empty() {
                return Ok(MutationSummary::default());
            }

            let mut summary: MutationSummary = MutationSummary::default();
            for chunk in rows.chunks(rows_per_statement(columns.len() + 1, 0)) {
                let statement: Statement =
                    statements::update_rows(&target.table, &target.key_column, &columns, chunk)?;
                let keys: Vec<RowKey> = chunk.iter().map(|row| row.key).collect();
                summary.absorb(uow.update_chunk(&target, statement, &keys)?);
            }

            info!(
                table = %table,
                rows = rows.len(),
                logged = summary.logged,
                suppressed = summary.suppressed,
                "Updated rows"
            );
            Ok(summary)
        })
    }

    fn update_chunk(
        &mut self,
        target: &Target,
        statement: Statement,
        keys: &[RowKey],
    ) -> Result<MutationSummary, PersistenceError> {
        let Some(tracked) = target.tracked.as_deref() else {
            return self.uncaptured(statement);
        };

        let before: BTreeMap<RowKey, RowImage> = self.images(target, tracked, keys)?;
        let affected: usize = statement.execute(self.conn)?;
        let after: BTreeMap<RowKey, RowImage> = self.images(target, tracked, keys)?;
        let events: Vec<RowEvent> = coordinator::resolve_update(keys, &before, &after)?;

        self.record(target, tracked, events, affected)
    }

    /// Deletes every listed key. Each deleted row is logged as a DELETE.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn delete(
        &mut self,
        table: &TableRef,
        keys: &[RowKey],
    ) -> Result<MutationSummary, PersistenceError> {
        self.savepoint(|uow| {
            let target: Target = Target::resolve(uow.conn, table)?;
            let keys: Vec<RowKey> = coordinator::unique_keys(keys);

            let mut summary: MutationSummary = MutationSummary::default();
            for chunk in keys.chunks(rows_per_statement(1, 0)) {
                let statement: Statement =
                    statements::delete(&target.table, &target.key_column, chunk)?;
                let Some(tracked) = target.tracked.as_deref() else {
                    summary.absorb(uow.uncaptured(statement)?);
                    continue;
                };

                let before: BTreeMap<RowKey, RowImage> = uow.images(&target, tracked, chunk)?;
                let affected: usize = statement.execute(uow.conn)?;
                let events: Vec<RowEvent> = coordinator::resolve_delete(chunk, &before);
                summary.absorb(uow.record(&target, tracked, events, affected)?);
            }

            info!(table = %table, logged = summary.logged, "Deleted rows");
            Ok(summary)
        })
    }

    /// Bulk-loads a stream of rows.
    ///
    /// Rows are consumed lazily and written in chunks of multi-row INSERTs.
    /// Every row is logged as an INSERT with the unit of work's shared
    /// timestamp, exactly as [`UnitOfWork::insert`] would log it.
    ///
    /// # Errors
    ///
    /// Returns an error if a row writes a different column set than the first
    /// row, writes the key column, or an insert fails.
    pub fn copy_in<I>(&mut self, table: &TableRef, rows: I) -> Result<MutationSummary, PersistenceError>
    where
        I: IntoIterator<Item = RowValues>,
    {
        self.savepoint(|uow| {
            let target: Target = Target::resolve(uow.conn, table)?;
            let mut rows = rows.into_iter().peekable();
            let Some(first) = rows.peek() else {
                return Ok(MutationSummary::default());
            };
            let columns: Vec<String> = first.values.columns().map(str::to_string).collect();
            target.ensure_assignable(columns.iter().map(String::as_str))?;

            let chunk_size: usize = rows_per_statement(columns.len() + 1, 0);
            let mut chunk: Vec<RowValues> = Vec::with_capacity(chunk_size);
            let mut summary: MutationSummary = MutationSummary::default();
            let mut total: usize = 0;

            for row in rows {
                let found: Vec<String> = row.values.columns().map(str::to_string).collect();
                if found != columns {
                    return Err(CoreError::InconsistentBatchColumns {
                        key: row.key,
                        expected: columns,
                        found,
                    }
                    .into());
                }

                chunk.push(row);
                if chunk.len() == chunk_size {
                    summary.absorb(uow.insert_chunk(&target, &columns, &chunk)?);
                    total += chunk.len();
                    chunk.clear();
                }
            }
            if !chunk.is_empty() {
                summary.absorb(uow.insert_chunk(&target, &columns, &chunk)?);
                total += chunk.len();
            }

            info!(table = %table, rows = total, logged = summary.logged, "Copied rows");
            Ok(summary)
        })
    }

    /// Runs a statement without capture.
    ///
    /// Nothing written this way reaches a change log, even on a monitored
    /// table.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn execute_raw(&mut self, sql: &str) -> Result<usize, PersistenceError> {
        debug!(sql, "Executing uncaptured statement");
        Ok(diesel::sql_query(sql).execute(self.conn)?)
    }
}
