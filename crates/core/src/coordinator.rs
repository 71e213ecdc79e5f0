// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Multi-row statement planning.
//!
//! A batch statement affects each key at most once, so every function here
//! produces at most one [`RowEvent`] per key, in request order. Images are
//! passed in as maps keyed by [`RowKey`]; reading them is the caller's job.

use crate::error::{CoreError, ImagePhase};
use crate::interceptor::RowEvent;
use rowtrail_domain::{RowImage, RowKey, RowValues};
use std::collections::{BTreeMap, BTreeSet};

/// How an upsert request was resolved against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResolution {
    /// The key did not exist; the row is inserted.
    NoPriorMatch,
    /// The key existed; its values are replaced.
    ExistingMatch,
}

/// The resolution of every key of one upsert batch, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    steps: Vec<(RowKey, MergeResolution)>,
}

impl MergePlan {
    /// Returns each key with its resolution.
    #[must_use]
    pub fn steps(&self) -> &[(RowKey, MergeResolution)] {
        &self.steps
    }

    /// Returns the keys in request order.
    #[must_use]
    pub fn keys(&self) -> Vec<RowKey> {
        self.steps.iter().map(|(key, _)| *key).collect()
    }

    /// Returns how many requests take the insert path.
    #[must_use]
    pub fn inserts(&self) -> usize {
        self.count(MergeResolution::NoPriorMatch)
    }

    /// Returns how many requests take the update path.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.count(MergeResolution::ExistingMatch)
    }

    /// Returns `true` if the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn count(&self, resolution: MergeResolution) -> usize {
        self.steps
            .iter()
            .filter(|(_, step)| *step == resolution)
            .count()
    }
}

/// Removes repeated keys, keeping the first occurrence of each.
///
/// UPDATE and DELETE by key set have set semantics: naming a key twice
/// still affects the row once.
#[must_use]
pub fn unique_keys(keys: &[RowKey]) -> Vec<RowKey> {
    let mut seen: BTreeSet<RowKey> = BTreeSet::new();
    keys.iter().copied().filter(|key| seen.insert(*key)).collect()
}

/// Rejects a batch that names the same key twice.
///
/// # Errors
///
/// Returns `CoreError::DuplicateKeyInBatch` with the first repeated key.
pub fn ensure_distinct_keys(rows: &[RowValues]) -> Result<(), CoreError> {
    let mut seen: BTreeSet<RowKey> = BTreeSet::new();
    for row in rows {
        if !seen.insert(row.key) {
            return Err(CoreError::DuplicateKeyInBatch(row.key));
        }
    }
    Ok(())
}

/// Returns the column set shared by every row of a batch.
///
/// A multi-row statement has one column list, so every row must write the
/// same columns. An empty batch has no columns.
///
/// # Errors
///
/// Returns `CoreError::InconsistentBatchColumns` for the first row whose
/// columns differ from the first row's.
pub fn ensure_uniform_columns(rows: &[RowValues]) -> Result<Vec<String>, CoreError> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let expected: Vec<String> = first.values.columns().map(str::to_string).collect();

    for row in rows.iter().skip(1) {
        let found: Vec<String> = row.values.columns().map(str::to_string).collect();
        if found != expected {
            return Err(CoreError::InconsistentBatchColumns {
                key: row.key,
                expected,
                found,
            });
        }
    }

    Ok(expected)
}

/// Partitions upsert requests by whether their key already exists.
///
/// `existing` is the set of keys present in the table when the statement
/// runs, read inside the same transaction.
///
/// # Errors
///
/// Returns `CoreError::DuplicateKeyInBatch` if a key appears twice.
pub fn plan_upsert(
    rows: &[RowValues],
    existing: &BTreeSet<RowKey>,
) -> Result<MergePlan, CoreError> {
    ensure_distinct_keys(rows)?;

    let steps: Vec<(RowKey, MergeResolution)> = rows
        .iter()
        .map(|row| {
            let resolution: MergeResolution = if existing.contains(&row.key) {
                MergeResolution::ExistingMatch
            } else {
                MergeResolution::NoPriorMatch
            };
            (row.key, resolution)
        })
        .collect();

    Ok(MergePlan { steps })
}

fn image_of(
    images: &BTreeMap<RowKey, RowImage>,
    key: RowKey,
    phase: ImagePhase,
) -> Result<RowImage, CoreError> {
    images
        .get(&key)
        .cloned()
        .ok_or(CoreError::MissingImage { key, phase })
}

/// Turns an executed upsert plan into one event per key.
///
/// # Errors
///
/// Returns `CoreError::MissingImage` if a key has no after image, or an
/// existing match has no before image.
pub fn resolve_upsert(
    plan: &MergePlan,
    before: &BTreeMap<RowKey, RowImage>,
    after: &BTreeMap<RowKey, RowImage>,
) -> Result<Vec<RowEvent>, CoreError> {
    plan.steps
        .iter()
        .map(|(key, resolution)| {
            let after_image: RowImage = image_of(after, *key, ImagePhase::After)?;
            RowEvent::from_merge(*key, *resolution, before.get(key).cloned(), after_image)
        })
        .collect()
}

/// Turns inserted keys into INSERT events.
///
/// # Errors
///
/// Returns `CoreError::MissingImage` if an inserted key has no after image.
pub fn resolve_insert(
    keys: &[RowKey],
    after: &BTreeMap<RowKey, RowImage>,
) -> Result<Vec<RowEvent>, CoreError> {
    keys.iter()
        .map(|key| {
            Ok(RowEvent::Insert {
                key: *key,
                after: image_of(after, *key, ImagePhase::After)?,
            })
        })
        .collect()
}

/// Turns targeted keys into UPDATE events.
///
/// Only keys that existed before the statement are affected; keys without a
/// before image are skipped.
///
/// # Errors
///
/// Returns `CoreError::MissingImage` if an affected key has no after image.
pub fn resolve_update(
    keys: &[RowKey],
    before: &BTreeMap<RowKey, RowImage>,
    after: &BTreeMap<RowKey, RowImage>,
) -> Result<Vec<RowEvent>, CoreError> {
    unique_keys(keys)
        .into_iter()
        .filter_map(|key| before.get(&key).map(|image| (key, image.clone())))
        .map(|(key, before_image)| {
            Ok(RowEvent::Update {
                key,
                before: before_image,
                after: image_of(after, key, ImagePhase::After)?,
            })
        })
        .collect()
}

/// Turns targeted keys into DELETE events.
///
/// Keys that did not match a row produce no event.
#[must_use]
pub fn resolve_delete(keys: &[RowKey], before: &BTreeMap<RowKey, RowImage>) -> Vec<RowEvent> {
    unique_keys(keys)
        .into_iter()
        .filter_map(|key| {
            before.get(&key).map(|image| RowEvent::Delete {
                key,
                before: image.clone(),
            })
        })
        .collect()
}
