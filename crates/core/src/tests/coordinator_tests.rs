// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::coordinator::{
    ensure_uniform_columns, plan_upsert, resolve_delete, resolve_insert, resolve_update,
    resolve_upsert, unique_keys,
};
use crate::tests::helpers::{row_image, statement_time, tracked_columns};
use crate::{
    CoreError, ImagePhase, Interception, MergePlan, MergeResolution, RowEvent, SessionContext,
    intercept,
};
use rowtrail_audit::{ActionType, ChangeLogEntry};
use rowtrail_domain::{RowImage, RowKey, RowValues};
use std::collections::{BTreeMap, BTreeSet};

fn request(key: i64, int_value: i64) -> RowValues {
    RowValues::new(key)
        .with("int_value", int_value)
        .with("varchar_value", "batch")
}

fn existing(keys: &[i64]) -> BTreeSet<RowKey> {
    keys.iter().copied().map(RowKey::new).collect()
}

fn images(rows: &[(i64, RowImage)]) -> BTreeMap<RowKey, RowImage> {
    rows.iter()
        .map(|(key, image)| (RowKey::new(*key), image.clone()))
        .collect()
}

#[test]
fn test_plan_upsert_partitions_by_existing_keys() {
    let rows: Vec<RowValues> = vec![request(100, 1), request(500, 5), request(200, 2)];

    let plan: MergePlan = plan_upsert(&rows, &existing(&[100, 200, 300])).unwrap();

    assert_eq!(plan.inserts(), 1);
    assert_eq!(plan.updates(), 2);
    assert_eq!(
        plan.steps(),
        &[
            (RowKey::new(100), MergeResolution::ExistingMatch),
            (RowKey::new(500), MergeResolution::NoPriorMatch),
            (RowKey::new(200), MergeResolution::ExistingMatch),
        ]
    );
}

#[test]
fn test_plan_upsert_rejects_duplicate_key() {
    let rows: Vec<RowValues> = vec![request(100, 1), request(100, 2)];

    let result: Result<MergePlan, CoreError> = plan_upsert(&rows, &existing(&[]));

    assert_eq!(result, Err(CoreError::DuplicateKeyInBatch(RowKey::new(100))));
}

#[test]
fn test_empty_upsert_plan() {
    let plan: MergePlan = plan_upsert(&[], &existing(&[1])).unwrap();

    assert!(plan.is_empty());
    assert_eq!(plan.inserts() + plan.updates(), 0);
}

#[test]
fn test_batch_upsert_logs_one_update_and_one_insert_sharing_timestamp() {
    let rows: Vec<RowValues> = vec![request(100, 2), request(500, 5)];
    let plan: MergePlan = plan_upsert(&rows, &existing(&[100])).unwrap();
    let before: BTreeMap<RowKey, RowImage> = images(&[(100, row_image(1, "batch"))]);
    let after: BTreeMap<RowKey, RowImage> = images(&[
        (100, row_image(2, "batch")),
        (500, row_image(5, "batch")),
    ]);

    let events: Vec<RowEvent> = resolve_upsert(&plan, &before, &after).unwrap();
    let entries: Vec<ChangeLogEntry> = events
        .into_iter()
        .filter_map(|event| {
            intercept(
                event,
                &tracked_columns(),
                &SessionContext::new(),
                statement_time(),
            )
            .into_entry()
        })
        .collect();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action_type(), ActionType::Update);
    assert_eq!(entries[0].row_key(), RowKey::new(100));
    assert_eq!(entries[1].action_type(), ActionType::Insert);
    assert_eq!(entries[1].row_key(), RowKey::new(500));
    assert_eq!(entries[0].changed_at(), entries[1].changed_at());
}

#[test]
fn test_batch_upsert_suppresses_unchanged_existing_rows() {
    let rows: Vec<RowValues> = vec![request(100, 1), request(200, 9), request(500, 5)];
    let plan: MergePlan = plan_upsert(&rows, &existing(&[100, 200])).unwrap();
    let before: BTreeMap<RowKey, RowImage> = images(&[
        (100, row_image(1, "batch")),
        (200, row_image(2, "batch")),
    ]);
    let after: BTreeMap<RowKey, RowImage> = images(&[
        (100, row_image(1, "batch")),
        (200, row_image(9, "batch")),
        (500, row_image(5, "batch")),
    ]);

    let interceptions: Vec<Interception> = resolve_upsert(&plan, &before, &after)
        .unwrap()
        .into_iter()
        .map(|event| {
            intercept(
                event,
                &tracked_columns(),
                &SessionContext::new(),
                statement_time(),
            )
        })
        .collect();

    assert_eq!(interceptions[0], Interception::Suppressed(RowKey::new(100)));
    assert!(matches!(interceptions[1], Interception::Emit(_)));
    assert!(matches!(interceptions[2], Interception::Emit(_)));
}

#[test]
fn test_resolve_upsert_requires_after_image() {
    let rows: Vec<RowValues> = vec![request(500, 5)];
    let plan: MergePlan = plan_upsert(&rows, &existing(&[])).unwrap();

    let result: Result<Vec<RowEvent>, CoreError> =
        resolve_upsert(&plan, &BTreeMap::new(), &BTreeMap::new());

    assert_eq!(
        result,
        Err(CoreError::MissingImage {
            key: RowKey::new(500),
            phase: ImagePhase::After,
        })
    );
}

#[test]
fn test_resolve_insert_emits_one_event_per_row() {
    let keys: Vec<RowKey> = vec![RowKey::new(1), RowKey::new(2)];
    let after: BTreeMap<RowKey, RowImage> =
        images(&[(1, row_image(1, "a")), (2, row_image(2, "b"))]);

    let events: Vec<RowEvent> = resolve_insert(&keys, &after).unwrap();

    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|event| event.action_type() == ActionType::Insert));
}

#[test]
fn test_resolve_update_skips_keys_that_did_not_match() {
    let keys: Vec<RowKey> = vec![RowKey::new(1), RowKey::new(42)];
    let before: BTreeMap<RowKey, RowImage> = images(&[(1, row_image(1, "a"))]);
    let after: BTreeMap<RowKey, RowImage> = images(&[(1, row_image(3, "a"))]);

    let events: Vec<RowEvent> = resolve_update(&keys, &before, &after).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key(), RowKey::new(1));
}

#[test]
fn test_resolve_delete_is_set_based() {
    let keys: Vec<RowKey> = vec![RowKey::new(1), RowKey::new(1), RowKey::new(7)];
    let before: BTreeMap<RowKey, RowImage> = images(&[(1, row_image(1, "a"))]);

    let events: Vec<RowEvent> = resolve_delete(&keys, &before);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action_type(), ActionType::Delete);
}

#[test]
fn test_unique_keys_keeps_first_occurrence_order() {
    let keys: Vec<RowKey> = [3, 1, 3, 2, 1].into_iter().map(RowKey::new).collect();

    assert_eq!(
        unique_keys(&keys),
        vec![RowKey::new(3), RowKey::new(1), RowKey::new(2)]
    );
}

#[test]
fn test_uniform_columns_are_returned_sorted() {
    let rows: Vec<RowValues> = vec![request(1, 1), request(2, 2)];

    assert_eq!(
        ensure_uniform_columns(&rows).unwrap(),
        vec![String::from("int_value"), String::from("varchar_value")]
    );
}

#[test]
fn test_mixed_column_sets_are_rejected() {
    let rows: Vec<RowValues> = vec![request(1, 1), RowValues::new(2).with("int_value", 2)];

    let result: Result<Vec<String>, CoreError> = ensure_uniform_columns(&rows);

    assert!(matches!(
        result,
        Err(CoreError::InconsistentBatchColumns { key, .. }) if key == RowKey::new(2)
    ));
}
