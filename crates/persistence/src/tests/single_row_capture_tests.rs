// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The canonical single-row sequence: insert, self-assign, two updates,
//! delete, each in its own unit of work.

use rowtrail_audit::{ActionType, Actor, ChangeLogRecord};
use rowtrail_domain::{Assignment, RowImage, RowKey, RowValues, TableRef, Value};

use super::{FIRST_TABLE_DDL, actor, create_test_persistence, first_table, test_row};
use crate::{MutationSummary, Persistence, PersistenceError, TableData};

fn key() -> [RowKey; 1] {
    [RowKey::new(1)]
}

fn set_int_value(persistence: &mut Persistence, value: Value, by: Option<&str>) -> MutationSummary {
    persistence
        .transaction(by.and_then(actor), |uow| {
            uow.update(&first_table(), &[("int_value", Assignment::Value(value))], &key())
        })
        .expect("Update failed")
}

fn records(persistence: &mut Persistence) -> Vec<ChangeLogRecord> {
    persistence
        .list_change_log(&first_table())
        .expect("Failed to read change log")
}

#[test]
fn test_insert_without_actor() {
    let mut persistence: Persistence = create_test_persistence();

    let summary: MutationSummary = persistence
        .transaction(None, |uow| uow.insert(&first_table(), &[test_row(1, Some(2), "first")]))
        .expect("Insert failed");

    assert_eq!(summary.affected, 1);
    assert_eq!(summary.logged, 1);

    let log: Vec<ChangeLogRecord> = records(&mut persistence);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].action_type(), ActionType::Insert);
    assert_eq!(log[0].row_key(), RowKey::new(1));
    assert!(log[0].actor().is_none());
    assert!(log[0].before_image().is_none());
    assert_eq!(
        log[0].after_image(),
        Some(&RowImage::new().with("int_value", 2).with("varchar_value", "first"))
    );
}

#[test]
fn test_self_assignment_is_not_logged() {
    let mut persistence: Persistence = create_test_persistence();
    persistence
        .transaction(None, |uow| uow.insert(&first_table(), &[test_row(1, Some(2), "first")]))
        .unwrap();

    let summary: MutationSummary = persistence
        .transaction(None, |uow| {
            uow.update(&first_table(), &[("int_value", Assignment::column("int_value"))], &key())
        })
        .unwrap();

    assert_eq!(summary.affected, 1);
    assert_eq!(summary.logged, 0);
    assert_eq!(summary.suppressed, 1);
    assert_eq!(persistence.count_change_log(&first_table()).unwrap(), 1);
}

#[test]
fn test_assigning_current_value_is_not_logged() {
    let mut persistence: Persistence = create_test_persistence();
    persistence
        .transaction(None, |uow| uow.insert(&first_table(), &[test_row(1, Some(2), "first")]))
        .unwrap();

    let summary: MutationSummary = set_int_value(&mut persistence, Value::Integer(2), None);

    assert_eq!(summary.suppressed, 1);
    assert_eq!(persistence.count_change_log(&first_table()).unwrap(), 1);
}

#[test]
fn test_update_to_null_records_both_images() {
    let mut persistence: Persistence = create_test_persistence();
    persistence
        .transaction(None, |uow| uow.insert(&first_table(), &[test_row(1, Some(2), "first")]))
        .unwrap();

    set_int_value(&mut persistence, Value::Null, Some("first_user"));

    let log: Vec<ChangeLogRecord> = records(&mut persistence);
    assert_eq!(log.len(), 2);
    let update: &ChangeLogRecord = &log[1];
    assert_eq!(update.action_type(), ActionType::Update);
    assert_eq!(update.actor().map(Actor::as_str), Some("first_user"));
    assert_eq!(
        update.before_image().and_then(|image| image.get("int_value")),
        Some(&Value::Integer(2))
    );
    assert_eq!(
        update.after_image().and_then(|image| image.get("int_value")),
        Some(&Value::Null)
    );
}

#[test]
fn test_full_single_row_sequence() {
    let mut persistence: Persistence = create_test_persistence();

    persistence
        .transaction(None, |uow| uow.insert(&first_table(), &[test_row(1, Some(1), "first")]))
        .unwrap();
    persistence
        .transaction(None, |uow| {
            uow.update(&first_table(), &[("int_value", Assignment::column("int_value"))], &key())
        })
        .unwrap();
    set_int_value(&mut persistence, Value::Integer(2), Some("first_user"));
    set_int_value(&mut persistence, Value::Null, Some("first_user"));
    persistence
        .transaction(actor("second_user"), |uow| uow.delete(&first_table(), &key()))
        .unwrap();

    let log: Vec<ChangeLogRecord> = records(&mut persistence);
    let summary: Vec<(ActionType, Option<&str>)> = log
        .iter()
        .map(|record| (record.action_type(), record.actor().map(Actor::as_str)))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ActionType::Insert, None),
            (ActionType::Update, Some("first_user")),
            (ActionType::Update, Some("first_user")),
            (ActionType::Delete, Some("second_user")),
        ]
    );

    let ids: Vec<i64> = log.iter().map(|record| record.log_id().value()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    let delete: &ChangeLogRecord = &log[3];
    assert!(delete.after_image().is_none());
    assert_eq!(
        delete.before_image().and_then(|image| image.get("int_value")),
        Some(&Value::Null)
    );

    let table: TableData = persistence.read_table(&first_table()).unwrap();
    assert!(table.rows.is_empty());
}

#[test]
fn test_actor_is_scoped_to_unit_of_work() {
    let mut persistence: Persistence = create_test_persistence();

    persistence
        .transaction(actor("first_user"), |uow| {
            uow.insert(&first_table(), &[test_row(1, Some(1), "first")])
        })
        .unwrap();
    persistence
        .transaction(None, |uow| uow.insert(&first_table(), &[test_row(2, Some(1), "second")]))
        .unwrap();

    let log: Vec<ChangeLogRecord> = records(&mut persistence);
    assert_eq!(log[0].actor().map(Actor::as_str), Some("first_user"));
    assert!(log[1].actor().is_none());
}

#[test]
fn test_set_application_user_mid_unit_of_work() {
    let mut persistence: Persistence = create_test_persistence();

    persistence
        .transaction(None, |uow| {
            uow.insert(&first_table(), &[test_row(1, Some(1), "first")])?;
            uow.set_application_user(Some("first_user"));
            assert_eq!(uow.application_user(), Some("first_user"));
            uow.insert(&first_table(), &[test_row(2, Some(1), "second")])?;
            uow.set_application_user(None);
            uow.insert(&first_table(), &[test_row(3, Some(1), "third")])
        })
        .unwrap();

    let actors: Vec<Option<String>> = records(&mut persistence)
        .iter()
        .map(|record| record.actor().map(|bound| bound.as_str().to_string()))
        .collect();
    assert_eq!(actors, vec![None, Some(String::from("first_user")), None]);
}

#[test]
fn test_records_share_unit_of_work_timestamp() {
    let mut persistence: Persistence = create_test_persistence();

    let changed_at = persistence
        .transaction(None, |uow| {
            uow.insert(&first_table(), &[test_row(1, Some(1), "first")])?;
            uow.update(&first_table(), &[("varchar_value", Assignment::value("changed"))], &key())?;
            Ok(uow.changed_at())
        })
        .unwrap();

    let log: Vec<ChangeLogRecord> = records(&mut persistence);
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|record| record.changed_at() == changed_at));
}

#[test]
fn test_rollback_discards_mutation_and_records() {
    let mut persistence: Persistence = create_test_persistence();

    let result: Result<(), PersistenceError> = persistence.transaction(None, |uow| {
        uow.insert(&first_table(), &[test_row(1, Some(1), "first")])?;
        Err(PersistenceError::NotFound(String::from("forced failure")))
    });

    assert!(result.is_err());
    assert_eq!(persistence.count_change_log(&first_table()).unwrap(), 0);
    assert!(persistence.read_table(&first_table()).unwrap().rows.is_empty());
}

#[test]
fn test_failed_insert_is_undone_when_error_is_handled() {
    let mut persistence: Persistence = create_test_persistence();

    persistence
        .transaction(None, |uow| {
            uow.execute_raw("DROP TABLE first_table_change_log")?;
            let result: Result<MutationSummary, PersistenceError> =
                uow.insert(&first_table(), &[test_row(1, Some(1), "first")]);
            assert!(matches!(result, Err(PersistenceError::DatabaseError(_))));
            Ok(())
        })
        .expect("Unit of work should commit");

    assert!(persistence.read_table(&first_table()).unwrap().rows.is_empty());
}

#[test]
fn test_handled_failure_keeps_earlier_mutations() {
    let mut persistence: Persistence = create_test_persistence();

    persistence
        .transaction(None, |uow| {
            uow.insert(&first_table(), &[test_row(1, Some(1), "first")])?;
            let duplicate: Result<MutationSummary, PersistenceError> = uow.insert(
                &first_table(),
                &[test_row(2, Some(2), "second"), test_row(1, None, "again")],
            );
            assert!(matches!(duplicate, Err(PersistenceError::ConstraintViolation(_))));
            Ok(())
        })
        .unwrap();

    let log: Vec<ChangeLogRecord> = records(&mut persistence);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].row_key(), RowKey::new(1));
    assert_eq!(persistence.read_table(&first_table()).unwrap().rows.len(), 1);
}

#[test]
fn test_duplicate_insert_is_constraint_violation() {
    let mut persistence: Persistence = create_test_persistence();
    persistence
        .transaction(None, |uow| uow.insert(&first_table(), &[test_row(1, Some(1), "first")]))
        .unwrap();

    let result = persistence
        .transaction(None, |uow| uow.insert(&first_table(), &[test_row(1, Some(9), "again")]));

    assert!(matches!(result, Err(PersistenceError::ConstraintViolation(_))));
    assert_eq!(persistence.count_change_log(&first_table()).unwrap(), 1);
}

#[test]
fn test_assigning_key_column_is_rejected() {
    let mut persistence: Persistence = create_test_persistence();

    let result = persistence.transaction(None, |uow| {
        uow.update(&first_table(), &[("id", Assignment::value(5))], &key())
    });

    assert!(matches!(
        result,
        Err(PersistenceError::KeyColumnNotAssignable { column, .. }) if column == "id"
    ));
}

#[test]
fn test_unsupported_value_cannot_be_written() {
    let mut persistence: Persistence = create_test_persistence();

    let result = persistence.transaction(None, |uow| {
        uow.insert(
            &first_table(),
            &[test_row(1, None, "first").with(
                "int_value",
                Value::Unsupported {
                    unsupported: String::from("geometry"),
                },
            )],
        )
    });

    assert!(matches!(result, Err(PersistenceError::UnsupportedValue(_))));
}

#[test]
fn test_update_of_missing_key_logs_nothing() {
    let mut persistence: Persistence = create_test_persistence();

    let summary: MutationSummary = set_int_value(&mut persistence, Value::Integer(3), None);

    assert_eq!(summary, MutationSummary::default());
    assert_eq!(persistence.count_change_log(&first_table()).unwrap(), 0);
}

#[test]
fn test_blob_and_real_survive_images() {
    let mut persistence: Persistence = create_test_persistence();
    persistence
        .execute_batch("CREATE TABLE readings (id INTEGER PRIMARY KEY, level REAL, raw BLOB);")
        .unwrap();
    let readings: TableRef = TableRef::main("readings").unwrap();
    persistence.enable_table_change_logging(&readings).unwrap();

    persistence
        .transaction(None, |uow| {
            uow.insert(
                &readings,
                &[RowValues::new(1)
                    .with("level", 0.1_f64)
                    .with("raw", vec![0_u8, 255, 16])],
            )
        })
        .unwrap();

    let log: Vec<ChangeLogRecord> = persistence.list_change_log(&readings).unwrap();
    let after: &RowImage = log[0].after_image().unwrap();
    assert_eq!(after.get("level"), Some(&Value::Real(0.1)));
    assert_eq!(after.get("raw"), Some(&Value::Blob(vec![0, 255, 16])));
}

#[test]
fn test_infinite_real_is_not_logged_as_null() {
    let mut persistence: Persistence = create_test_persistence();
    persistence
        .execute_batch("CREATE TABLE readings (id INTEGER PRIMARY KEY, level REAL);")
        .unwrap();
    let readings: TableRef = TableRef::main("readings").unwrap();
    persistence.enable_table_change_logging(&readings).unwrap();

    persistence
        .transaction(None, |uow| {
            uow.insert(&readings, &[RowValues::new(1).with("level", f64::INFINITY)])
        })
        .unwrap();
    let summary: MutationSummary = persistence
        .transaction(None, |uow| {
            uow.update(&readings, &[("level", Assignment::Value(Value::Null))], &key())
        })
        .unwrap();

    assert_eq!(summary.logged, 1);
    let log: Vec<ChangeLogRecord> = persistence.list_change_log(&readings).unwrap();
    assert_eq!(
        log[0].after_image().unwrap().get("level"),
        Some(&Value::Real(f64::INFINITY))
    );
    assert_eq!(
        log[1].before_image().unwrap().get("level"),
        Some(&Value::Real(f64::INFINITY))
    );
    assert_eq!(log[1].after_image().unwrap().get("level"), Some(&Value::Null));
}

#[test]
fn test_unmonitored_table_is_written_without_capture() {
    let mut persistence: Persistence =
        Persistence::new_in_memory().expect("Failed to create persistence");
    persistence.execute_batch(FIRST_TABLE_DDL).unwrap();

    let summary: MutationSummary = persistence
        .transaction(None, |uow| uow.insert(&first_table(), &[test_row(1, Some(1), "first")]))
        .unwrap();

    assert_eq!(summary.affected, 1);
    assert_eq!(summary.logged, 0);
    assert_eq!(persistence.read_table(&first_table()).unwrap().rows.len(), 1);
}

#[test]
fn test_execute_raw_is_not_captured() {
    let mut persistence: Persistence = create_test_persistence();

    let changed: usize = persistence
        .transaction(None, |uow| {
            uow.execute_raw("INSERT INTO first_table (id, int_value) VALUES (1, 1)")
        })
        .unwrap();

    assert_eq!(changed, 1);
    assert_eq!(persistence.count_change_log(&first_table()).unwrap(), 0);
}
