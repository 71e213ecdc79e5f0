// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::Comparison;
use crate::diff::{changed_columns, compare, compare_values};
use crate::tests::helpers::{row_image, tracked_columns};
use rowtrail_domain::{RowImage, Value};

#[test]
fn test_identical_images_are_unchanged() {
    let before: RowImage = row_image(2, "first");
    let after: RowImage = row_image(2, "first");

    assert!(!compare(&before, &after, &tracked_columns()));
}

#[test]
fn test_self_assignment_is_unchanged() {
    let before: RowImage = row_image(2, "first");
    let after: RowImage = before.clone();

    assert!(!compare(&before, &after, &tracked_columns()));
    assert!(changed_columns(&before, &after, &tracked_columns()).is_empty());
}

#[test]
fn test_null_to_null_is_unchanged() {
    let before: RowImage = row_image(Value::Null, "first");
    let after: RowImage = row_image(Value::Null, "first");

    assert!(!compare(&before, &after, &tracked_columns()));
}

#[test]
fn test_value_to_null_is_changed() {
    let before: RowImage = row_image(2, "first");
    let after: RowImage = row_image(Value::Null, "first");

    assert!(compare(&before, &after, &tracked_columns()));
    assert_eq!(
        changed_columns(&before, &after, &tracked_columns()),
        vec![String::from("int_value")]
    );
}

#[test]
fn test_null_to_value_is_changed() {
    let before: RowImage = row_image(Value::Null, "first");
    let after: RowImage = row_image(7, "first");

    assert!(compare(&before, &after, &tracked_columns()));
}

#[test]
fn test_untracked_column_is_ignored() {
    let before: RowImage = row_image(2, "first").with("added_at", "2026-03-01");
    let after: RowImage = row_image(2, "first").with("added_at", "2026-03-02");

    assert!(!compare(&before, &after, &tracked_columns()));
}

#[test]
fn test_changed_columns_follow_tracking_order() {
    let before: RowImage = row_image(2, "first");
    let after: RowImage = row_image(3, "second");

    assert_eq!(
        changed_columns(&before, &after, &tracked_columns()),
        tracked_columns()
    );
}

#[test]
fn test_different_storage_classes_are_different() {
    assert_eq!(
        compare_values(&Value::Integer(2), &Value::Text(String::from("2"))),
        Comparison::Different
    );
    assert_eq!(
        compare_values(&Value::Integer(2), &Value::Real(2.0)),
        Comparison::Different
    );
}

#[test]
fn test_equal_reals_compare_equal() {
    assert_eq!(
        compare_values(&Value::Real(1.5), &Value::Real(1.5)),
        Comparison::Equal
    );
}

#[test]
fn test_blob_comparison() {
    assert_eq!(
        compare_values(&Value::Blob(vec![1, 2]), &Value::Blob(vec![1, 2])),
        Comparison::Equal
    );
    assert_eq!(
        compare_values(&Value::Blob(vec![1, 2]), &Value::Blob(vec![1, 3])),
        Comparison::Different
    );
}

#[test]
fn test_unsupported_value_is_incomparable_and_counts_as_changed() {
    let unsupported: Value = Value::Unsupported {
        unsupported: String::from("geometry"),
    };

    let comparison: Comparison = compare_values(&unsupported, &unsupported.clone());

    assert_eq!(comparison, Comparison::Incomparable);
    assert!(comparison.is_change());

    let before: RowImage = row_image(2, unsupported.clone());
    let after: RowImage = row_image(2, unsupported);
    assert!(compare(&before, &after, &tracked_columns()));
}

#[test]
fn test_column_missing_from_one_image_counts_as_changed() {
    let before: RowImage = row_image(2, "first");
    let after: RowImage = RowImage::new().with("int_value", 2);

    assert_eq!(
        changed_columns(&before, &after, &tracked_columns()),
        vec![String::from("varchar_value")]
    );
}
