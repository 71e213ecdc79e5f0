// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::Value;

#[test]
fn test_value_display_uses_null_marker() {
    assert_eq!(Value::Null.to_string(), "<NULL>");
    assert_eq!(Value::Integer(42).to_string(), "42");
    assert_eq!(Value::Text(String::from("first")).to_string(), "first");
    assert_eq!(Value::Blob(vec![0xAB, 0x01]).to_string(), "x'AB01'");
}

#[test]
fn test_value_from_option_maps_none_to_null() {
    let none: Option<i64> = None;

    assert_eq!(Value::from(none), Value::Null);
    assert_eq!(Value::from(Some(7_i64)), Value::Integer(7));
    assert_eq!(Value::from(Some("x")), Value::Text(String::from("x")));
}

#[test]
fn test_value_type_names_match_sqlite_typeof() {
    assert_eq!(Value::Null.type_name(), "null");
    assert_eq!(Value::Integer(1).type_name(), "integer");
    assert_eq!(Value::Real(1.5).type_name(), "real");
    assert_eq!(Value::from("a").type_name(), "text");
    assert_eq!(Value::Blob(Vec::new()).type_name(), "blob");
}

#[test]
fn test_value_serializes_as_plain_json() {
    assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
    assert_eq!(serde_json::to_string(&Value::Integer(2)).unwrap(), "2");
    assert_eq!(serde_json::to_string(&Value::Real(2.5)).unwrap(), "2.5");
    assert_eq!(serde_json::to_string(&Value::from("a")).unwrap(), "\"a\"");
}

#[test]
fn test_value_deserialization_keeps_integer_and_real_apart() {
    let integer: Value = serde_json::from_str("2").unwrap();
    let real: Value = serde_json::from_str("2.0").unwrap();

    assert_eq!(integer, Value::Integer(2));
    assert_eq!(real, Value::Real(2.0));
}

#[test]
fn test_unsupported_value_survives_serialization() {
    let value: Value = Value::Unsupported {
        unsupported: String::from("geometry"),
    };
    let json: String = serde_json::to_string(&value).unwrap();

    assert_eq!(json, "{\"unsupported\":\"geometry\"}");
    assert_eq!(serde_json::from_str::<Value>(&json).unwrap(), value);
}

#[test]
fn test_non_finite_reals_serialize_tagged() {
    assert_eq!(
        serde_json::to_string(&Value::Real(f64::INFINITY)).unwrap(),
        "{\"real\":\"inf\"}"
    );
    assert_eq!(
        serde_json::to_string(&Value::Real(f64::NEG_INFINITY)).unwrap(),
        "{\"real\":\"-inf\"}"
    );

    let nan: Value = serde_json::from_str("{\"real\":\"NaN\"}").unwrap();
    assert!(matches!(nan, Value::Real(value) if value.is_nan()));
}

#[test]
fn test_non_finite_reals_are_not_read_back_as_null() {
    let json: String = serde_json::to_string(&Value::Real(f64::NEG_INFINITY)).unwrap();

    assert_eq!(
        serde_json::from_str::<Value>(&json).unwrap(),
        Value::Real(f64::NEG_INFINITY)
    );
    assert_ne!(serde_json::from_str::<Value>(&json).unwrap(), Value::Null);
}

#[test]
fn test_text_that_spells_infinity_stays_text() {
    let value: Value = serde_json::from_str("\"inf\"").unwrap();

    assert_eq!(value, Value::from("inf"));
}

#[test]
fn test_tagged_finite_real_is_rejected() {
    assert_eq!(
        serde_json::from_str::<Value>("{\"real\":\"1.5\"}").ok(),
        None
    );
}
