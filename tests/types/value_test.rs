use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveTime};
use lumbung::types::{
    error::DatabaseError,
    value::{DataType, Value, type_code_width},
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_type_codes_and_widths() {
    assert_eq!(Value::Null.type_code().unwrap(), 0);
    assert_eq!(Value::TinyInt(1).type_code().unwrap(), 1);
    assert_eq!(Value::SmallInt(1).type_code().unwrap(), 2);
    assert_eq!(Value::Int(1).type_code().unwrap(), 3);
    assert_eq!(Value::BigInt(1).type_code().unwrap(), 4);
    assert_eq!(Value::Float(1.0).type_code().unwrap(), 5);
    assert_eq!(Value::Double(1.0).type_code().unwrap(), 6);
    assert_eq!(Value::Year(2024).type_code().unwrap(), 8);
    assert_eq!(Value::Time(NaiveTime::MIN).type_code().unwrap(), 9);
    assert_eq!(Value::Text("hello".to_string()).type_code().unwrap(), 12 + 5);

    assert_eq!(type_code_width(0).unwrap(), 0);
    assert_eq!(type_code_width(1).unwrap(), 1);
    assert_eq!(type_code_width(3).unwrap(), 4);
    assert_eq!(type_code_width(10).unwrap(), 8);
    assert_eq!(type_code_width(11).unwrap(), 8);
    assert_eq!(type_code_width(12).unwrap(), 0);
    assert_eq!(type_code_width(12 + 200).unwrap(), 200);
    assert!(matches!(
        type_code_width(7),
        Err(DatabaseError::UnknownTypeCode(7))
    ));
}

#[test]
fn test_fixed_width_values_round_trip() {
    let values = vec![
        Value::Null,
        Value::TinyInt(-7),
        Value::SmallInt(-1234),
        Value::Int(123_456),
        Value::BigInt(-9_000_000_000),
        Value::Float(1.5),
        Value::Double(-2.25),
        Value::Year(2127),
        Value::Year(1872),
        Value::Time(NaiveTime::from_hms_milli_opt(13, 45, 10, 250).unwrap()),
        Value::DateTime(date(2023, 5, 17).and_hms_opt(8, 30, 0).unwrap()),
        Value::Date(date(1999, 12, 31)),
        Value::Text("lumbung".to_string()),
    ];

    for value in values {
        let bytes = value.to_bytes().unwrap();
        assert_eq!(bytes.len(), value.size());
        let code = value.type_code().unwrap();
        let decoded = Value::from_bytes(code, &bytes).unwrap();
        assert_eq!(decoded, value);
    }
}

#[test]
fn test_big_endian_encoding() {
    assert_eq!(Value::Int(1).to_bytes().unwrap(), vec![0, 0, 0, 1]);
    assert_eq!(Value::SmallInt(0x0102).to_bytes().unwrap(), vec![1, 2]);
    // YEAR is stored as an offset from 2000
    assert_eq!(Value::Year(2005).to_bytes().unwrap(), vec![5]);
    assert_eq!(Value::Year(1990).to_bytes().unwrap(), vec![(-10i8) as u8]);
    // DATE is milliseconds since the epoch at midnight
    let epoch_plus_one_day = Value::Date(date(1970, 1, 2)).to_bytes().unwrap();
    assert_eq!(epoch_plus_one_day, 86_400_000i64.to_be_bytes().to_vec());
}

#[test]
fn test_from_bytes_rejects_wrong_width() {
    let result = Value::from_bytes(3, &[0, 1]);
    assert!(matches!(
        result,
        Err(DatabaseError::InvalidLength {
            expected: 4,
            actual: 2,
            ..
        })
    ));
}

#[test]
fn test_text_length_limit() {
    let max = Value::Text("a".repeat(243));
    assert_eq!(max.type_code().unwrap(), 255);
    assert!(max.to_bytes().is_ok());

    let too_long = Value::Text("a".repeat(244));
    assert!(too_long.type_code().is_err());
    assert!(too_long.to_bytes().is_err());
}

#[test]
fn test_coercion() {
    assert_eq!(
        Value::BigInt(12).coerce_to(DataType::TinyInt).unwrap(),
        Value::TinyInt(12)
    );
    assert!(Value::Int(300).coerce_to(DataType::TinyInt).is_err());
    assert_eq!(
        Value::Int(3).coerce_to(DataType::Double).unwrap(),
        Value::Double(3.0)
    );
    assert_eq!(
        Value::Int(2024).coerce_to(DataType::Year).unwrap(),
        Value::Year(2024)
    );
    assert!(Value::Int(2200).coerce_to(DataType::Year).is_err());
    assert_eq!(
        Value::Text("2024-02-29".to_string())
            .coerce_to(DataType::Date)
            .unwrap(),
        Value::Date(date(2024, 2, 29))
    );
    assert_eq!(
        Value::Text("2024-02-29 10:11:12".to_string())
            .coerce_to(DataType::DateTime)
            .unwrap(),
        Value::DateTime(date(2024, 2, 29).and_hms_opt(10, 11, 12).unwrap())
    );
    assert_eq!(
        Value::Text("23:59:59".to_string())
            .coerce_to(DataType::Time)
            .unwrap(),
        Value::Time(NaiveTime::from_hms_opt(23, 59, 59).unwrap())
    );
    assert!(Value::Text("not a date".to_string()).coerce_to(DataType::Date).is_err());
    // NULL passes through any column type
    assert_eq!(Value::Null.coerce_to(DataType::Int).unwrap(), Value::Null);
}

#[test]
fn test_compare_orders_values() {
    assert_eq!(Value::Int(5).compare(&Value::Int(10)), Ordering::Less);
    assert_eq!(Value::TinyInt(5).compare(&Value::BigInt(5)), Ordering::Equal);
    assert_eq!(Value::Int(5).compare(&Value::Double(5.5)), Ordering::Less);
    assert_eq!(
        Value::Text("apple".to_string()).compare(&Value::Text("banana".to_string())),
        Ordering::Less
    );
    assert_eq!(Value::Null.compare(&Value::Int(i32::MIN)), Ordering::Less);
    assert_eq!(
        Value::Int(i32::MAX).compare(&Value::Text(String::new())),
        Ordering::Less
    );
}

#[test]
fn test_data_type_names() {
    for data_type in [
        DataType::TinyInt,
        DataType::SmallInt,
        DataType::Int,
        DataType::BigInt,
        DataType::Float,
        DataType::Double,
        DataType::Year,
        DataType::Time,
        DataType::DateTime,
        DataType::Date,
        DataType::Text,
    ] {
        assert_eq!(DataType::from_string(data_type.name()).unwrap(), data_type);
    }
    assert_eq!(DataType::from_string("integer").unwrap(), DataType::Int);
    assert!(DataType::from_string("BLOB").is_err());
}
