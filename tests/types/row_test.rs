use std::collections::HashMap;

use chrono::NaiveDate;
use lumbung::{
    storage::schema::{ColumnSchema, TableSchema},
    types::{
        cell::Cell,
        error::DatabaseError,
        row::Row,
        value::{DataType, Value},
    },
};

fn employee_schema() -> TableSchema {
    TableSchema::new(
        "employees",
        vec![
            ColumnSchema::new("id", DataType::Int, 0).primary_key(),
            ColumnSchema::new("name", DataType::Text, 1).not_null(),
            ColumnSchema::new("age", DataType::TinyInt, 2),
            ColumnSchema::new("hired", DataType::Date, 3),
            ColumnSchema::new("salary", DataType::Double, 4),
        ],
    )
}

fn employee(id: i32, name: &str) -> Row {
    Row::new(vec![
        Value::Int(id),
        Value::Text(name.to_string()),
        Value::TinyInt(30),
        Value::Date(NaiveDate::from_ymd_opt(2020, 1, 15).unwrap()),
        Value::Double(1234.5),
    ])
}

#[test]
fn test_encode_layout() {
    let schema = employee_schema();
    let payload = employee(1, "Ann").encode(&schema.columns).unwrap();

    assert_eq!(payload.deletion_flag, 0);
    assert_eq!(payload.column_count, 5);
    assert_eq!(payload.type_codes, vec![3, 12 + 3, 1, 11, 6]);
    assert_eq!(payload.body.len(), 4 + 3 + 1 + 8 + 8);
    assert_eq!(&payload.body[0..4], &[0, 0, 0, 1]);
    assert_eq!(&payload.body[4..7], b"Ann");
}

#[test]
fn test_null_has_code_zero_and_no_body() {
    let schema = employee_schema();
    let mut row = employee(2, "Bo");
    row.values[2] = Value::Null;
    row.values[3] = Value::Null;
    let payload = row.encode(&schema.columns).unwrap();
    assert_eq!(payload.type_codes[2], 0);
    assert_eq!(payload.type_codes[3], 0);
    assert_eq!(payload.body.len(), 4 + 2 + 8);

    let decoded = Row::decode(2, &payload, &schema.columns).unwrap();
    assert_eq!(decoded.values, row.values);
}

#[test]
fn test_cell_round_trip() {
    let schema = employee_schema();
    let row = Row::with_row_id(7, employee(7, "Cy").values);
    let cell = row.to_cell(&schema.columns).unwrap();
    assert_eq!(cell.row_id(), Some(7));

    let bytes = cell.serialize().unwrap();
    let (decoded_cell, _) =
        Cell::deserialize(lumbung::types::page::PageType::TableLeaf, &bytes).unwrap();
    let decoded = Row::from_cell(&decoded_cell, &schema.columns).unwrap();
    assert_eq!(decoded, row);
}

#[test]
fn test_to_cell_requires_row_id() {
    let schema = employee_schema();
    assert!(employee(1, "Di").to_cell(&schema.columns).is_err());
}

#[test]
fn test_encode_rejects_type_mismatch() {
    let schema = employee_schema();
    let mut row = employee(1, "Ed");
    row.values[2] = Value::Text("thirty".to_string());
    assert!(matches!(
        row.encode(&schema.columns),
        Err(DatabaseError::TypeMismatch { .. })
    ));
}

#[test]
fn test_decode_rejects_column_count_mismatch() {
    let schema = employee_schema();
    let payload = employee(1, "Flo").encode(&schema.columns).unwrap();
    assert!(Row::decode(1, &payload, &schema.columns[..4]).is_err());
}

#[test]
fn test_decode_rejects_short_body() {
    let schema = employee_schema();
    let mut payload = employee(1, "Gus").encode(&schema.columns).unwrap();
    payload.body.pop();
    assert!(matches!(
        Row::decode(1, &payload, &schema.columns),
        Err(DatabaseError::InvalidLength { .. })
    ));
}

#[test]
fn test_project_and_lookup_by_name() {
    let schema = employee_schema();
    let row = Row::with_row_id(3, employee(3, "Hal").values);
    assert_eq!(row.get(&schema, "name"), Some(&Value::Text("Hal".to_string())));
    assert_eq!(row.get(&schema, "missing"), None);

    let projected = row.project(&[4, 0]);
    assert_eq!(projected.row_id, Some(3));
    assert_eq!(projected.values, vec![Value::Double(1234.5), Value::Int(3)]);
}

#[test]
fn test_schema_builds_rows_from_named_values() {
    let schema = employee_schema();
    let values: HashMap<String, Value> = [
        ("id".to_string(), Value::BigInt(9)),
        ("name".to_string(), Value::Text("Ivy".to_string())),
        ("hired".to_string(), Value::Text("2021-06-01".to_string())),
    ]
    .into_iter()
    .collect();
    let row = schema.row_from_values(&values).unwrap();
    assert_eq!(row.values[0], Value::Int(9));
    assert_eq!(row.values[2], Value::Null);
    assert_eq!(
        row.values[3],
        Value::Date(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())
    );
    assert!(schema.validate_row(&row).is_ok());

    let mut missing_name = row.clone();
    missing_name.values[1] = Value::Null;
    assert!(matches!(
        schema.validate_row(&missing_name),
        Err(DatabaseError::ConstraintViolation { .. })
    ));

    let unknown: HashMap<String, Value> = [("nope".to_string(), Value::Int(1))].into_iter().collect();
    assert!(matches!(
        schema.row_from_values(&unknown),
        Err(DatabaseError::ColumnNotFound { .. })
    ));
}
