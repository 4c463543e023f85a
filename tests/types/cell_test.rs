use lumbung::types::{
    cell::{Cell, CellHeader, CellKey, IndexCellPayload, TableCellPayload},
    error::DatabaseError,
    page::PageType,
    value::Value,
};

fn sample_payload() -> TableCellPayload {
    // INT 7, TEXT "abc"
    TableCellPayload::new(vec![3, 12 + 3], vec![0, 0, 0, 7, b'a', b'b', b'c']).unwrap()
}

#[test]
fn test_header_widths() {
    assert_eq!(CellHeader::width(PageType::TableLeaf), 6);
    assert_eq!(CellHeader::width(PageType::TableInterior), 6);
    assert_eq!(CellHeader::width(PageType::IndexLeaf), 2);
    assert_eq!(CellHeader::width(PageType::IndexInterior), 4);
}

#[test]
fn test_header_round_trip_for_every_variant() {
    let headers = [
        (
            PageType::TableLeaf,
            CellHeader {
                size: 11,
                left_child_page: None,
                row_id: Some(42),
            },
        ),
        (
            PageType::TableInterior,
            CellHeader {
                size: 0,
                left_child_page: Some(9),
                row_id: Some(-3),
            },
        ),
        (
            PageType::IndexLeaf,
            CellHeader {
                size: 300,
                left_child_page: None,
                row_id: None,
            },
        ),
        (
            PageType::IndexInterior,
            CellHeader {
                size: 5,
                left_child_page: Some(65000),
                row_id: None,
            },
        ),
    ];

    for (page_type, header) in headers {
        let bytes = header.serialize(page_type).unwrap();
        assert_eq!(bytes.len(), CellHeader::width(page_type));
        assert_eq!(CellHeader::deserialize(page_type, &bytes).unwrap(), header);
    }
}

#[test]
fn test_header_rejects_wrong_length() {
    let result = CellHeader::deserialize(PageType::TableLeaf, &[0, 1, 2]);
    assert!(matches!(
        result,
        Err(DatabaseError::InvalidLength {
            expected: 6,
            actual: 3,
            ..
        })
    ));
    assert!(CellHeader::deserialize(PageType::IndexLeaf, &[0, 1, 2]).is_err());
}

#[test]
fn test_table_leaf_layout() {
    let cell = Cell::table_leaf(5, sample_payload());
    let bytes = cell.serialize().unwrap();
    // size(2) rowid(4) | flag count codes(2) body(7)
    assert_eq!(bytes.len(), 6 + 2 + 2 + 7);
    assert_eq!(cell.len(), bytes.len());
    assert_eq!(&bytes[0..2], &[0, 11]);
    assert_eq!(&bytes[2..6], &[0, 0, 0, 5]);
    assert_eq!(bytes[6], 0);
    assert_eq!(bytes[7], 2);
    assert_eq!(&bytes[8..10], &[3, 15]);

    let (decoded, consumed) = Cell::deserialize(PageType::TableLeaf, &bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, cell);
}

#[test]
fn test_table_interior_has_no_payload() {
    let cell = Cell::table_interior(3, 99);
    let bytes = cell.serialize().unwrap();
    assert_eq!(bytes, vec![0, 3, 0, 0, 0, 99]);
    assert_eq!(cell.payload().unwrap(), None);

    let (decoded, consumed) = Cell::deserialize(PageType::TableInterior, &bytes).unwrap();
    assert_eq!(consumed, 6);
    assert_eq!(decoded.left_child_page(), Some(3));
    assert_eq!(decoded.key(), CellKey::RowId(99));
}

#[test]
fn test_index_cells_round_trip() {
    let leaf = Cell::index_leaf(Value::Text("carol".to_string()), Value::Int(17));
    let bytes = leaf.serialize().unwrap();
    // size(2) | key code + 5 bytes | pointer code + 4 bytes
    assert_eq!(bytes.len(), 2 + 1 + 5 + 1 + 4);
    let (decoded, _) = Cell::deserialize(PageType::IndexLeaf, &bytes).unwrap();
    assert_eq!(decoded, leaf);

    let interior = Cell::index_interior(4, Value::SmallInt(-2));
    let bytes = interior.serialize().unwrap();
    assert_eq!(bytes.len(), 4 + 1 + 2);
    let (decoded, _) = Cell::deserialize(PageType::IndexInterior, &bytes).unwrap();
    assert_eq!(decoded, interior);
    assert_eq!(decoded.key(), CellKey::Value(Value::SmallInt(-2)));
}

#[test]
fn test_table_payload_metadata() {
    let payload = sample_payload();
    let bytes = payload.serialize();
    let decoded = TableCellPayload::deserialize(&bytes).unwrap();
    assert_eq!(decoded, payload);
    assert_eq!(decoded.column_count, 2);

    assert!(TableCellPayload::deserialize(&[0]).is_err());
    // Claims three type codes, carries one
    assert!(TableCellPayload::deserialize(&[0, 3, 1]).is_err());
}

#[test]
fn test_index_payload_rejects_trailing_bytes() {
    let payload = IndexCellPayload {
        key: Value::Int(1),
        pointer: Some(Value::Int(2)),
    };
    let mut bytes = payload.serialize().unwrap();
    bytes.push(0xAA);
    assert!(IndexCellPayload::deserialize(&bytes, true).is_err());
}

#[test]
fn test_tombstone_flag() {
    let mut cell = Cell::table_leaf(1, sample_payload());
    assert!(cell.exists());
    assert!(cell.mark_deleted());
    assert!(!cell.exists());

    let bytes = cell.serialize().unwrap();
    assert_eq!(bytes[6], 1);
    let (decoded, _) = Cell::deserialize(PageType::TableLeaf, &bytes).unwrap();
    assert!(!decoded.exists());

    // Only table leaves carry a deletion flag
    let mut interior = Cell::table_interior(0, 1);
    assert!(!interior.mark_deleted());
    assert!(interior.exists());
}

#[test]
fn test_promotion_matches_page_family() {
    let cell = Cell::promotion(PageType::TableInterior, 2, CellKey::RowId(10)).unwrap();
    assert_eq!(cell, Cell::table_interior(2, 10));

    let cell =
        Cell::promotion(PageType::IndexInterior, 2, CellKey::Value(Value::Int(10))).unwrap();
    assert_eq!(cell, Cell::index_interior(2, Value::Int(10)));

    assert!(Cell::promotion(PageType::TableInterior, 2, CellKey::Value(Value::Int(1))).is_err());
}

#[test]
fn test_key_ordering() {
    assert!(CellKey::RowId(1) < CellKey::RowId(2));
    assert!(CellKey::Value(Value::Int(2)) < CellKey::Value(Value::Text("a".to_string())));
    assert_eq!(
        CellKey::Value(Value::TinyInt(3)),
        CellKey::Value(Value::BigInt(3))
    );
}
