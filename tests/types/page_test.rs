use lumbung::types::{
    NO_PAGE, PAGE_HEADER_SIZE,
    cell::{Cell, CellKey, TableCellPayload},
    error::DatabaseError,
    page::{Page, PageType},
    value::Value,
};

/// Table leaf cell whose encoded size is exactly 30 bytes: header 6, metadata
/// 2, two type codes, INT 4 and 16 characters of TEXT.
fn record(row_id: i32) -> Cell {
    let text = format!("{:0>16}", row_id);
    let mut body = row_id.to_be_bytes().to_vec();
    body.extend_from_slice(text.as_bytes());
    Cell::table_leaf(row_id, TableCellPayload::new(vec![3, 12 + 16], body).unwrap())
}

fn filled_leaf(page_size: usize, count: i32) -> Page {
    let mut page = Page::new(page_size, 0, PageType::TableLeaf, 0);
    for row_id in 0..count {
        page.insert(&record(row_id)).unwrap();
    }
    page
}

#[test]
fn test_new_page_defaults() {
    let page = Page::new(512, 3, PageType::TableLeaf, 0);
    assert_eq!(page.parent_page, NO_PAGE);
    assert_eq!(page.sibling_page, NO_PAGE);
    assert!(page.is_root());
    assert!(page.is_leaf());
    assert_eq!(page.capacity(), 512 - PAGE_HEADER_SIZE);
}

#[test]
fn test_header_layout() {
    let mut page = filled_leaf(512, 2);
    page.parent_page = 7;
    page.sibling_page = 8;
    page.root_page = 9;
    let bytes = page.serialize().unwrap();

    assert_eq!(bytes.len(), 512);
    assert_eq!(&bytes[0..2], &[0, 2]);
    assert_eq!(bytes[2], 13);
    assert_eq!(&bytes[6..8], &[0, 7]);
    assert_eq!(&bytes[8..10], &[0, 8]);
    assert_eq!(&bytes[10..12], &[0, 9]);

    // Cells are packed against the end of the block
    let first_offset = u16::from_be_bytes([bytes[16], bytes[17]]) as usize;
    let second_offset = u16::from_be_bytes([bytes[18], bytes[19]]) as usize;
    assert_eq!(first_offset, 512 - 30);
    assert_eq!(second_offset, 512 - 60);
    let content_start = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
    assert_eq!(content_start, second_offset);
}

#[test]
fn test_page_round_trip_for_every_type() {
    let mut table_leaf = filled_leaf(1024, 10);
    table_leaf.sibling_page = 4;

    let mut table_interior = Page::new(512, 1, PageType::TableInterior, 1);
    for (child, key) in [(2, 10), (3, 20), (4, 30)] {
        table_interior.insert(&Cell::table_interior(child, key)).unwrap();
    }
    table_interior.sibling_page = 5;

    let mut index_leaf = Page::new(2048, 2, PageType::IndexLeaf, 0);
    for name in ["delta", "alpha", "charlie", "bravo"] {
        index_leaf
            .insert(&Cell::index_leaf(Value::Text(name.to_string()), Value::Int(1)))
            .unwrap();
    }

    let mut index_interior = Page::new(512, 6, PageType::IndexInterior, 6);
    index_interior
        .insert(&Cell::index_interior(0, Value::Text("m".to_string())))
        .unwrap();
    index_interior.sibling_page = 1;

    let empty = Page::new(4096, 0, PageType::TableLeaf, 0);

    for page in [table_leaf, table_interior, index_leaf, index_interior, empty] {
        let bytes = page.serialize().unwrap();
        assert_eq!(bytes.len(), page.page_size);
        let decoded = Page::deserialize(&bytes, page.page_number).unwrap();
        assert_eq!(decoded, page);
    }
}

#[test]
fn test_cells_stay_sorted_by_key() {
    let mut page = Page::new(512, 0, PageType::TableLeaf, 0);
    for row_id in [5, 1, 3, 2, 4] {
        page.insert(&record(row_id)).unwrap();
    }
    let keys: Vec<CellKey> = page.cells.iter().map(Cell::key).collect();
    let expected: Vec<CellKey> = (1..=5).map(CellKey::RowId).collect();
    assert_eq!(keys, expected);

    let decoded = Page::deserialize(&page.serialize().unwrap(), 0).unwrap();
    assert_eq!(decoded.first_key(), Some(CellKey::RowId(1)));
    assert_eq!(decoded.last_key(), Some(CellKey::RowId(5)));
}

#[test]
fn test_capacity_of_512_byte_leaf() {
    assert_eq!(record(0).len(), 30);
    // (512 - 16) / (30 + 2) = 15 records
    let mut page = filled_leaf(512, 15);
    assert_eq!(page.cells.len(), 15);
    assert_eq!(page.available_space(), 496 - 15 * 32);

    let result = page.insert(&record(15));
    assert!(matches!(result, Err(DatabaseError::PageFull { page_number: 0 })));
    assert_eq!(page.cells.len(), 15);

    // A full page still serializes
    let decoded = Page::deserialize(&page.serialize().unwrap(), 0).unwrap();
    assert_eq!(decoded.cells.len(), 15);
}

#[test]
fn test_insert_rejects_foreign_cell_type() {
    let mut page = Page::new(512, 0, PageType::TableLeaf, 0);
    assert!(page.insert(&Cell::table_interior(1, 1)).is_err());
}

#[test]
fn test_truncate_clears_cells() {
    let mut page = filled_leaf(512, 4);
    page.sibling_page = 2;
    page.truncate();
    assert!(page.cells.is_empty());
    assert_eq!(page.sibling_page, 2);
    assert_eq!(page.available_space(), page.capacity());
}

#[test]
fn test_find_child_page_routing() {
    // keys <= 10 -> 2, <= 20 -> 3, above -> sibling 4
    let mut page = Page::new(512, 1, PageType::TableInterior, 1);
    page.insert(&Cell::table_interior(2, 10)).unwrap();
    page.insert(&Cell::table_interior(3, 20)).unwrap();
    page.sibling_page = 4;

    assert_eq!(page.find_child_page(&CellKey::RowId(0)).unwrap(), 2);
    assert_eq!(page.find_child_page(&CellKey::RowId(10)).unwrap(), 2);
    assert_eq!(page.find_child_page(&CellKey::RowId(11)).unwrap(), 3);
    assert_eq!(page.find_child_page(&CellKey::RowId(20)).unwrap(), 3);
    assert_eq!(page.find_child_page(&CellKey::RowId(21)).unwrap(), 4);
    assert_eq!(page.leftmost_child().unwrap(), 2);
    assert_eq!(page.children(), vec![2, 3, 4]);

    let leaf = Page::new(512, 0, PageType::TableLeaf, 0);
    assert!(leaf.find_child_page(&CellKey::RowId(1)).is_err());
}

#[test]
fn test_redirect_child() {
    let mut page = Page::new(512, 1, PageType::TableInterior, 1);
    page.insert(&Cell::table_interior(2, 10)).unwrap();
    page.sibling_page = 4;

    assert!(page.redirect_child(4, 7));
    assert_eq!(page.sibling_page, 7);
    assert!(page.redirect_child(2, 8));
    assert_eq!(page.cells[0].left_child_page(), Some(8));
    assert!(!page.redirect_child(99, 1));
}

#[test]
fn test_replace_and_find() {
    let mut page = filled_leaf(512, 3);
    let mut updated = record(1);
    updated.mark_deleted();
    page.replace(updated.clone()).unwrap();
    assert_eq!(page.get(&CellKey::RowId(1)), Some(&updated));
    assert!(page.find(&CellKey::RowId(9)).is_none());
    assert!(matches!(
        page.replace(record(9)),
        Err(DatabaseError::CellNotFound { .. })
    ));
}

#[test]
fn test_deserialize_detects_corruption() {
    let page = filled_leaf(512, 3);
    let mut bytes = page.serialize().unwrap();
    bytes[500] ^= 0xFF;
    assert!(matches!(
        Page::deserialize(&bytes, 0),
        Err(DatabaseError::CorruptedPage { page_number: 0, .. })
    ));
}

#[test]
fn test_deserialize_rejects_unknown_page_type() {
    let page = Page::new(512, 0, PageType::TableLeaf, 0);
    let mut bytes = page.serialize().unwrap();
    bytes[2] = 42;
    // Re-seal the checksum so only the type is wrong
    let checksum = lumbung::utils::hash::page_checksum(&bytes);
    bytes[12..16].copy_from_slice(&checksum.to_be_bytes());
    assert!(matches!(
        Page::deserialize(&bytes, 0),
        Err(DatabaseError::InvalidPageType(42))
    ));
}

#[test]
fn test_deserialize_rejects_short_block() {
    assert!(matches!(
        Page::deserialize(&[0u8; 8], 0),
        Err(DatabaseError::InvalidLength { .. })
    ));
}
