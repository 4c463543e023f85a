//! Cell codec.
//!
//! A cell is one record (leaf) or routing entry (interior) inside a page.
//! Every cell is a fixed-width [`CellHeader`] followed by an optional
//! variable-width payload:
//!
//! ```text
//! table leaf      size(2) | rowid(4)           | deletion_flag | column_count | type_codes.. | body..
//! table interior  left_child(2) | rowid(4)
//! index leaf      size(2)                      | key_code | key.. | pointer_code | pointer..
//! index interior  left_child(2) | size(2)      | key_code | key..
//! ```
//!
//! All integers are big-endian.

use std::{cmp::Ordering, fmt};

use byteorder::{BigEndian, ByteOrder};

use crate::types::{
    PageNumber, RowId,
    error::{DatabaseError, Result},
    page::PageType,
    value::{Value, type_code_width},
};

/// Natural key of a cell: the rowid for table cells, the indexed value for
/// index cells.
#[derive(Debug, Clone)]
pub enum CellKey {
    RowId(RowId),
    Value(Value),
}

impl PartialEq for CellKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellKey {}

impl PartialOrd for CellKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CellKey::RowId(a), CellKey::RowId(b)) => a.cmp(b),
            (CellKey::Value(a), CellKey::Value(b)) => a.compare(b),
            (CellKey::RowId(_), CellKey::Value(_)) => Ordering::Less,
            (CellKey::Value(_), CellKey::RowId(_)) => Ordering::Greater,
        }
    }
}

impl From<RowId> for CellKey {
    fn from(row_id: RowId) -> Self {
        CellKey::RowId(row_id)
    }
}

impl From<Value> for CellKey {
    fn from(value: Value) -> Self {
        CellKey::Value(value)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKey::RowId(row_id) => write!(f, "rowid {}", row_id),
            CellKey::Value(value) => write!(f, "'{}'", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellHeader {
    /// Payload size in bytes; always 0 for table interior cells.
    pub size: u16,
    pub left_child_page: Option<PageNumber>,
    pub row_id: Option<RowId>,
}

impl CellHeader {
    pub fn width(page_type: PageType) -> usize {
        match page_type {
            PageType::TableLeaf => 6,
            PageType::TableInterior => 6,
            PageType::IndexLeaf => 2,
            PageType::IndexInterior => 4,
        }
    }

    pub fn serialize(&self, page_type: PageType) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; Self::width(page_type)];
        match page_type {
            PageType::TableLeaf => {
                BigEndian::write_u16(&mut buffer[0..2], self.size);
                BigEndian::write_i32(&mut buffer[2..6], self.require_row_id()?);
            }
            PageType::TableInterior => {
                BigEndian::write_u16(&mut buffer[0..2], self.require_left_child()?);
                BigEndian::write_i32(&mut buffer[2..6], self.require_row_id()?);
            }
            PageType::IndexLeaf => {
                BigEndian::write_u16(&mut buffer[0..2], self.size);
            }
            PageType::IndexInterior => {
                BigEndian::write_u16(&mut buffer[0..2], self.require_left_child()?);
                BigEndian::write_u16(&mut buffer[2..4], self.size);
            }
        }
        Ok(buffer)
    }

    pub fn deserialize(page_type: PageType, bytes: &[u8]) -> Result<Self> {
        let expected = Self::width(page_type);
        if bytes.len() != expected {
            return Err(DatabaseError::InvalidLength {
                what: "cell header",
                expected,
                actual: bytes.len(),
            });
        }

        let header = match page_type {
            PageType::TableLeaf => CellHeader {
                size: BigEndian::read_u16(&bytes[0..2]),
                left_child_page: None,
                row_id: Some(BigEndian::read_i32(&bytes[2..6])),
            },
            PageType::TableInterior => CellHeader {
                size: 0,
                left_child_page: Some(BigEndian::read_u16(&bytes[0..2])),
                row_id: Some(BigEndian::read_i32(&bytes[2..6])),
            },
            PageType::IndexLeaf => CellHeader {
                size: BigEndian::read_u16(&bytes[0..2]),
                left_child_page: None,
                row_id: None,
            },
            PageType::IndexInterior => CellHeader {
                size: BigEndian::read_u16(&bytes[2..4]),
                left_child_page: Some(BigEndian::read_u16(&bytes[0..2])),
                row_id: None,
            },
        };
        Ok(header)
    }

    fn require_row_id(&self) -> Result<RowId> {
        self.row_id.ok_or_else(|| DatabaseError::SerializationError {
            details: "Cell header is missing its rowid".to_string(),
        })
    }

    fn require_left_child(&self) -> Result<PageNumber> {
        self.left_child_page
            .ok_or_else(|| DatabaseError::SerializationError {
                details: "Cell header is missing its left child page".to_string(),
            })
    }
}

/// Payload of a table leaf cell. The body is kept packed; splitting it into
/// column values is the row codec's job.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCellPayload {
    pub deletion_flag: u8,
    pub column_count: u8,
    pub type_codes: Vec<u8>,
    pub body: Vec<u8>,
}

impl TableCellPayload {
    pub fn new(type_codes: Vec<u8>, body: Vec<u8>) -> Result<Self> {
        let column_count = u8::try_from(type_codes.len()).map_err(|_| {
            DatabaseError::InvalidData {
                details: format!("{} columns exceed the 255 column limit", type_codes.len()),
            }
        })?;
        Ok(Self {
            deletion_flag: 0,
            column_count,
            type_codes,
            body,
        })
    }

    pub fn exists(&self) -> bool {
        self.deletion_flag == 0
    }

    pub fn mark_deleted(&mut self) {
        self.deletion_flag = 1;
    }

    pub fn len(&self) -> usize {
        2 + self.type_codes.len() + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.len());
        buffer.push(self.deletion_flag);
        buffer.push(self.column_count);
        buffer.extend_from_slice(&self.type_codes);
        buffer.extend_from_slice(&self.body);
        buffer
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(DatabaseError::InvalidLength {
                what: "table payload metadata",
                expected: 2,
                actual: bytes.len(),
            });
        }
        let deletion_flag = bytes[0];
        let column_count = bytes[1];
        let codes_end = 2 + column_count as usize;
        if bytes.len() < codes_end {
            return Err(DatabaseError::InvalidLength {
                what: "table payload type codes",
                expected: codes_end,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            deletion_flag,
            column_count,
            type_codes: bytes[2..codes_end].to_vec(),
            body: bytes[codes_end..].to_vec(),
        })
    }
}

/// Payload of an index cell: the indexed value and, on leaves, the primary
/// key value (or rowid) of the row it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCellPayload {
    pub key: Value,
    pub pointer: Option<Value>,
}

impl IndexCellPayload {
    pub fn len(&self) -> usize {
        let mut len = 1 + self.key.size();
        if let Some(pointer) = &self.pointer {
            len += 1 + pointer.size();
        }
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.len());
        buffer.push(self.key.type_code()?);
        buffer.extend_from_slice(&self.key.to_bytes()?);
        if let Some(pointer) = &self.pointer {
            buffer.push(pointer.type_code()?);
            buffer.extend_from_slice(&pointer.to_bytes()?);
        }
        Ok(buffer)
    }

    pub fn deserialize(bytes: &[u8], with_pointer: bool) -> Result<Self> {
        let (key, consumed) = Self::read_value(bytes)?;
        let (pointer, consumed) = if with_pointer {
            let (pointer, used) = Self::read_value(&bytes[consumed..])?;
            (Some(pointer), consumed + used)
        } else {
            (None, consumed)
        };
        if consumed != bytes.len() {
            return Err(DatabaseError::InvalidLength {
                what: "index payload",
                expected: consumed,
                actual: bytes.len(),
            });
        }
        Ok(Self { key, pointer })
    }

    fn read_value(bytes: &[u8]) -> Result<(Value, usize)> {
        let Some(&code) = bytes.first() else {
            return Err(DatabaseError::InvalidLength {
                what: "index payload type code",
                expected: 1,
                actual: 0,
            });
        };
        let width = type_code_width(code)?;
        if bytes.len() < 1 + width {
            return Err(DatabaseError::InvalidLength {
                what: "index payload value",
                expected: 1 + width,
                actual: bytes.len(),
            });
        }
        let value = Value::from_bytes(code, &bytes[1..1 + width])?;
        Ok((value, 1 + width))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableLeafCell {
    pub row_id: RowId,
    pub payload: TableCellPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableInteriorCell {
    pub left_child_page: PageNumber,
    pub row_id: RowId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexLeafCell {
    pub payload: IndexCellPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexInteriorCell {
    pub left_child_page: PageNumber,
    pub key: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    TableLeaf(TableLeafCell),
    TableInterior(TableInteriorCell),
    IndexLeaf(IndexLeafCell),
    IndexInterior(IndexInteriorCell),
}

impl Cell {
    pub fn table_leaf(row_id: RowId, payload: TableCellPayload) -> Self {
        Cell::TableLeaf(TableLeafCell { row_id, payload })
    }

    pub fn table_interior(left_child_page: PageNumber, row_id: RowId) -> Self {
        Cell::TableInterior(TableInteriorCell {
            left_child_page,
            row_id,
        })
    }

    pub fn index_leaf(key: Value, pointer: Value) -> Self {
        Cell::IndexLeaf(IndexLeafCell {
            payload: IndexCellPayload {
                key,
                pointer: Some(pointer),
            },
        })
    }

    pub fn index_interior(left_child_page: PageNumber, key: Value) -> Self {
        Cell::IndexInterior(IndexInteriorCell {
            left_child_page,
            key,
        })
    }

    /// Build the routing cell an interior page of `page_type` stores for a
    /// split boundary.
    pub fn promotion(page_type: PageType, left_child_page: PageNumber, key: CellKey) -> Result<Self> {
        match (page_type, key) {
            (PageType::TableInterior, CellKey::RowId(row_id)) => {
                Ok(Cell::table_interior(left_child_page, row_id))
            }
            (PageType::IndexInterior, CellKey::Value(value)) => {
                Ok(Cell::index_interior(left_child_page, value))
            }
            (page_type, key) => Err(DatabaseError::InvalidData {
                details: format!("Cannot promote {} into a {:?} page", key, page_type),
            }),
        }
    }

    pub fn page_type(&self) -> PageType {
        match self {
            Cell::TableLeaf(_) => PageType::TableLeaf,
            Cell::TableInterior(_) => PageType::TableInterior,
            Cell::IndexLeaf(_) => PageType::IndexLeaf,
            Cell::IndexInterior(_) => PageType::IndexInterior,
        }
    }

    pub fn key(&self) -> CellKey {
        match self {
            Cell::TableLeaf(cell) => CellKey::RowId(cell.row_id),
            Cell::TableInterior(cell) => CellKey::RowId(cell.row_id),
            Cell::IndexLeaf(cell) => CellKey::Value(cell.payload.key.clone()),
            Cell::IndexInterior(cell) => CellKey::Value(cell.key.clone()),
        }
    }

    pub fn row_id(&self) -> Option<RowId> {
        match self {
            Cell::TableLeaf(cell) => Some(cell.row_id),
            Cell::TableInterior(cell) => Some(cell.row_id),
            _ => None,
        }
    }

    /// False for tombstoned table rows.
    pub fn exists(&self) -> bool {
        match self {
            Cell::TableLeaf(cell) => cell.payload.exists(),
            _ => true,
        }
    }

    pub fn mark_deleted(&mut self) -> bool {
        match self {
            Cell::TableLeaf(cell) => {
                cell.payload.mark_deleted();
                true
            }
            _ => false,
        }
    }

    pub fn left_child_page(&self) -> Option<PageNumber> {
        match self {
            Cell::TableInterior(cell) => Some(cell.left_child_page),
            Cell::IndexInterior(cell) => Some(cell.left_child_page),
            _ => None,
        }
    }

    pub fn set_left_child_page(&mut self, page_number: PageNumber) {
        match self {
            Cell::TableInterior(cell) => cell.left_child_page = page_number,
            Cell::IndexInterior(cell) => cell.left_child_page = page_number,
            _ => {}
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Cell::TableLeaf(cell) => cell.payload.len(),
            Cell::TableInterior(_) => 0,
            Cell::IndexLeaf(cell) => cell.payload.len(),
            Cell::IndexInterior(cell) => 1 + cell.key.size(),
        }
    }

    /// Serialized size in bytes, header included.
    pub fn len(&self) -> usize {
        CellHeader::width(self.page_type()) + self.payload_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn header(&self) -> Result<CellHeader> {
        let size = u16::try_from(self.payload_len()).map_err(|_| DatabaseError::InvalidData {
            details: format!("Cell payload of {} bytes is too large", self.payload_len()),
        })?;
        Ok(CellHeader {
            size,
            left_child_page: self.left_child_page(),
            row_id: self.row_id(),
        })
    }

    pub fn payload(&self) -> Result<Option<Vec<u8>>> {
        match self {
            Cell::TableLeaf(cell) => Ok(Some(cell.payload.serialize())),
            Cell::TableInterior(_) => Ok(None),
            Cell::IndexLeaf(cell) => cell.payload.serialize().map(Some),
            Cell::IndexInterior(cell) => IndexCellPayload {
                key: cell.key.clone(),
                pointer: None,
            }
            .serialize()
            .map(Some),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buffer = self.header()?.serialize(self.page_type())?;
        if let Some(payload) = self.payload()? {
            buffer.extend_from_slice(&payload);
        }
        Ok(buffer)
    }

    /// Parse the cell starting at `bytes[0]`, returning it and its length.
    pub fn deserialize(page_type: PageType, bytes: &[u8]) -> Result<(Self, usize)> {
        let header_width = CellHeader::width(page_type);
        if bytes.len() < header_width {
            return Err(DatabaseError::InvalidLength {
                what: "cell",
                expected: header_width,
                actual: bytes.len(),
            });
        }
        let header = CellHeader::deserialize(page_type, &bytes[..header_width])?;
        let end = header_width + header.size as usize;
        if bytes.len() < end {
            return Err(DatabaseError::InvalidLength {
                what: "cell payload",
                expected: end,
                actual: bytes.len(),
            });
        }
        let payload = &bytes[header_width..end];

        let cell = match page_type {
            PageType::TableLeaf => Cell::TableLeaf(TableLeafCell {
                row_id: header.require_row_id()?,
                payload: TableCellPayload::deserialize(payload)?,
            }),
            PageType::TableInterior => Cell::TableInterior(TableInteriorCell {
                left_child_page: header.require_left_child()?,
                row_id: header.require_row_id()?,
            }),
            PageType::IndexLeaf => Cell::IndexLeaf(IndexLeafCell {
                payload: IndexCellPayload::deserialize(payload, true)?,
            }),
            PageType::IndexInterior => Cell::IndexInterior(IndexInteriorCell {
                left_child_page: header.require_left_child()?,
                key: IndexCellPayload::deserialize(payload, false)?.key,
            }),
        };
        Ok((cell, end))
    }
}
