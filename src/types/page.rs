use byteorder::{BigEndian, ByteOrder};

use crate::{
    types::{
        CELL_COUNT_OFFSET, CHECKSUM_OFFSET, CONTENT_START_OFFSET, DIRECTORY_ENTRY_SIZE, NO_PAGE,
        PAGE_HEADER_SIZE, PAGE_TYPE_OFFSET, PARENT_PAGE_OFFSET, PageNumber, ROOT_PAGE_OFFSET,
        SIBLING_PAGE_OFFSET,
        cell::{Cell, CellKey},
        error::{DatabaseError, Result},
    },
    utils::hash::{page_checksum, verify_page_checksum},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    IndexInterior = 2,
    TableInterior = 5,
    IndexLeaf = 10,
    TableLeaf = 13,
}

impl PageType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            2 => Ok(PageType::IndexInterior),
            5 => Ok(PageType::TableInterior),
            10 => Ok(PageType::IndexLeaf),
            13 => Ok(PageType::TableLeaf),
            _ => Err(DatabaseError::InvalidPageType(value)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            PageType::IndexInterior => 2,
            PageType::TableInterior => 5,
            PageType::IndexLeaf => 10,
            PageType::TableLeaf => 13,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, PageType::TableLeaf | PageType::IndexLeaf)
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PageType::IndexLeaf | PageType::IndexInterior)
    }

    /// Interior page type of the same family.
    pub fn interior(&self) -> PageType {
        if self.is_index() {
            PageType::IndexInterior
        } else {
            PageType::TableInterior
        }
    }

    /// Leaf page type of the same family.
    pub fn leaf(&self) -> PageType {
        if self.is_index() {
            PageType::IndexLeaf
        } else {
            PageType::TableLeaf
        }
    }
}

/*
 * Page Layout on Disk
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                    PAGE HEADER (16 bytes)                       │
 * │  cell_count(2) | page_type(1) | reserved(1) | content_start(2) │
 * │  parent(2) | sibling(2) | root(2) | checksum(4)                │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                  CELL DIRECTORY                                 │
 * │  [offset0(2)] [offset1(2)] ...   sorted by cell key            │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    FREE SPACE                                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                   CELL DATA                                     │
 * │  [...cell N...] [...cell 2...] [...cell 1...] [...cell 0...]   │
 * └─────────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page_size: usize,
    pub page_number: PageNumber,
    pub page_type: PageType,
    pub root_page: PageNumber,
    pub parent_page: PageNumber,
    pub sibling_page: PageNumber,
    /// Kept sorted by cell key; equal keys keep insertion order.
    pub cells: Vec<Cell>,
}

impl Page {
    pub fn new(
        page_size: usize,
        page_number: PageNumber,
        page_type: PageType,
        root_page: PageNumber,
    ) -> Self {
        Self {
            page_size,
            page_number,
            page_type,
            root_page,
            parent_page: NO_PAGE,
            sibling_page: NO_PAGE,
            cells: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.page_type.is_leaf()
    }

    pub fn is_root(&self) -> bool {
        self.parent_page == NO_PAGE
    }

    /// Bytes available to the directory and cell area together.
    pub fn capacity(&self) -> usize {
        self.page_size.saturating_sub(PAGE_HEADER_SIZE)
    }

    pub fn used_space(&self) -> usize {
        self.cells
            .iter()
            .map(|cell| cell.len() + DIRECTORY_ENTRY_SIZE)
            .sum()
    }

    pub fn available_space(&self) -> usize {
        self.capacity().saturating_sub(self.used_space())
    }

    pub fn can_fit(&self, cell: &Cell) -> bool {
        self.available_space() >= cell.len() + DIRECTORY_ENTRY_SIZE
    }

    /// Insert a copy of `cell` at its key position. Fails with `PageFull`
    /// without touching the page when the cell would run into the directory.
    pub fn insert(&mut self, cell: &Cell) -> Result<usize> {
        self.check_cell_type(cell)?;
        if !self.can_fit(cell) {
            return Err(DatabaseError::PageFull {
                page_number: self.page_number,
            });
        }
        let index = self.insert_position(&cell.key());
        self.cells.insert(index, cell.clone());
        Ok(index)
    }

    /// Insert at an exact slot. Used where equal keys make the sorted
    /// position ambiguous.
    pub fn insert_at(&mut self, index: usize, cell: &Cell) -> Result<()> {
        self.check_cell_type(cell)?;
        if index > self.cells.len() {
            return Err(DatabaseError::InvalidData {
                details: format!(
                    "Slot {} is past the {} cells of page {}",
                    index,
                    self.cells.len(),
                    self.page_number
                ),
            });
        }
        if !self.can_fit(cell) {
            return Err(DatabaseError::PageFull {
                page_number: self.page_number,
            });
        }
        self.cells.insert(index, cell.clone());
        Ok(())
    }

    /// Slot a new cell with `key` takes: after every cell with an equal key.
    pub fn insert_position(&self, key: &CellKey) -> usize {
        self.cells.partition_point(|existing| existing.key() <= *key)
    }

    /// Replace the first cell with the same key.
    pub fn replace(&mut self, cell: Cell) -> Result<()> {
        self.check_cell_type(&cell)?;
        let key = cell.key();
        let index = self.find(&key).ok_or_else(|| DatabaseError::CellNotFound {
            key: key.to_string(),
        })?;
        let used_after = self.used_space() - self.cells[index].len() + cell.len();
        if used_after > self.capacity() {
            return Err(DatabaseError::PageFull {
                page_number: self.page_number,
            });
        }
        self.cells[index] = cell;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<Cell> {
        if index < self.cells.len() {
            Some(self.cells.remove(index))
        } else {
            None
        }
    }

    /// Index of the first cell whose key equals `key`.
    pub fn find(&self, key: &CellKey) -> Option<usize> {
        let index = self.cells.partition_point(|cell| cell.key() < *key);
        match self.cells.get(index) {
            Some(cell) if cell.key() == *key => Some(index),
            _ => None,
        }
    }

    pub fn get(&self, key: &CellKey) -> Option<&Cell> {
        self.find(key).map(|index| &self.cells[index])
    }

    pub fn truncate(&mut self) {
        self.cells.clear();
    }

    pub fn first_key(&self) -> Option<CellKey> {
        self.cells.first().map(Cell::key)
    }

    pub fn last_key(&self) -> Option<CellKey> {
        self.cells.last().map(Cell::key)
    }

    /// Route `key` through an interior page. Cells are walked from the largest
    /// key down; the walk stops at the first cell whose key is strictly less
    /// than `key`, and the left child of the last cell passed is the answer.
    /// With no cell passed the sibling pointer (the rightmost child) is used.
    pub fn find_child_page(&self, key: &CellKey) -> Result<PageNumber> {
        if self.is_leaf() {
            return Err(DatabaseError::InvalidPageType(self.page_type.as_u8()));
        }
        let mut child = self.sibling_page;
        for cell in self.cells.iter().rev() {
            if cell.key() < *key {
                break;
            }
            child = self.child_of(cell)?;
        }
        Ok(child)
    }

    /// Child that takes a new entry equal to `key` after every stored equal
    /// entry: the left child of the first cell with a larger key, else the
    /// sibling.
    pub fn find_insert_child(&self, key: &CellKey) -> Result<PageNumber> {
        if self.is_leaf() {
            return Err(DatabaseError::InvalidPageType(self.page_type.as_u8()));
        }
        match self.cells.iter().find(|cell| cell.key() > *key) {
            Some(cell) => self.child_of(cell),
            None => Ok(self.sibling_page),
        }
    }

    /// Slot of the reference to `child`: the index of the cell pointing at
    /// it, or the cell count when it is the sibling.
    pub fn child_slot(&self, child: PageNumber) -> Option<usize> {
        if self.is_leaf() {
            return None;
        }
        self.cells
            .iter()
            .position(|cell| cell.left_child_page() == Some(child))
            .or_else(|| (self.sibling_page == child).then_some(self.cells.len()))
    }

    /// Child holding the smallest keys.
    pub fn leftmost_child(&self) -> Result<PageNumber> {
        if self.is_leaf() {
            return Err(DatabaseError::InvalidPageType(self.page_type.as_u8()));
        }
        match self.cells.first() {
            Some(cell) => self.child_of(cell),
            None => Ok(self.sibling_page),
        }
    }

    /// Every child page referenced by an interior page.
    pub fn children(&self) -> Vec<PageNumber> {
        if self.is_leaf() {
            return Vec::new();
        }
        let mut children: Vec<PageNumber> =
            self.cells.iter().filter_map(Cell::left_child_page).collect();
        if self.sibling_page != NO_PAGE {
            children.push(self.sibling_page);
        }
        children
    }

    /// Point whichever reference targets `old` at `new` instead.
    pub fn redirect_child(&mut self, old: PageNumber, new: PageNumber) -> bool {
        if self.sibling_page == old {
            self.sibling_page = new;
            return true;
        }
        for cell in self.cells.iter_mut() {
            if cell.left_child_page() == Some(old) {
                cell.set_left_child_page(new);
                return true;
            }
        }
        false
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.used_space() > self.capacity() {
            return Err(DatabaseError::PageFull {
                page_number: self.page_number,
            });
        }
        let mut buffer = vec![0u8; self.page_size];
        let cell_count = self.cells.len() as u16;

        BigEndian::write_u16(&mut buffer[CELL_COUNT_OFFSET..], cell_count);
        buffer[PAGE_TYPE_OFFSET] = self.page_type.as_u8();
        BigEndian::write_u16(&mut buffer[PARENT_PAGE_OFFSET..], self.parent_page);
        BigEndian::write_u16(&mut buffer[SIBLING_PAGE_OFFSET..], self.sibling_page);
        BigEndian::write_u16(&mut buffer[ROOT_PAGE_OFFSET..], self.root_page);

        // Cells fill the block backward from its end, in directory order.
        let mut content_start = self.page_size;
        for (i, cell) in self.cells.iter().enumerate() {
            let bytes = cell.serialize()?;
            content_start -= bytes.len();
            buffer[content_start..content_start + bytes.len()].copy_from_slice(&bytes);
            let entry = PAGE_HEADER_SIZE + i * DIRECTORY_ENTRY_SIZE;
            BigEndian::write_u16(&mut buffer[entry..], content_start as u16);
        }
        BigEndian::write_u16(&mut buffer[CONTENT_START_OFFSET..], content_start as u16);

        let checksum = page_checksum(&buffer);
        BigEndian::write_u32(&mut buffer[CHECKSUM_OFFSET..], checksum);
        Ok(buffer)
    }

    pub fn deserialize(bytes: &[u8], page_number: PageNumber) -> Result<Self> {
        if bytes.len() < PAGE_HEADER_SIZE {
            return Err(DatabaseError::InvalidLength {
                what: "page",
                expected: PAGE_HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        if !verify_page_checksum(bytes) {
            return Err(DatabaseError::CorruptedPage {
                page_number,
                reason: "Checksum mismatch".to_string(),
            });
        }

        let page_size = bytes.len();
        let cell_count = BigEndian::read_u16(&bytes[CELL_COUNT_OFFSET..]) as usize;
        let page_type = PageType::from_u8(bytes[PAGE_TYPE_OFFSET])?;
        let parent_page = BigEndian::read_u16(&bytes[PARENT_PAGE_OFFSET..]);
        let sibling_page = BigEndian::read_u16(&bytes[SIBLING_PAGE_OFFSET..]);
        let root_page = BigEndian::read_u16(&bytes[ROOT_PAGE_OFFSET..]);

        let directory_end = PAGE_HEADER_SIZE + cell_count * DIRECTORY_ENTRY_SIZE;
        if directory_end > page_size {
            return Err(DatabaseError::CorruptedPage {
                page_number,
                reason: format!("Directory of {} cells exceeds the page", cell_count),
            });
        }

        let mut cells = Vec::with_capacity(cell_count);
        for i in 0..cell_count {
            let entry = PAGE_HEADER_SIZE + i * DIRECTORY_ENTRY_SIZE;
            let offset = BigEndian::read_u16(&bytes[entry..]) as usize;
            if offset < directory_end || offset >= page_size {
                return Err(DatabaseError::CorruptedPage {
                    page_number,
                    reason: format!("Cell offset {} outside the cell area", offset),
                });
            }
            let (cell, _) = Cell::deserialize(page_type, &bytes[offset..])?;
            cells.push(cell);
        }

        Ok(Page {
            page_size,
            page_number,
            page_type,
            root_page,
            parent_page,
            sibling_page,
            cells,
        })
    }

    fn child_of(&self, cell: &Cell) -> Result<PageNumber> {
        cell.left_child_page()
            .ok_or_else(|| DatabaseError::CorruptedPage {
                page_number: self.page_number,
                reason: "Interior page holds a cell without a child pointer".to_string(),
            })
    }

    fn check_cell_type(&self, cell: &Cell) -> Result<()> {
        if cell.page_type() != self.page_type {
            return Err(DatabaseError::InvalidData {
                details: format!(
                    "Cannot store a {:?} cell in {:?} page {}",
                    cell.page_type(),
                    self.page_type,
                    self.page_number
                ),
            });
        }
        Ok(())
    }
}
