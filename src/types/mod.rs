pub mod cell;
pub mod error;
pub mod page;
pub mod row;
pub mod value;

// Common type aliases
pub type PageNumber = u16;
pub type RowId = i32;

/// Sentinel for "no sibling" and "no parent" (the latter marks the root).
pub const NO_PAGE: PageNumber = 0xFFFF;

pub const DEFAULT_PAGE_SIZE: usize = 512;
pub const MIN_PAGE_SIZE: usize = 512;
pub const MAX_PAGE_SIZE: usize = 32768;

// Page header layout (big-endian)
pub const PAGE_HEADER_SIZE: usize = 16;
pub const CELL_COUNT_OFFSET: usize = 0;
pub const PAGE_TYPE_OFFSET: usize = 2;
pub const CONTENT_START_OFFSET: usize = 4;
pub const PARENT_PAGE_OFFSET: usize = 6;
pub const SIBLING_PAGE_OFFSET: usize = 8;
pub const ROOT_PAGE_OFFSET: usize = 10;
pub const CHECKSUM_OFFSET: usize = 12;
pub const CHECKSUM_SIZE: usize = 4;

pub const DIRECTORY_ENTRY_SIZE: usize = 2;

/// Type codes above this value encode TEXT of `code - TEXT_TYPE_CODE` bytes.
pub const TEXT_TYPE_CODE: u8 = 12;
pub const MAX_TEXT_LENGTH: usize = (u8::MAX - TEXT_TYPE_CODE) as usize;
