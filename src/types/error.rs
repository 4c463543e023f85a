use thiserror::Error;

use crate::types::PageNumber;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page is full (page_number: {page_number})")]
    PageFull { page_number: PageNumber },

    #[error("Cell of {size} bytes can never fit a page with {capacity} usable bytes")]
    CellTooLarge { size: usize, capacity: usize },

    #[error("Cell not found for key {key}")]
    CellNotFound { key: String },

    #[error("Invalid {what} length: expected {expected} bytes, got {actual} bytes")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Serialization/deserialization error: {details}")]
    SerializationError { details: String },

    #[error("Invalid page type: {0}")]
    InvalidPageType(u8),

    #[error("Unknown type code: {0}")]
    UnknownTypeCode(u8),

    #[error("Invalid page size: {0} bytes")]
    InvalidPageSize(usize),

    #[error("Corrupted page: page_number={page_number}, reason={reason}")]
    CorruptedPage {
        page_number: PageNumber,
        reason: String,
    },

    #[error("Table '{name}' not found")]
    TableNotFound { name: String },

    #[error("Table '{name}' already exists")]
    TableExists { name: String },

    #[error("Column '{name}' not found in table '{table}'")]
    ColumnNotFound { name: String, table: String },

    #[error("Index '{name}' not found")]
    IndexNotFound { name: String },

    #[error("Index '{name}' already exists")]
    IndexExists { name: String },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Constraint violation: {details}")]
    ConstraintViolation { details: String },

    #[error("Invalid data: {details}")]
    InvalidData { details: String },

    #[error("'{name}' is a system table")]
    SystemTable { name: String },

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
