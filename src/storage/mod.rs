pub mod bplus_tree;
pub mod catalog;
pub mod index;
pub mod schema;
pub mod storage_manager;
pub mod table;

use std::path::{Path, PathBuf};

pub const TABLE_FILE_EXTENSION: &str = "tbl";
pub const INDEX_FILE_EXTENSION: &str = "idx";

pub const TABLES_CATALOG: &str = "lumbung_tables";
pub const COLUMNS_CATALOG: &str = "lumbung_columns";

pub fn is_system_table(name: &str) -> bool {
    name == TABLES_CATALOG || name == COLUMNS_CATALOG
}

pub fn table_file_path(dir: &Path, table_name: &str) -> PathBuf {
    dir.join(format!("{}.{}", table_name, TABLE_FILE_EXTENSION))
}

pub fn index_file_path(dir: &Path, table_name: &str, column: &str) -> PathBuf {
    dir.join(format!("{}_{}.{}", table_name, column, INDEX_FILE_EXTENSION))
}
