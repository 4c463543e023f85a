use std::path::Path;

use log::debug;

use crate::{
    storage::{bplus_tree::BPlusTree, index_file_path},
    types::{
        cell::Cell,
        error::Result,
        page::PageType,
        value::Value,
    },
};

/// A secondary index over one column: a B+Tree of `(value, pointer)` leaf
/// cells, where the pointer is the row's primary key value or, for tables
/// without one, its rowid.
pub struct SecondaryIndex {
    table_name: String,
    column: String,
    tree: BPlusTree,
}

impl SecondaryIndex {
    pub fn create(dir: &Path, table_name: &str, column: &str, page_size: usize) -> Result<Self> {
        let path = index_file_path(dir, table_name, column);
        let tree = BPlusTree::create(&path, page_size, PageType::IndexLeaf)?;
        debug!("Created index on {}.{}", table_name, column);
        Ok(Self {
            table_name: table_name.to_string(),
            column: column.to_string(),
            tree,
        })
    }

    pub fn open(dir: &Path, table_name: &str, column: &str, page_size: usize) -> Result<Self> {
        let path = index_file_path(dir, table_name, column);
        let tree = BPlusTree::open(&path, page_size)?;
        Ok(Self {
            table_name: table_name.to_string(),
            column: column.to_string(),
            tree,
        })
    }

    /// `<table>_<column>`, the name the file is stored under.
    pub fn default_name(&self) -> String {
        format!("{}_{}", self.table_name, self.column)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn path(&self) -> &Path {
        self.tree.path()
    }

    pub fn tree(&mut self) -> &mut BPlusTree {
        &mut self.tree
    }

    /// NULL keys are not indexed.
    pub fn insert(&mut self, key: Value, pointer: Value) -> Result<()> {
        if key.is_null() {
            return Ok(());
        }
        self.tree.insert(Cell::index_leaf(key, pointer))
    }

    pub fn remove(&mut self, key: &Value, pointer: &Value) -> Result<bool> {
        if key.is_null() {
            return Ok(false);
        }
        self.tree.remove_entry(key, pointer)
    }

    pub fn entries(&mut self) -> Result<Vec<(Value, Value)>> {
        self.tree.entries()
    }

    pub fn truncate(&mut self) -> Result<()> {
        self.tree.truncate()
    }
}
