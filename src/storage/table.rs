use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    storage::{
        bplus_tree::BPlusTree, index::SecondaryIndex, index_file_path, schema::TableSchema,
        table_file_path,
    },
    types::{
        PageNumber, RowId,
        cell::{Cell, CellHeader, CellKey},
        error::{DatabaseError, Result},
        page::PageType,
        row::Row,
        value::Value,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub record_count: usize,
    pub avg_length: usize,
    pub root_page: PageNumber,
}

/// A table file plus the secondary index files hanging off it.
///
/// Reads are always full scans of the main tree. Indexes are kept in step on
/// every write but are not used to answer queries.
pub struct Table {
    schema: TableSchema,
    dir: PathBuf,
    page_size: usize,
    tree: BPlusTree,
    /// Keyed by column name.
    indexes: BTreeMap<String, SecondaryIndex>,
    next_row_id: RowId,
    /// Live rows and their summed payload bytes, kept in step with writes.
    live_rows: usize,
    payload_bytes: usize,
}

impl Table {
    pub fn create(dir: &Path, schema: TableSchema, page_size: usize) -> Result<Self> {
        Self::create_with_first_row_id(dir, schema, page_size, 0)
    }

    pub fn create_with_first_row_id(
        dir: &Path,
        schema: TableSchema,
        page_size: usize,
        first_row_id: RowId,
    ) -> Result<Self> {
        schema.validate()?;
        let path = table_file_path(dir, &schema.table_name);
        if path.exists() {
            return Err(DatabaseError::TableExists {
                name: schema.table_name.clone(),
            });
        }
        let tree = BPlusTree::create(&path, page_size, PageType::TableLeaf)?;
        info!("Created table '{}' at {}", schema.table_name, path.display());
        Ok(Self {
            schema,
            dir: dir.to_path_buf(),
            page_size,
            tree,
            indexes: BTreeMap::new(),
            next_row_id: first_row_id,
            live_rows: 0,
            payload_bytes: 0,
        })
    }

    /// Open an existing table. Index files named after one of the schema's
    /// columns are opened along with it.
    pub fn open(dir: &Path, schema: TableSchema, page_size: usize) -> Result<Self> {
        let path = table_file_path(dir, &schema.table_name);
        if !path.exists() {
            return Err(DatabaseError::TableNotFound {
                name: schema.table_name.clone(),
            });
        }
        let mut tree = BPlusTree::open(&path, page_size)?;
        let next_row_id = match tree.max_row_id()? {
            Some(max) => max.checked_add(1).ok_or_else(|| DatabaseError::InvalidData {
                details: format!("Table '{}' has exhausted its rowids", schema.table_name),
            })?,
            None => 0,
        };

        let live = tree.search_all()?;
        let payload_bytes = live.iter().map(payload_len).sum();

        let mut indexes = BTreeMap::new();
        for column in &schema.columns {
            if index_file_path(dir, &schema.table_name, &column.name).exists() {
                let index = SecondaryIndex::open(dir, &schema.table_name, &column.name, page_size)?;
                indexes.insert(column.name.clone(), index);
            }
        }

        debug!(
            "Opened table '{}' with {} index(es), next rowid {}",
            schema.table_name,
            indexes.len(),
            next_row_id
        );
        Ok(Self {
            schema,
            dir: dir.to_path_buf(),
            page_size,
            tree,
            indexes,
            next_row_id,
            live_rows: live.len(),
            payload_bytes,
        })
    }

    pub fn name(&self) -> &str {
        &self.schema.table_name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        self.tree.path()
    }

    pub fn next_row_id(&self) -> RowId {
        self.next_row_id
    }

    pub fn tree(&mut self) -> &mut BPlusTree {
        &mut self.tree
    }

    /// Insert a row given as column name → value. Unnamed columns are NULL.
    pub fn insert(&mut self, values: &HashMap<String, Value>) -> Result<RowId> {
        let row = self.schema.row_from_values(values)?;
        self.insert_row(row.values)
    }

    /// Insert a row given positionally in schema order.
    pub fn insert_row(&mut self, values: Vec<Value>) -> Result<RowId> {
        if values.len() != self.schema.columns.len() {
            return Err(DatabaseError::InvalidData {
                details: format!(
                    "Table '{}' expects {} values, got {}",
                    self.name(),
                    self.schema.columns.len(),
                    values.len()
                ),
            });
        }
        let mut coerced = Vec::with_capacity(values.len());
        for (value, column) in values.into_iter().zip(&self.schema.columns) {
            coerced.push(value.coerce_to(column.data_type)?);
        }
        let mut row = Row::new(coerced);
        self.schema.validate_row(&row)?;
        self.check_unique(&[&row], &[], None)?;

        let row_id = self.next_row_id;
        row.row_id = Some(row_id);
        let cell = row.to_cell(&self.schema.columns)?;
        let size = payload_len(&cell);
        self.tree.insert(cell)?;
        self.live_rows += 1;
        self.payload_bytes += size;
        self.next_row_id = row_id.checked_add(1).ok_or_else(|| DatabaseError::InvalidData {
            details: format!("Table '{}' has exhausted its rowids", self.name()),
        })?;

        let pointer = self.pointer_for(&row);
        for (column, index) in self.indexes.iter_mut() {
            let position = self.schema.column_index(column)?;
            index.insert(row.values[position].clone(), pointer.clone())?;
        }
        Ok(row_id)
    }

    pub fn get(&mut self, row_id: RowId) -> Result<Option<Row>> {
        match self.tree.search(&CellKey::RowId(row_id))? {
            Some(cell) => Row::from_cell(&cell, &self.schema.columns).map(Some),
            None => Ok(None),
        }
    }

    pub fn get_many(&mut self, row_ids: &[RowId]) -> Result<Vec<Row>> {
        self.tree
            .search_many(row_ids)?
            .iter()
            .map(|cell| Row::from_cell(cell, &self.schema.columns))
            .collect()
    }

    /// Every live row in rowid order, with all columns.
    pub fn scan(&mut self) -> Result<Vec<Row>> {
        self.tree
            .search_all()?
            .iter()
            .map(|cell| Row::from_cell(cell, &self.schema.columns))
            .collect()
    }

    /// Rows matching `predicate`, projected onto `columns`. An empty list or
    /// `*` selects every column. The predicate sees the full row.
    pub fn select<P>(&mut self, columns: &[&str], predicate: P) -> Result<Vec<Row>>
    where
        P: Fn(&Row) -> bool,
    {
        let projection = self.projection(columns)?;
        let rows = self
            .scan()?
            .into_iter()
            .filter(|row| predicate(row))
            .map(|row| match &projection {
                Some(indices) => row.project(indices),
                None => row,
            })
            .collect();
        Ok(rows)
    }

    /// Apply `changes` to every row matching `predicate`. All rows are
    /// validated before any is written.
    pub fn update<P>(&mut self, predicate: P, changes: &HashMap<String, Value>) -> Result<usize>
    where
        P: Fn(&Row) -> bool,
    {
        let mut pending = Vec::new();
        for row in self.scan()? {
            if !predicate(&row) {
                continue;
            }
            let mut updated = row.clone();
            self.schema.apply_changes(&mut updated, changes)?;
            self.schema.validate_row(&updated)?;
            pending.push((row, updated));
        }
        if pending.is_empty() {
            return Ok(0);
        }

        let new_rows: Vec<&Row> = pending.iter().map(|(_, new)| new).collect();
        let replaced: Vec<RowId> = pending.iter().filter_map(|(old, _)| old.row_id).collect();
        let changed: Vec<&str> = changes.keys().map(String::as_str).collect();
        self.check_unique(&new_rows, &replaced, Some(&changed))?;

        for (old, new) in &pending {
            let old_size = payload_len(&old.to_cell(&self.schema.columns)?);
            let cell = new.to_cell(&self.schema.columns)?;
            let new_size = payload_len(&cell);
            self.tree.update(cell)?;
            self.payload_bytes = self.payload_bytes - old_size + new_size;
            self.reindex(old, new)?;
        }
        debug!("Updated {} row(s) in '{}'", pending.len(), self.name());
        Ok(pending.len())
    }

    /// Tombstone every row matching `predicate`.
    pub fn delete<P>(&mut self, predicate: P) -> Result<usize>
    where
        P: Fn(&Row) -> bool,
    {
        let mut deleted = 0;
        for row in self.scan()? {
            if !predicate(&row) {
                continue;
            }
            let Some(row_id) = row.row_id else {
                continue;
            };
            let size = payload_len(&row.to_cell(&self.schema.columns)?);
            self.tree.delete(row_id)?;
            self.live_rows -= 1;
            self.payload_bytes -= size;
            self.unindex(&row)?;
            deleted += 1;
        }
        debug!("Deleted {} row(s) from '{}'", deleted, self.name());
        Ok(deleted)
    }

    pub fn has_index(&self, column: &str) -> bool {
        self.indexes.contains_key(column)
    }

    pub fn indexed_columns(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub fn index(&mut self, column: &str) -> Option<&mut SecondaryIndex> {
        self.indexes.get_mut(column)
    }

    /// Build an index over `column` from the rows already stored, in value
    /// order.
    pub fn create_index(&mut self, column: &str) -> Result<()> {
        let position = self.schema.column_index(column)?;
        if self.indexes.contains_key(column) {
            return Err(DatabaseError::IndexExists {
                name: format!("{}_{}", self.name(), column),
            });
        }

        let mut entries: Vec<(Value, Value)> = self
            .scan()?
            .into_iter()
            .filter(|row| !row.values[position].is_null())
            .map(|row| (row.values[position].clone(), self.pointer_for(&row)))
            .collect();
        entries.sort_by(|a, b| a.0.compare(&b.0));

        let mut index =
            SecondaryIndex::create(&self.dir, &self.schema.table_name, column, self.page_size)?;
        for (key, pointer) in entries {
            index.insert(key, pointer)?;
        }
        info!("Created index {}", index.default_name());
        self.indexes.insert(column.to_string(), index);
        Ok(())
    }

    pub fn drop_index(&mut self, column: &str) -> Result<()> {
        let index = self
            .indexes
            .remove(column)
            .ok_or_else(|| DatabaseError::IndexNotFound {
                name: format!("{}_{}", self.name(), column),
            })?;
        let path = index.path().to_path_buf();
        drop(index);
        fs::remove_file(&path)?;
        info!("Dropped index on {}.{}", self.name(), column);
        Ok(())
    }

    /// Clear every row and index entry. Rowids keep counting from where
    /// they were.
    pub fn truncate(&mut self) -> Result<()> {
        self.tree.truncate()?;
        self.live_rows = 0;
        self.payload_bytes = 0;
        for index in self.indexes.values_mut() {
            index.truncate()?;
        }
        info!("Truncated table '{}'", self.name());
        Ok(())
    }

    /// Current statistics, from counters kept up to date by every write.
    pub fn stats(&self) -> TableStats {
        TableStats {
            record_count: self.live_rows,
            avg_length: self.payload_bytes.checked_div(self.live_rows).unwrap_or(0),
            root_page: self.tree.root_page(),
        }
    }

    /// Close the table and delete its files.
    pub fn drop_files(self) -> Result<()> {
        let table_path = self.tree.path().to_path_buf();
        let index_paths: Vec<PathBuf> = self
            .indexes
            .values()
            .map(|index| index.path().to_path_buf())
            .collect();
        let name = self.schema.table_name.clone();
        drop(self);

        fs::remove_file(&table_path)?;
        for path in index_paths {
            fs::remove_file(&path)?;
        }
        info!("Removed files of table '{}'", name);
        Ok(())
    }

    fn projection(&self, columns: &[&str]) -> Result<Option<Vec<usize>>> {
        if columns.is_empty() || (columns.len() == 1 && columns[0] == "*") {
            return Ok(None);
        }
        columns
            .iter()
            .map(|name| self.schema.column_index(name))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Value stored as an index pointer for `row`.
    fn pointer_for(&self, row: &Row) -> Value {
        match self.schema.primary_key_column() {
            Some(position) => row.values[position].clone(),
            None => Value::Int(row.row_id.unwrap_or_default()),
        }
    }

    /// Reject `candidates` that would duplicate a PRIMARY KEY or UNIQUE value,
    /// either among themselves or against stored rows. Rows in `replacing`
    /// are about to be overwritten and are ignored. With `only` set, columns
    /// outside it are taken to be unchanged and are not checked.
    fn check_unique(
        &mut self,
        candidates: &[&Row],
        replacing: &[RowId],
        only: Option<&[&str]>,
    ) -> Result<()> {
        let unique_columns: Vec<usize> = self
            .schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.is_unique())
            .filter(|(_, column)| only.is_none_or(|names| names.contains(&column.name.as_str())))
            .map(|(position, _)| position)
            .collect();
        if unique_columns.is_empty() {
            return Ok(());
        }

        let stored: Vec<Row> = self
            .scan()?
            .into_iter()
            .filter(|row| row.row_id.is_none_or(|id| !replacing.contains(&id)))
            .collect();

        for &position in &unique_columns {
            let mut seen: Vec<&Value> = stored
                .iter()
                .map(|row| &row.values[position])
                .filter(|value| !value.is_null())
                .collect();
            for candidate in candidates {
                let value = &candidate.values[position];
                if value.is_null() {
                    continue;
                }
                if seen.iter().any(|existing| existing.compare(value) == Ordering::Equal) {
                    return Err(DatabaseError::ConstraintViolation {
                        details: format!(
                            "Duplicate value {} for unique column '{}' of table '{}'",
                            value,
                            self.schema.columns[position].name,
                            self.schema.table_name
                        ),
                    });
                }
                seen.push(value);
            }
        }
        Ok(())
    }

    fn reindex(&mut self, old: &Row, new: &Row) -> Result<()> {
        let old_pointer = self.pointer_for(old);
        let new_pointer = self.pointer_for(new);
        for (column, index) in self.indexes.iter_mut() {
            let position = self.schema.column_index(column)?;
            let (old_key, new_key) = (&old.values[position], &new.values[position]);
            if old_key.compare(new_key) == Ordering::Equal
                && old_pointer.compare(&new_pointer) == Ordering::Equal
            {
                continue;
            }
            index.remove(old_key, &old_pointer)?;
            index.insert(new_key.clone(), new_pointer.clone())?;
        }
        Ok(())
    }

    fn unindex(&mut self, row: &Row) -> Result<()> {
        let pointer = self.pointer_for(row);
        for (column, index) in self.indexes.iter_mut() {
            let position = self.schema.column_index(column)?;
            index.remove(&row.values[position], &pointer)?;
        }
        Ok(())
    }
}

fn payload_len(cell: &Cell) -> usize {
    cell.len().saturating_sub(CellHeader::width(cell.page_type()))
}
