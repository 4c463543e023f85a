use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    storage::{
        COLUMNS_CATALOG, TABLES_CATALOG, is_system_table,
        schema::{ColumnConstraint, ColumnSchema, TableSchema, TableSchemaBuilder},
        table::{Table, TableStats},
        table_file_path,
    },
    types::{
        RowId,
        error::{DatabaseError, Result},
        row::Row,
        value::{DataType, Value},
    },
};

// lumbung_tables columns
const TABLES_NAME: usize = 0;

// lumbung_columns columns
const COLUMNS_NAME: usize = 0;
const COLUMNS_TABLE_NAME: usize = 2;
const COLUMNS_DATA_TYPE: usize = 3;
const COLUMNS_ORDINAL: usize = 4;
const COLUMNS_CONSTRAINTS: usize = 5;

pub fn tables_catalog_schema() -> Result<TableSchema> {
    TableSchemaBuilder::new(TABLES_CATALOG)
        .add_column_with_constraint("table_name", DataType::Text, ColumnConstraint::PrimaryKey)
        .add_column("record_count", DataType::Int)
        .add_column("avg_length", DataType::SmallInt)
        .add_column("root_page", DataType::Int)
        .build()
}

pub fn columns_catalog_schema() -> Result<TableSchema> {
    TableSchemaBuilder::new(COLUMNS_CATALOG)
        .add_column_with_constraint("column_name", DataType::Text, ColumnConstraint::NotNull)
        .add_column_with_constraint("table_rowid", DataType::Int, ColumnConstraint::NotNull)
        .add_column_with_constraint("table_name", DataType::Text, ColumnConstraint::NotNull)
        .add_column_with_constraint("data_type", DataType::Text, ColumnConstraint::NotNull)
        .add_column_with_constraint("ordinal_position", DataType::TinyInt, ColumnConstraint::NotNull)
        .add_column("constraints", DataType::Text)
        .build()
}

/// The two self-describing system tables. Every table, the catalog tables
/// included, has one row in `lumbung_tables` and one row per column in
/// `lumbung_columns`.
pub struct Catalog {
    dir: PathBuf,
    tables: Table,
    columns: Table,
}

impl Catalog {
    /// Open the catalog in `dir`, bootstrapping it when the tables file is
    /// missing.
    pub fn open(dir: &Path, page_size: usize) -> Result<Self> {
        fs::create_dir_all(dir)?;
        if table_file_path(dir, TABLES_CATALOG).exists() {
            let tables = Table::open(dir, tables_catalog_schema()?, page_size)?;
            let columns = Table::open(dir, columns_catalog_schema()?, page_size)?;
            debug!("Opened catalog at {}", dir.display());
            return Ok(Self {
                dir: dir.to_path_buf(),
                tables,
                columns,
            });
        }
        Self::bootstrap(dir, page_size)
    }

    fn bootstrap(dir: &Path, page_size: usize) -> Result<Self> {
        info!("Bootstrapping catalog at {}", dir.display());
        // A columns file without a tables file is left over from an
        // interrupted bootstrap.
        let columns_path = table_file_path(dir, COLUMNS_CATALOG);
        if columns_path.exists() {
            fs::remove_file(&columns_path)?;
        }

        let tables_schema = tables_catalog_schema()?;
        let columns_schema = columns_catalog_schema()?;
        let mut catalog = Self {
            dir: dir.to_path_buf(),
            tables: Table::create_with_first_row_id(dir, tables_schema.clone(), page_size, 0)?,
            columns: Table::create_with_first_row_id(dir, columns_schema.clone(), page_size, 1)?,
        };
        catalog.register(&tables_schema, 0)?;
        catalog.register(&columns_schema, 0)?;
        catalog.refresh_catalog_stats()?;
        Ok(catalog)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Direct access to a system table, for reads.
    pub fn system_table(&mut self, name: &str) -> Option<&mut Table> {
        match name {
            TABLES_CATALOG => Some(&mut self.tables),
            COLUMNS_CATALOG => Some(&mut self.columns),
            _ => None,
        }
    }

    pub fn contains(&mut self, table_name: &str) -> Result<bool> {
        Ok(!self.table_rows(table_name)?.is_empty())
    }

    /// Record a new table and its columns. Returns the table's catalog rowid.
    pub fn register(&mut self, schema: &TableSchema, root_page: u16) -> Result<RowId> {
        if self.contains(&schema.table_name)? {
            return Err(DatabaseError::TableExists {
                name: schema.table_name.clone(),
            });
        }

        let table_rowid = self.tables.insert_row(vec![
            Value::Text(schema.table_name.clone()),
            Value::Int(0),
            Value::SmallInt(0),
            Value::Int(root_page as i32),
        ])?;

        for column in &schema.columns {
            let ordinal = i8::try_from(column.position + 1).map_err(|_| DatabaseError::InvalidData {
                details: format!("Column '{}' sits past position 127", column.name),
            })?;
            let constraint = match column.constraint.name() {
                Some(name) => Value::Text(name.to_string()),
                None => Value::Null,
            };
            self.columns.insert_row(vec![
                Value::Text(column.name.clone()),
                Value::Int(table_rowid),
                Value::Text(schema.table_name.clone()),
                Value::Text(column.data_type.name().to_string()),
                Value::TinyInt(ordinal),
                constraint,
            ])?;
        }

        if !is_system_table(&schema.table_name) {
            self.refresh_catalog_stats()?;
        }
        info!(
            "Registered table '{}' ({} columns) as catalog rowid {}",
            schema.table_name,
            schema.columns.len(),
            table_rowid
        );
        Ok(table_rowid)
    }

    /// Tombstone the catalog rows of a table.
    pub fn unregister(&mut self, table_name: &str) -> Result<()> {
        if is_system_table(table_name) {
            return Err(DatabaseError::SystemTable {
                name: table_name.to_string(),
            });
        }
        let removed = self.tables.delete(|row| text_at(row, TABLES_NAME) == Some(table_name))?;
        if removed == 0 {
            return Err(DatabaseError::TableNotFound {
                name: table_name.to_string(),
            });
        }
        self.columns
            .delete(|row| text_at(row, COLUMNS_TABLE_NAME) == Some(table_name))?;
        self.refresh_catalog_stats()?;
        info!("Unregistered table '{}'", table_name);
        Ok(())
    }

    /// Rebuild a table's schema from `lumbung_columns`.
    pub fn load_schema(&mut self, table_name: &str) -> Result<TableSchema> {
        if !self.contains(table_name)? {
            return Err(DatabaseError::TableNotFound {
                name: table_name.to_string(),
            });
        }

        let mut rows = self
            .columns
            .select(&[], |row| text_at(row, COLUMNS_TABLE_NAME) == Some(table_name))?;
        rows.sort_by_key(|row| row.values[COLUMNS_ORDINAL].as_integer().unwrap_or(0));

        let mut columns = Vec::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            let name = text_at(row, COLUMNS_NAME).ok_or_else(|| corrupt_column_row(table_name))?;
            let data_type = DataType::from_string(
                text_at(row, COLUMNS_DATA_TYPE).ok_or_else(|| corrupt_column_row(table_name))?,
            )?;
            let constraint = ColumnConstraint::from_name(text_at(row, COLUMNS_CONSTRAINTS))?;
            columns.push(ColumnSchema::new(name, data_type, position).with_constraint(constraint));
        }

        let schema = TableSchema::new(table_name, columns);
        schema.validate()?;
        Ok(schema)
    }

    /// Names of every registered table, catalog tables included, in
    /// registration order.
    pub fn table_names(&mut self) -> Result<Vec<String>> {
        let rows = self.tables.scan()?;
        Ok(rows
            .iter()
            .filter_map(|row| text_at(row, TABLES_NAME).map(str::to_string))
            .collect())
    }

    pub fn user_table_names(&mut self) -> Result<Vec<String>> {
        Ok(self
            .table_names()?
            .into_iter()
            .filter(|name| !is_system_table(name))
            .collect())
    }

    /// Write `record_count`, `avg_length` and `root_page` for a table.
    pub fn refresh_stats(&mut self, table_name: &str, stats: TableStats) -> Result<()> {
        let avg_length = i16::try_from(stats.avg_length).unwrap_or(i16::MAX);
        let record_count = i32::try_from(stats.record_count).unwrap_or(i32::MAX);
        let changes = HashMap::from([
            ("record_count".to_string(), Value::Int(record_count)),
            ("avg_length".to_string(), Value::SmallInt(avg_length)),
            ("root_page".to_string(), Value::Int(stats.root_page as i32)),
        ]);
        let updated = self
            .tables
            .update(|row| text_at(row, TABLES_NAME) == Some(table_name), &changes)?;
        if updated == 0 {
            return Err(DatabaseError::TableNotFound {
                name: table_name.to_string(),
            });
        }
        debug!(
            "Stats for '{}': {} rows, avg {} bytes, root {}",
            table_name, stats.record_count, stats.avg_length, stats.root_page
        );
        Ok(())
    }

    fn refresh_catalog_stats(&mut self) -> Result<()> {
        let stats = self.tables.stats();
        self.refresh_stats(TABLES_CATALOG, stats)?;
        let stats = self.columns.stats();
        self.refresh_stats(COLUMNS_CATALOG, stats)
    }

    fn table_rows(&mut self, table_name: &str) -> Result<Vec<Row>> {
        self.tables
            .select(&[], |row| text_at(row, TABLES_NAME) == Some(table_name))
    }
}

fn text_at(row: &Row, position: usize) -> Option<&str> {
    match row.values.get(position) {
        Some(Value::Text(text)) => Some(text.as_str()),
        _ => None,
    }
}

fn corrupt_column_row(table_name: &str) -> DatabaseError {
    DatabaseError::InvalidData {
        details: format!("Catalog holds a malformed column row for '{}'", table_name),
    }
}
