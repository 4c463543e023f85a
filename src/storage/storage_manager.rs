use std::{collections::HashMap, fs};

use log::{info, warn};

use crate::{
    config::StorageConfig,
    storage::{
        catalog::Catalog,
        is_system_table,
        schema::{ColumnSchema, TableSchema},
        table::Table,
    },
    types::{
        RowId,
        error::{DatabaseError, Result},
        row::Row,
        value::Value,
    },
};

/// Entry point for the statement dispatcher. Owns the catalog and one open
/// [`Table`] per user table.
pub struct StorageManager {
    config: StorageConfig,
    catalog: Catalog,
    tables: HashMap<String, Table>,
    /// Index name → (table, column).
    indexes: HashMap<String, (String, String)>,
}

impl StorageManager {
    /// Create the data and catalog directories if needed, bootstrap the
    /// catalog on first use and open every registered user table.
    pub fn open(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        let mut catalog = Catalog::open(&config.catalog_dir, config.page_size)?;

        let mut tables = HashMap::new();
        let mut indexes = HashMap::new();
        for name in catalog.user_table_names()? {
            let schema = catalog.load_schema(&name)?;
            let table = Table::open(&config.data_dir, schema, config.page_size)?;
            for column in table.indexed_columns() {
                indexes.insert(format!("{}_{}", name, column), (name.clone(), column));
            }
            tables.insert(name, table);
        }

        info!(
            "Storage opened: {} user table(s), {} index(es), page size {}",
            tables.len(),
            indexes.len(),
            config.page_size
        );
        Ok(Self {
            config,
            catalog,
            tables,
            indexes,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnSchema>) -> Result<()> {
        if is_system_table(name) {
            return Err(DatabaseError::SystemTable {
                name: name.to_string(),
            });
        }
        if self.tables.contains_key(name) || self.catalog.contains(name)? {
            return Err(DatabaseError::TableExists {
                name: name.to_string(),
            });
        }

        let schema = TableSchema::new(name, columns);
        schema.validate()?;
        let mut table = Table::create(&self.config.data_dir, schema.clone(), self.config.page_size)?;
        if let Err(e) = self.catalog.register(&schema, table.tree().root_page()) {
            warn!("Registering '{}' failed, removing its file: {}", name, e);
            table.drop_files()?;
            return Err(e);
        }
        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    /// Remove a table: its catalog rows are tombstoned and its table and
    /// index files deleted.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if is_system_table(name) {
            return Err(DatabaseError::SystemTable {
                name: name.to_string(),
            });
        }
        if !self.tables.contains_key(name) {
            return Err(DatabaseError::TableNotFound {
                name: name.to_string(),
            });
        }
        // The open handle stays registered until the catalog lets go of it.
        self.catalog.unregister(name)?;
        self.indexes.retain(|_, (table_name, _)| table_name != name);
        let table = self
            .tables
            .remove(name)
            .ok_or_else(|| DatabaseError::TableNotFound {
                name: name.to_string(),
            })?;
        table.drop_files()?;
        info!("Dropped table '{}'", name);
        Ok(())
    }

    pub fn create_index(&mut self, index_name: &str, table_name: &str, column: &str) -> Result<()> {
        if self.indexes.contains_key(index_name) {
            return Err(DatabaseError::IndexExists {
                name: index_name.to_string(),
            });
        }
        let table = self.user_table(table_name)?;
        table.create_index(column)?;
        self.indexes.insert(
            index_name.to_string(),
            (table_name.to_string(), column.to_string()),
        );
        Ok(())
    }

    pub fn drop_index(&mut self, index_name: &str) -> Result<()> {
        let (table_name, column) =
            self.indexes
                .get(index_name)
                .cloned()
                .ok_or_else(|| DatabaseError::IndexNotFound {
                    name: index_name.to_string(),
                })?;
        self.user_table(&table_name)?.drop_index(&column)?;
        self.indexes.remove(index_name);
        Ok(())
    }

    pub fn insert(&mut self, table_name: &str, values: &HashMap<String, Value>) -> Result<RowId> {
        let row_id = self.user_table(table_name)?.insert(values)?;
        self.refresh_stats(table_name)?;
        Ok(row_id)
    }

    pub fn update<P>(
        &mut self,
        table_name: &str,
        predicate: P,
        values: &HashMap<String, Value>,
    ) -> Result<usize>
    where
        P: Fn(&Row) -> bool,
    {
        let updated = self.user_table(table_name)?.update(predicate, values)?;
        if updated > 0 {
            self.refresh_stats(table_name)?;
        }
        Ok(updated)
    }

    pub fn delete<P>(&mut self, table_name: &str, predicate: P) -> Result<usize>
    where
        P: Fn(&Row) -> bool,
    {
        let deleted = self.user_table(table_name)?.delete(predicate)?;
        if deleted > 0 {
            self.refresh_stats(table_name)?;
        }
        Ok(deleted)
    }

    pub fn truncate(&mut self, table_name: &str) -> Result<()> {
        self.user_table(table_name)?.truncate()?;
        self.refresh_stats(table_name)
    }

    /// Works on catalog tables too.
    pub fn select<P>(&mut self, table_name: &str, columns: &[&str], predicate: P) -> Result<Vec<Row>>
    where
        P: Fn(&Row) -> bool,
    {
        if let Some(table) = self.catalog.system_table(table_name) {
            return table.select(columns, predicate);
        }
        self.user_table(table_name)?.select(columns, predicate)
    }

    /// Every table in the catalog, system tables included.
    pub fn table_names(&mut self) -> Result<Vec<String>> {
        self.catalog.table_names()
    }

    pub fn table_schema(&mut self, table_name: &str) -> Result<TableSchema> {
        if let Some(table) = self.catalog.system_table(table_name) {
            return Ok(table.schema().clone());
        }
        self.catalog.load_schema(table_name)
    }

    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Any open table, catalog tables included, for inspection.
    pub fn table(&mut self, table_name: &str) -> Result<&mut Table> {
        if let Some(table) = self.catalog.system_table(table_name) {
            return Ok(table);
        }
        self.tables
            .get_mut(table_name)
            .ok_or_else(|| DatabaseError::TableNotFound {
                name: table_name.to_string(),
            })
    }

    fn user_table(&mut self, table_name: &str) -> Result<&mut Table> {
        if is_system_table(table_name) {
            return Err(DatabaseError::SystemTable {
                name: table_name.to_string(),
            });
        }
        self.tables
            .get_mut(table_name)
            .ok_or_else(|| DatabaseError::TableNotFound {
                name: table_name.to_string(),
            })
    }

    fn refresh_stats(&mut self, table_name: &str) -> Result<()> {
        let table = self
            .tables
            .get_mut(table_name)
            .ok_or_else(|| DatabaseError::TableNotFound {
                name: table_name.to_string(),
            })?;
        let stats = table.stats();
        self.catalog.refresh_stats(table_name, stats)
    }
}
