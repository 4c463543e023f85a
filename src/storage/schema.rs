use std::collections::{HashMap, HashSet};

use crate::types::{
    error::{DatabaseError, Result},
    row::Row,
    value::{DataType, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnConstraint {
    None,
    PrimaryKey,
    NotNull,
    Unique,
}

impl ColumnConstraint {
    /// Text stored in the catalog's `constraints` column.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            ColumnConstraint::None => None,
            ColumnConstraint::PrimaryKey => Some("PRIMARY KEY"),
            ColumnConstraint::NotNull => Some("NOT NULL"),
            ColumnConstraint::Unique => Some("UNIQUE"),
        }
    }

    pub fn from_name(name: Option<&str>) -> Result<Self> {
        let Some(name) = name else {
            return Ok(ColumnConstraint::None);
        };
        match name.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" => Ok(ColumnConstraint::None),
            "PRIMARY KEY" | "PRI" => Ok(ColumnConstraint::PrimaryKey),
            "NOT NULL" => Ok(ColumnConstraint::NotNull),
            "UNIQUE" | "UNI" => Ok(ColumnConstraint::Unique),
            other => Err(DatabaseError::InvalidData {
                details: format!("Unknown column constraint: {}", other),
            }),
        }
    }
}

/// Represents a column definition in a table schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub position: usize,
    pub constraint: ColumnConstraint,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType, position: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            position,
            constraint: ColumnConstraint::None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.constraint = ColumnConstraint::NotNull;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.constraint = ColumnConstraint::PrimaryKey;
        self
    }

    pub fn unique(mut self) -> Self {
        self.constraint = ColumnConstraint::Unique;
        self
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraint == ColumnConstraint::PrimaryKey
    }

    /// Primary keys are implicitly NOT NULL.
    pub fn is_nullable(&self) -> bool {
        !matches!(
            self.constraint,
            ColumnConstraint::PrimaryKey | ColumnConstraint::NotNull
        )
    }

    /// Primary keys are implicitly UNIQUE.
    pub fn is_unique(&self) -> bool {
        matches!(
            self.constraint,
            ColumnConstraint::PrimaryKey | ColumnConstraint::Unique
        )
    }
}

/// Represents a complete table schema with all column definitions
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, mut columns: Vec<ColumnSchema>) -> Self {
        columns.sort_by_key(|col| col.position);
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.get_column_index(name)
            .ok_or_else(|| DatabaseError::ColumnNotFound {
                name: name.to_string(),
                table: self.table_name.clone(),
            })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }

    pub fn primary_key_column(&self) -> Option<usize> {
        self.columns.iter().position(|col| col.is_primary_key())
    }

    /// Validate column definitions
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(DatabaseError::InvalidData {
                details: "Table name cannot be empty".to_string(),
            });
        }
        if self.columns.is_empty() {
            return Err(DatabaseError::InvalidData {
                details: "Table must have at least one column".to_string(),
            });
        }
        if self.columns.len() > u8::MAX as usize {
            return Err(DatabaseError::InvalidData {
                details: format!("Table '{}' has more than 255 columns", self.table_name),
            });
        }

        let mut column_names = HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(DatabaseError::InvalidData {
                    details: "Column name cannot be empty".to_string(),
                });
            }
            if !column_names.insert(column.name.as_str()) {
                return Err(DatabaseError::InvalidData {
                    details: format!("Duplicate column name: {}", column.name),
                });
            }
            if column.data_type == DataType::Null {
                return Err(DatabaseError::InvalidData {
                    details: format!("Column '{}' cannot be declared NULL", column.name),
                });
            }
        }

        // Positions must be 0, 1, 2, ... once sorted.
        for (i, column) in self.columns.iter().enumerate() {
            if column.position != i {
                return Err(DatabaseError::InvalidData {
                    details: format!(
                        "Column positions must be sequential starting from 0, found gap at position {}",
                        i
                    ),
                });
            }
        }

        let primary_key_count = self.columns.iter().filter(|c| c.is_primary_key()).count();
        if primary_key_count > 1 {
            return Err(DatabaseError::InvalidData {
                details: "Table can have at most one primary key column".to_string(),
            });
        }

        Ok(())
    }

    /// Build a row in schema order from a column/value map. Missing columns
    /// become NULL; every value is coerced to its column type.
    pub fn row_from_values(&self, values: &HashMap<String, Value>) -> Result<Row> {
        self.check_column_names(values)?;
        let mut row_values = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = values.get(&column.name).cloned().unwrap_or(Value::Null);
            row_values.push(value.coerce_to(column.data_type)?);
        }
        Ok(Row::new(row_values))
    }

    /// Overwrite the named columns of `row` with coerced values.
    pub fn apply_changes(&self, row: &mut Row, changes: &HashMap<String, Value>) -> Result<()> {
        self.check_column_names(changes)?;
        for (name, value) in changes {
            let index = self.column_index(name)?;
            let coerced = value.clone().coerce_to(self.columns[index].data_type)?;
            row.set_value(index, coerced)?;
        }
        Ok(())
    }

    /// NOT NULL / PRIMARY KEY null checks.
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.values.len() != self.columns.len() {
            return Err(DatabaseError::InvalidData {
                details: format!(
                    "Row has {} values but table '{}' expects {} columns",
                    row.values.len(),
                    self.table_name,
                    self.columns.len()
                ),
            });
        }

        for (value, column) in row.values.iter().zip(&self.columns) {
            if value.is_null() && column.is_primary_key() {
                return Err(DatabaseError::ConstraintViolation {
                    details: format!("Primary key '{}' cannot be NULL", column.name),
                });
            }
            if value.is_null() && !column.is_nullable() {
                return Err(DatabaseError::ConstraintViolation {
                    details: format!("Column '{}' cannot be NULL", column.name),
                });
            }
        }
        Ok(())
    }

    fn check_column_names(&self, values: &HashMap<String, Value>) -> Result<()> {
        for name in values.keys() {
            self.column_index(name)?;
        }
        Ok(())
    }
}

/// Builder for creating table schemas
pub struct TableSchemaBuilder {
    table_name: String,
    columns: Vec<ColumnSchema>,
}

impl TableSchemaBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.add_column_with_constraint(name, data_type, ColumnConstraint::None)
    }

    pub fn add_column_with_constraint(
        mut self,
        name: impl Into<String>,
        data_type: DataType,
        constraint: ColumnConstraint,
    ) -> Self {
        let position = self.columns.len();
        let column = ColumnSchema::new(name, data_type, position).with_constraint(constraint);
        self.columns.push(column);
        self
    }

    pub fn build(self) -> Result<TableSchema> {
        let schema = TableSchema::new(self.table_name, self.columns);
        schema.validate()?;
        Ok(schema)
    }
}
