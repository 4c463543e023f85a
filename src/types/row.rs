use crate::{
    storage::schema::{ColumnSchema, TableSchema},
    types::{
        RowId,
        cell::{Cell, TableCellPayload},
        error::{DatabaseError, Result},
        value::{DataType, Value, type_code_width},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub row_id: Option<RowId>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            row_id: None,
            values,
        }
    }

    pub fn with_row_id(row_id: RowId, values: Vec<Value>) -> Self {
        Self {
            row_id: Some(row_id),
            values,
        }
    }

    pub fn get_value(&self, column_index: usize) -> Option<&Value> {
        self.values.get(column_index)
    }

    /// Look a value up by column name. Only meaningful for rows laid out in
    /// `schema` order (i.e. not projected).
    pub fn get<'a>(&'a self, schema: &TableSchema, column_name: &str) -> Option<&'a Value> {
        schema
            .get_column_index(column_name)
            .and_then(|index| self.values.get(index))
    }

    pub fn set_value(&mut self, column_index: usize, value: Value) -> Result<()> {
        if column_index >= self.values.len() {
            return Err(DatabaseError::InvalidData {
                details: format!("Column index {} out of bounds", column_index),
            });
        }
        self.values[column_index] = value;
        Ok(())
    }

    /// Keep only the values at `indices`, in that order.
    pub fn project(&self, indices: &[usize]) -> Row {
        Row {
            row_id: self.row_id,
            values: indices
                .iter()
                .filter_map(|&index| self.values.get(index).cloned())
                .collect(),
        }
    }

    /// Encode the values, in schema order, into a table cell payload.
    pub fn encode(&self, columns: &[ColumnSchema]) -> Result<TableCellPayload> {
        if self.values.len() != columns.len() {
            return Err(DatabaseError::InvalidData {
                details: format!(
                    "Row has {} values but the schema has {} columns",
                    self.values.len(),
                    columns.len()
                ),
            });
        }

        let mut type_codes = Vec::with_capacity(columns.len());
        let mut body = Vec::new();
        for (value, column) in self.values.iter().zip(columns) {
            Self::check_type(value, column)?;
            type_codes.push(value.type_code()?);
            body.extend_from_slice(&value.to_bytes()?);
        }
        TableCellPayload::new(type_codes, body)
    }

    /// Decode a payload with the exact schema it was encoded with.
    pub fn decode(
        row_id: RowId,
        payload: &TableCellPayload,
        columns: &[ColumnSchema],
    ) -> Result<Self> {
        if payload.type_codes.len() != columns.len() {
            return Err(DatabaseError::InvalidData {
                details: format!(
                    "Payload carries {} columns but the schema has {}",
                    payload.type_codes.len(),
                    columns.len()
                ),
            });
        }

        let mut cursor = 0;
        let mut values = Vec::with_capacity(columns.len());
        for (&code, column) in payload.type_codes.iter().zip(columns) {
            let width = type_code_width(code)?;
            if cursor + width > payload.body.len() {
                return Err(DatabaseError::InvalidLength {
                    what: "row body",
                    expected: cursor + width,
                    actual: payload.body.len(),
                });
            }
            let value = Value::from_bytes(code, &payload.body[cursor..cursor + width])?;
            Self::check_type(&value, column)?;
            values.push(value);
            cursor += width;
        }

        if cursor != payload.body.len() {
            return Err(DatabaseError::InvalidLength {
                what: "row body",
                expected: cursor,
                actual: payload.body.len(),
            });
        }

        Ok(Row::with_row_id(row_id, values))
    }

    pub fn to_cell(&self, columns: &[ColumnSchema]) -> Result<Cell> {
        let row_id = self.row_id.ok_or_else(|| DatabaseError::InvalidData {
            details: "Row has no rowid to key its cell".to_string(),
        })?;
        Ok(Cell::table_leaf(row_id, self.encode(columns)?))
    }

    pub fn from_cell(cell: &Cell, columns: &[ColumnSchema]) -> Result<Self> {
        match cell {
            Cell::TableLeaf(leaf) => Self::decode(leaf.row_id, &leaf.payload, columns),
            other => Err(DatabaseError::InvalidData {
                details: format!("Cannot decode a row from a {:?} cell", other.page_type()),
            }),
        }
    }

    fn check_type(value: &Value, column: &ColumnSchema) -> Result<()> {
        let actual = value.data_type();
        if actual != DataType::Null && actual != column.data_type {
            return Err(DatabaseError::TypeMismatch {
                expected: format!("{} for column '{}'", column.data_type, column.name),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}
