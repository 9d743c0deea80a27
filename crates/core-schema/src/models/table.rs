use crate::error::{self as schema_error, SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use validator::Validate;

use super::value::Value;

/// Storage class a declared SQL type maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
    Date,
    Timestamp,
}

impl ColumnType {
    /// Maps a declared SQL type such as `VARCHAR(50)` or `DECIMAL(10, 2)`.
    #[must_use]
    pub fn from_declared(declared: &str) -> Option<Self> {
        let base = declared
            .split(['(', ' '])
            .next()
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        let column_type = match base.as_str() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "SERIAL" | "BIGSERIAL"
            | "INT2" | "INT4" | "INT8" => Self::Integer,
            "DECIMAL" | "NUMERIC" | "FLOAT" | "DOUBLE" | "REAL" | "MONEY" | "FLOAT4"
            | "FLOAT8" => Self::Float,
            "CHAR" | "VARCHAR" | "TEXT" | "STRING" | "NCHAR" | "NVARCHAR" | "CLOB"
            | "CHARACTER" => Self::Text,
            "BOOL" | "BOOLEAN" => Self::Boolean,
            "DATE" => Self::Date,
            "TIMESTAMP" | "DATETIME" => Self::Timestamp,
            _ => return None,
        };
        Some(column_type)
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// A reference from a column to the column of another table
pub struct ForeignKey {
    #[validate(length(min = 1))]
    pub table: String,
    #[validate(length(min = 1))]
    pub column: String,
}

impl Display for ForeignKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    #[validate(length(min = 1))]
    pub name: String,
    /// Declared SQL type, e.g. `VARCHAR(100)`
    #[validate(length(min = 1))]
    pub r#type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub foreign_key: Option<ForeignKey>,
}

const fn default_nullable() -> bool {
    true
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: &str, r#type: &str) -> Self {
        Self {
            name: name.to_string(),
            r#type: r#type.to_string(),
            nullable: true,
            primary_key: false,
            foreign_key: None,
        }
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.foreign_key = Some(ForeignKey {
            table: table.to_string(),
            column: column.to_string(),
        });
        self
    }

    #[must_use]
    pub fn column_type(&self) -> Option<ColumnType> {
        ColumnType::from_declared(&self.r#type)
    }

    /// Primary key columns never accept NULL regardless of the declared nullability
    #[must_use]
    pub const fn accepts_null(&self) -> bool {
        self.nullable && !self.primary_key
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSpec {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1), nested)]
    pub columns: Vec<ColumnSpec>,
    /// Seed rows, one value per column in declaration order
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl TableSpec {
    #[must_use]
    pub fn new(name: &str, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.rows = rows;
        self
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    /// Column types in declaration order.
    pub fn column_types(&self) -> SchemaResult<Vec<ColumnType>> {
        self.columns
            .iter()
            .map(|column| {
                column
                    .column_type()
                    .ok_or_else(|| SchemaError::UnsupportedColumnType {
                        declared: column.r#type.clone(),
                        column: column.name.clone(),
                        table: self.name.clone(),
                    })
            })
            .collect()
    }

    /// Seed rows with every value coerced to its column type.
    pub fn typed_rows(&self) -> SchemaResult<Vec<Vec<Value>>> {
        let types = self.column_types()?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                ensure!(
                    row.len() == self.columns.len(),
                    schema_error::RowWidthSnafu {
                        table: self.name.clone(),
                        row: row_idx,
                        expected: self.columns.len(),
                        actual: row.len(),
                    }
                );
                row.iter()
                    .zip(self.columns.iter().zip(types.iter()))
                    .map(|(value, (column, column_type))| {
                        value
                            .coerce(*column_type)
                            .ok_or_else(|| SchemaError::ValueCoercion {
                                table: self.name.clone(),
                                row: row_idx,
                                column: column.name.clone(),
                                column_type: column_type.to_string(),
                                value: value.to_string(),
                            })
                    })
                    .collect()
            })
            .collect()
    }

    fn check_seed_rows(&self, rows: &[Vec<Value>]) -> SchemaResult<()> {
        let key_columns: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.primary_key)
            .map(|(idx, _)| idx)
            .collect();
        let mut seen_keys = HashSet::new();
        for (row_idx, row) in rows.iter().enumerate() {
            for (value, column) in row.iter().zip(&self.columns) {
                ensure!(
                    !value.is_null() || column.accepts_null(),
                    schema_error::NullNotAllowedSnafu {
                        table: self.name.clone(),
                        row: row_idx,
                        column: column.name.clone(),
                    }
                );
            }
            if key_columns.is_empty() {
                continue;
            }
            let key = key_columns
                .iter()
                .map(|idx| row[*idx].to_string())
                .collect::<Vec<_>>()
                .join(", ");
            ensure!(
                seen_keys.insert(key.clone()),
                schema_error::DuplicatePrimaryKeySnafu {
                    table: self.name.clone(),
                    row: row_idx,
                    key,
                }
            );
        }
        Ok(())
    }
}

/// A named set of tables seeded with sample data.
///
/// A snapshot is immutable for the duration of a verification; every
/// execution materializes its own copy of the seed data.
#[derive(Validate, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaSpec {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(nested)]
    pub tables: Vec<TableSpec>,
}

impl SchemaSpec {
    #[must_use]
    pub fn new(name: &str, tables: Vec<TableSpec>) -> Self {
        Self {
            name: name.to_string(),
            tables,
        }
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    /// Runs structural validation followed by the seed data checks:
    /// unique names, row widths, nullability, primary key uniqueness,
    /// foreign key targets and type coercion.
    pub fn validate_spec(&self) -> SchemaResult<()> {
        self.validate()?;

        let mut table_names = HashMap::new();
        for table in &self.tables {
            ensure!(
                table_names
                    .insert(table.name.to_lowercase(), table)
                    .is_none(),
                schema_error::TableAlreadyExistsSnafu {
                    table: table.name.clone(),
                    schema: self.name.clone(),
                }
            );
            let mut column_names = HashSet::new();
            for column in &table.columns {
                ensure!(
                    column_names.insert(column.name.to_lowercase()),
                    schema_error::ColumnAlreadyExistsSnafu {
                        column: column.name.clone(),
                        table: table.name.clone(),
                    }
                );
            }
        }

        for table in &self.tables {
            for column in &table.columns {
                let Some(fk) = &column.foreign_key else {
                    continue;
                };
                let target_exists = table_names
                    .get(&fk.table.to_lowercase())
                    .is_some_and(|target| target.column(&fk.column).is_some());
                ensure!(
                    target_exists,
                    schema_error::ForeignKeyTargetSnafu {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        target_table: fk.table.clone(),
                        target_column: fk.column.clone(),
                    }
                );
            }
            let rows = table.typed_rows()?;
            table.check_seed_rows(&rows)?;
        }
        Ok(())
    }
}
