use snafu::prelude::*;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum SchemaError {
    #[snafu(display("Schema: Validation failed. Reason: {source}"))]
    Validation { source: validator::ValidationErrors },

    #[snafu(display("Table {table} already exists in schema {schema}"))]
    TableAlreadyExists { table: String, schema: String },

    #[snafu(display("Column {column} already exists in table {table}"))]
    ColumnAlreadyExists { column: String, table: String },

    #[snafu(display("Unsupported column type {declared} for column {column} in table {table}"))]
    UnsupportedColumnType {
        declared: String,
        column: String,
        table: String,
    },

    #[snafu(display(
        "Row {row} of table {table} has {actual} values, but the table has {expected} columns"
    ))]
    RowWidth {
        table: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[snafu(display("Row {row} of table {table}: column {column} does not accept NULL"))]
    NullNotAllowed {
        table: String,
        row: usize,
        column: String,
    },

    #[snafu(display("Row {row} of table {table}: duplicate primary key {key}"))]
    DuplicatePrimaryKey {
        table: String,
        row: usize,
        key: String,
    },

    #[snafu(display(
        "Column {column} of table {table} references unknown column {target_table}.{target_column}"
    ))]
    ForeignKeyTarget {
        table: String,
        column: String,
        target_table: String,
        target_column: String,
    },

    #[snafu(display(
        "Row {row} of table {table}: value {value} cannot be stored in {column} ({column_type})"
    ))]
    ValueCoercion {
        table: String,
        row: usize,
        column: String,
        column_type: String,
        value: String,
    },
}

pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

impl From<validator::ValidationErrors> for SchemaError {
    fn from(source: validator::ValidationErrors) -> Self {
        Self::Validation { source }
    }
}
