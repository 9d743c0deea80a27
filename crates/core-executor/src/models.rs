use core_schema::Value;
use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::datatypes::Schema as ArrowSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Hard execution budget; the service default applies when unset
    pub timeout: Option<Duration>,
    /// Permit DDL/DML statements (playground exploration)
    pub allow_writes: bool,
}

impl ExecutionOptions {
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            timeout: None,
            allow_writes: false,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn with_writes(mut self, allow_writes: bool) -> Self {
        self.allow_writes = allow_writes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub r#type: String,
}

impl Column {
    #[must_use]
    pub fn new(name: &str, r#type: &str) -> Self {
        Self {
            name: name.to_string(),
            r#type: r#type.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Vec<Value>);

impl Row {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Row {row} has {actual} values, but the result has {expected} columns"))]
pub struct RowWidthError {
    pub row: usize,
    pub expected: usize,
    pub actual: usize,
}

#[derive(Deserialize)]
struct ResultSetDef {
    columns: Vec<Column>,
    #[serde(default)]
    rows: Vec<Row>,
}

/// Tabular query output. Every row has exactly one value per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ResultSetDef")]
pub struct ResultSet {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl ResultSet {
    pub fn try_new(columns: Vec<Column>, rows: Vec<Row>) -> Result<Self, RowWidthError> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(RowWidthError {
                row: idx,
                expected: columns.len(),
                actual: row.len(),
            });
        }
        Ok(Self { columns, rows })
    }

    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl TryFrom<ResultSetDef> for ResultSet {
    type Error = RowWidthError;

    fn try_from(value: ResultSetDef) -> Result<Self, Self::Error> {
        Self::try_new(value.columns, value.rows)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub records: Vec<RecordBatch>,
    /// The schema associated with the result.
    /// This is required to construct a valid response even when `records` are empty
    pub schema: Arc<ArrowSchema>,
    pub result_set: ResultSet,
    /// Canonical rendering of the executed statements
    pub query: String,
}

/// Clause kinds a query can be tagged with for partial credit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Clause {
    Join,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Distinct,
    Aggregate,
    Subquery,
    Cte,
    SetOperation,
    Window,
    Case,
}

/// Structural facts about a query, gathered from its AST without executing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub tables: BTreeSet<String>,
    pub clauses: BTreeSet<Clause>,
}

impl QueryAnalysis {
    #[must_use]
    pub fn has_clause(&self, clause: Clause) -> bool {
        self.clauses.contains(&clause)
    }

    #[must_use]
    pub fn references_table(&self, table: &str) -> bool {
        self.tables.contains(&table.to_lowercase())
    }
}
