use core_executor::ErrorKind;
use core_schema::Value;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum VerdictErrorKind {
    Syntax,
    Runtime,
    Timeout,
    /// The challenge itself is broken: bad schema, failing reference query
    Configuration,
    Comparison,
}

impl From<ErrorKind> for VerdictErrorKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Syntax => Self::Syntax,
            ErrorKind::Runtime => Self::Runtime,
            ErrorKind::Timeout => Self::Timeout,
            ErrorKind::Setup => Self::Configuration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictError {
    pub kind: VerdictErrorKind,
    pub message: String,
}

/// A single structured difference between the expected and the actual result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mismatch {
    ColumnCount {
        expected: usize,
        actual: usize,
    },
    MissingColumn {
        name: String,
    },
    MissingRow {
        values: Vec<Value>,
    },
    ExtraRow {
        values: Vec<Value>,
    },
    ValueMismatch {
        row: usize,
        column: String,
        expected: Value,
        actual: Value,
    },
    /// Same rows, different order
    RowOrder,
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnCount { expected, actual } => {
                write!(f, "expected {expected} columns, got {actual}")
            }
            Self::MissingColumn { name } => write!(f, "missing column {name}"),
            Self::MissingRow { values } => write!(f, "missing row ({})", join_values(values)),
            Self::ExtraRow { values } => write!(f, "unexpected row ({})", join_values(values)),
            Self::ValueMismatch {
                row,
                column,
                expected,
                actual,
            } => write!(
                f,
                "row {row}, column {column}: expected {expected}, got {actual}"
            ),
            Self::RowOrder => write!(f, "rows are in the wrong order"),
        }
    }
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of grading one submission. Rendered camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub is_correct: bool,
    /// 0..=100
    pub score: u8,
    pub execution_time_ms: u64,
    pub rows_returned: usize,
    #[serde(default)]
    pub mismatches: Vec<Mismatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<VerdictError>,
}

impl Verdict {
    #[must_use]
    pub const fn graded(
        is_correct: bool,
        score: u8,
        execution_time_ms: u64,
        rows_returned: usize,
        mismatches: Vec<Mismatch>,
    ) -> Self {
        Self {
            is_correct,
            score,
            execution_time_ms,
            rows_returned,
            mismatches,
            error: None,
        }
    }

    #[must_use]
    pub const fn failed(error: VerdictError, score: u8, execution_time_ms: u64) -> Self {
        Self {
            is_correct: false,
            score,
            execution_time_ms,
            rows_returned: 0,
            mismatches: Vec::new(),
            error: Some(error),
        }
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<VerdictErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }
}
