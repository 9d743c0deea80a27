use std::backtrace::Backtrace;

use core_schema::SchemaError;
use datafusion_common::DataFusionError;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::dedicated_executor::JobError;

/// Coarse classification of an execution failure, used to decide who is to blame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// The SQL text does not parse
    Syntax,
    /// The SQL parses but fails to plan or execute
    Runtime,
    /// The execution budget was exceeded
    Timeout,
    /// The schema snapshot or the execution environment is broken
    Setup,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExecutionError {
    #[snafu(display("Query is empty"))]
    EmptyQuery,

    #[snafu(display("SQL syntax error: {message}"))]
    Syntax { message: String },

    #[snafu(display("Only read-only queries are allowed here, found: {statement}"))]
    ReadOnlyViolation { statement: String },

    #[snafu(display("{source}"))]
    DataFusionQuery {
        #[snafu(source(from(DataFusionError, Box::new)))]
        source: Box<DataFusionError>,
        query: String,
    },

    #[snafu(display("Query result exceeds the limit of {limit} rows"))]
    ResultTooLarge { limit: usize },

    #[snafu(display("Query exceeded the execution time budget of {timeout_ms} ms"))]
    Timeout { timeout_ms: u64 },

    #[snafu(display("Invalid schema snapshot: {source}"))]
    Schema { source: SchemaError },

    #[snafu(display("Arrow error: {source}"))]
    Arrow {
        source: datafusion::arrow::error::ArrowError,
    },

    #[snafu(display("DataFusion error: {source}"))]
    DataFusion { source: DataFusionError },

    #[snafu(display("Threaded Job error: {source}: {backtrace}"))]
    JobError {
        source: JobError,
        backtrace: Backtrace,
    },
}

impl ExecutionError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyQuery | Self::Syntax { .. } => ErrorKind::Syntax,
            // A worker that died mid-query was brought down by the query itself
            Self::JobError {
                source: JobError::WorkerLost,
                ..
            }
            | Self::ReadOnlyViolation { .. }
            | Self::DataFusionQuery { .. }
            | Self::ResultTooLarge { .. } => ErrorKind::Runtime,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Schema { .. }
            | Self::Arrow { .. }
            | Self::DataFusion { .. }
            | Self::JobError { .. } => ErrorKind::Setup,
        }
    }
}

pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;
