use core_executor::ExecutionError;
use core_schema::SchemaError;
use snafu::Snafu;

use crate::entities::verdict::{VerdictError, VerdictErrorKind};

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum ComparisonError {
    #[snafu(display("Expected result has no columns"))]
    EmptyExpectedColumns,
}

pub type ComparisonResult<T> = std::result::Result<T, ComparisonError>;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum VerificationError {
    #[snafu(display("{source}"))]
    Candidate { source: ExecutionError },

    #[snafu(display("Reference query failed: {source}"))]
    Reference { source: ExecutionError },

    #[snafu(display("Result comparison failed: {source}"))]
    Comparison { source: ComparisonError },

    #[snafu(display("Invalid verification options: {message}"))]
    InvalidOptions { message: String },
}

pub type VerificationResult<T> = std::result::Result<T, VerificationError>;

impl VerificationError {
    /// Who is to blame: the learner's query, or the challenge setup.
    #[must_use]
    pub fn kind(&self) -> VerdictErrorKind {
        match self {
            Self::Candidate { source } => source.kind().into(),
            Self::Reference { .. } | Self::InvalidOptions { .. } => {
                VerdictErrorKind::Configuration
            }
            Self::Comparison { .. } => VerdictErrorKind::Comparison,
        }
    }
}

impl From<&VerificationError> for VerdictError {
    fn from(err: &VerificationError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum CatalogError {
    #[snafu(display("Failed to read catalog {path}: {source}"))]
    Read {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("Failed to parse catalog: {source}"))]
    Parse { source: serde_yaml::Error },

    #[snafu(display("Schema {name} is defined more than once"))]
    DuplicateSchema { name: String },

    #[snafu(display("Schema {name} is invalid: {source}"))]
    InvalidSchema { name: String, source: SchemaError },

    #[snafu(display("Challenge {id} is defined more than once"))]
    DuplicateChallenge { id: String },

    #[snafu(display("Challenge {id} refers to unknown schema {schema}"))]
    UnknownSchema { id: String, schema: String },

    #[snafu(display("Challenge {id} not found"))]
    ChallengeNotFound { id: String },
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
