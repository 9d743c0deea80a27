use core_executor::ResultSet;
use serde::{Deserialize, Serialize};

/// What a submission is graded against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpectedAnswer {
    /// A pre-materialized result
    ResultSet(ResultSet),
    /// A trusted query evaluated against the same schema snapshot
    ReferenceQuery(String),
}

impl ExpectedAnswer {
    #[must_use]
    pub fn reference_query(&self) -> Option<&str> {
        match self {
            Self::ReferenceQuery(query) => Some(query),
            Self::ResultSet(_) => None,
        }
    }
}
