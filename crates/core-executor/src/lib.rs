pub mod cancellation;
pub mod dedicated_executor;
pub mod error;
pub mod models;
pub mod query;
pub mod service;
pub mod session;
pub mod utils;

#[cfg(test)]
pub mod tests;

pub use error::{ErrorKind, ExecutionError, ExecutionResult};
pub use models::*;
pub use query::{analyze_query, normalize_query, parse_statements};
pub use service::{CoreExecutionService, ExecutionService};
pub use utils::Config;

#[cfg(feature = "test-utils")]
pub use service::MockExecutionService;
