use std::sync::Arc;
use std::time::Duration;

use core_schema::SchemaSpec;
use snafu::ResultExt;

use super::dedicated_executor::{DedicatedExecutor, JobError};
use super::error::{self as ex_error, ExecutionError, ExecutionResult};
use super::models::{ExecutionOptions, QueryResult};
use super::session::VerificationSession;
use super::utils::Config;

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait::async_trait]
pub trait ExecutionService: Send + Sync {
    /// Runs `query` against a fresh, private copy of `schema`.
    async fn execute(
        &self,
        query: &str,
        schema: &SchemaSpec,
        options: ExecutionOptions,
    ) -> ExecutionResult<QueryResult>;
}

pub struct CoreExecutionService {
    config: Arc<Config>,
    executor: DedicatedExecutor,
}

impl CoreExecutionService {
    #[must_use]
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            executor: DedicatedExecutor::builder()
                .with_thread_name("sql-query")
                .build(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait::async_trait]
impl ExecutionService for CoreExecutionService {
    #[tracing::instrument(
        name = "ExecutionService::execute",
        level = "debug",
        skip(self, schema),
        fields(schema = %schema.name),
        err
    )]
    async fn execute(
        &self,
        query: &str,
        schema: &SchemaSpec,
        options: ExecutionOptions,
    ) -> ExecutionResult<QueryResult> {
        let timeout = options
            .timeout
            .unwrap_or_else(|| Duration::from_millis(self.config.default_timeout_ms));
        let session = Arc::new(VerificationSession::new(schema, &self.config)?);
        let user_query = session.query(query, options);

        let job_result = self
            .executor
            .run(timeout, move |job| async move {
                let mut user_query = user_query;
                user_query.execute(&job).await
            })
            .await;
        match job_result {
            Ok(query_result) => query_result,
            Err(JobError::Timeout { timeout_ms }) => {
                tracing::warn!(timeout_ms, "Query exceeded its execution budget");
                Err(ExecutionError::Timeout { timeout_ms })
            }
            Err(err) => Err(err).context(ex_error::JobSnafu),
        }
    }
}
