use std::sync::Arc;
use std::time::{Duration, Instant};

use core_executor::dedicated_executor::duration_ms;
use core_executor::{ErrorKind, ExecutionOptions, ExecutionService, QueryResult, analyze_query};
use core_schema::SchemaSpec;
use snafu::{ResultExt, ensure};

use crate::comparator::{Comparison, ComparisonOptions, compare};
use crate::entities::{
    ExpectedAnswer, Scoring, Verdict, VerdictError, VerdictErrorKind, VerificationOptions,
};
use crate::errors::{self as verifier_error, VerificationError, VerificationResult};
use crate::scoring::{Rubric, boolean_score};

#[async_trait::async_trait]
pub trait VerificationService: Send + Sync {
    /// Grades `candidate` against `expected` on a private copy of `schema`.
    async fn verify(
        &self,
        candidate: &str,
        schema: &SchemaSpec,
        expected: &ExpectedAnswer,
        options: &VerificationOptions,
    ) -> Verdict;
}

pub struct CoreVerificationService {
    pub execution: Arc<dyn ExecutionService>,
}

impl CoreVerificationService {
    pub fn new(execution: Arc<dyn ExecutionService>) -> Self {
        Self { execution }
    }

    async fn compare_with_expected(
        &self,
        candidate: &QueryResult,
        schema: &SchemaSpec,
        expected: &ExpectedAnswer,
        options: &VerificationOptions,
        execution_options: ExecutionOptions,
    ) -> VerificationResult<Comparison> {
        let comparison_options = ComparisonOptions::from(options);
        match expected {
            ExpectedAnswer::ResultSet(result_set) => {
                compare(result_set, &candidate.result_set, &comparison_options)
                    .context(verifier_error::ComparisonSnafu)
            }
            ExpectedAnswer::ReferenceQuery(query) => {
                let reference = self
                    .execution
                    .execute(query, schema, execution_options.with_writes(false))
                    .await
                    .context(verifier_error::ReferenceSnafu)?;
                compare(
                    &reference.result_set,
                    &candidate.result_set,
                    &comparison_options,
                )
                .context(verifier_error::ComparisonSnafu)
            }
        }
    }
}

fn validate_options(options: &VerificationOptions) -> VerificationResult<()> {
    ensure!(
        options.timeout_ms > 0,
        verifier_error::InvalidOptionsSnafu {
            message: "timeoutMs must be greater than zero",
        }
    );
    Ok(())
}

fn rubric(options: &VerificationOptions, expected: &ExpectedAnswer) -> Option<Rubric> {
    match &options.scoring {
        Scoring::Boolean => None,
        Scoring::PartialCredit(config) => {
            let reference = expected
                .reference_query()
                .and_then(|query| analyze_query(query).ok());
            Some(Rubric::new(config, reference.as_ref()))
        }
    }
}

/// Converts a failure into a verdict error, logging configuration problems at
/// error level.
fn verdict_error(err: &VerificationError) -> VerdictError {
    let verdict_error = VerdictError::from(err);
    if verdict_error.kind == VerdictErrorKind::Configuration {
        tracing::error!(error = %err, "Challenge configuration error");
    } else {
        tracing::debug!(error = %err, kind = %verdict_error.kind, "Verification failed");
    }
    verdict_error
}

#[async_trait::async_trait]
impl VerificationService for CoreVerificationService {
    #[tracing::instrument(
        name = "VerificationService::verify",
        level = "debug",
        skip(self, schema, expected, options),
        fields(schema = %schema.name, mode = %options.comparison_mode)
    )]
    async fn verify(
        &self,
        candidate: &str,
        schema: &SchemaSpec,
        expected: &ExpectedAnswer,
        options: &VerificationOptions,
    ) -> Verdict {
        if let Err(err) = validate_options(options) {
            return Verdict::failed(verdict_error(&err), 0, 0);
        }
        let rubric = rubric(options, expected);
        let execution_options = ExecutionOptions::read_only()
            .with_timeout(Duration::from_millis(options.timeout_ms))
            .with_writes(options.allow_writes);

        let started = Instant::now();
        let candidate_result = self
            .execution
            .execute(candidate, schema, execution_options)
            .await;
        let execution_time_ms = duration_ms(started.elapsed());

        let candidate_result = match candidate_result {
            Ok(result) => result,
            Err(source) => {
                let score = match (&rubric, source.kind()) {
                    (Some(rubric), ErrorKind::Runtime | ErrorKind::Timeout) => {
                        analyze_query(candidate).map_or(0, |analysis| rubric.score(&analysis, None))
                    }
                    _ => 0,
                };
                let err = VerificationError::Candidate { source };
                return Verdict::failed(verdict_error(&err), score, execution_time_ms);
            }
        };

        let comparison = match self
            .compare_with_expected(&candidate_result, schema, expected, options, execution_options)
            .await
        {
            Ok(comparison) => comparison,
            Err(err) => return Verdict::failed(verdict_error(&err), 0, execution_time_ms),
        };

        let score = match &rubric {
            Some(rubric) if !comparison.equivalent => analyze_query(candidate)
                .map_or(0, |analysis| rubric.score(&analysis, Some(&comparison))),
            _ => boolean_score(comparison.equivalent),
        };
        tracing::debug!(
            is_correct = comparison.equivalent,
            score,
            mismatches = comparison.mismatches.len(),
            "Verification finished"
        );
        Verdict::graded(
            comparison.equivalent,
            score,
            execution_time_ms,
            candidate_result.result_set.num_rows(),
            comparison.mismatches,
        )
    }
}
