use std::any::Any;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::error::{DataFusionError, Result as DFResult};
use datafusion::execution::TaskContext;
use datafusion::physical_optimizer::PhysicalOptimizerRule;
use datafusion::physical_plan::{
    DisplayAs, DisplayFormatType, ExecutionPlan, PlanProperties, RecordBatchStream,
    SendableRecordBatchStream,
};
use datafusion_common::config::ConfigOptions;
use datafusion_common::internal_err;
use datafusion_common::tree_node::{Transformed, TransformedResult, TreeNode};
use futures::{Stream, StreamExt};

use super::dedicated_executor::JobContext;

/// A physical optimizer rule that puts a [`CancellableExec`] above every
/// operator of the plan.
///
/// Pipeline breakers such as aggregates, sorts and join build sides drain
/// their whole input before emitting anything. Checking the job only on the
/// output stream would let them run to completion after a timeout, so the
/// check has to sit on every edge of the plan.
///
/// Before:
/// ```text
/// AggregateExec
///   CrossJoinExec
///     DataSourceExec
///     DataSourceExec
/// ```
///
/// After:
/// ```text
/// CancellableExec
///   AggregateExec
///     CancellableExec
///       CrossJoinExec
///         CancellableExec
///           DataSourceExec
///         CancellableExec
///           DataSourceExec
/// ```
#[derive(Debug)]
pub struct CancelOnExpiry {
    job: JobContext,
}

impl CancelOnExpiry {
    #[must_use]
    pub const fn new(job: JobContext) -> Self {
        Self { job }
    }
}

impl PhysicalOptimizerRule for CancelOnExpiry {
    fn optimize(
        &self,
        plan: Arc<dyn ExecutionPlan>,
        _config: &ConfigOptions,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        plan.transform_up(|plan| {
            let wrapped: Arc<dyn ExecutionPlan> =
                Arc::new(CancellableExec::new(plan, self.job.clone()));
            Ok(Transformed::yes(wrapped))
        })
        .data()
    }

    fn name(&self) -> &'static str {
        "CancelOnExpiry"
    }

    fn schema_check(&self) -> bool {
        true
    }
}

/// Pass-through operator that fails its stream once the job is cancelled.
#[derive(Debug)]
pub struct CancellableExec {
    input: Arc<dyn ExecutionPlan>,
    job: JobContext,
}

impl CancellableExec {
    #[must_use]
    pub fn new(input: Arc<dyn ExecutionPlan>, job: JobContext) -> Self {
        Self { input, job }
    }

    #[must_use]
    pub const fn input(&self) -> &Arc<dyn ExecutionPlan> {
        &self.input
    }
}

fn cancelled_error(job: &JobContext) -> DataFusionError {
    DataFusionError::Execution(format!(
        "Query cancelled after exceeding {} ms",
        job.timeout_ms()
    ))
}

impl DisplayAs for CancellableExec {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CancellableExec")
    }
}

impl ExecutionPlan for CancellableExec {
    fn name(&self) -> &'static str {
        "CancellableExec"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn properties(&self) -> &PlanProperties {
        self.input.properties()
    }

    fn maintains_input_order(&self) -> Vec<bool> {
        vec![true]
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![&self.input]
    }

    fn with_new_children(
        self: Arc<Self>,
        mut children: Vec<Arc<dyn ExecutionPlan>>,
    ) -> DFResult<Arc<dyn ExecutionPlan>> {
        match (children.pop(), children.is_empty()) {
            (Some(input), true) => Ok(Arc::new(Self::new(input, self.job.clone()))),
            _ => internal_err!("CancellableExec wrong number of children"),
        }
    }

    fn execute(
        &self,
        partition: usize,
        context: Arc<TaskContext>,
    ) -> DFResult<SendableRecordBatchStream> {
        if self.job.is_cancelled() {
            return Err(cancelled_error(&self.job));
        }
        let input = self.input.execute(partition, context)?;
        Ok(Box::pin(CancellableStream {
            input,
            job: self.job.clone(),
        }))
    }
}

struct CancellableStream {
    input: SendableRecordBatchStream,
    job: JobContext,
}

impl Stream for CancellableStream {
    type Item = DFResult<RecordBatch>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.job.is_cancelled() {
            return Poll::Ready(Some(Err(cancelled_error(&self.job))));
        }
        self.input.poll_next_unpin(cx)
    }
}

impl RecordBatchStream for CancellableStream {
    fn schema(&self) -> SchemaRef {
        self.input.schema()
    }
}
