use super::cancellation::CancelOnExpiry;
use super::dedicated_executor::JobContext;
use super::error::{self as ex_error, ExecutionError, ExecutionResult};
use super::models::{Clause, QueryAnalysis, QueryResult};
use super::session::VerificationSession;
use super::utils::convert_record_batches;
use datafusion::arrow::array::RecordBatch;
use datafusion::dataframe::DataFrame;
use datafusion::error::DataFusionError;
use datafusion::execution::context::SQLOptions;
use datafusion::physical_optimizer::PhysicalOptimizerRule;
use datafusion::physical_plan::execute_stream;
use datafusion::sql::parser::Statement as DFStatement;
use futures::StreamExt;
use snafu::{ResultExt, ensure};
use sqlparser::ast::{
    Expr, GroupByExpr, ObjectName, Query, Select, SetExpr, Statement, TableFactor, Visit,
    Visitor,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing_attributes::instrument;

const AGGREGATE_FUNCTIONS: [&str; 12] = [
    "count",
    "sum",
    "avg",
    "min",
    "max",
    "stddev",
    "variance",
    "array_agg",
    "string_agg",
    "group_concat",
    "bool_and",
    "bool_or",
];

pub struct UserQuery {
    pub session: Arc<VerificationSession>,
    pub raw_query: String,
    pub query: String,
    allow_writes: bool,
}

impl UserQuery {
    pub(super) fn new(session: Arc<VerificationSession>, query: String, allow_writes: bool) -> Self {
        Self {
            session,
            query: query.clone(),
            raw_query: query,
            allow_writes,
        }
    }

    pub fn parse_query(&self) -> ExecutionResult<Vec<Statement>> {
        parse_statements(&self.raw_query)
    }

    fn sql_options(&self) -> SQLOptions {
        SQLOptions::new()
            .with_allow_ddl(self.allow_writes)
            .with_allow_dml(self.allow_writes)
            .with_allow_statements(self.allow_writes)
    }

    /// Runs every statement in order and returns the output of the last one.
    #[instrument(level = "debug", skip(self, job), fields(query = %self.raw_query), err)]
    pub async fn execute(&mut self, job: &JobContext) -> ExecutionResult<QueryResult> {
        let statements = self.parse_query()?;
        self.query = render_statements(&statements);
        if !self.allow_writes {
            ensure_read_only(&statements)?;
        }

        let sql_options = self.sql_options();
        let mut output = None;
        for statement in statements {
            let rendered = statement.to_string();
            let state = self.session.ctx.state();
            let plan = state
                .statement_to_plan(DFStatement::Statement(Box::new(statement)))
                .await
                .context(ex_error::DataFusionQuerySnafu {
                    query: rendered.clone(),
                })?;
            // Catches writes hidden inside queries, e.g. SELECT ... INTO
            sql_options
                .verify_plan(&plan)
                .map_err(|_| ExecutionError::ReadOnlyViolation {
                    statement: summarize(&rendered),
                })?;
            let df = self
                .session
                .ctx
                .execute_logical_plan(plan)
                .await
                .context(ex_error::DataFusionQuerySnafu {
                    query: rendered.clone(),
                })?;
            let schema = Arc::new(df.schema().as_arrow().clone());
            let records = self.collect(df, &rendered, job).await?;
            output = Some((schema, records));
        }

        let (schema, records) = output.ok_or(ExecutionError::EmptyQuery)?;
        let result_set = convert_record_batches(&schema, &records)?;
        Ok(QueryResult {
            records,
            schema,
            result_set,
            query: self.query.clone(),
        })
    }

    /// Plans the query with a cancellation check on every operator and drains
    /// it batch by batch, stopping once the job is cancelled or the result
    /// grows past the configured row cap.
    async fn collect(
        &self,
        df: DataFrame,
        query: &str,
        job: &JobContext,
    ) -> ExecutionResult<Vec<RecordBatch>> {
        // Errors raised after the deadline come from the cancellation checks
        let query_error = |source: DataFusionError| {
            if job.is_cancelled() {
                ExecutionError::Timeout {
                    timeout_ms: job.timeout_ms(),
                }
            } else {
                ExecutionError::DataFusionQuery {
                    source: Box::new(source),
                    query: query.to_string(),
                }
            }
        };

        let task_ctx = Arc::new(df.task_ctx());
        let plan = df.create_physical_plan().await.map_err(query_error)?;
        let plan = CancelOnExpiry::new(job.clone())
            .optimize(plan, self.session.ctx.state().config_options())
            .map_err(query_error)?;
        let mut stream = execute_stream(plan, task_ctx).map_err(query_error)?;

        let limit = self.session.max_result_rows();
        let mut records = Vec::new();
        let mut num_rows = 0usize;
        while let Some(batch) = stream.next().await {
            ensure!(
                !job.is_cancelled(),
                ex_error::TimeoutSnafu {
                    timeout_ms: job.timeout_ms()
                }
            );
            let batch = batch.map_err(query_error)?;
            num_rows = num_rows.saturating_add(batch.num_rows());
            ensure!(num_rows <= limit, ex_error::ResultTooLargeSnafu { limit });
            records.push(batch);
        }
        Ok(records)
    }
}

/// Parses SQL text into statements. Surrounding whitespace and trailing
/// semicolons are insignificant.
pub fn parse_statements(sql: &str) -> ExecutionResult<Vec<Statement>> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql).map_err(|e| {
        ExecutionError::Syntax {
            message: e.to_string(),
        }
    })?;
    ensure!(!statements.is_empty(), ex_error::EmptyQuerySnafu);
    Ok(statements)
}

/// Canonical text of a query: parsed statements rendered back and joined.
pub fn normalize_query(sql: &str) -> ExecutionResult<String> {
    parse_statements(sql).map(|statements| render_statements(&statements))
}

fn render_statements(statements: &[Statement]) -> String {
    statements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn ensure_read_only(statements: &[Statement]) -> ExecutionResult<()> {
    for statement in statements {
        ensure!(
            matches!(statement, Statement::Query(_)),
            ex_error::ReadOnlyViolationSnafu {
                statement: summarize(&statement.to_string()),
            }
        );
    }
    Ok(())
}

fn summarize(statement: &str) -> String {
    const MAX_CHARS: usize = 80;
    if statement.chars().count() <= MAX_CHARS {
        return statement.to_string();
    }
    let mut short = statement.chars().take(MAX_CHARS).collect::<String>();
    short.push_str("...");
    short
}

/// Collects referenced tables and clause kinds without executing anything.
pub fn analyze_query(sql: &str) -> ExecutionResult<QueryAnalysis> {
    let statements = parse_statements(sql)?;
    let mut visitor = AnalysisVisitor::default();
    for statement in &statements {
        let _ = statement.visit(&mut visitor);
    }
    Ok(visitor.finish())
}

#[derive(Debug, Default)]
struct AnalysisVisitor {
    relations: BTreeSet<String>,
    cte_names: BTreeSet<String>,
    clauses: BTreeSet<Clause>,
}

impl AnalysisVisitor {
    fn finish(self) -> QueryAnalysis {
        QueryAnalysis {
            tables: self
                .relations
                .difference(&self.cte_names)
                .cloned()
                .collect(),
            clauses: self.clauses,
        }
    }

    fn inspect_set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => self.inspect_select(select),
            SetExpr::SetOperation { left, right, .. } => {
                self.clauses.insert(Clause::SetOperation);
                self.inspect_set_expr(left);
                self.inspect_set_expr(right);
            }
            _ => {}
        }
    }

    fn inspect_select(&mut self, select: &Select) {
        if select.selection.is_some() {
            self.clauses.insert(Clause::Where);
        }
        if select.having.is_some() {
            self.clauses.insert(Clause::Having);
        }
        if select.distinct.is_some() {
            self.clauses.insert(Clause::Distinct);
        }
        let grouped = match &select.group_by {
            GroupByExpr::All(_) => true,
            GroupByExpr::Expressions(exprs, _) => !exprs.is_empty(),
        };
        if grouped {
            self.clauses.insert(Clause::GroupBy);
        }
        // Comma-separated FROM items are implicit joins
        if select.from.len() > 1 || select.from.iter().any(|from| !from.joins.is_empty()) {
            self.clauses.insert(Clause::Join);
        }
    }
}

impl Visitor for AnalysisVisitor {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            self.clauses.insert(Clause::Cte);
            for cte in &with.cte_tables {
                self.cte_names.insert(cte.alias.name.value.to_lowercase());
            }
        }
        if query.order_by.is_some() {
            self.clauses.insert(Clause::OrderBy);
        }
        if query.limit.is_some() || query.fetch.is_some() {
            self.clauses.insert(Clause::Limit);
        }
        self.inspect_set_expr(&query.body);
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let name = relation.to_string();
        let table = name.rsplit('.').next().unwrap_or(&name);
        self.relations
            .insert(table.trim_matches(['"', '`']).to_lowercase());
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        if matches!(table_factor, TableFactor::Derived { .. }) {
            self.clauses.insert(Clause::Subquery);
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        match expr {
            Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists { .. } => {
                self.clauses.insert(Clause::Subquery);
            }
            Expr::Function(function) => {
                if function.over.is_some() {
                    self.clauses.insert(Clause::Window);
                } else {
                    let name = function.name.to_string().to_lowercase();
                    if AGGREGATE_FUNCTIONS.contains(&name.as_str()) {
                        self.clauses.insert(Clause::Aggregate);
                    }
                }
            }
            Expr::Case { .. } => {
                self.clauses.insert(Clause::Case);
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }
}
