use std::sync::Arc;

use core_schema::{SchemaSpec, TableSpec};
use datafusion::arrow::array::RecordBatch;
use datafusion::arrow::datatypes::{Field, Schema as ArrowSchema};
use datafusion::datasource::memory::MemTable;
use datafusion::prelude::{SessionConfig, SessionContext};
use datafusion_common::{Constraint, Constraints};
use snafu::ResultExt;

use super::error::{self as ex_error, ExecutionResult};
use super::models::ExecutionOptions;
use super::query::UserQuery;
use super::utils::{Config, arrow_type, values_to_array};

/// One isolated DataFusion session holding a private copy of a schema snapshot.
///
/// A session is built for a single execution and dropped right after, so
/// writes issued by one query are never visible to another.
pub struct VerificationSession {
    pub ctx: SessionContext,
    pub schema_name: String,
    max_result_rows: usize,
}

impl VerificationSession {
    #[tracing::instrument(
        name = "VerificationSession::new",
        level = "trace",
        skip_all,
        fields(schema = %schema.name),
        err
    )]
    pub fn new(schema: &SchemaSpec, config: &Config) -> ExecutionResult<Self> {
        schema.validate_spec().context(ex_error::SchemaSnafu)?;

        let session_config = SessionConfig::new()
            .with_target_partitions(config.target_partitions.max(1))
            .with_batch_size(config.batch_size.max(1))
            .with_information_schema(true);
        let ctx = SessionContext::new_with_config(session_config);

        for table in &schema.tables {
            let mem_table = build_mem_table(table)?;
            ctx.register_table(table.name.to_lowercase(), Arc::new(mem_table))
                .context(ex_error::DataFusionSnafu)?;
        }
        Ok(Self {
            ctx,
            schema_name: schema.name.clone(),
            max_result_rows: config.max_result_rows,
        })
    }

    pub fn query<S>(self: &Arc<Self>, query: S, options: ExecutionOptions) -> UserQuery
    where
        S: Into<String>,
    {
        UserQuery::new(self.clone(), query.into(), options.allow_writes)
    }

    #[must_use]
    pub const fn max_result_rows(&self) -> usize {
        self.max_result_rows
    }
}

fn build_mem_table(table: &TableSpec) -> ExecutionResult<MemTable> {
    let types = table.column_types().context(ex_error::SchemaSnafu)?;
    let rows = table.typed_rows().context(ex_error::SchemaSnafu)?;

    let fields = table
        .columns
        .iter()
        .zip(&types)
        .map(|(column, column_type)| {
            Field::new(
                column.name.to_lowercase(),
                arrow_type(*column_type),
                column.accepts_null(),
            )
        })
        .collect::<Vec<_>>();
    let schema = Arc::new(ArrowSchema::new(fields));

    let arrays = types
        .iter()
        .enumerate()
        .map(|(idx, column_type)| values_to_array(*column_type, rows.iter().map(|row| &row[idx])))
        .collect::<Vec<_>>();
    let batch = RecordBatch::try_new(schema.clone(), arrays).context(ex_error::ArrowSnafu)?;
    let mem_table =
        MemTable::try_new(schema, vec![vec![batch]]).context(ex_error::DataFusionSnafu)?;

    let key_columns = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, column)| column.primary_key)
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    if key_columns.is_empty() {
        return Ok(mem_table);
    }
    Ok(mem_table.with_constraints(Constraints::new_unverified(vec![Constraint::PrimaryKey(
        key_columns,
    )])))
}
