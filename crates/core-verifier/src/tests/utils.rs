use std::sync::Arc;

use core_executor::{Column, Config, CoreExecutionService, ResultSet, Row};
use core_schema::{ColumnSpec, SchemaSpec, TableSpec, Value};

use crate::entities::Verdict;
use crate::service::CoreVerificationService;

pub const HIGH_EARNERS: &str = "SELECT name FROM employees WHERE salary > 50000";

pub fn employees_schema() -> SchemaSpec {
    SchemaSpec::new(
        "company",
        vec![
            TableSpec::new(
                "employees",
                vec![
                    ColumnSpec::new("id", "INTEGER").primary_key(),
                    ColumnSpec::new("name", "VARCHAR(50)").not_null(),
                    ColumnSpec::new("department", "TEXT"),
                    ColumnSpec::new("salary", "DECIMAL(10, 2)"),
                    ColumnSpec::new("hire_date", "DATE"),
                ],
            )
            .with_rows(vec![
                vec![1.into(), "Alice".into(), "Engineering".into(), 85_000.into(), "2021-03-15".into()],
                vec![2.into(), "Bob".into(), "Sales".into(), 48_000.into(), "2022-07-01".into()],
                vec![3.into(), "Carol".into(), "Engineering".into(), 72_000.into(), "2020-11-23".into()],
                vec![4.into(), "Dave".into(), "Marketing".into(), 50_000.into(), "2023-01-09".into()],
            ]),
        ],
    )
}

pub fn nums_schema(size: i64) -> SchemaSpec {
    SchemaSpec::new(
        "nums",
        vec![
            TableSpec::new("nums", vec![ColumnSpec::new("n", "BIGINT")])
                .with_rows((1..=size).map(|n| vec![Value::Integer(n)]).collect()),
        ],
    )
}

pub fn result_set(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
    ResultSet::try_new(
        columns.iter().map(|name| Column::new(name, "")).collect(),
        rows.into_iter().map(Row::new).collect(),
    )
    .unwrap_or_else(|_| ResultSet::empty())
}

pub fn verification_service() -> CoreVerificationService {
    CoreVerificationService::new(Arc::new(CoreExecutionService::new(Arc::new(
        Config::default(),
    ))))
}

/// Drops the wall-clock part of a verdict so two runs can be compared.
pub fn without_timing(mut verdict: Verdict) -> Verdict {
    verdict.execution_time_ms = 0;
    verdict
}
