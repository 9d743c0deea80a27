use core_schema::{ColumnSpec, SchemaSpec, TableSpec, Value};

pub fn employees_schema() -> SchemaSpec {
    SchemaSpec::new(
        "company",
        vec![TableSpec::new(
            "employees",
            vec![
                ColumnSpec::new("id", "INTEGER").primary_key(),
                ColumnSpec::new("name", "VARCHAR(50)").not_null(),
                ColumnSpec::new("department", "TEXT"),
                ColumnSpec::new("salary", "INTEGER"),
                ColumnSpec::new("hire_date", "DATE"),
            ],
        )
        .with_rows(vec![
            employee(1, "Alice", "Engineering", 85_000, "2021-03-15"),
            employee(2, "Bob", "Sales", 48_000, "2022-07-01"),
            employee(3, "Carol", "Engineering", 72_000, "2020-11-23"),
            employee(4, "Dave", "Marketing", 50_000, "2023-01-09"),
        ])],
    )
}

fn employee(id: i64, name: &str, department: &str, salary: i64, hired: &str) -> Vec<Value> {
    vec![
        id.into(),
        name.into(),
        department.into(),
        salary.into(),
        hired.into(),
    ]
}

/// Single-column table of the integers `1..=size`.
pub fn nums_schema(size: i64) -> SchemaSpec {
    SchemaSpec::new(
        "nums",
        vec![
            TableSpec::new("nums", vec![ColumnSpec::new("n", "BIGINT")])
                .with_rows((1..=size).map(|n| vec![Value::Integer(n)]).collect()),
        ],
    )
}
