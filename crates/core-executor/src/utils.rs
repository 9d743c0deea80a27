use crate::error::{self as ex_error, ExecutionResult};
use crate::models::{Column, ResultSet, Row};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use core_schema::{ColumnType, Value};
use datafusion::arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray,
    TimestampMicrosecondArray,
};
use datafusion::arrow::datatypes::{
    DataType, Decimal128Type, DecimalType, Schema as ArrowSchema, TimeUnit,
};
use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Budget applied when a call does not carry its own timeout
    pub default_timeout_ms: u64,
    /// Results larger than this fail instead of being truncated
    pub max_result_rows: usize,
    pub target_partitions: usize,
    pub batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5_000,
            max_result_rows: 10_000,
            // A single partition keeps row order deterministic for order-sensitive grading
            target_partitions: 1,
            batch_size: 1_024,
        }
    }
}

impl Config {
    #[must_use]
    pub const fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub const fn with_max_result_rows(mut self, max_result_rows: usize) -> Self {
        self.max_result_rows = max_result_rows;
        self
    }
}

#[must_use]
pub const fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Integer => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Text => DataType::Utf8,
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::Date => DataType::Date32,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
    }
}

/// Builds an Arrow column out of values already coerced to `column_type`.
#[must_use]
pub fn values_to_array<'a>(
    column_type: ColumnType,
    values: impl Iterator<Item = &'a Value>,
) -> ArrayRef {
    match column_type {
        ColumnType::Integer => Arc::new(
            values
                .map(|v| match v {
                    Value::Integer(v) => Some(*v),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnType::Float => Arc::new(
            values
                .map(|v| match v {
                    Value::Float(v) => Some(*v),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnType::Text => Arc::new(
            values
                .map(|v| match v {
                    Value::Text(v) => Some(v.as_str()),
                    _ => None,
                })
                .collect::<StringArray>(),
        ),
        ColumnType::Boolean => Arc::new(
            values
                .map(|v| match v {
                    Value::Boolean(v) => Some(*v),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnType::Date => Arc::new(
            values
                .map(|v| match v {
                    Value::Date(v) => days_since_epoch(*v),
                    _ => None,
                })
                .collect::<Date32Array>(),
        ),
        ColumnType::Timestamp => Arc::new(
            values
                .map(|v| match v {
                    Value::Timestamp(v) => Some(v.and_utc().timestamp_micros()),
                    _ => None,
                })
                .collect::<TimestampMicrosecondArray>(),
        ),
    }
}

fn days_since_epoch(date: NaiveDate) -> Option<i32> {
    let days = date
        .signed_duration_since(DateTime::<Utc>::UNIX_EPOCH.date_naive())
        .num_days();
    i32::try_from(days).ok()
}

/// Converts record batches into a [`ResultSet`] of tagged values.
pub fn convert_record_batches(
    schema: &ArrowSchema,
    batches: &[RecordBatch],
) -> ExecutionResult<ResultSet> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| Column {
            name: field.name().clone(),
            r#type: field.data_type().to_string(),
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for batch in batches {
        for row_idx in 0..batch.num_rows() {
            let values = batch
                .columns()
                .iter()
                .map(|array| {
                    ScalarValue::try_from_array(array, row_idx)
                        .map(scalar_to_value)
                        .context(ex_error::DataFusionSnafu)
                })
                .collect::<ExecutionResult<Vec<_>>>()?;
            rows.push(Row::new(values));
        }
    }
    // Batches produced by a plan always match the plan's schema width.
    ResultSet::try_new(columns, rows).map_err(|e| {
        ex_error::ExecutionError::Arrow {
            source: datafusion::arrow::error::ArrowError::InvalidArgumentError(e.to_string()),
        }
    })
}

#[must_use]
#[allow(clippy::as_conversions, clippy::cast_precision_loss)]
pub fn scalar_to_value(scalar: ScalarValue) -> Value {
    if scalar.is_null() {
        return Value::Null;
    }
    match scalar {
        ScalarValue::Boolean(Some(v)) => Value::Boolean(v),
        ScalarValue::Int8(Some(v)) => Value::Integer(i64::from(v)),
        ScalarValue::Int16(Some(v)) => Value::Integer(i64::from(v)),
        ScalarValue::Int32(Some(v)) => Value::Integer(i64::from(v)),
        ScalarValue::Int64(Some(v)) => Value::Integer(v),
        ScalarValue::UInt8(Some(v)) => Value::Integer(i64::from(v)),
        ScalarValue::UInt16(Some(v)) => Value::Integer(i64::from(v)),
        ScalarValue::UInt32(Some(v)) => Value::Integer(i64::from(v)),
        ScalarValue::UInt64(Some(v)) => {
            i64::try_from(v).map_or(Value::Float(v as f64), Value::Integer)
        }
        ScalarValue::Float16(Some(v)) => Value::Float(v.to_f64()),
        ScalarValue::Float32(Some(v)) => Value::Float(f64::from(v)),
        ScalarValue::Float64(Some(v)) => Value::Float(v),
        ScalarValue::Decimal128(Some(v), precision, scale) => {
            decimal_to_value(v, precision, scale)
        }
        ScalarValue::Utf8(Some(v))
        | ScalarValue::LargeUtf8(Some(v))
        | ScalarValue::Utf8View(Some(v)) => Value::Text(v),
        ScalarValue::Date32(Some(days)) => {
            DateTime::from_timestamp(i64::from(days) * 86_400, 0)
                .map_or(Value::Null, |dt| Value::Date(dt.date_naive()))
        }
        ScalarValue::Date64(Some(ms)) => DateTime::from_timestamp_millis(ms)
            .map_or(Value::Null, |dt| Value::Date(dt.date_naive())),
        ScalarValue::TimestampSecond(Some(v), _) => {
            timestamp_value(DateTime::from_timestamp(v, 0).map(|dt| dt.naive_utc()))
        }
        ScalarValue::TimestampMillisecond(Some(v), _) => {
            timestamp_value(DateTime::from_timestamp_millis(v).map(|dt| dt.naive_utc()))
        }
        ScalarValue::TimestampMicrosecond(Some(v), _) => {
            timestamp_value(DateTime::from_timestamp_micros(v).map(|dt| dt.naive_utc()))
        }
        ScalarValue::TimestampNanosecond(Some(v), _) => {
            Value::Timestamp(DateTime::from_timestamp_nanos(v).naive_utc())
        }
        other => {
            let text = other.to_string();
            text.parse::<f64>()
                .ok()
                .filter(|_| other.data_type().is_numeric())
                .map_or(Value::Text(text), Value::Float)
        }
    }
}

fn timestamp_value(timestamp: Option<NaiveDateTime>) -> Value {
    timestamp.map_or(Value::Null, Value::Timestamp)
}

/// Integral decimals become integers; everything else goes through the exact
/// decimal rendering so `12.30` reads back as `12.3`.
fn decimal_to_value(unscaled: i128, precision: u8, scale: i8) -> Value {
    let factor = u32::try_from(scale.unsigned_abs())
        .ok()
        .and_then(|exp| 10_i128.checked_pow(exp));
    let integral = match (scale, factor) {
        (0, _) => Some(unscaled),
        (s, Some(f)) if s < 0 => unscaled.checked_mul(f),
        (_, Some(f)) if unscaled % f == 0 => Some(unscaled / f),
        _ => None,
    };
    if let Some(v) = integral.and_then(|v| i64::try_from(v).ok()) {
        return Value::Integer(v);
    }
    let rendered = Decimal128Type::format_decimal(unscaled, precision, scale);
    rendered
        .parse::<f64>()
        .map_or(Value::Text(rendered), Value::Float)
}
