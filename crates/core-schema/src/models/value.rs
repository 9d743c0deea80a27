use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::table::ColumnType;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single scalar cell, either seeded into a table or read back from a query.
///
/// Serialized untagged so seed rows and expected results can be written as
/// plain JSON/YAML scalars. Temporal values written as text are coerced to
/// [`Value::Date`]/[`Value::Timestamp`] by [`Value::coerce`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Converts the value into the representation used by a column of type `target`.
    ///
    /// Returns `None` when the value cannot be represented without losing information.
    #[must_use]
    #[allow(clippy::as_conversions, clippy::cast_precision_loss)]
    pub fn coerce(&self, target: ColumnType) -> Option<Self> {
        if self.is_null() {
            return Some(Self::Null);
        }
        match (target, self) {
            (ColumnType::Integer, Self::Integer(v)) => Some(Self::Integer(*v)),
            (ColumnType::Integer, Self::Float(v)) => integral_float(*v).map(Self::Integer),
            (ColumnType::Integer, Self::Text(v)) => v.trim().parse().ok().map(Self::Integer),

            (ColumnType::Float, Self::Integer(v)) => {
                let float = *v as f64;
                (integral_float(float) == Some(*v)).then_some(Self::Float(float))
            }
            (ColumnType::Float, Self::Float(v)) => Some(Self::Float(*v)),
            (ColumnType::Float, Self::Text(v)) => v.trim().parse().ok().map(Self::Float),

            (ColumnType::Text, Self::Text(v)) => Some(Self::Text(v.clone())),
            (ColumnType::Text, other) => Some(Self::Text(other.to_string())),

            (ColumnType::Boolean, Self::Boolean(v)) => Some(Self::Boolean(*v)),
            (ColumnType::Boolean, Self::Integer(0)) => Some(Self::Boolean(false)),
            (ColumnType::Boolean, Self::Integer(1)) => Some(Self::Boolean(true)),
            (ColumnType::Boolean, Self::Text(v)) => match v.trim().to_lowercase().as_str() {
                "true" | "t" | "yes" | "1" => Some(Self::Boolean(true)),
                "false" | "f" | "no" | "0" => Some(Self::Boolean(false)),
                _ => None,
            },

            (ColumnType::Date, Self::Date(v)) => Some(Self::Date(*v)),
            (ColumnType::Date, Self::Timestamp(v)) => Some(Self::Date(v.date())),
            (ColumnType::Date, Self::Text(v)) => NaiveDate::parse_from_str(v.trim(), DATE_FORMAT)
                .ok()
                .map(Self::Date),

            (ColumnType::Timestamp, Self::Timestamp(v)) => Some(Self::Timestamp(*v)),
            (ColumnType::Timestamp, Self::Date(v)) => {
                Some(Self::Timestamp(v.and_time(NaiveTime::MIN)))
            }
            (ColumnType::Timestamp, Self::Text(v)) => parse_timestamp(v).map(Self::Timestamp),

            _ => None,
        }
    }
}

/// Returns the integer an integral float represents, if it fits in an `i64`.
#[must_use]
#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
pub fn integral_float(value: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it does not fit.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if value.is_finite() && value.fract() == 0.0 && (-LIMIT..LIMIT).contains(&value) {
        Some(value as i64)
    } else {
        None
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.format(DATE_FORMAT)),
            Self::Timestamp(v) => write!(f, "{}", v.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_deserialize() {
        let values: Vec<Value> =
            serde_json::from_str(r#"[null, true, 42, 4.5, "Alice", "2024-01-05"]"#)
                .unwrap_or_default();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Integer(42),
                Value::Float(4.5),
                Value::Text("Alice".to_string()),
                Value::Text("2024-01-05".to_string()),
            ]
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_coerce_to_column_types() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!(
            Value::from("2024-01-05").coerce(ColumnType::Date),
            Some(Value::Date(date))
        );
        assert_eq!(
            Value::from("2024-01-05 10:30:00").coerce(ColumnType::Timestamp),
            Some(Value::Timestamp(date.and_hms_opt(10, 30, 0).unwrap()))
        );
        assert_eq!(
            Value::Integer(60_000).coerce(ColumnType::Float),
            Some(Value::Float(60_000.0))
        );
        // Above 2^53 not every integer has an exact float
        assert_eq!(
            Value::Integer(9_007_199_254_740_993).coerce(ColumnType::Float),
            None
        );
        assert_eq!(
            Value::Integer(9_007_199_254_740_992).coerce(ColumnType::Float),
            Some(Value::Float(9_007_199_254_740_992.0))
        );
        assert_eq!(Value::Integer(i64::MAX).coerce(ColumnType::Float), None);
        assert_eq!(
            Value::Float(3.0).coerce(ColumnType::Integer),
            Some(Value::Integer(3))
        );
        assert_eq!(Value::Float(3.5).coerce(ColumnType::Integer), None);
        assert_eq!(Value::from("abc").coerce(ColumnType::Integer), None);
        assert_eq!(
            Value::Integer(7).coerce(ColumnType::Text),
            Some(Value::from("7"))
        );
        assert_eq!(Value::Null.coerce(ColumnType::Date), Some(Value::Null));
        assert_eq!(Value::Boolean(true).coerce(ColumnType::Date), None);
    }

    #[test]
    fn test_integral_float() {
        assert_eq!(integral_float(5.0), Some(5));
        assert_eq!(integral_float(-0.0), Some(0));
        assert_eq!(integral_float(5.5), None);
        assert_eq!(integral_float(f64::NAN), None);
        assert_eq!(integral_float(1e19), None);
    }
}
