//! Result comparison.
//!
//! Values are reduced to canonical keys before comparing: integers and
//! integral floats share one representation, other floats compare bit-exact,
//! temporal values compare through their ISO-8601 text. Rows are compared as
//! multisets, so duplicates count. Unmatched rows are then paired on a guessed
//! key column to produce cell-level diagnostics.

use std::collections::{HashMap, HashSet, VecDeque};

use core_executor::ResultSet;
use core_schema::{DATE_FORMAT, TIMESTAMP_FORMAT, Value, integral_float};
use snafu::ensure;

use crate::entities::{ComparisonMode, Mismatch, VerificationOptions};
use crate::errors::{self as verifier_error, ComparisonResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonOptions {
    pub mode: ComparisonMode,
    pub case_sensitive: bool,
    pub max_mismatches: usize,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            mode: ComparisonMode::default(),
            case_sensitive: true,
            max_mismatches: 50,
        }
    }
}

impl From<&VerificationOptions> for ComparisonOptions {
    fn from(options: &VerificationOptions) -> Self {
        Self {
            mode: options.comparison_mode,
            case_sensitive: options.case_sensitive,
            max_mismatches: options.max_mismatches,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub equivalent: bool,
    pub mismatches: Vec<Mismatch>,
    /// Columns lined up, so rows were compared at all
    pub columns_aligned: bool,
    pub matched_rows: usize,
    pub expected_rows: usize,
    pub actual_rows: usize,
}

impl Comparison {
    /// Share of rows matched, relative to the larger of the two results.
    #[must_use]
    #[allow(clippy::as_conversions, clippy::cast_precision_loss)]
    pub fn row_fraction(&self) -> f64 {
        if !self.columns_aligned {
            return 0.0;
        }
        let total = self.expected_rows.max(self.actual_rows);
        if total == 0 {
            return 1.0;
        }
        self.matched_rows as f64 / total as f64
    }

    fn misaligned(mismatches: Vec<Mismatch>, expected: &ResultSet, actual: &ResultSet) -> Self {
        Self {
            equivalent: false,
            mismatches,
            columns_aligned: false,
            matched_rows: 0,
            expected_rows: expected.num_rows(),
            actual_rows: actual.num_rows(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
}

type RowKey = Vec<ValueKey>;

fn value_key(value: &Value, case_sensitive: bool) -> ValueKey {
    let text = |text: String| {
        if case_sensitive {
            ValueKey::Text(text)
        } else {
            ValueKey::Text(text.to_lowercase())
        }
    };
    match value {
        Value::Null => ValueKey::Null,
        Value::Boolean(v) => ValueKey::Bool(*v),
        Value::Integer(v) => ValueKey::Int(*v),
        Value::Float(v) => integral_float(*v).map_or_else(
            || {
                let canonical = if v.is_nan() { f64::NAN } else { *v };
                ValueKey::Float(canonical.to_bits())
            },
            ValueKey::Int,
        ),
        Value::Text(v) => text(v.clone()),
        Value::Date(v) => text(v.format(DATE_FORMAT).to_string()),
        Value::Timestamp(v) => text(v.format(TIMESTAMP_FORMAT).to_string()),
    }
}

/// Compares `actual` against `expected`. Neither input is modified.
pub fn compare(
    expected: &ResultSet,
    actual: &ResultSet,
    options: &ComparisonOptions,
) -> ComparisonResult<Comparison> {
    ensure!(
        !expected.columns().is_empty(),
        verifier_error::EmptyExpectedColumnsSnafu
    );

    let projection = match align_columns(expected, actual, options) {
        Ok(projection) => projection,
        Err(mut mismatches) => {
            mismatches.truncate(options.max_mismatches);
            return Ok(Comparison::misaligned(mismatches, expected, actual));
        }
    };

    let expected_keys = expected
        .rows()
        .iter()
        .map(|row| {
            row.values()
                .iter()
                .map(|value| value_key(value, options.case_sensitive))
                .collect::<RowKey>()
        })
        .collect::<Vec<_>>();
    let actual_values = actual
        .rows()
        .iter()
        .map(|row| {
            projection
                .iter()
                .map(|idx| row.get(*idx).cloned().unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let actual_keys = actual_values
        .iter()
        .map(|values| {
            values
                .iter()
                .map(|value| value_key(value, options.case_sensitive))
                .collect::<RowKey>()
        })
        .collect::<Vec<_>>();

    let mut pending: HashMap<&RowKey, VecDeque<usize>> = HashMap::new();
    for (idx, key) in expected_keys.iter().enumerate() {
        pending.entry(key).or_default().push_back(idx);
    }
    let mut matched_rows = 0;
    let mut extra_rows = Vec::new();
    for (idx, key) in actual_keys.iter().enumerate() {
        match pending.get_mut(key).and_then(VecDeque::pop_front) {
            Some(_) => matched_rows += 1,
            None => extra_rows.push(idx),
        }
    }
    let mut missing_rows = pending.into_values().flatten().collect::<Vec<_>>();
    missing_rows.sort_unstable();

    let mut comparison = Comparison {
        equivalent: missing_rows.is_empty() && extra_rows.is_empty(),
        mismatches: Vec::new(),
        columns_aligned: true,
        matched_rows,
        expected_rows: expected.num_rows(),
        actual_rows: actual.num_rows(),
    };

    if comparison.equivalent {
        if options.mode == ComparisonMode::Exact && expected_keys != actual_keys {
            comparison.equivalent = false;
            if options.max_mismatches > 0 {
                comparison.mismatches.push(Mismatch::RowOrder);
            }
        }
        return Ok(comparison);
    }

    comparison.mismatches = diagnose(
        expected,
        &expected_keys,
        &actual_values,
        &actual_keys,
        &missing_rows,
        &extra_rows,
        options.max_mismatches,
    );
    Ok(comparison)
}

/// For each expected column, the index of the actual column holding it.
fn align_columns(
    expected: &ResultSet,
    actual: &ResultSet,
    options: &ComparisonOptions,
) -> Result<Vec<usize>, Vec<Mismatch>> {
    let expected_count = expected.columns().len();
    let actual_count = actual.columns().len();
    let count_mismatch = || Mismatch::ColumnCount {
        expected: expected_count,
        actual: actual_count,
    };

    if !options.mode.matches_columns_by_name() {
        if expected_count != actual_count {
            return Err(vec![count_mismatch()]);
        }
        return Ok((0..expected_count).collect());
    }

    let mut taken = HashSet::new();
    let mut projection = Vec::with_capacity(expected_count);
    let mut missing = Vec::new();
    for column in expected.columns() {
        let found = actual
            .columns()
            .iter()
            .enumerate()
            .find(|(idx, candidate)| {
                !taken.contains(idx) && candidate.name.eq_ignore_ascii_case(&column.name)
            })
            .map(|(idx, _)| idx);
        match found {
            Some(idx) => {
                taken.insert(idx);
                projection.push(idx);
            }
            None => missing.push(Mismatch::MissingColumn {
                name: column.name.clone(),
            }),
        }
    }
    if !missing.is_empty() {
        return Err(missing);
    }
    if actual_count != expected_count {
        return Err(vec![count_mismatch()]);
    }
    Ok(projection)
}

/// First column whose expected values are all distinct, else the first column.
fn guess_key_column(expected_keys: &[RowKey], width: usize) -> usize {
    (0..width)
        .find(|col| {
            let mut seen = HashSet::new();
            expected_keys.iter().all(|row| seen.insert(&row[*col]))
        })
        .unwrap_or(0)
}

fn diagnose(
    expected: &ResultSet,
    expected_keys: &[RowKey],
    actual_values: &[Vec<Value>],
    actual_keys: &[RowKey],
    missing_rows: &[usize],
    extra_rows: &[usize],
    max_mismatches: usize,
) -> Vec<Mismatch> {
    let key_column = guess_key_column(expected_keys, expected.columns().len());

    let mut unpaired: HashMap<&ValueKey, VecDeque<usize>> = HashMap::new();
    for idx in missing_rows {
        unpaired
            .entry(&expected_keys[*idx][key_column])
            .or_default()
            .push_back(*idx);
    }

    let mut mismatches = Vec::new();
    for actual_idx in extra_rows {
        let paired = unpaired
            .get_mut(&actual_keys[*actual_idx][key_column])
            .and_then(VecDeque::pop_front);
        let Some(expected_idx) = paired else {
            mismatches.push(Mismatch::ExtraRow {
                values: actual_values[*actual_idx].clone(),
            });
            continue;
        };
        let expected_row = &expected.rows()[expected_idx];
        for (col, column) in expected.columns().iter().enumerate() {
            if expected_keys[expected_idx][col] != actual_keys[*actual_idx][col] {
                mismatches.push(Mismatch::ValueMismatch {
                    row: expected_idx,
                    column: column.name.clone(),
                    expected: expected_row.get(col).cloned().unwrap_or_default(),
                    actual: actual_values[*actual_idx][col].clone(),
                });
            }
        }
    }

    let mut still_missing = unpaired.into_values().flatten().collect::<Vec<_>>();
    still_missing.sort_unstable();
    mismatches.extend(still_missing.into_iter().map(|idx| Mismatch::MissingRow {
        values: expected.rows()[idx].values().to_vec(),
    }));
    mismatches.truncate(max_mismatches);
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_executor::{Column, Row};

    fn result_set(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
        ResultSet::try_new(
            columns.iter().map(|name| Column::new(name, "")).collect(),
            rows.into_iter().map(Row::new).collect(),
        )
        .unwrap_or_else(|_| ResultSet::empty())
    }

    fn options(mode: ComparisonMode) -> ComparisonOptions {
        ComparisonOptions {
            mode,
            ..ComparisonOptions::default()
        }
    }

    fn people() -> ResultSet {
        result_set(
            &["id", "name"],
            vec![
                vec![1.into(), "Alice".into()],
                vec![2.into(), "Bob".into()],
                vec![3.into(), "Carol".into()],
            ],
        )
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_numeric_equivalence() {
        let expected = result_set(&["n"], vec![vec![5.into()], vec![2.5.into()]]);
        let actual = result_set(&["n"], vec![vec![5.0.into()], vec![2.5.into()]]);
        let comparison = compare(&expected, &actual, &ComparisonOptions::default()).unwrap();
        assert!(comparison.equivalent);

        let rounded = result_set(&["n"], vec![vec![5.into()], vec![2.500_000_1.into()]]);
        let comparison = compare(&expected, &rounded, &ComparisonOptions::default()).unwrap();
        assert!(!comparison.equivalent);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_case_sensitivity() {
        let expected = result_set(&["name"], vec![vec!["Alice".into()]]);
        let actual = result_set(&["name"], vec![vec!["ALICE".into()]]);
        assert!(
            !compare(&expected, &actual, &ComparisonOptions::default())
                .unwrap()
                .equivalent
        );
        let insensitive = ComparisonOptions {
            case_sensitive: false,
            ..ComparisonOptions::default()
        };
        assert!(compare(&expected, &actual, &insensitive).unwrap().equivalent);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_dates_match_iso_text() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let expected = result_set(&["d"], vec![vec!["2024-01-05".into()]]);
        let actual = result_set(&["d"], vec![vec![Value::Date(date)]]);
        assert!(
            compare(&expected, &actual, &ComparisonOptions::default())
                .unwrap()
                .equivalent
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_nulls_are_equal() {
        let expected = result_set(&["a"], vec![vec![Value::Null], vec![1.into()]]);
        let actual = result_set(&["a"], vec![vec![1.into()], vec![Value::Null]]);
        assert!(
            compare(&expected, &actual, &ComparisonOptions::default())
                .unwrap()
                .equivalent
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_duplicates_are_counted() {
        let expected = result_set(&["a"], vec![vec![1.into()], vec![1.into()], vec![2.into()]]);
        let actual = result_set(&["a"], vec![vec![1.into()], vec![2.into()], vec![2.into()]]);
        let comparison = compare(&expected, &actual, &ComparisonOptions::default()).unwrap();
        assert!(!comparison.equivalent);
        assert_eq!(comparison.matched_rows, 2);
        assert_eq!(
            comparison.mismatches,
            vec![
                Mismatch::ExtraRow {
                    values: vec![2.into()]
                },
                Mismatch::MissingRow {
                    values: vec![1.into()]
                },
            ]
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_exact_mode_reports_row_order() {
        let expected = people();
        let reversed = result_set(
            &["id", "name"],
            expected.rows().iter().rev().map(|row| row.values().to_vec()).collect(),
        );
        let unordered = compare(&expected, &reversed, &ComparisonOptions::default()).unwrap();
        assert!(unordered.equivalent);

        let exact = compare(&expected, &reversed, &options(ComparisonMode::Exact)).unwrap();
        assert!(!exact.equivalent);
        assert_eq!(exact.mismatches, vec![Mismatch::RowOrder]);
        assert!((exact.row_fraction() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_positional_modes_ignore_column_names() {
        let aliased = result_set(
            &["employee_id", "full_name"],
            people().rows().iter().map(|row| row.values().to_vec()).collect(),
        );
        for mode in [ComparisonMode::Exact, ComparisonMode::UnorderedRows] {
            assert!(compare(&people(), &aliased, &options(mode)).unwrap().equivalent);
        }
        let by_name =
            compare(&people(), &aliased, &options(ComparisonMode::UnorderedColumnsAndRows))
                .unwrap();
        assert!(!by_name.equivalent);
        assert_eq!(
            by_name.mismatches,
            vec![
                Mismatch::MissingColumn {
                    name: "id".to_string()
                },
                Mismatch::MissingColumn {
                    name: "name".to_string()
                },
            ]
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_columns_matched_by_name() {
        let swapped = result_set(
            &["NAME", "Id"],
            vec![
                vec!["Carol".into(), 3.into()],
                vec!["Alice".into(), 1.into()],
                vec!["Bob".into(), 2.into()],
            ],
        );
        let comparison = compare(
            &people(),
            &swapped,
            &options(ComparisonMode::UnorderedColumnsAndRows),
        )
        .unwrap();
        assert!(comparison.equivalent);

        let positional = compare(&people(), &swapped, &ComparisonOptions::default()).unwrap();
        assert!(!positional.equivalent);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_column_count_mismatch_skips_rows() {
        let narrow = result_set(&["name"], vec![vec!["Alice".into()]]);
        let comparison = compare(&narrow, &people(), &ComparisonOptions::default()).unwrap();
        assert!(!comparison.equivalent);
        assert!(!comparison.columns_aligned);
        assert_eq!(
            comparison.mismatches,
            vec![Mismatch::ColumnCount {
                expected: 1,
                actual: 2
            }]
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_value_mismatch_paired_on_key() {
        let actual = result_set(
            &["id", "name"],
            vec![
                vec![3.into(), "Caroline".into()],
                vec![1.into(), "Alice".into()],
                vec![4.into(), "Dave".into()],
            ],
        );
        let comparison = compare(&people(), &actual, &ComparisonOptions::default()).unwrap();
        assert!(!comparison.equivalent);
        assert_eq!(comparison.matched_rows, 1);
        assert_eq!(
            comparison.mismatches,
            vec![
                Mismatch::ValueMismatch {
                    row: 2,
                    column: "name".to_string(),
                    expected: "Carol".into(),
                    actual: "Caroline".into(),
                },
                Mismatch::ExtraRow {
                    values: vec![4.into(), "Dave".into()]
                },
                Mismatch::MissingRow {
                    values: vec![2.into(), "Bob".into()]
                },
            ]
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_mismatches_are_capped() {
        let expected = result_set(&["n"], (0..100).map(|n: i64| vec![n.into()]).collect());
        let actual = result_set(&["n"], (100..200).map(|n: i64| vec![n.into()]).collect());
        let capped = ComparisonOptions {
            max_mismatches: 10,
            ..ComparisonOptions::default()
        };
        let comparison = compare(&expected, &actual, &capped).unwrap();
        assert_eq!(comparison.mismatches.len(), 10);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_empty_results() {
        let empty = result_set(&["a"], vec![]);
        let comparison = compare(&empty, &empty, &options(ComparisonMode::Exact)).unwrap();
        assert!(comparison.equivalent);

        let no_columns = ResultSet::empty();
        assert!(compare(&no_columns, &empty, &ComparisonOptions::default()).is_err());
    }
}
