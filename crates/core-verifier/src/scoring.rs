use std::collections::BTreeSet;

use core_executor::{Clause, QueryAnalysis};

use crate::comparator::Comparison;
use crate::entities::PartialCreditConfig;

const TABLES_WEIGHT: f64 = 20.0;
const CLAUSES_WEIGHT: f64 = 40.0;
const COLUMNS_WEIGHT: f64 = 10.0;
const ROWS_WEIGHT: f64 = 30.0;

/// Highest score an incorrect answer can reach.
pub const MAX_PARTIAL_SCORE: u8 = 99;

#[must_use]
pub const fn boolean_score(is_correct: bool) -> u8 {
    if is_correct { 100 } else { 0 }
}

/// Resolved partial-credit requirements for one challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rubric {
    pub required_tables: BTreeSet<String>,
    pub required_clauses: BTreeSet<Clause>,
}

impl Rubric {
    /// Configured requirements win; unset ones fall back to the reference analysis.
    #[must_use]
    pub fn new(config: &PartialCreditConfig, reference: Option<&QueryAnalysis>) -> Self {
        let required_tables = config.required_tables.as_ref().map_or_else(
            || reference.map(|r| r.tables.clone()).unwrap_or_default(),
            |tables| tables.iter().map(|table| table.to_lowercase()).collect(),
        );
        let required_clauses = config.required_clauses.as_ref().map_or_else(
            || reference.map(|r| r.clauses.clone()).unwrap_or_default(),
            |clauses| clauses.iter().copied().collect(),
        );
        Self {
            required_tables,
            required_clauses,
        }
    }

    /// Scores an incorrect answer. `comparison` is `None` when the candidate
    /// failed to execute, which leaves only the structural credit.
    #[must_use]
    #[allow(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn score(&self, candidate: &QueryAnalysis, comparison: Option<&Comparison>) -> u8 {
        let mut earned = 0.0;
        let mut total = COLUMNS_WEIGHT + ROWS_WEIGHT;

        if !self.required_tables.is_empty() {
            total += TABLES_WEIGHT;
            earned += TABLES_WEIGHT
                * fraction(
                    self.required_tables
                        .iter()
                        .filter(|table| candidate.tables.contains(*table))
                        .count(),
                    self.required_tables.len(),
                );
        }
        if !self.required_clauses.is_empty() {
            total += CLAUSES_WEIGHT;
            earned += CLAUSES_WEIGHT
                * fraction(
                    self.required_clauses
                        .iter()
                        .filter(|clause| candidate.clauses.contains(*clause))
                        .count(),
                    self.required_clauses.len(),
                );
        }
        if let Some(comparison) = comparison {
            if comparison.columns_aligned {
                earned += COLUMNS_WEIGHT;
            }
            earned += ROWS_WEIGHT * comparison.row_fraction();
        }

        let score = (100.0 * earned / total).round().clamp(0.0, 100.0) as u8;
        score.min(MAX_PARTIAL_SCORE)
    }
}

#[allow(clippy::as_conversions, clippy::cast_precision_loss)]
fn fraction(hits: usize, required: usize) -> f64 {
    if required == 0 {
        return 0.0;
    }
    hits as f64 / required as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_executor::analyze_query;

    fn analysis(sql: &str) -> QueryAnalysis {
        analyze_query(sql).unwrap_or_default()
    }

    fn comparison(columns_aligned: bool, matched_rows: usize, rows: usize) -> Comparison {
        Comparison {
            equivalent: false,
            mismatches: vec![],
            columns_aligned,
            matched_rows,
            expected_rows: rows,
            actual_rows: rows,
        }
    }

    #[test]
    fn test_boolean_score() {
        assert_eq!(boolean_score(true), 100);
        assert_eq!(boolean_score(false), 0);
    }

    #[test]
    fn test_rubric_falls_back_to_reference() {
        let reference = analysis("SELECT name FROM employees WHERE salary > 50000");
        let rubric = Rubric::new(&PartialCreditConfig::default(), Some(&reference));
        assert_eq!(
            rubric.required_tables,
            BTreeSet::from(["employees".to_string()])
        );
        assert_eq!(rubric.required_clauses, BTreeSet::from([Clause::Where]));

        let configured = Rubric::new(
            &PartialCreditConfig::default()
                .with_required_clauses(vec![])
                .with_required_tables(vec!["Employees".to_string()]),
            Some(&reference),
        );
        assert!(configured.required_clauses.is_empty());
        assert!(configured.required_tables.contains("employees"));
    }

    #[test]
    fn test_structure_without_matching_columns() {
        let rubric = Rubric::new(
            &PartialCreditConfig::default().with_required_clauses(vec![Clause::Where]),
            Some(&analysis("SELECT name FROM employees WHERE salary > 50000")),
        );
        let candidate = analysis("SELECT * FROM employees WHERE salary > 50000");
        assert_eq!(rubric.score(&candidate, Some(&comparison(false, 0, 2))), 60);
    }

    #[test]
    fn test_row_credit() {
        let rubric = Rubric::new(
            &PartialCreditConfig::default(),
            Some(&analysis("SELECT name FROM employees WHERE salary > 50000")),
        );
        let candidate = analysis("SELECT name FROM employees WHERE salary >= 50000");
        // 20 + 40 + 10 + 30 * 2/4
        assert_eq!(rubric.score(&candidate, Some(&comparison(true, 2, 4))), 85);
        // Execution failures keep the structural share only
        assert_eq!(rubric.score(&candidate, None), 60);
    }

    #[test]
    fn test_incorrect_answer_is_capped() {
        let rubric = Rubric::default();
        let candidate = analysis("SELECT 1");
        assert_eq!(
            rubric.score(&candidate, Some(&comparison(true, 10, 10))),
            MAX_PARTIAL_SCORE
        );
    }

    #[test]
    fn test_missing_structure() {
        let rubric = Rubric::new(
            &PartialCreditConfig::default(),
            Some(&analysis(
                "SELECT department, COUNT(*) FROM employees GROUP BY department",
            )),
        );
        let candidate = analysis("SELECT department FROM employees");
        // tables 20 of 20, clauses 0 of 40, columns 10, rows 0
        assert_eq!(rubric.score(&candidate, Some(&comparison(true, 0, 3))), 30);
    }
}
