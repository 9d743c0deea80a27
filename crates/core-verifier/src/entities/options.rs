use core_executor::Clause;
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ComparisonMode {
    /// Same columns by position, same rows in the same order
    Exact,
    /// Same columns by position, rows compared as a multiset
    #[default]
    UnorderedRows,
    /// Columns matched by name, rows compared as a multiset
    UnorderedColumnsAndRows,
}

impl ComparisonMode {
    #[must_use]
    pub const fn matches_columns_by_name(self) -> bool {
        matches!(self, Self::UnorderedColumnsAndRows)
    }
}

/// Partial-credit requirements. A list left unset is taken from the
/// reference query; an empty list means "no requirement".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialCreditConfig {
    #[serde(default)]
    pub required_clauses: Option<Vec<Clause>>,
    #[serde(default)]
    pub required_tables: Option<Vec<String>>,
}

impl PartialCreditConfig {
    #[must_use]
    pub fn with_required_clauses(mut self, clauses: Vec<Clause>) -> Self {
        self.required_clauses = Some(clauses);
        self
    }

    #[must_use]
    pub fn with_required_tables(mut self, tables: Vec<String>) -> Self {
        self.required_tables = Some(tables);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Scoring {
    #[default]
    Boolean,
    PartialCredit(PartialCreditConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerificationOptions {
    pub comparison_mode: ComparisonMode,
    pub case_sensitive: bool,
    pub timeout_ms: u64,
    /// Let the submission modify its private copy of the schema
    pub allow_writes: bool,
    pub scoring: Scoring,
    pub max_mismatches: usize,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            comparison_mode: ComparisonMode::default(),
            case_sensitive: true,
            timeout_ms: 5_000,
            allow_writes: false,
            scoring: Scoring::default(),
            max_mismatches: 50,
        }
    }
}

impl VerificationOptions {
    #[must_use]
    pub const fn with_comparison_mode(mut self, mode: ComparisonMode) -> Self {
        self.comparison_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub const fn with_allow_writes(mut self, allow_writes: bool) -> Self {
        self.allow_writes = allow_writes;
        self
    }

    #[must_use]
    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_options_defaults() {
        let options: VerificationOptions = serde_yaml::from_str("{}").unwrap_or_default();
        assert_eq!(options, VerificationOptions::default());
        assert_eq!(options.comparison_mode, ComparisonMode::UnorderedRows);
        assert!(options.case_sensitive);
        assert_eq!(options.timeout_ms, 5_000);
        assert_eq!(options.scoring, Scoring::Boolean);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_options_from_yaml() {
        let options: VerificationOptions = serde_yaml::from_str(
            "comparisonMode: exact\ncaseSensitive: false\ntimeoutMs: 250\nscoring:\n  type: partial-credit\n  requiredClauses: [where, group-by]\n",
        )
        .unwrap();
        assert_eq!(options.comparison_mode, ComparisonMode::Exact);
        assert!(!options.case_sensitive);
        assert_eq!(options.timeout_ms, 250);
        assert_eq!(
            options.scoring,
            Scoring::PartialCredit(
                PartialCreditConfig::default()
                    .with_required_clauses(vec![Clause::Where, Clause::GroupBy])
            )
        );
    }

    #[test]
    fn test_comparison_mode_from_str() {
        assert_eq!(
            ComparisonMode::from_str("Unordered-Columns-And-Rows").ok(),
            Some(ComparisonMode::UnorderedColumnsAndRows)
        );
        assert_eq!(ComparisonMode::Exact.to_string(), "exact");
    }
}
