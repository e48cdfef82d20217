//! Column-level joinability tests.
//!
//! Two questions are answered here: does a sampled column look like a key,
//! and are the values of one key column contained in another.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::DiscoveryConfig;
use crate::metadata::{ColumnDescriptor, Value};

/// Word characters only: letters, digits, underscore.
static WORD_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").unwrap());

/// Outcome of a containment test between a left sample and a right set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    /// Left values found in the right set.
    pub matched: usize,
    /// Left values examined before stopping.
    pub examined: usize,
    /// Total left values.
    pub total: usize,
}

impl Overlap {
    /// Fraction of all left values found so far.
    ///
    /// `None` when the left sample is empty.
    pub fn ratio(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.matched as f64 / self.total as f64)
    }

    /// Whether the test stopped before examining every left value.
    pub fn short_circuited(&self) -> bool {
        self.examined < self.total
    }

    /// Whether the ratio reaches `threshold`. An empty sample never does.
    pub fn reaches(&self, threshold: f64) -> bool {
        self.ratio().is_some_and(|r| r >= threshold)
    }
}

/// Decides whether columns are id-like and whether they join.
#[derive(Debug, Clone)]
pub struct JoinabilityAnalyzer {
    include_threshold: f64,
    str_id_max_unique_values: usize,
    excluded_columns: HashSet<String>,
}

impl JoinabilityAnalyzer {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            include_threshold: config.include_threshold,
            str_id_max_unique_values: config.str_id_max_unique_values,
            excluded_columns: config
                .excluded_columns
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
        }
    }

    pub fn include_threshold(&self) -> f64 {
        self.include_threshold
    }

    /// Whether the column name is on the exclusion list (case-insensitive).
    pub fn is_excluded(&self, column: &str) -> bool {
        self.excluded_columns.contains(&column.to_lowercase())
    }

    /// Whether a column sample resembles a primary/foreign key.
    ///
    /// Integer columns qualify unless every value is 0 or 1. Text columns
    /// qualify when every value is a single word token and the sample has
    /// fewer than `str_id_max_unique_values` distinct values. Empty samples,
    /// NULLs and mixed types never qualify.
    pub fn is_id_like(&self, values: &[Value]) -> bool {
        if values.is_empty() {
            return false;
        }

        if values.iter().all(|v| matches!(v, Value::Integer(_))) {
            return !values.iter().all(|v| matches!(v, Value::Integer(0 | 1)));
        }

        let Some(texts) = values.iter().map(Value::as_text).collect::<Option<Vec<_>>>() else {
            return false;
        };
        if !texts.iter().all(|t| WORD_TOKEN.is_match(t)) {
            return false;
        }
        let distinct: HashSet<&str> = texts.into_iter().collect();
        distinct.len() < self.str_id_max_unique_values
    }

    /// Full containment ratio of `left` in `right`.
    ///
    /// `None` when `left` is empty.
    pub fn overlap_ratio(&self, left: &[Value], right: &HashSet<Value>) -> Option<f64> {
        let matched = left.iter().filter(|v| right.contains(*v)).count();
        Overlap {
            matched,
            examined: left.len(),
            total: left.len(),
        }
        .ratio()
    }

    /// Containment test that stops once the inclusion threshold is reached.
    pub fn test_inclusion(&self, left: &[Value], right: &HashSet<Value>) -> Overlap {
        let total = left.len();
        let mut overlap = Overlap {
            matched: 0,
            examined: 0,
            total,
        };
        for value in left {
            overlap.examined += 1;
            if right.contains(value) {
                overlap.matched += 1;
                if overlap.reaches(self.include_threshold) {
                    break;
                }
            }
        }
        overlap
    }

    /// Whether `left` could be joined onto `right`.
    ///
    /// Declared SQL types must match exactly; then the sampled left values
    /// must reach the inclusion threshold against the right set.
    pub fn is_compatible(
        &self,
        left: &ColumnDescriptor,
        left_values: &[Value],
        right: &ColumnDescriptor,
        right_values: &HashSet<Value>,
    ) -> bool {
        if left.sql_type != right.sql_type {
            return false;
        }
        self.test_inclusion(left_values, right_values)
            .reaches(self.include_threshold)
    }
}

impl Default for JoinabilityAnalyzer {
    fn default() -> Self {
        Self::new(&DiscoveryConfig::default())
    }
}
