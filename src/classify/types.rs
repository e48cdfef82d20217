//! Data exchanged with column classifiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{ClassifierError, ClassifierResult};

fn default_count() -> usize {
    1
}

/// One line of labelled ground truth: `count` datasets of `label` drawn
/// from `table.column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrainingSpec {
    pub label: String,
    /// Column as `table.column`
    pub column: String,
    /// Number of datasets drawn from the column
    #[serde(default = "default_count")]
    pub count: usize,
}

impl TrainingSpec {
    pub fn new(label: impl Into<String>, column: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            column: column.into(),
            count,
        }
    }

    /// Label in the form used for training and lookup (uppercase).
    pub fn normalized_label(&self) -> String {
        self.label.to_uppercase()
    }

    /// Split `table.column` into its parts.
    pub fn table_and_column(&self) -> ClassifierResult<(&str, &str)> {
        match self.column.split_once('.') {
            Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                Ok((table, column))
            }
            _ => Err(ClassifierError::InvalidSpec(format!(
                "expected table.column, got '{}'",
                self.column
            ))),
        }
    }
}

/// A dataset of stringified values drawn from one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnData {
    pub table: String,
    pub column: String,
    pub values: Vec<String>,
}

impl ColumnData {
    pub fn new(table: impl Into<String>, column: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            values,
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// A dataset with its ground-truth label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledColumn {
    pub label: String,
    pub data: ColumnData,
}

/// Classifier output for one column of the target database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedColumn {
    pub table: String,
    /// Qualified column name (`table.column`)
    pub column: String,
    pub data: Vec<String>,
    /// Probability per trained label
    pub probabilities: BTreeMap<String, f64>,
    /// Working score, set per ranking request
    #[serde(default)]
    pub score: f64,
}

impl ClassifiedColumn {
    /// Bare column name without the table prefix.
    pub fn column_name(&self) -> &str {
        self.column
            .split_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.column)
    }

    pub fn probability(&self, label: &str) -> Option<f64> {
        self.probabilities.get(label).copied()
    }
}
