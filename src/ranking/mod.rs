//! Ranking of classified columns against a search query.
//!
//! The score of a column starts at the classifier probability of the
//! requested resource type and is then multiplied by:
//!
//! - `2^-distance` from the anchor table, when one is given
//! - `1 / sqrt(1 + d)` where `d` is the name distance, when a name is given
//!
//! Results are sorted by score (stable) and truncated.

mod name_match;

pub use name_match::{name_distance, name_factor};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classify::ClassifiedColumn;
use crate::graph::{DependencyGraph, Distance};

/// Default ranking settings.
pub mod defaults {
    pub const MIN_SCORE: f64 = 0.0;
    pub const MAX_RESULTS: usize = 10;
    pub const DISPLAY_VALUES: usize = 20;
}

/// Ranking settings shared by every query against an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Candidates scoring at or below this value are dropped.
    pub min_score: f64,
    /// Result cap when the query gives none.
    pub max_results: usize,
    /// Sample values kept per result.
    pub display_values: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_score: defaults::MIN_SCORE,
            max_results: defaults::MAX_RESULTS,
            display_values: defaults::DISPLAY_VALUES,
        }
    }
}

/// A column search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub resource_type: String,
    pub anchor_table: Option<String>,
    pub name_query: Option<String>,
    pub max_results: Option<usize>,
}

impl SearchQuery {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Default::default()
        }
    }

    pub fn with_anchor(mut self, table: impl Into<String>) -> Self {
        self.anchor_table = Some(table.into());
        self
    }

    pub fn with_name(mut self, query: impl Into<String>) -> Self {
        self.name_query = Some(query.into());
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedColumn {
    pub table: String,
    pub column: String,
    pub data: Vec<String>,
    pub score: f64,
}

impl From<ClassifiedColumn> for RankedColumn {
    fn from(column: ClassifiedColumn) -> Self {
        Self {
            table: column.table,
            column: column.column,
            data: column.data,
            score: column.score,
        }
    }
}

/// Scores and orders classified columns.
#[derive(Debug, Clone, Default)]
pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Copies of the columns scored by their probability of `resource_type`,
    /// filtered by the minimum score, data truncated for display.
    ///
    /// A column without the label scores 1.
    pub fn candidates(
        &self,
        resource_type: &str,
        columns: &[ClassifiedColumn],
    ) -> Vec<ClassifiedColumn> {
        let label = resource_type.to_uppercase();
        let mut missing = 0usize;
        let candidates: Vec<ClassifiedColumn> = columns
            .iter()
            .filter_map(|column| {
                let score = column.probability(&label).unwrap_or_else(|| {
                    missing += 1;
                    1.0
                });
                if score <= self.config.min_score {
                    return None;
                }
                let mut candidate = column.clone();
                candidate.score = score;
                candidate.data.truncate(self.config.display_values);
                Some(candidate)
            })
            .collect();
        if missing > 0 {
            warn!(resource_type = %label, columns = missing, "No ResourceType was provided");
        }
        candidates
    }

    /// Rank `columns` for `query` using `graph` for anchor distances.
    pub fn rank(
        &self,
        query: &SearchQuery,
        columns: &[ClassifiedColumn],
        graph: &DependencyGraph,
    ) -> Vec<RankedColumn> {
        let mut candidates = self.candidates(&query.resource_type, columns);

        if let Some(anchor) = &query.anchor_table {
            for column in &mut candidates {
                let distance = graph
                    .get_distance(anchor, &column.table)
                    .unwrap_or_else(|err| {
                        warn!(
                            anchor = %anchor,
                            table = %column.table,
                            error = %err,
                            "Treating table as far"
                        );
                        Distance::Far
                    });
                column.score *= distance.decay();
            }
        }

        if let Some(name) = &query.name_query {
            for column in &mut candidates {
                column.score *= name_factor(name_distance(name, &column.table, &column.column));
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(query.max_results.unwrap_or(self.config.max_results));
        candidates.into_iter().map(RankedColumn::from).collect()
    }
}
