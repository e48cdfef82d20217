//! Join discovery without declared foreign keys.
//!
//! Discovery works from sampled data only:
//!
//! 1. **Id-like detection** - sample each table once and keep columns that
//!    look like keys (non-boolean integers, or low-cardinality word tokens)
//! 2. **Containment testing** - for every id-like column pair of matching
//!    SQL type across two tables, check whether the left values are
//!    contained in the right ones, stopping as soon as the inclusion
//!    threshold is reached
//!
//! Every compatible pair becomes a directed edge of the `DependencyGraph`.
//!
//! # Example
//!
//! ```ignore
//! use colscout::discovery::{DependencyGraphBuilder, DiscoveryConfig};
//!
//! let mut builder = DependencyGraphBuilder::new(DiscoveryConfig::default());
//! let graph = builder.build(&access).await?;
//! println!("{}", graph);
//! ```

mod builder;
mod joinability;

pub use builder::{BuildStats, DependencyGraphBuilder};
pub use joinability::{JoinabilityAnalyzer, Overlap};

/// Default thresholds for discovery.
pub mod defaults {
    /// Fraction of left values that must be found on the right side.
    pub const INCLUDE_THRESHOLD: f64 = 0.8;
    /// Distinct string values allowed in an id-like text column sample.
    pub const STR_ID_MAX_UNIQUE_VALUES: usize = 500;
    /// Rows sampled per table when looking for id-like columns.
    pub const ID_SAMPLE_ROWS: usize = 1000;
    /// Minimum rows sampled per join candidate column.
    pub const MIN_COLUMN_SAMPLE: usize = 5000;
    /// Column samples kept in memory at once during a run.
    pub const MAX_CACHED_COLUMNS: usize = 256;
    /// Surrogate key names never treated as join candidates.
    pub const EXCLUDED_COLUMNS: &[&str] = &["id", "row_id"];
}

/// Configuration for join discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    /// Minimum left-in-right inclusion ratio to declare two columns compatible.
    pub include_threshold: f64,
    /// Upper bound (exclusive) on distinct values of an id-like string column.
    pub str_id_max_unique_values: usize,
    /// Rows sampled per table for id-like detection.
    pub id_sample_rows: usize,
    /// Floor of the per-column sample used in containment tests.
    pub min_column_sample: usize,
    /// Bound on column samples cached during one run.
    pub max_cached_columns: usize,
    /// Column names skipped regardless of their values.
    pub excluded_columns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            include_threshold: defaults::INCLUDE_THRESHOLD,
            str_id_max_unique_values: defaults::STR_ID_MAX_UNIQUE_VALUES,
            id_sample_rows: defaults::ID_SAMPLE_ROWS,
            min_column_sample: defaults::MIN_COLUMN_SAMPLE,
            max_cached_columns: defaults::MAX_CACHED_COLUMNS,
            excluded_columns: defaults::EXCLUDED_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl DiscoveryConfig {
    /// Builder: set the inclusion threshold.
    pub fn with_include_threshold(mut self, threshold: f64) -> Self {
        self.include_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Builder: set the distinct-value bound for string ids.
    pub fn with_str_id_max_unique_values(mut self, max: usize) -> Self {
        self.str_id_max_unique_values = max;
        self
    }

    /// Builder: set the per-column sample floor.
    pub fn with_min_column_sample(mut self, rows: usize) -> Self {
        self.min_column_sample = rows;
        self
    }

    /// Builder: replace the excluded column names.
    pub fn with_excluded_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}
