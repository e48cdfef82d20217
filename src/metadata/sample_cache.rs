//! Run-scoped caches for sampled data.
//!
//! One `SampleCache` lives for a single analysis run against a single data
//! source. Row counts are cheap and kept for the whole run; column samples
//! are bounded and evicted oldest-first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::provider::{DataAccess, DataAccessResult};
use super::types::{SampleOrder, Value};

/// A deduplicated column sample with a set view for membership tests.
#[derive(Debug, Default)]
pub struct ColumnSample {
    /// Distinct values in first-seen order.
    pub values: Vec<Value>,
    /// The same values as a set.
    pub set: HashSet<Value>,
}

impl ColumnSample {
    pub fn from_values(raw: Vec<Value>) -> Self {
        let mut set = HashSet::with_capacity(raw.len());
        let mut values = Vec::with_capacity(raw.len());
        for value in raw {
            if set.insert(value.clone()) {
                values.push(value);
            }
        }
        Self { values, set }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Sample size for join candidates: `max(floor, round(rows^(2/3)))`.
pub fn column_sample_limit(row_count: u64, floor: usize) -> usize {
    let scaled = (row_count as f64).powf(2.0 / 3.0).round() as usize;
    scaled.max(floor)
}

/// Bounded cache of row counts and column samples for one run.
#[derive(Debug)]
pub struct SampleCache {
    row_counts: HashMap<String, u64>,
    columns: HashMap<(String, String), Arc<ColumnSample>>,
    order: VecDeque<(String, String)>,
    max_columns: usize,
    min_sample: usize,
}

impl SampleCache {
    /// Create a cache holding at most `max_columns` column samples, each of at
    /// least `min_sample` rows.
    pub fn new(max_columns: usize, min_sample: usize) -> Self {
        Self {
            row_counts: HashMap::new(),
            columns: HashMap::new(),
            order: VecDeque::new(),
            max_columns: max_columns.max(1),
            min_sample,
        }
    }

    pub async fn row_count(
        &mut self,
        access: &dyn DataAccess,
        table: &str,
    ) -> DataAccessResult<u64> {
        if let Some(count) = self.row_counts.get(table) {
            return Ok(*count);
        }
        let count = access.row_count(table).await?;
        self.row_counts.insert(table.to_string(), count);
        Ok(count)
    }

    /// Get the randomly sampled, deduplicated values of `table.column`.
    pub async fn column(
        &mut self,
        access: &dyn DataAccess,
        table: &str,
        column: &str,
    ) -> DataAccessResult<Arc<ColumnSample>> {
        let key = (table.to_string(), column.to_string());
        if let Some(sample) = self.columns.get(&key) {
            return Ok(Arc::clone(sample));
        }

        let rows = self.row_count(access, table).await?;
        let limit = column_sample_limit(rows, self.min_sample);
        let raw = access
            .sample_column_values(table, column, limit, &SampleOrder::Random)
            .await?;
        let sample = Arc::new(ColumnSample::from_values(raw));

        if self.columns.len() >= self.max_columns {
            if let Some(oldest) = self.order.pop_front() {
                self.columns.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.columns.insert(key, Arc::clone(&sample));

        Ok(sample)
    }

    pub fn cached_columns(&self) -> usize {
        self.columns.len()
    }
}
