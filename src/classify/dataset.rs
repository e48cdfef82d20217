//! Building labelled training sets and classification inputs.
//!
//! A column is sampled once (`dataset_size * count` values, frequency
//! weighted when the table carries a `frequency` column), stringified and
//! shuffled. Datasets of `dataset_size` values are then drawn from that
//! sample uniformly with replacement, so a large column yields many small
//! representative datasets.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::error::ClassifierResult;
use super::types::{ColumnData, LabeledColumn, TrainingSpec};
use crate::metadata::{DataAccess, SampleOrder};

/// Column used as a sampling weight when present.
pub const FREQUENCY_COLUMN: &str = "frequency";

/// Default number of values per dataset.
pub const DEFAULT_DATASET_SIZE: usize = 100;

/// Draws column datasets from a data source.
pub struct DatasetSampler {
    dataset_size: usize,
    rng: StdRng,
}

impl DatasetSampler {
    /// Create a sampler; a seed makes the drawn datasets reproducible.
    pub fn new(dataset_size: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            dataset_size: dataset_size.max(1),
            rng,
        }
    }

    pub fn dataset_size(&self) -> usize {
        self.dataset_size
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Draw `count` datasets from `table.column`.
    ///
    /// Returns nothing when the column sample is empty.
    pub async fn fetch_datasets(
        &mut self,
        access: &dyn DataAccess,
        table: &str,
        column: &str,
        count: usize,
    ) -> ClassifierResult<Vec<ColumnData>> {
        let order = if access.has_column(table, FREQUENCY_COLUMN).await? {
            SampleOrder::Weighted {
                column: FREQUENCY_COLUMN.to_string(),
            }
        } else {
            SampleOrder::Random
        };

        let limit = self.dataset_size * count;
        let mut sampled: Vec<String> = access
            .sample_column_values(table, column, limit, &order)
            .await?
            .iter()
            .map(|v| v.to_sample_string())
            .collect();
        debug!(table, column, sampled = sampled.len(), ?order, "Sampled column");
        if sampled.is_empty() {
            return Ok(Vec::new());
        }
        sampled.shuffle(&mut self.rng);

        let datasets = (0..count)
            .map(|_| {
                let values = (0..self.dataset_size)
                    .map(|_| sampled[self.rng.random_range(0..sampled.len())].clone())
                    .collect();
                ColumnData::new(table, column, values)
            })
            .collect();
        Ok(datasets)
    }

    /// Labelled datasets for every training spec, labels uppercased.
    pub async fn training_set(
        &mut self,
        access: &dyn DataAccess,
        specs: &[TrainingSpec],
    ) -> ClassifierResult<Vec<LabeledColumn>> {
        let mut labeled = Vec::new();
        for (i, spec) in specs.iter().enumerate() {
            let (table, column) = spec.table_and_column()?;
            info!(
                column = %spec.column,
                progress = %format!("{}/{}", i + 1, specs.len()),
                "Fetching training column"
            );
            let label = spec.normalized_label();
            for data in self.fetch_datasets(access, table, column, spec.count).await? {
                labeled.push(LabeledColumn {
                    label: label.clone(),
                    data,
                });
            }
        }
        Ok(labeled)
    }

    /// One dataset per column of every table of the target database.
    pub async fn classification_inputs(
        &mut self,
        access: &dyn DataAccess,
    ) -> ClassifierResult<Vec<ColumnData>> {
        let mut inputs = Vec::new();
        for table in access.list_tables().await? {
            for column in access.list_columns(&table).await? {
                inputs.extend(self.fetch_datasets(access, &table, &column.name, 1).await?);
            }
        }
        info!(columns = inputs.len(), "Fetched classification inputs");
        Ok(inputs)
    }
}
