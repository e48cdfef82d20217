//! Per-database engines.
//!
//! An `Engine` owns everything needed to answer searches for one database:
//! the dependency graph, the trained classifier and the classification of
//! every column. Engines are immutable once built; searches work on
//! per-request copies of the classified columns.
//!
//! ```text
//! DataAccess ──► DependencyGraphBuilder ──► DependencyGraph ─┐
//!     │                                                      ├──► RankingEngine ──► RankedColumn
//!     └──────► DatasetSampler ──► ColumnClassifier ──────────┘
//! ```

mod error;
mod registry;

pub use error::{EngineError, EngineResult};
pub use registry::{BuildStatus, Connector, EngineRegistry, SettingsConnector, StaticConnector};

use tracing::{info, info_span, Instrument};

use crate::classify::{
    classify, restore_classifier, train, ClassifiedColumn, ColumnClassifier, DatasetSampler,
    NGramClassifier, TrainingReport, TrainingSpec, DEFAULT_DATASET_SIZE,
};
use crate::config::{Settings, SettingsError};
use crate::discovery::{DependencyGraphBuilder, DiscoveryConfig};
use crate::graph::DependencyGraph;
use crate::metadata::DataAccess;
use crate::ranking::{RankedColumn, RankingConfig, RankingEngine, SearchQuery};
use crate::store::{compute_hash, unix_now, EngineRecord};

/// Everything needed to build and query engines.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub discovery: DiscoveryConfig,
    pub ranking: RankingConfig,
    pub training: Vec<TrainingSpec>,
    /// Database the training columns are read from; the analysed database
    /// when unset.
    pub training_database: Option<String>,
    pub dataset_size: usize,
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            ranking: RankingConfig::default(),
            training: Vec::new(),
            training_database: None,
            dataset_size: DEFAULT_DATASET_SIZE,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Validate `settings` and extract the engine configuration.
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            discovery: settings.discovery.to_config()?,
            ranking: settings.ranking.to_config()?,
            training: settings.training.specs.clone(),
            training_database: settings.training.database.clone(),
            dataset_size: settings.training.dataset_size,
            seed: settings.training.seed,
        })
    }

    /// Builder: set the training specs.
    pub fn with_training(mut self, specs: Vec<TrainingSpec>) -> Self {
        self.training = specs;
        self
    }

    /// Builder: set the dataset size and sampling seed.
    pub fn with_sampling(mut self, dataset_size: usize, seed: Option<u64>) -> Self {
        self.dataset_size = dataset_size;
        self.seed = seed;
        self
    }

    /// Builder: set the discovery configuration.
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    /// Hash of the training specs; engines trained on other specs are stale.
    pub fn training_hash(&self) -> EngineResult<String> {
        compute_hash(&self.training).map_err(|e| EngineError::Store(e.into()))
    }
}

/// A built engine for one database.
pub struct Engine {
    database_id: String,
    graph: DependencyGraph,
    classifier: Box<dyn ColumnClassifier>,
    classifications: Vec<ClassifiedColumn>,
    ranking: RankingEngine,
    training_hash: String,
    built_at: i64,
    report: Option<TrainingReport>,
}

impl Engine {
    /// Build an engine: discover joins, train the classifier and classify
    /// every column of `target`.
    pub async fn build(
        database_id: &str,
        target: &dyn DataAccess,
        training: &dyn DataAccess,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        let span = info_span!("build", database = %database_id);
        Self::build_inner(database_id, target, training, config)
            .instrument(span)
            .await
    }

    async fn build_inner(
        database_id: &str,
        target: &dyn DataAccess,
        training: &dyn DataAccess,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        info!("Building dependency graph");
        let mut builder = DependencyGraphBuilder::new(config.discovery.clone());
        let graph = builder.build(target).await?;

        info!("Building training set");
        let mut sampler = DatasetSampler::new(config.dataset_size, config.seed);
        let labeled = sampler.training_set(training, &config.training).await?;

        info!(datasets = labeled.len(), "Training classifier");
        let mut classifier = NGramClassifier::new();
        let report = train(&mut classifier, labeled, sampler.rng())?;

        info!("Classifying columns");
        let inputs = sampler.classification_inputs(target).await?;
        let classifications = classify(&classifier, inputs)?;

        Ok(Self {
            database_id: database_id.to_string(),
            graph,
            classifier: Box::new(classifier),
            classifications,
            ranking: RankingEngine::new(config.ranking.clone()),
            training_hash: config.training_hash()?,
            built_at: unix_now(),
            report: Some(report),
        })
    }

    /// Restore an engine from its stored record.
    pub fn from_record(record: EngineRecord, ranking: RankingConfig) -> EngineResult<Self> {
        Ok(Self {
            graph: DependencyGraph::from_snapshot(record.graph)?,
            classifier: restore_classifier(record.classifier)?,
            classifications: record.classifications,
            ranking: RankingEngine::new(ranking),
            training_hash: record.training_hash,
            built_at: record.built_at,
            database_id: record.database_id,
            report: None,
        })
    }

    pub fn to_record(&self) -> EngineResult<EngineRecord> {
        Ok(EngineRecord {
            database_id: self.database_id.clone(),
            graph: self.graph.to_snapshot(),
            classifier: self.classifier.export_state()?,
            classifications: self.classifications.clone(),
            training_hash: self.training_hash.clone(),
            built_at: self.built_at,
        })
    }

    /// Rank the classified columns for `query`.
    pub fn search(&self, query: &SearchQuery) -> Vec<RankedColumn> {
        self.ranking.rank(query, &self.classifications, &self.graph)
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn classifications(&self) -> &[ClassifiedColumn] {
        &self.classifications
    }

    /// Labels the classifier can assign.
    pub fn labels(&self) -> &[String] {
        self.classifier.labels()
    }

    pub fn training_hash(&self) -> &str {
        &self.training_hash
    }

    pub fn built_at(&self) -> i64 {
        self.built_at
    }

    /// Hold-out report of the training run; absent for restored engines.
    pub fn training_report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }
}
