//! Column classification into resource types.
//!
//! ```text
//! TrainingSpec ──► DatasetSampler ──► LabeledColumn ──► train() ──► ColumnClassifier
//!                                                                        │
//! target database ──► DatasetSampler ──► ColumnData ──► classify() ──────┘
//!                                                           │
//!                                                           ▼
//!                                                   ClassifiedColumn
//! ```
//!
//! Only the `ColumnClassifier` contract matters to ranking. `NGramClassifier`
//! is the default implementation; its trained state is exported as a
//! versioned `ClassifierState` and restored with `restore_classifier`.

mod classifier;
mod dataset;
mod error;
mod features;
mod ngram;
mod types;

pub use classifier::{
    classify, restore_classifier, train, ClassifierState, ColumnClassifier, LabelScore,
    TrainingReport, CLASSIFIER_STATE_VERSION, TRAIN_FRACTION,
};
pub use dataset::{DatasetSampler, DEFAULT_DATASET_SIZE, FREQUENCY_COLUMN};
pub use error::{ClassifierError, ClassifierResult};
pub use features::{cell_ngrams, StatFeatures, NGRAM_RANGE};
pub use ngram::NGramClassifier;
pub use types::{ClassifiedColumn, ColumnData, LabeledColumn, TrainingSpec};
