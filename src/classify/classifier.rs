//! The classifier contract and the glue around it.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ClassifierError, ClassifierResult};
use super::ngram::NGramClassifier;
use super::types::{ClassifiedColumn, ColumnData, LabeledColumn};

/// Version of the serialized classifier envelope.
pub const CLASSIFIER_STATE_VERSION: u32 = 1;

/// Fraction of labelled datasets used for fitting; the rest is held out.
pub const TRAIN_FRACTION: f64 = 0.8;

/// Serialized trained state: labels plus a model-specific parameter blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierState {
    pub version: u32,
    /// Model kind used to pick the restoring implementation
    pub kind: String,
    pub labels: Vec<String>,
    pub parameters: serde_json::Value,
}

/// Hold-out accuracy of one label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelScore {
    /// Correctly predicted
    pub tp: usize,
    /// Held-out datasets with this label
    pub nb: usize,
    /// Predicted as this label but wrong
    pub fp: usize,
}

/// Outcome of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub trained_on: usize,
    pub held_out: usize,
    pub correct: usize,
    pub per_label: BTreeMap<String, LabelScore>,
}

impl TrainingReport {
    /// Hold-out accuracy, `None` when nothing was held out.
    pub fn accuracy(&self) -> Option<f64> {
        (self.held_out > 0).then(|| self.correct as f64 / self.held_out as f64)
    }
}

/// A model mapping column datasets to per-label probabilities.
pub trait ColumnClassifier: Send + Sync {
    /// Model kind recorded in exported state.
    fn kind(&self) -> &'static str;

    /// Labels the model was trained on, in output order.
    fn labels(&self) -> &[String];

    fn is_trained(&self) -> bool {
        !self.labels().is_empty()
    }

    /// Fit the model on labelled datasets.
    fn fit(&mut self, columns: &[LabeledColumn]) -> ClassifierResult<()>;

    /// Probability of every trained label for one dataset.
    fn predict_proba(&self, column: &ColumnData) -> ClassifierResult<BTreeMap<String, f64>>;

    /// Most probable label.
    fn predict(&self, column: &ColumnData) -> ClassifierResult<Option<String>> {
        let probabilities = self.predict_proba(column)?;
        Ok(probabilities
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(label, _)| label))
    }

    fn export_state(&self) -> ClassifierResult<ClassifierState>;
}

/// Rebuild a trained classifier from exported state.
pub fn restore_classifier(state: ClassifierState) -> ClassifierResult<Box<dyn ColumnClassifier>> {
    if state.version != CLASSIFIER_STATE_VERSION {
        return Err(ClassifierError::StateVersion {
            expected: CLASSIFIER_STATE_VERSION,
            found: state.version,
        });
    }
    match state.kind.as_str() {
        NGramClassifier::KIND => Ok(Box::new(NGramClassifier::from_state(state)?)),
        other => Err(ClassifierError::InvalidState(format!(
            "unknown classifier kind '{}'",
            other
        ))),
    }
}

/// Shuffle, fit on 80% of the datasets and score the held-out rest.
pub fn train<R: Rng + ?Sized>(
    classifier: &mut dyn ColumnClassifier,
    mut columns: Vec<LabeledColumn>,
    rng: &mut R,
) -> ClassifierResult<TrainingReport> {
    if columns.is_empty() {
        return Err(ClassifierError::EmptyTrainingSet);
    }
    columns.shuffle(rng);

    let split = (columns.len() as f64 * TRAIN_FRACTION).ceil() as usize;
    let held_out = columns.split_off(split.min(columns.len()));

    info!(train = columns.len(), test = held_out.len(), "Fitting model");
    classifier.fit(&columns)?;

    let mut report = TrainingReport {
        trained_on: columns.len(),
        held_out: held_out.len(),
        ..Default::default()
    };
    for label in classifier.labels() {
        report.per_label.insert(label.clone(), LabelScore::default());
    }

    for column in &held_out {
        let predicted = classifier.predict(&column.data)?;
        report.per_label.entry(column.label.clone()).or_default().nb += 1;
        match predicted {
            Some(label) if label == column.label => {
                report.correct += 1;
                report.per_label.entry(label).or_default().tp += 1;
            }
            Some(label) => report.per_label.entry(label).or_default().fp += 1,
            None => {}
        }
    }

    for (label, score) in &report.per_label {
        info!(
            label = %label,
            tp = score.tp,
            nb = score.nb,
            fp = score.fp,
            "Hold-out score"
        );
    }
    if let Some(accuracy) = report.accuracy() {
        info!(
            correct = report.correct,
            total = report.held_out,
            accuracy = %format!("{:.2}%", accuracy * 100.0),
            "Hold-out accuracy"
        );
    }
    Ok(report)
}

/// Classify every column dataset of the target database.
pub fn classify(
    classifier: &dyn ColumnClassifier,
    columns: Vec<ColumnData>,
) -> ClassifierResult<Vec<ClassifiedColumn>> {
    if !classifier.is_trained() {
        return Err(ClassifierError::NotTrained);
    }
    columns
        .into_iter()
        .map(|data| {
            let probabilities = classifier.predict_proba(&data)?;
            Ok(ClassifiedColumn {
                column: data.qualified_name(),
                table: data.table,
                data: data.values,
                probabilities,
                score: 0.0,
            })
        })
        .collect()
}
