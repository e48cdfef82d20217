//! Nearest-centroid classifier over TF-IDF character n-grams.
//!
//! Each cell of a dataset is turned into a TF-IDF vector of its n-grams;
//! the cell vectors are summed into one column vector and the column's
//! statistical features are appended. Training keeps one centroid per
//! label. Prediction is a softmax over the cosine similarity to every
//! centroid, so every trained label gets a probability.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::classifier::{ClassifierState, ColumnClassifier, CLASSIFIER_STATE_VERSION};
use super::error::{ClassifierError, ClassifierResult};
use super::features::{cell_ngrams, StatFeatures, NGRAM_RANGE};
use super::types::{ColumnData, LabeledColumn};

/// Weight of the statistical features relative to the unit n-gram vector.
const STAT_WEIGHT: f64 = 0.5;

/// Sharpness of the softmax over similarities.
const DEFAULT_TEMPERATURE: f64 = 10.0;

/// Number of statistical features appended to every vector.
const STAT_FEATURES: usize = 3;

#[derive(Debug, Serialize, Deserialize)]
struct NGramParameters {
    vocabulary: Vec<String>,
    idf: Vec<f64>,
    centroids: Vec<Vec<f64>>,
    temperature: f64,
}

/// The default column classifier.
#[derive(Debug, Clone)]
pub struct NGramClassifier {
    labels: Vec<String>,
    vocabulary: HashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f64>,
    centroids: Vec<Vec<f64>>,
    temperature: f64,
}

impl NGramClassifier {
    pub const KIND: &'static str = "ngram";

    pub fn new() -> Self {
        Self {
            labels: Vec::new(),
            vocabulary: HashMap::new(),
            terms: Vec::new(),
            idf: Vec::new(),
            centroids: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Restore a trained classifier from exported state.
    pub fn from_state(state: ClassifierState) -> ClassifierResult<Self> {
        let params: NGramParameters = serde_json::from_value(state.parameters)?;
        let width = params.vocabulary.len() + STAT_FEATURES;

        if params.idf.len() != params.vocabulary.len() {
            return Err(ClassifierError::InvalidState(format!(
                "{} idf weights for {} terms",
                params.idf.len(),
                params.vocabulary.len()
            )));
        }
        if params.centroids.len() != state.labels.len() {
            return Err(ClassifierError::InvalidState(format!(
                "{} centroids for {} labels",
                params.centroids.len(),
                state.labels.len()
            )));
        }
        if params.centroids.iter().any(|c| c.len() != width) {
            return Err(ClassifierError::InvalidState(
                "centroid width does not match vocabulary".to_string(),
            ));
        }

        let vocabulary = params
            .vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        Ok(Self {
            labels: state.labels,
            vocabulary,
            terms: params.vocabulary,
            idf: params.idf,
            centroids: params.centroids,
            temperature: params.temperature,
        })
    }

    /// Column vector: summed unit TF-IDF cell vectors, normalized, followed
    /// by the weighted statistical features.
    fn vectorize(&self, values: &[String]) -> Vec<f64> {
        let mut vector = vec![0.0; self.terms.len() + STAT_FEATURES];

        for cell in values {
            let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
            for gram in cell_ngrams(cell, NGRAM_RANGE) {
                if let Some(&idx) = self.vocabulary.get(&gram) {
                    *counts.entry(idx).or_default() += 1.0;
                }
            }
            let weighted: Vec<(usize, f64)> = counts
                .into_iter()
                .map(|(idx, tf)| (idx, tf * self.idf[idx]))
                .collect();
            let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (idx, w) in weighted {
                    vector[idx] += w / norm;
                }
            }
        }

        let (ngrams, stats) = vector.split_at_mut(self.terms.len());
        let norm = ngrams.iter().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            ngrams.iter_mut().for_each(|w| *w /= norm);
        }
        for (slot, feature) in stats
            .iter_mut()
            .zip(StatFeatures::from_values(values).normalized())
        {
            *slot = feature * STAT_WEIGHT;
        }
        vector
    }
}

impl Default for NGramClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

fn softmax(scores: &[f64], temperature: f64) -> Vec<f64> {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores
        .iter()
        .map(|s| ((s - max) * temperature).exp())
        .collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

impl ColumnClassifier for NGramClassifier {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn fit(&mut self, columns: &[LabeledColumn]) -> ClassifierResult<()> {
        if columns.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }

        // document frequency, one document per cell
        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        let mut documents = 0usize;
        for column in columns {
            for cell in &column.data.values {
                documents += 1;
                let grams: BTreeSet<String> = cell_ngrams(cell, NGRAM_RANGE).into_iter().collect();
                for gram in grams {
                    *df.entry(gram).or_default() += 1;
                }
            }
        }

        let n = documents as f64;
        self.terms = df.keys().cloned().collect();
        self.idf = df
            .values()
            .map(|&count| ((1.0 + n) / (1.0 + count as f64)).ln() + 1.0)
            .collect();
        self.vocabulary = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        let labels: BTreeSet<&str> = columns.iter().map(|c| c.label.as_str()).collect();
        self.labels = labels.into_iter().map(str::to_string).collect();

        let width = self.terms.len() + STAT_FEATURES;
        let mut sums = vec![vec![0.0; width]; self.labels.len()];
        let mut counts = vec![0usize; self.labels.len()];
        for column in columns {
            let Some(label_idx) = self.labels.iter().position(|l| *l == column.label) else {
                continue;
            };
            let vector = self.vectorize(&column.data.values);
            for (acc, w) in sums[label_idx].iter_mut().zip(vector) {
                *acc += w;
            }
            counts[label_idx] += 1;
        }
        self.centroids = sums
            .into_iter()
            .zip(counts)
            .map(|(sum, count)| sum.into_iter().map(|w| w / count.max(1) as f64).collect())
            .collect();
        Ok(())
    }

    fn predict_proba(&self, column: &ColumnData) -> ClassifierResult<BTreeMap<String, f64>> {
        if !self.is_trained() {
            return Err(ClassifierError::NotTrained);
        }
        let vector = self.vectorize(&column.values);
        let similarities: Vec<f64> = self
            .centroids
            .iter()
            .map(|centroid| cosine(&vector, centroid))
            .collect();
        Ok(self
            .labels
            .iter()
            .cloned()
            .zip(softmax(&similarities, self.temperature))
            .collect())
    }

    fn export_state(&self) -> ClassifierResult<ClassifierState> {
        if !self.is_trained() {
            return Err(ClassifierError::NotTrained);
        }
        let params = NGramParameters {
            vocabulary: self.terms.clone(),
            idf: self.idf.clone(),
            centroids: self.centroids.clone(),
            temperature: self.temperature,
        };
        Ok(ClassifierState {
            version: CLASSIFIER_STATE_VERSION,
            kind: Self::KIND.to_string(),
            labels: self.labels.clone(),
            parameters: serde_json::to_value(params)?,
        })
    }
}
