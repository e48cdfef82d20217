//! Feature extraction for column datasets.

use std::collections::HashSet;
use std::ops::RangeInclusive;

/// N-gram sizes extracted from every cell.
pub const NGRAM_RANGE: RangeInclusive<usize> = 2..=3;

/// Characters that disqualify an n-gram.
const SEPARATORS: [char; 4] = [' ', '.', '?', '!'];

/// Character n-grams of a single cell.
///
/// A trailing `.` is dropped first. Grams containing a separator are
/// skipped and every ASCII digit is masked as `\d`. A single-character
/// cell also yields the anchored unigram `^c$` unless unigrams are already
/// requested.
pub fn cell_ngrams(cell: &str, range: RangeInclusive<usize>) -> Vec<String> {
    let cell = cell.strip_suffix('.').unwrap_or(cell);
    let chars: Vec<char> = cell.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut grams = Vec::new();
    if chars.len() == 1 && !range.contains(&1) {
        grams.push(format!("^{}$", chars[0]));
    }

    for n in range {
        if n == 0 {
            continue;
        }
        for window in chars.windows(n) {
            if window.iter().any(|c| SEPARATORS.contains(c)) {
                continue;
            }
            let mut gram = String::with_capacity(n * 2);
            for c in window {
                if c.is_ascii_digit() {
                    gram.push_str("\\d");
                } else {
                    gram.push(*c);
                }
            }
            grams.push(gram);
        }
    }
    grams
}

/// Summary statistics of a column dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatFeatures {
    /// Mean number of characters per value
    pub mean_chars: f64,
    /// Mean number of space-separated words per value
    pub mean_words: f64,
    /// Distinct values over all values
    pub unique_ratio: f64,
}

impl StatFeatures {
    pub fn from_values(values: &[String]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let chars: usize = values.iter().map(|v| v.chars().count()).sum();
        let words: usize = values.iter().map(|v| v.split(' ').count()).sum();
        let distinct: HashSet<&str> = values.iter().map(String::as_str).collect();
        Self {
            mean_chars: chars as f64 / n,
            mean_words: words as f64 / n,
            unique_ratio: distinct.len() as f64 / n,
        }
    }

    /// Features squashed into `[0, 1)` so they mix with unit n-gram vectors.
    pub fn normalized(&self) -> [f64; 3] {
        [
            self.mean_chars / (1.0 + self.mean_chars),
            self.mean_words / (1.0 + self.mean_words),
            self.unique_ratio,
        ]
    }
}
