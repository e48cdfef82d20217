//! Column name similarity.

use strsim::damerau_levenshtein;

/// Smallest edit distance between `query` and the names of a column.
///
/// Candidates are the table name, the qualified column name and every
/// dot-separated part of it. The distance to a candidate that contains the
/// query as a substring is halved.
pub fn name_distance(query: &str, table: &str, qualified_column: &str) -> f64 {
    std::iter::once(table)
        .chain(std::iter::once(qualified_column))
        .chain(qualified_column.split('.'))
        .map(|word| {
            let distance = damerau_levenshtein(word, query) as f64;
            if word.contains(query) {
                distance / 2.0
            } else {
                distance
            }
        })
        .fold(f64::INFINITY, f64::min)
}

/// Multiplicative factor `1 / sqrt(1 + distance)`.
pub fn name_factor(distance: f64) -> f64 {
    1.0 / (1.0 + distance).sqrt()
}
