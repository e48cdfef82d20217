// tests/discovery/joinability_test.rs
use std::collections::HashSet;

use colscout::discovery::{DependencyGraphBuilder, DiscoveryConfig, JoinabilityAnalyzer};
use colscout::metadata::{MemoryDataAccess, Value};

fn ints(range: std::ops::Range<i64>) -> Vec<Value> {
    range.map(Value::Integer).collect()
}

#[test]
fn test_overlap_is_monotonic_in_matches() {
    let analyzer = JoinabilityAnalyzer::default();
    let left = ints(0..10);
    let mut previous = 0.0;
    for found in 0..=10 {
        let right: HashSet<Value> = ints(0..found).into_iter().collect();
        let ratio = analyzer.overlap_ratio(&left, &right).unwrap();
        assert!(ratio >= previous);
        previous = ratio;
    }
    assert_eq!(previous, 1.0);
}

#[test]
fn test_subset_has_full_overlap() {
    let analyzer = JoinabilityAnalyzer::default();
    let right: HashSet<Value> = ints(0..100).into_iter().collect();
    assert_eq!(analyzer.overlap_ratio(&ints(10..20), &right), Some(1.0));
}

#[test]
fn test_threshold_decides_compatibility() {
    let config = DiscoveryConfig::default().with_include_threshold(0.5);
    let analyzer = JoinabilityAnalyzer::new(&config);
    let right: HashSet<Value> = ints(0..5).into_iter().collect();

    assert!(analyzer.test_inclusion(&ints(0..10), &right).reaches(0.5));
    assert!(!analyzer.test_inclusion(&ints(1..10), &right).reaches(0.5));
}

#[test]
fn test_mixed_text_is_not_id_like() {
    let analyzer = JoinabilityAnalyzer::default();
    let values: Vec<Value> = ["aspirin", "sodium chloride"]
        .iter()
        .map(|s| Value::from(*s))
        .collect();
    assert!(!analyzer.is_id_like(&values));
}

#[tokio::test]
async fn test_id_column_is_never_a_join_candidate() {
    let rows: Vec<Vec<Value>> = (1..=10).map(|i| vec![Value::Integer(i)]).collect();
    let access = MemoryDataAccess::new()
        .with_table("a", &[("id", "integer")], rows.clone())
        .with_table("b", &[("id", "integer")], rows);

    let mut builder = DependencyGraphBuilder::default();
    let graph = builder.build(&access).await.unwrap();

    assert_eq!(graph.edge_count(), 0);
    assert_eq!(builder.stats().id_like_columns, 0);
}

#[tokio::test]
async fn test_custom_exclusions_replace_defaults() {
    let rows: Vec<Vec<Value>> = (1..=10).map(|i| vec![Value::Integer(i)]).collect();
    let access = MemoryDataAccess::new()
        .with_table("a", &[("id", "integer")], rows.clone())
        .with_table("b", &[("id", "integer")], rows);

    let config = DiscoveryConfig::default().with_excluded_columns(Vec::<String>::new());
    let mut builder = DependencyGraphBuilder::new(config);
    let graph = builder.build(&access).await.unwrap();

    assert_eq!(graph.edge_count(), 2);
}
