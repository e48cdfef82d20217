// tests/ranking/ranking_test.rs
use std::collections::BTreeMap;

use colscout::classify::ClassifiedColumn;
use colscout::graph::{DependencyGraph, JoinEdge};
use colscout::ranking::{RankingConfig, RankingEngine, SearchQuery};

fn classified(qualified: &str, probabilities: &[(&str, f64)]) -> ClassifiedColumn {
    let (table, _) = qualified.split_once('.').unwrap();
    ClassifiedColumn {
        table: table.to_string(),
        column: qualified.to_string(),
        data: (0..50).map(|i| format!("v{}", i)).collect(),
        probabilities: probabilities
            .iter()
            .map(|(label, p)| (label.to_string(), *p))
            .collect::<BTreeMap<_, _>>(),
        score: 0.0,
    }
}

fn hospital_graph() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    graph.add_join(JoinEdge::new("patients", "subject_id", "admissions", "subject_id"));
    graph.add_join(JoinEdge::new("admissions", "hadm_id", "prescriptions", "hadm_id"));
    graph
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
}

#[test]
fn test_anchor_decays_by_distance() {
    let graph = hospital_graph();
    let columns = vec![
        classified("admissions.subject_id", &[("ID", 0.9)]),
        classified("prescriptions.subject_id", &[("ID", 0.9)]),
        classified("patients.subject_id", &[("ID", 0.9)]),
    ];
    let engine = RankingEngine::default();
    let ranked = engine.rank(&SearchQuery::new("ID").with_anchor("patients"), &columns, &graph);

    let scores: Vec<(&str, f64)> = ranked.iter().map(|r| (r.column.as_str(), r.score)).collect();
    assert_eq!(scores[0].0, "patients.subject_id");
    assert_close(scores[0].1, 0.9);
    assert_eq!(scores[1].0, "admissions.subject_id");
    assert_close(scores[1].1, 0.45);
    assert_eq!(scores[2].0, "prescriptions.subject_id");
    assert_close(scores[2].1, 0.225);
}

#[test]
fn test_far_tables_keep_an_eighth() {
    let mut graph = hospital_graph();
    graph.add_table("caregivers");
    let columns = vec![classified("caregivers.cgid", &[("ID", 0.8)])];
    let ranked = RankingEngine::default().rank(
        &SearchQuery::new("ID").with_anchor("patients"),
        &columns,
        &graph,
    );
    assert_close(ranked[0].score, 0.1);
}

#[test]
fn test_unknown_anchor_counts_as_far() {
    let graph = hospital_graph();
    let columns = vec![classified("patients.subject_id", &[("ID", 0.8)])];
    let ranked = RankingEngine::default().rank(
        &SearchQuery::new("ID").with_anchor("no_such_table"),
        &columns,
        &graph,
    );
    assert_eq!(ranked.len(), 1);
    assert_close(ranked[0].score, 0.1);
}

#[test]
fn test_name_query_prefers_substring_match() {
    let graph = DependencyGraph::new();
    let columns = vec![
        classified("padents.gender", &[("GENDER", 0.8)]),
        classified("patients.gender", &[("GENDER", 0.8)]),
    ];
    let ranked = RankingEngine::default().rank(
        &SearchQuery::new("gender").with_name("pat"),
        &columns,
        &graph,
    );
    assert_eq!(ranked[0].column, "patients.gender");
    assert_eq!(ranked[1].column, "padents.gender");
    assert_close(ranked[0].score, 0.8 / 3.5f64.sqrt());
    assert_close(ranked[1].score, 0.8 / 5f64.sqrt());
}

#[test]
fn test_results_truncated_and_sorted() {
    let graph = DependencyGraph::new();
    let columns: Vec<ClassifiedColumn> = (0..25)
        .map(|i| classified(&format!("t{}.c", i), &[("ID", (i + 1) as f64 / 30.0)]))
        .collect();
    let engine = RankingEngine::default();

    let ranked = engine.rank(&SearchQuery::new("ID"), &columns, &graph);
    assert_eq!(ranked.len(), 10);
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(ranked[0].column, "t24.c");

    let ranked = engine.rank(&SearchQuery::new("ID").with_max_results(3), &columns, &graph);
    assert_eq!(ranked.len(), 3);
}

#[test]
fn test_display_values_truncated() {
    let graph = DependencyGraph::new();
    let columns = vec![classified("patients.subject_id", &[("ID", 0.5)])];
    let ranked = RankingEngine::default().rank(&SearchQuery::new("ID"), &columns, &graph);
    assert_eq!(ranked[0].data.len(), 20);
    // the input is left untouched
    assert_eq!(columns[0].data.len(), 50);
    assert_eq!(columns[0].score, 0.0);
}

#[test]
fn test_min_score_filters_candidates() {
    let graph = DependencyGraph::new();
    let columns = vec![
        classified("a.x", &[("ID", 0.05)]),
        classified("b.y", &[("ID", 0.4)]),
    ];
    let config = RankingConfig {
        min_score: 0.1,
        ..RankingConfig::default()
    };
    let ranked = RankingEngine::new(config).rank(&SearchQuery::new("ID"), &columns, &graph);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].table, "b");
}

#[test]
fn test_missing_label_scores_one() {
    let graph = DependencyGraph::new();
    let columns = vec![
        classified("a.x", &[("ID", 0.3)]),
        classified("b.y", &[("ID", 0.6)]),
    ];
    let ranked = RankingEngine::default().rank(&SearchQuery::new("NAME"), &columns, &graph);
    assert_eq!(ranked.len(), 2);
    assert!(ranked.iter().all(|r| r.score == 1.0));
    // stable order for ties
    assert_eq!(ranked[0].table, "a");
}
