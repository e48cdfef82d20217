// tests/graph/distance_test.rs
use colscout::graph::{DependencyGraph, Distance, GraphError, JoinEdge};

/// patients -> admissions -> prescriptions, with joins in both directions.
fn hospital_graph() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    graph.add_join(JoinEdge::new("patients", "subject_id", "admissions", "subject_id"));
    graph.add_join(JoinEdge::new("admissions", "subject_id", "patients", "subject_id"));
    graph.add_join(JoinEdge::new("admissions", "hadm_id", "prescriptions", "hadm_id"));
    graph.add_join(JoinEdge::new("prescriptions", "hadm_id", "admissions", "hadm_id"));
    graph.add_table("caregivers");
    graph
}

#[test]
fn test_same_table_is_zero() {
    let graph = hospital_graph();
    for table in graph.tables() {
        assert_eq!(graph.get_distance(table, table).unwrap(), Distance::Same);
    }
}

#[test]
fn test_adjacency_matches_edges() {
    let graph = hospital_graph();
    let tables: Vec<&str> = graph.tables().collect();
    for from in &tables {
        let neighbors = graph.neighbors(from).unwrap();
        for to in tables.iter().filter(|t| *t != from) {
            let adjacent = graph.get_distance(from, to).unwrap() == Distance::Adjacent;
            assert_eq!(adjacent, neighbors.contains(to), "{} -> {}", from, to);
        }
    }
}

#[test]
fn test_two_hops_and_far() {
    let graph = hospital_graph();
    assert_eq!(graph.get_distance("patients", "prescriptions").unwrap().hops(), 2);
    assert_eq!(graph.get_distance("prescriptions", "patients").unwrap().hops(), 2);
    assert_eq!(graph.get_distance("patients", "caregivers").unwrap(), Distance::Far);
    assert_eq!(graph.get_distance("caregivers", "patients").unwrap(), Distance::Far);
}

#[test]
fn test_distances_are_capped() {
    let mut graph = DependencyGraph::new();
    for i in 0..6 {
        graph.add_join(JoinEdge::new(format!("t{}", i), "k", format!("t{}", i + 1), "k"));
    }
    for i in 0..7 {
        let d = graph.get_distance("t0", &format!("t{}", i)).unwrap();
        assert!(d.hops() <= 3);
    }
    assert_eq!(graph.get_distance("t0", "t6").unwrap(), Distance::Far);
}

#[test]
fn test_one_way_join_is_directed() {
    let mut graph = DependencyGraph::new();
    graph.add_join(JoinEdge::new("labevents", "itemid", "d_labitems", "itemid"));
    assert_eq!(graph.get_distance("labevents", "d_labitems").unwrap(), Distance::Adjacent);
    assert_eq!(graph.get_distance("d_labitems", "labevents").unwrap(), Distance::Far);
}

#[test]
fn test_unknown_table_is_an_error() {
    let graph = hospital_graph();
    let err = graph.get_distance("patients", "icustays").unwrap_err();
    assert_eq!(err, GraphError::UnknownTable("icustays".into()));
    assert_eq!(err.to_string(), "Table not found in dependency graph: icustays");
}

#[test]
fn test_snapshot_preserves_distances() {
    let graph = hospital_graph();
    let json = serde_json::to_string(&graph.to_snapshot()).unwrap();
    let restored = DependencyGraph::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

    let tables: Vec<&str> = graph.tables().collect();
    for from in &tables {
        for to in &tables {
            assert_eq!(
                graph.get_distance(from, to).unwrap(),
                restored.get_distance(from, to).unwrap()
            );
        }
    }
    assert_eq!(graph.to_string(), restored.to_string());
}
