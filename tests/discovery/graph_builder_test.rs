// tests/discovery/graph_builder_test.rs
use colscout::discovery::{DependencyGraphBuilder, DiscoveryConfig};
use colscout::graph::Distance;
use colscout::metadata::{DataAccessError, MemoryDataAccess, Value};

fn hospital() -> MemoryDataAccess {
    let patients = (1..=10)
        .map(|i| {
            vec![
                Value::Integer(i),
                Value::Integer(i),
                Value::from(if i % 2 == 0 { "F" } else { "M" }),
            ]
        })
        .collect();
    let admissions = (0..20)
        .map(|i| {
            vec![
                Value::Integer(i + 1),
                Value::Integer(100 + i),
                Value::Integer(1 + i % 10),
                Value::from(if i % 3 == 0 { "MARRIED" } else { "SINGLE" }),
            ]
        })
        .collect();
    let prescriptions = (0..30)
        .map(|i| {
            vec![
                Value::Integer(100 + i % 20),
                Value::from(["aspirin", "heparin", "insulin"][i as usize % 3]),
            ]
        })
        .collect();

    MemoryDataAccess::new()
        .with_table(
            "patients",
            &[("id", "integer"), ("subject_id", "integer"), ("gender", "text")],
            patients,
        )
        .with_table(
            "admissions",
            &[
                ("row_id", "integer"),
                ("hadm_id", "integer"),
                ("subject_id", "integer"),
                ("marital_status", "text"),
            ],
            admissions,
        )
        .with_table(
            "prescriptions",
            &[("hadm_id", "integer"), ("drug", "text")],
            prescriptions,
        )
}

#[tokio::test]
async fn test_builds_hospital_graph() {
    let mut builder = DependencyGraphBuilder::default();
    let graph = builder.build(&hospital()).await.unwrap();

    assert_eq!(graph.table_count(), 3);
    assert_eq!(graph.edge_count(), 4);
    insta::assert_snapshot!(graph.to_string(), @r"
    admissions
      prescriptions
        hadm_id=hadm_id
      patients
        subject_id=subject_id
    patients
      admissions
        subject_id=subject_id
    prescriptions
      admissions
        hadm_id=hadm_id
    ");
}

#[tokio::test]
async fn test_distances_follow_discovered_joins() {
    let mut builder = DependencyGraphBuilder::default();
    let graph = builder.build(&hospital()).await.unwrap();

    assert_eq!(graph.get_distance("patients", "admissions").unwrap(), Distance::Adjacent);
    assert_eq!(graph.get_distance("patients", "prescriptions").unwrap(), Distance::TwoHops);
    assert_eq!(graph.get_distance("prescriptions", "prescriptions").unwrap(), Distance::Same);
}

#[tokio::test]
async fn test_strict_threshold_drops_partial_joins() {
    // only half of the admissions appear in a shorter prescriptions table
    let prescriptions = (0..10).map(|i| vec![Value::Integer(100 + i)]).collect();
    let admissions = (0..20).map(|i| vec![Value::Integer(100 + i)]).collect();
    let access = MemoryDataAccess::new()
        .with_table("admissions", &[("hadm_id", "integer")], admissions)
        .with_table("prescriptions", &[("hadm_id", "integer")], prescriptions);

    let mut builder = DependencyGraphBuilder::new(DiscoveryConfig::default());
    let graph = builder.build(&access).await.unwrap();

    let joins = graph.joins_from("admissions").unwrap();
    assert!(joins.is_empty());
    assert_eq!(graph.joins_from("prescriptions").unwrap().len(), 1);
}

#[tokio::test]
async fn test_query_failure_aborts_build() {
    let access = hospital().failing_on("prescriptions");
    let mut builder = DependencyGraphBuilder::default();
    let err = builder.build(&access).await.unwrap_err();
    assert!(matches!(err, DataAccessError::Query { .. }));
}

#[tokio::test]
async fn test_builder_resets_between_runs() {
    let mut builder = DependencyGraphBuilder::default();
    builder.build(&hospital()).await.unwrap();
    let first = builder.stats().clone();
    builder.build(&hospital()).await.unwrap();
    assert_eq!(builder.stats(), &first);
}
