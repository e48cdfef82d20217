// tests/engine/registry_test.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colscout::classify::TrainingSpec;
use colscout::engine::{BuildStatus, EngineConfig, EngineError, EngineRegistry, StaticConnector};
use colscout::metadata::{
    ColumnDescriptor, DataAccess, DataAccessError, DataAccessResult, MemoryDataAccess, RowSample,
    SampleOrder, Value,
};
use colscout::ranking::SearchQuery;
use colscout::store::{EngineStore, Readiness};

fn hospital() -> MemoryDataAccess {
    let patients = (1..=10)
        .map(|i| {
            vec![
                Value::Integer(i),
                Value::from(if i % 2 == 0 { "F" } else { "M" }),
            ]
        })
        .collect();
    let admissions = (0..20)
        .map(|i| {
            vec![
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
                Value::from(["aspirin", "heparin", "insulin", "warfarin"][i as usize % 4]),
            ]
        })
        .collect();

    MemoryDataAccess::new()
        .with_table(
            "patients",
            &[("subject_id", "integer"), ("gender", "text")],
            patients,
        )
        .with_table(
            "admissions",
            &[
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

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_training(vec![
            TrainingSpec::new("id", "admissions.hadm_id", 3),
            TrainingSpec::new("gender", "patients.gender", 3),
            TrainingSpec::new("drug", "prescriptions.drug", 3),
        ])
        .with_sampling(10, Some(42))
}

fn registry_with(source: MemoryDataAccess) -> EngineRegistry {
    let connector = StaticConnector::new().with_source("mimic", Arc::new(source));
    EngineRegistry::new(Arc::new(connector), config())
}

fn temp_store_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("colscout-store-{}.db", uuid::Uuid::new_v4()))
}

/// Delays table listing so a build stays in flight across an await.
struct SlowAccess(MemoryDataAccess);

#[async_trait]
impl DataAccess for SlowAccess {
    async fn list_tables(&self) -> DataAccessResult<Vec<String>> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.0.list_tables().await
    }

    async fn list_columns(&self, table: &str) -> DataAccessResult<Vec<ColumnDescriptor>> {
        self.0.list_columns(table).await
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> DataAccessResult<RowSample> {
        self.0.sample_rows(table, limit).await
    }

    async fn sample_column_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
        order: &SampleOrder,
    ) -> DataAccessResult<Vec<Value>> {
        self.0.sample_column_values(table, column, limit, order).await
    }

    async fn row_count(&self, table: &str) -> DataAccessResult<u64> {
        self.0.row_count(table).await
    }
}

#[tokio::test]
async fn test_build_then_search() {
    let registry = registry_with(hospital());
    assert_eq!(registry.status("mimic").unwrap(), BuildStatus::Unknown);

    let status = registry.build_or_load("mimic", false).await.unwrap();
    assert_eq!(status, BuildStatus::Trained);
    assert_eq!(registry.status("mimic").unwrap(), BuildStatus::Trained);

    let engine = registry.engine("mimic").unwrap();
    assert_eq!(engine.labels(), ["DRUG", "GENDER", "ID"]);
    assert_eq!(engine.classifications().len(), 7);
    assert_eq!(engine.graph().table_count(), 3);
    let report = engine.training_report().unwrap();
    assert_eq!(report.trained_on + report.held_out, 9);

    let query = SearchQuery::new("gender").with_anchor("patients");
    let results = registry.search("mimic", &query).unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 10);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(results[0].column, "patients.gender");
}

#[tokio::test]
async fn test_cached_engine_is_reused() {
    let registry = registry_with(hospital());
    registry.build_or_load("mimic", false).await.unwrap();
    let first = registry.engine("mimic").unwrap();

    assert_eq!(registry.build_or_load("mimic", false).await.unwrap(), BuildStatus::Trained);
    assert!(Arc::ptr_eq(&first, &registry.engine("mimic").unwrap()));

    assert_eq!(registry.build_or_load("mimic", true).await.unwrap(), BuildStatus::Trained);
    assert!(!Arc::ptr_eq(&first, &registry.engine("mimic").unwrap()));
}

#[tokio::test]
async fn test_search_before_build_is_not_ready() {
    let registry = registry_with(hospital());
    let err = registry.search("mimic", &SearchQuery::new("id")).unwrap_err();
    assert!(matches!(err, EngineError::NotReady(db) if db == "mimic"));
}

#[tokio::test]
async fn test_concurrent_builds_run_once() {
    let connector =
        StaticConnector::new().with_source("mimic", Arc::new(SlowAccess(hospital())));
    let registry = EngineRegistry::new(Arc::new(connector), config());

    let (first, second) = tokio::join!(
        registry.build_or_load("mimic", false),
        async {
            tokio::task::yield_now().await;
            let during = registry.search("mimic", &SearchQuery::new("id"));
            (registry.build_or_load("mimic", false).await, during)
        }
    );

    assert_eq!(first.unwrap(), BuildStatus::Trained);
    let (second, during) = second;
    assert_eq!(second.unwrap(), BuildStatus::Building);
    assert!(matches!(during, Err(EngineError::NotReady(_))));
    assert_eq!(registry.status("mimic").unwrap(), BuildStatus::Trained);
}

#[tokio::test]
async fn test_failed_build_reports_error() {
    let registry = registry_with(hospital().failing_on("prescriptions"));

    let err = registry.build_or_load("mimic", false).await.unwrap_err();
    assert!(matches!(err, EngineError::DataAccess(DataAccessError::Query { .. })));
    assert!(matches!(registry.status("mimic").unwrap(), BuildStatus::Error(_)));
    assert!(matches!(
        registry.search("mimic", &SearchQuery::new("id")),
        Err(EngineError::BuildFailed { .. })
    ));
}

#[tokio::test]
async fn test_unknown_database() {
    let registry = registry_with(hospital());
    let err = registry.build_or_load("eicu", false).await.unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}

#[tokio::test]
async fn test_engines_survive_restart() {
    let path = temp_store_path();

    let registry = registry_with(hospital()).with_store(EngineStore::open_at(&path).unwrap());
    registry.build_or_load("mimic", false).await.unwrap();
    let query = SearchQuery::new("drug").with_anchor("admissions");
    let before = registry.search("mimic", &query).unwrap();
    drop(registry);

    // no data sources: anything but a stored engine would fail
    let restarted = EngineRegistry::new(Arc::new(StaticConnector::new()), config())
        .with_store(EngineStore::open_at(&path).unwrap());
    assert_eq!(restarted.status("mimic").unwrap(), BuildStatus::Trained);
    let after = restarted.search("mimic", &query).unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.column, a.column);
        assert_eq!(b.data, a.data);
        assert!((b.score - a.score).abs() < 1e-9);
    }
    assert!(restarted.engine("mimic").unwrap().training_report().is_none());

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_stale_training_forces_rebuild() {
    let path = temp_store_path();

    let registry = registry_with(hospital()).with_store(EngineStore::open_at(&path).unwrap());
    registry.build_or_load("mimic", false).await.unwrap();
    drop(registry);

    let retrained =
        config().with_training(vec![TrainingSpec::new("id", "patients.subject_id", 2)]);
    let restarted = EngineRegistry::new(Arc::new(StaticConnector::new()), retrained)
        .with_store(EngineStore::open_at(&path).unwrap());
    // the stored engine answers to other specs: neither reported nor served
    assert_eq!(restarted.status("mimic").unwrap(), BuildStatus::Unknown);
    assert!(matches!(
        restarted.search("mimic", &SearchQuery::new("id")),
        Err(EngineError::NotReady(_))
    ));
    // the rebuild needs the source, which is gone
    assert!(restarted.build_or_load("mimic", false).await.is_err());
    assert!(matches!(restarted.status("mimic").unwrap(), BuildStatus::Error(_)));

    let store = EngineStore::open_at(&path).unwrap();
    assert_eq!(store.status("mimic").unwrap(), Some(Readiness::Error));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_failed_rebuild_withdraws_stored_engine() {
    let path = temp_store_path();

    let registry = registry_with(hospital()).with_store(EngineStore::open_at(&path).unwrap());
    registry.build_or_load("mimic", false).await.unwrap();
    drop(registry);

    let orphaned = EngineRegistry::new(Arc::new(StaticConnector::new()), config())
        .with_store(EngineStore::open_at(&path).unwrap());
    assert!(orphaned.build_or_load("mimic", true).await.is_err());
    drop(orphaned);

    let restarted = EngineRegistry::new(Arc::new(StaticConnector::new()), config())
        .with_store(EngineStore::open_at(&path).unwrap());
    assert!(matches!(restarted.status("mimic").unwrap(), BuildStatus::Error(_)));
    assert!(matches!(
        restarted.search("mimic", &SearchQuery::new("drug")),
        Err(EngineError::NotReady(_))
    ));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_cancelled_build_resets_marker() {
    let path = temp_store_path();
    let connector =
        StaticConnector::new().with_source("mimic", Arc::new(SlowAccess(hospital())));
    let registry = EngineRegistry::new(Arc::new(connector), config())
        .with_store(EngineStore::open_at(&path).unwrap());

    let build = registry.build_or_load("mimic", false);
    assert!(tokio::time::timeout(Duration::from_millis(10), build).await.is_err());
    assert_eq!(
        registry.status("mimic").unwrap(),
        BuildStatus::Error("build was cancelled".to_string())
    );

    let store = EngineStore::open_at(&path).unwrap();
    assert_eq!(store.status("mimic").unwrap(), None);
    drop(store);
    let restarted = EngineRegistry::new(Arc::new(StaticConnector::new()), config())
        .with_store(EngineStore::open_at(&path).unwrap());
    assert_eq!(restarted.status("mimic").unwrap(), BuildStatus::Unknown);

    // the cancelled slot does not block a retry
    assert_eq!(registry.build_or_load("mimic", false).await.unwrap(), BuildStatus::Trained);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_cancelled_rebuild_keeps_stored_engine() {
    let path = temp_store_path();
    let connector =
        StaticConnector::new().with_source("mimic", Arc::new(SlowAccess(hospital())));
    let registry = EngineRegistry::new(Arc::new(connector), config())
        .with_store(EngineStore::open_at(&path).unwrap());
    registry.build_or_load("mimic", false).await.unwrap();

    let rebuild = registry.build_or_load("mimic", true);
    assert!(tokio::time::timeout(Duration::from_millis(10), rebuild).await.is_err());
    drop(registry);

    let store = EngineStore::open_at(&path).unwrap();
    assert_eq!(store.status("mimic").unwrap(), Some(Readiness::Trained));
    drop(store);
    let restarted = EngineRegistry::new(Arc::new(StaticConnector::new()), config())
        .with_store(EngineStore::open_at(&path).unwrap());
    assert_eq!(restarted.status("mimic").unwrap(), BuildStatus::Trained);
    assert!(restarted.search("mimic", &SearchQuery::new("drug")).is_ok());

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_evict_forgets_engine() {
    let registry = registry_with(hospital()).with_store(EngineStore::open_in_memory().unwrap());
    registry.build_or_load("mimic", false).await.unwrap();

    registry.evict("mimic").unwrap();
    assert_eq!(registry.status("mimic").unwrap(), BuildStatus::Unknown);
}

#[tokio::test]
async fn test_explore_and_schema_without_engine() {
    let registry = registry_with(hospital());

    let rows = registry.explore("mimic", "admissions", 5).await.unwrap();
    assert_eq!(rows.fields, vec!["hadm_id", "subject_id", "marital_status"]);
    assert_eq!(rows.len(), 5);

    let schema = registry.schema("mimic").await.unwrap();
    assert_eq!(schema["patients"], vec!["subject_id", "gender"]);
}
