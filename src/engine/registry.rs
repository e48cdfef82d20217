//! Registry of per-database engines.
//!
//! The registry keeps one slot per database id. A slot is claimed as
//! `Building` before any work starts, so at most one build per database is
//! in flight; searches against a slot that is not `Ready` fail with
//! `EngineError::NotReady` instead of seeing a partial engine.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{error, info, warn};

use super::{Engine, EngineConfig, EngineError, EngineResult};
use crate::config::{DatabaseSettings, SettingsError};
use crate::metadata::{DataAccess, RowSample};
use crate::ranking::{RankedColumn, SearchQuery};
use crate::store::{EngineStore, Readiness, StoreError};

/// Opens data access handles by database id.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, database_id: &str) -> EngineResult<Arc<dyn DataAccess>>;
}

/// Connector over the `[databases]` section of the settings.
pub struct SettingsConnector {
    databases: BTreeMap<String, DatabaseSettings>,
}

impl SettingsConnector {
    pub fn new(databases: BTreeMap<String, DatabaseSettings>) -> Self {
        Self { databases }
    }
}

#[async_trait]
impl Connector for SettingsConnector {
    async fn connect(&self, database_id: &str) -> EngineResult<Arc<dyn DataAccess>> {
        let settings = self
            .databases
            .get(database_id)
            .ok_or_else(|| SettingsError::DatabaseNotFound(database_id.to_string()))?;
        Ok(settings.connection_config()?.open()?)
    }
}

/// Connector over data sources registered up front.
#[derive(Default)]
pub struct StaticConnector {
    sources: HashMap<String, Arc<dyn DataAccess>>,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a data source under `database_id`.
    pub fn with_source(mut self, database_id: &str, source: Arc<dyn DataAccess>) -> Self {
        self.sources.insert(database_id.to_string(), source);
        self
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self, database_id: &str) -> EngineResult<Arc<dyn DataAccess>> {
        self.sources
            .get(database_id)
            .cloned()
            .ok_or_else(|| SettingsError::DatabaseNotFound(database_id.to_string()).into())
    }
}

/// Readiness of a database as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum BuildStatus {
    Trained,
    Building,
    Unknown,
    Error(String),
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Trained => write!(f, "trained"),
            BuildStatus::Building => write!(f, "building"),
            BuildStatus::Unknown => write!(f, "unknown"),
            BuildStatus::Error(message) => write!(f, "error: {}", message),
        }
    }
}

enum EngineSlot {
    Building,
    Ready(Arc<Engine>),
    Failed(String),
}

/// Marks the slot failed if a build is dropped before it finishes, and puts
/// back the store marker the build replaced.
struct BuildGuard<'a> {
    slots: &'a DashMap<String, EngineSlot>,
    store: Option<&'a Mutex<EngineStore>>,
    database_id: String,
    /// Marker held before the build marked itself `building`.
    replaced: Option<Option<Readiness>>,
    finished: bool,
}

impl BuildGuard<'_> {
    fn finish(mut self, slot: EngineSlot) {
        self.slots.insert(self.database_id.clone(), slot);
        self.finished = true;
    }

    fn restore_marker(&mut self) -> Result<(), StoreError> {
        let (Some(store), Some(replaced)) = (self.store, self.replaced.take()) else {
            return Ok(());
        };
        let store = store.lock().map_err(|_| StoreError::Poisoned)?;
        match replaced {
            // a stale `building` left by a dead process is not worth keeping
            Some(Readiness::Building) | None => store.clear_status(&self.database_id),
            Some(status) => store.set_status(&self.database_id, status),
        }
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(database = %self.database_id, "Build cancelled");
        self.slots.insert(
            self.database_id.clone(),
            EngineSlot::Failed("build was cancelled".to_string()),
        );
        if let Err(err) = self.restore_marker() {
            warn!(database = %self.database_id, error = %err, "Could not reset build marker");
        }
    }
}

/// Builds, caches and serves engines keyed by database id.
pub struct EngineRegistry {
    slots: DashMap<String, EngineSlot>,
    connector: Arc<dyn Connector>,
    store: Option<Mutex<EngineStore>>,
    config: EngineConfig,
}

impl EngineRegistry {
    pub fn new(connector: Arc<dyn Connector>, config: EngineConfig) -> Self {
        Self {
            slots: DashMap::new(),
            connector,
            store: None,
            config,
        }
    }

    /// Builder: persist engines in `store`.
    pub fn with_store(mut self, store: EngineStore) -> Self {
        self.store = Some(Mutex::new(store));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn with_store_lock<T>(
        &self,
        f: impl FnOnce(&mut EngineStore) -> Result<T, StoreError>,
    ) -> EngineResult<Option<T>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let mut store = store.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(Some(f(&mut *store)?))
    }

    /// Load a stored engine trained on the current specs. Only payloads whose
    /// marker says `trained` are served.
    fn load_stored(&self, database_id: &str) -> EngineResult<Option<Engine>> {
        let record = self
            .with_store_lock(|s| {
                if s.status(database_id)? != Some(Readiness::Trained) {
                    return Ok(None);
                }
                s.load(database_id)
            })?
            .flatten();
        let Some(record) = record else {
            return Ok(None);
        };
        if record.training_hash != self.config.training_hash()? {
            info!(database = %database_id, "Stored engine was trained on other specs");
            return Ok(None);
        }
        Ok(Some(Engine::from_record(record, self.config.ranking.clone())?))
    }

    /// Make an engine available for `database_id`.
    ///
    /// Returns `Building` without doing anything when a build is already in
    /// flight, and `Trained` when an engine is cached (unless `force`). A
    /// stored engine trained on the current specs is reused unless `force`.
    /// Build failures are returned and leave the slot failed.
    pub async fn build_or_load(&self, database_id: &str, force: bool) -> EngineResult<BuildStatus> {
        match self.slots.entry(database_id.to_string()) {
            Entry::Occupied(mut entry) => match entry.get() {
                EngineSlot::Building => return Ok(BuildStatus::Building),
                EngineSlot::Ready(_) if !force => return Ok(BuildStatus::Trained),
                _ => {
                    entry.insert(EngineSlot::Building);
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(EngineSlot::Building);
            }
        }
        let mut guard = BuildGuard {
            slots: &self.slots,
            store: self.store.as_ref(),
            database_id: database_id.to_string(),
            replaced: None,
            finished: false,
        };

        if !force {
            match self.load_stored(database_id) {
                Ok(Some(engine)) => {
                    info!(database = %database_id, "Loaded stored engine");
                    guard.finish(EngineSlot::Ready(Arc::new(engine)));
                    return Ok(BuildStatus::Trained);
                }
                Ok(None) => {}
                Err(err) => warn!(database = %database_id, error = %err, "Ignoring stored engine"),
            }
        }

        guard.replaced = self.with_store_lock(|s| {
            let replaced = s.status(database_id)?;
            s.set_status(database_id, Readiness::Building)?;
            Ok(replaced)
        })?;
        match self.build(database_id).await {
            Ok(engine) => {
                guard.finish(EngineSlot::Ready(Arc::new(engine)));
                Ok(BuildStatus::Trained)
            }
            Err(err) => {
                error!(database = %database_id, error = %err, "Build failed");
                if let Err(store_err) =
                    self.with_store_lock(|s| s.set_status(database_id, Readiness::Error))
                {
                    warn!(error = %store_err, "Could not record build failure");
                }
                guard.finish(EngineSlot::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    async fn build(&self, database_id: &str) -> EngineResult<Engine> {
        let target = self.connector.connect(database_id).await?;
        let training = match &self.config.training_database {
            Some(id) if id != database_id => self.connector.connect(id).await?,
            _ => Arc::clone(&target),
        };

        let engine =
            Engine::build(database_id, target.as_ref(), training.as_ref(), &self.config).await?;
        let record = engine.to_record()?;
        self.with_store_lock(|s| s.save(&record))?;
        info!(
            database = %database_id,
            tables = engine.graph().table_count(),
            joins = engine.graph().edge_count(),
            columns = engine.classifications().len(),
            "Engine ready"
        );
        Ok(engine)
    }

    /// Readiness of a database: the in-memory slot first, then the store's
    /// marker. A stored engine trained on other specs reports `Unknown`, the
    /// same as `engine` refusing to serve it.
    pub fn status(&self, database_id: &str) -> EngineResult<BuildStatus> {
        if let Some(slot) = self.slots.get(database_id) {
            return Ok(match slot.value() {
                EngineSlot::Building => BuildStatus::Building,
                EngineSlot::Ready(_) => BuildStatus::Trained,
                EngineSlot::Failed(message) => BuildStatus::Error(message.clone()),
            });
        }
        let stored = self.with_store_lock(|s| {
            Ok((s.status(database_id)?, s.training_hash(database_id)?))
        })?;
        let Some((marker, hash)) = stored else {
            return Ok(BuildStatus::Unknown);
        };
        Ok(match marker {
            Some(Readiness::Trained) if hash == Some(self.config.training_hash()?) => {
                BuildStatus::Trained
            }
            Some(Readiness::Trained) => BuildStatus::Unknown,
            Some(Readiness::Building) => BuildStatus::Building,
            Some(Readiness::Error) => BuildStatus::Error("previous build failed".to_string()),
            None => BuildStatus::Unknown,
        })
    }

    /// The ready engine of a database, loading it from the store if needed.
    pub fn engine(&self, database_id: &str) -> EngineResult<Arc<Engine>> {
        if let Some(slot) = self.slots.get(database_id) {
            return match slot.value() {
                EngineSlot::Ready(engine) => Ok(Arc::clone(engine)),
                EngineSlot::Building => Err(EngineError::NotReady(database_id.to_string())),
                EngineSlot::Failed(message) => Err(EngineError::BuildFailed {
                    database: database_id.to_string(),
                    message: message.clone(),
                }),
            };
        }

        let engine = self
            .load_stored(database_id)?
            .map(Arc::new)
            .ok_or_else(|| EngineError::NotReady(database_id.to_string()))?;
        match self.slots.entry(database_id.to_string()) {
            // a build claimed the slot meanwhile
            Entry::Occupied(_) => Err(EngineError::NotReady(database_id.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(EngineSlot::Ready(Arc::clone(&engine)));
                Ok(engine)
            }
        }
    }

    /// Ranked columns of a database for `query`.
    pub fn search(
        &self,
        database_id: &str,
        query: &SearchQuery,
    ) -> EngineResult<Vec<RankedColumn>> {
        Ok(self.engine(database_id)?.search(query))
    }

    /// First rows of a table, independent of engine readiness.
    pub async fn explore(
        &self,
        database_id: &str,
        table: &str,
        limit: usize,
    ) -> EngineResult<RowSample> {
        let access = self.connector.connect(database_id).await?;
        Ok(access.explore(table, limit).await?)
    }

    /// Table and column names of a database.
    pub async fn schema(&self, database_id: &str) -> EngineResult<BTreeMap<String, Vec<String>>> {
        let access = self.connector.connect(database_id).await?;
        Ok(access.schema().await?)
    }

    /// Forget the cached and stored engine of a database.
    pub fn evict(&self, database_id: &str) -> EngineResult<()> {
        self.slots.remove(database_id);
        self.with_store_lock(|s| s.delete(database_id))?;
        Ok(())
    }
}
