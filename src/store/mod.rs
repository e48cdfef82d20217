//! SQLite-based engine store.
//!
//! Persists built engines so a database is analysed once and reloaded on
//! the next start. The store lives in `~/.colscout/engines.db` unless a
//! path is configured.
//!
//! # Design
//!
//! - `readiness` holds one status row per database and can be read without
//!   touching any payload
//! - `engines` holds the JSON payloads: graph snapshot, classifier state and
//!   classification results, each versioned on its own
//! - Versioned - payloads are cleared on store version mismatch

mod hash;
pub use hash::compute_hash;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::classify::{ClassifiedColumn, ClassifierState};
use crate::graph::GraphSnapshot;

/// Current store schema version. Bump this when the table layout changes.
const STORE_VERSION: i32 = 1;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to determine store directory")]
    NoStoreDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown readiness status: {0}")]
    InvalidStatus(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Readiness marker of a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Building,
    Trained,
    Error,
}

impl Readiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::Building => "building",
            Readiness::Trained => "trained",
            Readiness::Error => "error",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Readiness {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "building" => Ok(Readiness::Building),
            "trained" => Ok(Readiness::Trained),
            "error" => Ok(Readiness::Error),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Everything needed to serve searches for one database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRecord {
    pub database_id: String,
    pub graph: GraphSnapshot,
    pub classifier: ClassifierState,
    pub classifications: Vec<ClassifiedColumn>,
    /// Hash of the training specs the classifier was trained on
    pub training_hash: String,
    /// Unix seconds
    pub built_at: i64,
}

pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// SQLite-based engine store.
pub struct EngineStore {
    conn: Connection,
}

impl EngineStore {
    /// Open or create the store at the default location.
    pub fn open() -> StoreResult<Self> {
        Self::open_at(&Self::default_path()?)
    }

    /// Open or create the store at `path`.
    ///
    /// If the store version doesn't match, payloads are cleared.
    pub fn open_at(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;

        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Get the default path to the store database.
    pub fn default_path() -> StoreResult<PathBuf> {
        let base = dirs::home_dir().ok_or(StoreError::NoStoreDir)?;
        Ok(base.join(".colscout").join("engines.db"))
    }

    fn init(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS readiness (
                database_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS engines (
                database_id TEXT PRIMARY KEY,
                graph TEXT NOT NULL,
                classifier TEXT NOT NULL,
                classifications TEXT NOT NULL,
                training_hash TEXT NOT NULL,
                built_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        let stored_version: Option<i32> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
                let s: String = row.get(0)?;
                Ok(s.parse().unwrap_or(0))
            })
            .optional()?;

        match stored_version {
            Some(v) if v == STORE_VERSION => {}
            Some(_) => {
                // Version mismatch, clear payloads
                self.clear_all()?;
                self.set_version()?;
            }
            None => {
                self.set_version()?;
            }
        }

        Ok(())
    }

    fn set_version(&self) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?)",
            params![STORE_VERSION.to_string()],
        )?;
        Ok(())
    }

    /// Set the readiness marker of a database.
    pub fn set_status(&self, database_id: &str, status: Readiness) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO readiness (database_id, status, updated_at) VALUES (?, ?, ?)",
            params![database_id, status.as_str(), unix_now()],
        )?;
        Ok(())
    }

    /// Read the readiness marker without loading the payload.
    pub fn status(&self, database_id: &str) -> StoreResult<Option<Readiness>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM readiness WHERE database_id = ?",
                params![database_id],
                |row| row.get(0),
            )
            .optional()?;
        status.map(|s| s.parse()).transpose()
    }

    /// Remove the readiness marker of a database, keeping any payload.
    pub fn clear_status(&self, database_id: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM readiness WHERE database_id = ?", params![database_id])?;
        Ok(())
    }

    /// Training hash of the stored engine, without loading the payload.
    pub fn training_hash(&self, database_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT training_hash FROM engines WHERE database_id = ?",
                params![database_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Store an engine and mark it trained, atomically.
    pub fn save(&mut self, record: &EngineRecord) -> StoreResult<()> {
        let graph = serde_json::to_string(&record.graph)?;
        let classifier = serde_json::to_string(&record.classifier)?;
        let classifications = serde_json::to_string(&record.classifications)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO engines
             (database_id, graph, classifier, classifications, training_hash, built_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.database_id,
                graph,
                classifier,
                classifications,
                record.training_hash,
                record.built_at
            ],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO readiness (database_id, status, updated_at) VALUES (?, ?, ?)",
            params![record.database_id, Readiness::Trained.as_str(), unix_now()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Load the stored engine of a database.
    pub fn load(&self, database_id: &str) -> StoreResult<Option<EngineRecord>> {
        let row: Option<(String, String, String, String, i64)> = self
            .conn
            .query_row(
                "SELECT graph, classifier, classifications, training_hash, built_at
                 FROM engines WHERE database_id = ?",
                params![database_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let Some((graph, classifier, classifications, training_hash, built_at)) = row else {
            return Ok(None);
        };
        Ok(Some(EngineRecord {
            database_id: database_id.to_string(),
            graph: serde_json::from_str(&graph)?,
            classifier: serde_json::from_str(&classifier)?,
            classifications: serde_json::from_str(&classifications)?,
            training_hash,
            built_at,
        }))
    }

    /// Remove the engine and readiness marker of a database.
    pub fn delete(&self, database_id: &str) -> StoreResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM engines WHERE database_id = ?", params![database_id])?;
        self.conn
            .execute("DELETE FROM readiness WHERE database_id = ?", params![database_id])?;
        Ok(rows > 0)
    }

    /// Clear all engines and markers (but keep metadata).
    pub fn clear_all(&self) -> StoreResult<()> {
        self.conn.execute("DELETE FROM engines", [])?;
        self.conn.execute("DELETE FROM readiness", [])?;
        Ok(())
    }
}
