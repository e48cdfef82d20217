//! # colscout
//!
//! Join discovery and column search over unfamiliar relational databases.
//!
//! ## Architecture
//!
//! colscout infers how tables join from sampled data, classifies columns
//! into resource types and ranks them against a search:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                DataAccess (SQLite, memory)               │
//! └─────────────────────────────────────────────────────────┘
//!              │                               │
//!              ▼ [discovery]                   ▼ [classify]
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │     DependencyGraph      │   │    ClassifiedColumn      │
//! │  (tables + join edges)   │   │  (label probabilities)   │
//! └──────────────────────────┘   └──────────────────────────┘
//!              │                               │
//!              └───────────────┬───────────────┘
//!                              ▼ [ranking]
//! ┌─────────────────────────────────────────────────────────┐
//! │                     RankedColumn                         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! One `Engine` per database owns the graph, the trained classifier and the
//! classifications. The `EngineRegistry` builds engines at most once at a
//! time per database and persists them in the `EngineStore`.

pub mod classify;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod graph;
pub mod metadata;
pub mod ranking;
pub mod store;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::classify::{ClassifiedColumn, ColumnClassifier, NGramClassifier, TrainingSpec};
    pub use crate::config::Settings;
    pub use crate::discovery::{DependencyGraphBuilder, DiscoveryConfig};
    pub use crate::engine::{BuildStatus, Engine, EngineConfig, EngineError, EngineRegistry};
    pub use crate::graph::{DependencyGraph, Distance, JoinEdge};
    pub use crate::metadata::{DataAccess, MemoryDataAccess, SqliteDataAccess};
    pub use crate::ranking::{RankedColumn, RankingConfig, RankingEngine, SearchQuery};
}
