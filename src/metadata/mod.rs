//! Data access module.
//!
//! This module abstracts the relational database under analysis behind the
//! `DataAccess` trait and provides the run-scoped caches discovery uses.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         DataAccess                              │
//! │  - list_tables()            - sample_rows()                     │
//! │  - list_columns()           - sample_column_values()            │
//! │  - row_count()              - explore() / schema()              │
//! └─────────────────────────────────────────────────────────────────┘
//!        │                        │                        │
//!        ▼                        ▼                        ▼
//! ┌──────────────────┐  ┌────────────────────┐  ┌────────────────────┐
//! │ SqliteDataAccess │  │ PostgresDataAccess │  │  MemoryDataAccess  │
//! │ (conn per call)  │  │  (conn per call)   │  │ (deterministic)    │
//! └──────────────────┘  └────────────────────┘  └────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use colscout::metadata::{DataAccess, SqliteDataAccess};
//!
//! let access = SqliteDataAccess::new("./mimic.db");
//! let tables = access.list_tables().await?;
//! let columns = access.list_columns("patients").await?;
//! ```

mod memory_provider;
mod postgres_provider;
mod provider;
mod sample_cache;
mod sqlite_provider;
mod types;

pub use memory_provider::MemoryDataAccess;
pub use postgres_provider::PostgresDataAccess;
pub use provider::{DataAccess, DataAccessError, DataAccessResult};
pub use sample_cache::{column_sample_limit, ColumnSample, SampleCache};
pub use sqlite_provider::SqliteDataAccess;
pub use types::*;
