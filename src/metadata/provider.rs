//! DataAccess trait definition.
//!
//! The DataAccess trait abstracts over the relational backend being analysed.
//! Discovery and classification only ever talk to a database through it, so
//! driver differences stay behind this seam.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::types::{ColumnDescriptor, RowSample, SampleOrder, Value};

/// Result type for data access operations.
pub type DataAccessResult<T> = Result<T, DataAccessError>;

/// Errors raised while talking to a source database.
///
/// These are fatal to an in-progress build; nothing in the crate retries them.
#[derive(Debug, thiserror::Error)]
pub enum DataAccessError {
    /// Could not open a connection to the source.
    #[error("could not connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A query against the source failed.
    #[error("query failed ({sql}): {source}")]
    Query {
        sql: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The table does not exist in the source.
    #[error("table {0} does not exist in database")]
    UnknownTable(String),

    /// The column does not exist on the table.
    #[error("column {table}.{column} does not exist in database")]
    UnknownColumn { table: String, column: String },

    /// The configured driver has no DataAccess implementation.
    #[error("database type {0} is unknown")]
    UnsupportedDriver(String),

    /// The blocking task running the query was cancelled or panicked.
    #[error("data access task failed: {0}")]
    Task(String),
}

impl DataAccessError {
    /// Create a query error from any error type.
    pub fn query(
        sql: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Query {
            sql: sql.into(),
            source: source.into(),
        }
    }

    /// Create a connection error from any error type.
    pub fn connection(
        target: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Connection {
            target: target.into(),
            source: source.into(),
        }
    }
}

/// Trait for reading schema and sampled data from a relational database.
///
/// Implementations scope their connections to each call; no connection is
/// held between calls.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// List all table names.
    async fn list_tables(&self) -> DataAccessResult<Vec<String>>;

    /// List the columns of a table with their declared SQL types.
    async fn list_columns(&self, table: &str) -> DataAccessResult<Vec<ColumnDescriptor>>;

    /// Sample up to `limit` random rows of a table.
    async fn sample_rows(&self, table: &str, limit: usize) -> DataAccessResult<RowSample>;

    /// Sample up to `limit` values of one column in the given order.
    async fn sample_column_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
        order: &SampleOrder,
    ) -> DataAccessResult<Vec<Value>>;

    /// Count the rows of a table.
    async fn row_count(&self, table: &str) -> DataAccessResult<u64>;

    // =========================================================================
    // Convenience operations (default implementations)
    // =========================================================================

    /// Return the first rows of a table alongside its column names.
    async fn explore(&self, table: &str, limit: usize) -> DataAccessResult<RowSample> {
        self.sample_rows(table, limit).await
    }

    /// Map every table to its column names.
    ///
    /// Columns of all tables are listed concurrently using `join_all`.
    async fn schema(&self) -> DataAccessResult<BTreeMap<String, Vec<String>>> {
        let tables = self.list_tables().await?;
        let futures: Vec<_> = tables.iter().map(|t| self.list_columns(t)).collect();
        let results = futures::future::join_all(futures).await;

        let mut schema = BTreeMap::new();
        for (table, columns) in tables.into_iter().zip(results) {
            let names = columns?.into_iter().map(|c| c.name).collect();
            schema.insert(table, names);
        }
        Ok(schema)
    }

    /// Check whether a table has a column with the given name.
    async fn has_column(&self, table: &str, column: &str) -> DataAccessResult<bool> {
        Ok(self
            .list_columns(table)
            .await?
            .iter()
            .any(|c| c.name == column))
    }
}
