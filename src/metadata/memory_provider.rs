//! In-memory DataAccess implementation.
//!
//! Holds tables as plain rows. Sampling is deterministic (insertion order),
//! which makes it the data source of choice for tests and demos. Tables can
//! be marked as failing to exercise error propagation.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::provider::{DataAccess, DataAccessError, DataAccessResult};
use super::types::{ColumnDescriptor, RowSample, SampleOrder, Value};

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Vec<Value>>,
}

/// DataAccess over tables held in memory.
#[derive(Debug, Default)]
pub struct MemoryDataAccess {
    tables: BTreeMap<String, MemoryTable>,
    failing: HashSet<String>,
    queries: AtomicUsize,
}

impl MemoryDataAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a table with `(name, sql_type)` columns and its rows.
    pub fn with_table(
        mut self,
        name: &str,
        columns: &[(&str, &str)],
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let columns = columns
            .iter()
            .map(|(col, ty)| ColumnDescriptor::new(name, *col, ty))
            .collect();
        self.tables
            .insert(name.to_string(), MemoryTable { columns, rows });
        self
    }

    /// Builder: make every query touching `table` fail.
    pub fn failing_on(mut self, table: &str) -> Self {
        self.failing.insert(table.to_string());
        self
    }

    /// Number of data queries served so far (schema listing excluded).
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn table(&self, name: &str) -> DataAccessResult<&MemoryTable> {
        if self.failing.contains(name) {
            return Err(DataAccessError::query(
                format!("SELECT * FROM {}", name),
                format!("connection reset while reading {}", name),
            ));
        }
        self.tables
            .get(name)
            .ok_or_else(|| DataAccessError::UnknownTable(name.to_string()))
    }
}

#[async_trait]
impl DataAccess for MemoryDataAccess {
    async fn list_tables(&self) -> DataAccessResult<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn list_columns(&self, table: &str) -> DataAccessResult<Vec<ColumnDescriptor>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> DataAccessResult<RowSample> {
        let t = self.table(table)?;
        self.queries.fetch_add(1, Ordering::Relaxed);
        let fields = t.columns.iter().map(|c| c.name.clone()).collect();
        let rows = t.rows.iter().take(limit).cloned().collect();
        Ok(RowSample::new(fields, rows))
    }

    async fn sample_column_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
        _order: &SampleOrder,
    ) -> DataAccessResult<Vec<Value>> {
        let t = self.table(table)?;
        let idx = t
            .columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| DataAccessError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })?;
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(t.rows
            .iter()
            .take(limit)
            .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
            .collect())
    }

    async fn row_count(&self, table: &str) -> DataAccessResult<u64> {
        let t = self.table(table)?;
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(t.rows.len() as u64)
    }
}
