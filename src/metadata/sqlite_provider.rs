//! SQLite DataAccess implementation.
//!
//! Every call opens a read-only connection on a blocking thread, runs its
//! query and closes the connection again.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use super::provider::{DataAccess, DataAccessError, DataAccessResult};
use super::types::{ColumnDescriptor, RowSample, SampleOrder, Value};

/// DataAccess over a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteDataAccess {
    path: PathBuf,
}

impl SqliteDataAccess {
    /// Create a new SqliteDataAccess for the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a freshly opened connection on the blocking pool.
    async fn with_connection<T, F>(&self, f: F) -> DataAccessResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DataAccessResult<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| DataAccessError::connection(path.display().to_string(), e))?;
            register_functions(&conn)
                .map_err(|e| DataAccessError::connection(path.display().to_string(), e))?;
            f(&conn)
        })
        .await
        .map_err(|e| DataAccessError::Task(e.to_string()))?
    }
}

/// Quote an identifier for interpolation into SQL.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Sort weight of a row with the given frequency: `log10(log10(f + 2))`.
///
/// Negative below a frequency of 8, so rare rows sort after every common one.
/// Null and negative frequencies count as zero.
fn frequency_weight(frequency: f64) -> f64 {
    (frequency.max(0.0) + 2.0).log10().log10()
}

/// Register `frequency_weight(x)` on a connection.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "frequency_weight",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let frequency = match ctx.get_raw(0) {
                ValueRef::Integer(i) => i as f64,
                ValueRef::Real(f) => f,
                _ => 0.0,
            };
            Ok(frequency_weight(frequency))
        },
    )
}

fn order_clause(order: &SampleOrder) -> String {
    match order {
        SampleOrder::Random => "RANDOM()".to_string(),
        // Log-damped: frequent rows tend to sort first, the weight grows
        // slowly with the frequency.
        SampleOrder::Weighted { column } => format!(
            "frequency_weight({}) * (ABS(RANDOM()) % 1000000) DESC",
            quote_ident(column)
        ),
    }
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn table_columns(conn: &Connection, table: &str) -> DataAccessResult<Vec<ColumnDescriptor>> {
    let sql = "SELECT name, type FROM pragma_table_info(?1) ORDER BY cid";
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| DataAccessError::query(sql, e))?;
    let columns = stmt
        .query_map([table], |row| {
            let name: String = row.get(0)?;
            let sql_type: String = row.get(1)?;
            Ok(ColumnDescriptor::new(table, name, sql_type))
        })
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|e| DataAccessError::query(sql, e))?;

    if columns.is_empty() {
        return Err(DataAccessError::UnknownTable(table.to_string()));
    }
    Ok(columns)
}

#[async_trait]
impl DataAccess for SqliteDataAccess {
    async fn list_tables(&self) -> DataAccessResult<Vec<String>> {
        self.with_connection(|conn| {
            let sql = "SELECT name FROM sqlite_master \
                       WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| DataAccessError::query(sql, e))?;
            stmt.query_map([], |row| row.get::<_, String>(0))
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                .map_err(|e| DataAccessError::query(sql, e))
        })
        .await
    }

    async fn list_columns(&self, table: &str) -> DataAccessResult<Vec<ColumnDescriptor>> {
        let table = table.to_string();
        self.with_connection(move |conn| table_columns(conn, &table))
            .await
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> DataAccessResult<RowSample> {
        let table = table.to_string();
        self.with_connection(move |conn| {
            table_columns(conn, &table)?;
            let sql = format!(
                "SELECT * FROM {} ORDER BY RANDOM() LIMIT {}",
                quote_ident(&table),
                limit
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
            let fields: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let width = fields.len();

            let mut rows = stmt
                .query([])
                .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
            let mut sampled = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| DataAccessError::query(sql.as_str(), e))?
            {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    let value = row
                        .get_ref(idx)
                        .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
                    values.push(read_value(value));
                }
                sampled.push(values);
            }

            Ok(RowSample::new(fields, sampled))
        })
        .await
    }

    async fn sample_column_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
        order: &SampleOrder,
    ) -> DataAccessResult<Vec<Value>> {
        let table = table.to_string();
        let column = column.to_string();
        let order = order_clause(order);
        self.with_connection(move |conn| {
            if !table_columns(conn, &table)?.iter().any(|c| c.name == column) {
                return Err(DataAccessError::UnknownColumn { table, column });
            }
            let sql = format!(
                "SELECT {} FROM {} ORDER BY {} LIMIT {}",
                quote_ident(&column),
                quote_ident(&table),
                order,
                limit
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
            let values = stmt
                .query_map([], |row| row.get_ref(0).map(read_value))
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
            Ok(values)
        })
        .await
    }

    async fn row_count(&self, table: &str) -> DataAccessResult<u64> {
        let table = table.to_string();
        self.with_connection(move |conn| {
            table_columns(conn, &table)?;
            let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&table));
            let count: i64 = conn
                .query_row(&sql, [], |row| row.get(0))
                .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn explore(&self, table: &str, limit: usize) -> DataAccessResult<RowSample> {
        let table = table.to_string();
        self.with_connection(move |conn| {
            table_columns(conn, &table)?;
            let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(&table), limit);
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
            let fields: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let width = fields.len();
            let rows = stmt
                .query_map([], |row| {
                    (0..width)
                        .map(|idx| row.get_ref(idx).map(read_value))
                        .collect::<Result<Vec<_>, _>>()
                })
                .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
                .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
            Ok(RowSample::new(fields, rows))
        })
        .await
    }
}
