//! PostgreSQL DataAccess implementation.
//!
//! Each call opens its own connection and closes it when done. Partition
//! children are hidden from table listing; their parents stand in for them.

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, Row};
use tracing::debug;

use super::provider::{DataAccess, DataAccessError, DataAccessResult};
use super::sqlite_provider::quote_ident;
use super::types::{ColumnDescriptor, RowSample, SampleOrder, Value};

const SYSTEM_SCHEMAS: &str = "('pg_catalog', 'information_schema')";

/// DataAccess over a PostgreSQL database.
#[derive(Clone)]
pub struct PostgresDataAccess {
    url: String,
    schema: Option<String>,
}

impl std::fmt::Debug for PostgresDataAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDataAccess")
            .field("url", &redact_url(&self.url))
            .field("schema", &self.schema)
            .finish()
    }
}

/// How a column is selected and decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Integer,
    Float,
    Text,
}

impl CellKind {
    /// Kind of a column from its `information_schema` data type.
    fn of(sql_type: &str) -> Self {
        match sql_type {
            "SMALLINT" | "INTEGER" | "BIGINT" => CellKind::Integer,
            "REAL" | "DOUBLE PRECISION" | "NUMERIC" | "DECIMAL" => CellKind::Float,
            _ => CellKind::Text,
        }
    }

    /// Select expression casting the column to the decoded type.
    fn select(self, column: &str) -> String {
        let cast = match self {
            CellKind::Integer => "int8",
            CellKind::Float => "float8",
            CellKind::Text => "text",
        };
        format!("{}::{} AS {}", quote_ident(column), cast, quote_ident(column))
    }

    fn decode(self, row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
        Ok(match self {
            CellKind::Integer => row.try_get::<Option<i64>, _>(idx)?.into(),
            CellKind::Float => row.try_get::<Option<f64>, _>(idx)?.into(),
            CellKind::Text => row.try_get::<Option<String>, _>(idx)?.into(),
        })
    }
}

/// Strip the credentials from a connection URL.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***{}", &url[..scheme], &url[at..])
        }
        _ => url.to_string(),
    }
}

fn tables_sql(schema: Option<&str>) -> String {
    match schema {
        Some(_) => "SELECT DISTINCT table_name::text FROM information_schema.tables \
                    WHERE table_schema::text = $1 ORDER BY 1"
            .to_string(),
        None => format!(
            "SELECT DISTINCT table_name::text FROM information_schema.tables \
             WHERE table_schema NOT IN {} ORDER BY 1",
            SYSTEM_SCHEMAS
        ),
    }
}

fn partitions_sql(schema: Option<&str>) -> String {
    let base = "SELECT DISTINCT child.relname::text FROM pg_inherits \
                JOIN pg_class child ON pg_inherits.inhrelid = child.oid \
                JOIN pg_namespace ns ON child.relnamespace = ns.oid";
    match schema {
        Some(_) => format!("{} WHERE ns.nspname::text = $1", base),
        None => format!("{} WHERE ns.nspname NOT IN {}", base, SYSTEM_SCHEMAS),
    }
}

fn columns_sql(schema: Option<&str>) -> String {
    let base = "SELECT column_name::text, data_type::text FROM information_schema.columns \
                WHERE table_name::text = $1";
    match schema {
        Some(_) => format!("{} AND table_schema::text = $2 ORDER BY ordinal_position", base),
        None => format!(
            "{} AND table_schema NOT IN {} ORDER BY ordinal_position",
            base, SYSTEM_SCHEMAS
        ),
    }
}

/// Drop partition children from a table listing.
fn without_partitions(tables: Vec<String>, children: &[String]) -> Vec<String> {
    tables
        .into_iter()
        .filter(|t| !children.contains(t))
        .collect()
}

/// Table reference, schema-qualified when a schema is configured.
fn qualify(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(table)),
        None => quote_ident(table),
    }
}

fn select_list(columns: &[ColumnDescriptor]) -> String {
    columns
        .iter()
        .map(|c| CellKind::of(&c.sql_type).select(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_clause(order: &SampleOrder) -> String {
    match order {
        SampleOrder::Random => "RANDOM()".to_string(),
        SampleOrder::Weighted { column } => format!(
            "LOG(LOG(GREATEST(COALESCE({}, 0), 0)::float8 + 2)) * RANDOM() DESC",
            quote_ident(column)
        ),
    }
}

async fn close(conn: PgConnection) {
    if let Err(err) = conn.close().await {
        debug!(error = %err, "Closing Postgres connection failed");
    }
}

impl PostgresDataAccess {
    /// Create a new PostgresDataAccess. Nothing is opened until the first call.
    pub fn new(url: impl Into<String>, schema: Option<String>) -> Self {
        Self {
            url: url.into(),
            schema,
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    async fn connect(&self) -> DataAccessResult<PgConnection> {
        PgConnection::connect(&self.url)
            .await
            .map_err(|e| DataAccessError::connection(redact_url(&self.url), e))
    }

    /// Run a single-column text query, binding the schema when one is set.
    async fn fetch_names(
        &self,
        conn: &mut PgConnection,
        sql: &str,
    ) -> DataAccessResult<Vec<String>> {
        let mut query = sqlx::query_scalar::<_, String>(sql);
        if let Some(schema) = self.schema() {
            query = query.bind(schema);
        }
        query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DataAccessError::query(sql, e))
    }

    async fn fetch_tables(&self, conn: &mut PgConnection) -> DataAccessResult<Vec<String>> {
        let tables = self.fetch_names(conn, &tables_sql(self.schema())).await?;
        let children = self.fetch_names(conn, &partitions_sql(self.schema())).await?;
        if !children.is_empty() {
            debug!(partitions = children.len(), "Hiding partition tables");
        }
        Ok(without_partitions(tables, &children))
    }

    async fn fetch_columns(
        &self,
        conn: &mut PgConnection,
        table: &str,
    ) -> DataAccessResult<Vec<ColumnDescriptor>> {
        let sql = columns_sql(self.schema());
        let mut query = sqlx::query_as::<_, (String, String)>(&sql).bind(table);
        if let Some(schema) = self.schema() {
            query = query.bind(schema);
        }
        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
        if rows.is_empty() {
            return Err(DataAccessError::UnknownTable(table.to_string()));
        }
        Ok(rows
            .into_iter()
            .map(|(name, sql_type)| ColumnDescriptor::new(table, name, sql_type))
            .collect())
    }

    async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        kinds: &[CellKind],
    ) -> DataAccessResult<Vec<Vec<Value>>> {
        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DataAccessError::query(sql, e))?;
        rows.iter()
            .map(|row| {
                kinds
                    .iter()
                    .enumerate()
                    .map(|(idx, kind)| kind.decode(row, idx))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DataAccessError::query(sql, e))
    }

    async fn select_rows(
        &self,
        conn: &mut PgConnection,
        table: &str,
        suffix: &str,
    ) -> DataAccessResult<RowSample> {
        let columns = self.fetch_columns(conn, table).await?;
        let kinds: Vec<CellKind> = columns.iter().map(|c| CellKind::of(&c.sql_type)).collect();
        let sql = format!(
            "SELECT {} FROM {} {}",
            select_list(&columns),
            qualify(self.schema(), table),
            suffix
        );
        let rows = Self::fetch_rows(conn, &sql, &kinds).await?;
        let fields = columns.into_iter().map(|c| c.name).collect();
        Ok(RowSample::new(fields, rows))
    }

    async fn column_values(
        &self,
        conn: &mut PgConnection,
        table: &str,
        column: &str,
        limit: usize,
        order: &SampleOrder,
    ) -> DataAccessResult<Vec<Value>> {
        let columns = self.fetch_columns(conn, table).await?;
        let Some(descriptor) = columns.iter().find(|c| c.name == column) else {
            return Err(DataAccessError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        };
        let kind = CellKind::of(&descriptor.sql_type);
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {} LIMIT {}",
            kind.select(column),
            qualify(self.schema(), table),
            order_clause(order),
            limit
        );
        let rows = Self::fetch_rows(conn, &sql, &[kind]).await?;
        Ok(rows.into_iter().filter_map(|row| row.into_iter().next()).collect())
    }

    async fn count_rows(&self, conn: &mut PgConnection, table: &str) -> DataAccessResult<u64> {
        self.fetch_columns(conn, table).await?;
        let sql = format!("SELECT COUNT(*) FROM {}", qualify(self.schema(), table));
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| DataAccessError::query(sql.as_str(), e))?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl DataAccess for PostgresDataAccess {
    async fn list_tables(&self) -> DataAccessResult<Vec<String>> {
        let mut conn = self.connect().await?;
        let result = self.fetch_tables(&mut conn).await;
        close(conn).await;
        result
    }

    async fn list_columns(&self, table: &str) -> DataAccessResult<Vec<ColumnDescriptor>> {
        let mut conn = self.connect().await?;
        let result = self.fetch_columns(&mut conn, table).await;
        close(conn).await;
        result
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> DataAccessResult<RowSample> {
        let mut conn = self.connect().await?;
        let suffix = format!("ORDER BY RANDOM() LIMIT {}", limit);
        let result = self.select_rows(&mut conn, table, &suffix).await;
        close(conn).await;
        result
    }

    async fn sample_column_values(
        &self,
        table: &str,
        column: &str,
        limit: usize,
        order: &SampleOrder,
    ) -> DataAccessResult<Vec<Value>> {
        let mut conn = self.connect().await?;
        let result = self.column_values(&mut conn, table, column, limit, order).await;
        close(conn).await;
        result
    }

    async fn row_count(&self, table: &str) -> DataAccessResult<u64> {
        let mut conn = self.connect().await?;
        let result = self.count_rows(&mut conn, table).await;
        close(conn).await;
        result
    }

    async fn explore(&self, table: &str, limit: usize) -> DataAccessResult<RowSample> {
        let mut conn = self.connect().await?;
        let suffix = format!("LIMIT {}", limit);
        let result = self.select_rows(&mut conn, table, &suffix).await;
        close(conn).await;
        result
    }
}
