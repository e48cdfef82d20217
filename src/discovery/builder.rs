//! Builds the `DependencyGraph` of a data source.

use std::collections::HashMap;

use tracing::{debug, info, info_span, Instrument};

use super::{DiscoveryConfig, JoinabilityAnalyzer};
use crate::graph::{DependencyGraph, JoinEdge};
use crate::metadata::{ColumnDescriptor, DataAccess, DataAccessResult, SampleCache};

/// Counters collected during one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub tables: usize,
    pub id_like_columns: usize,
    pub comparisons: usize,
    pub edges: usize,
}

/// Discovers joins between tables and assembles them into a graph.
///
/// Memoized state (id-like columns, column samples) is scoped to a single
/// `build` call and reset at the start of the next one.
pub struct DependencyGraphBuilder {
    config: DiscoveryConfig,
    analyzer: JoinabilityAnalyzer,
    id_columns: HashMap<String, Vec<ColumnDescriptor>>,
    stats: BuildStats,
}

impl DependencyGraphBuilder {
    pub fn new(config: DiscoveryConfig) -> Self {
        let analyzer = JoinabilityAnalyzer::new(&config);
        Self {
            config,
            analyzer,
            id_columns: HashMap::new(),
            stats: BuildStats::default(),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Counters from the last build.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Discover every join in `access` and return the resulting graph.
    ///
    /// Every table becomes a node, including tables without joins. Any data
    /// access failure aborts the build.
    pub async fn build(&mut self, access: &dyn DataAccess) -> DataAccessResult<DependencyGraph> {
        self.id_columns.clear();
        self.stats = BuildStats::default();
        let mut cache = SampleCache::new(
            self.config.max_cached_columns,
            self.config.min_column_sample,
        );

        let tables = access.list_tables().await?;
        let mut graph = DependencyGraph::new();
        for table in &tables {
            graph.add_table(table);
        }
        self.stats.tables = tables.len();

        for (i, table) in tables.iter().enumerate() {
            info!(
                table = %table,
                progress = %format!("{}/{}", i + 1, tables.len()),
                "Computing joinable tables"
            );
            let span = info_span!("discover", table = %table);
            let edges = self
                .find_joins(access, &mut cache, table, &tables)
                .instrument(span)
                .await?;
            for edge in edges {
                graph.add_join(edge);
            }
        }

        self.stats.edges = graph.edge_count();
        info!(
            tables = self.stats.tables,
            edges = self.stats.edges,
            comparisons = self.stats.comparisons,
            "Dependency graph built"
        );
        Ok(graph)
    }

    /// Id-like columns of a table, computed at most once per build.
    async fn id_like_columns(
        &mut self,
        access: &dyn DataAccess,
        table: &str,
    ) -> DataAccessResult<Vec<ColumnDescriptor>> {
        if let Some(columns) = self.id_columns.get(table) {
            return Ok(columns.clone());
        }

        let columns = access.list_columns(table).await?;
        let sample = access.sample_rows(table, self.config.id_sample_rows).await?;

        let id_like: Vec<ColumnDescriptor> = columns
            .into_iter()
            .filter(|col| !self.analyzer.is_excluded(&col.name))
            .filter(|col| {
                sample
                    .column(&col.name)
                    .is_some_and(|values| self.analyzer.is_id_like(&values))
            })
            .collect();

        for col in &id_like {
            debug!(column = %col.qualified_name(), sql_type = %col.sql_type, "Id-like column");
        }
        self.stats.id_like_columns += id_like.len();
        self.id_columns.insert(table.to_string(), id_like.clone());
        Ok(id_like)
    }

    /// Edges from the id-like columns of `table` to every other table.
    async fn find_joins(
        &mut self,
        access: &dyn DataAccess,
        cache: &mut SampleCache,
        table: &str,
        tables: &[String],
    ) -> DataAccessResult<Vec<JoinEdge>> {
        let mut edges = Vec::new();
        let left_columns = self.id_like_columns(access, table).await?;

        for left in &left_columns {
            let left_sample = cache.column(access, table, &left.name).await?;

            for other in tables.iter().filter(|t| t.as_str() != table) {
                let right_columns = self.id_like_columns(access, other).await?;

                for right in right_columns.iter().filter(|c| c.sql_type == left.sql_type) {
                    let right_sample = cache.column(access, other, &right.name).await?;
                    self.stats.comparisons += 1;

                    let overlap = self
                        .analyzer
                        .test_inclusion(&left_sample.values, &right_sample.set);
                    debug!(
                        left = %left.qualified_name(),
                        right = %right.qualified_name(),
                        matched = overlap.matched,
                        total = overlap.total,
                        "Inclusion test"
                    );
                    if overlap.reaches(self.analyzer.include_threshold()) {
                        edges.push(JoinEdge::new(table, &left.name, other, &right.name));
                    }
                }
            }
        }
        Ok(edges)
    }
}

impl Default for DependencyGraphBuilder {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}
