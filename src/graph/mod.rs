//! Dependency graph of joinable tables.
//!
//! Tables are nodes; every discovered join is a directed edge carrying the
//! column pair it was found on. Several edges may connect the same pair of
//! tables when different column pairs are compatible.

mod snapshot;
mod types;

pub use snapshot::{GraphSnapshot, GRAPH_SNAPSHOT_VERSION};
pub use types::*;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during graph queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Table not found in dependency graph: {0}")]
    UnknownTable(String),

    #[error("Unsupported graph snapshot version {found} (expected {expected})")]
    SnapshotVersion { expected: u32, found: u32 },
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Directed graph of tables linked by discovered join edges.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph
    graph: DiGraph<TableNode, JoinEdge>,

    /// Index: table name → NodeIndex
    table_index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table node. Adding an existing table is a no-op.
    pub fn add_table(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.table_index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(TableNode {
            name: name.to_string(),
        });
        self.table_index.insert(name.to_string(), idx);
        idx
    }

    /// Add a join edge, creating missing endpoint nodes.
    pub fn add_join(&mut self, edge: JoinEdge) {
        let from = self.add_table(&edge.source_table);
        let to = self.add_table(&edge.target_table);
        self.graph.add_edge(from, to, edge);
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.table_index.contains_key(name)
    }

    pub fn table_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Table names in insertion order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.graph.raw_nodes().iter().map(|n| n.weight.name.as_str())
    }

    /// All join edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &JoinEdge> {
        self.graph.raw_edges().iter().map(|e| &e.weight)
    }

    /// Outgoing join edges of a table, in insertion order.
    pub fn joins_from(&self, table: &str) -> GraphResult<Vec<&JoinEdge>> {
        let idx = self.index_of(table)?;
        let mut joins: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), e.weight()))
            .collect();
        joins.sort_by_key(|(id, _)| *id);
        Ok(joins.into_iter().map(|(_, edge)| edge).collect())
    }

    /// Distinct direct neighbours of a table, in first-join order.
    pub fn neighbors(&self, table: &str) -> GraphResult<Vec<&str>> {
        let mut seen = Vec::new();
        for edge in self.joins_from(table)? {
            if !seen.contains(&edge.target_table.as_str()) {
                seen.push(edge.target_table.as_str());
            }
        }
        Ok(seen)
    }

    /// Capped distance from `from` to `to`.
    ///
    /// Only one intermediate hop is checked; anything further is `Far`.
    /// Edges are directed, so the result may differ when swapping arguments.
    ///
    /// # Example
    /// ```ignore
    /// let d = graph.get_distance("patients", "prescriptions")?;
    /// assert_eq!(d, Distance::TwoHops);
    /// ```
    pub fn get_distance(&self, from: &str, to: &str) -> GraphResult<Distance> {
        if from == to {
            return Ok(Distance::Same);
        }
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;

        if self.graph.contains_edge(from_idx, to_idx) {
            return Ok(Distance::Adjacent);
        }
        let via_neighbor = self
            .graph
            .neighbors_directed(from_idx, Direction::Outgoing)
            .any(|mid| self.graph.contains_edge(mid, to_idx));
        if via_neighbor {
            return Ok(Distance::TwoHops);
        }
        Ok(Distance::Far)
    }

    fn index_of(&self, table: &str) -> GraphResult<NodeIndex> {
        self.table_index
            .get(table)
            .copied()
            .ok_or_else(|| GraphError::UnknownTable(table.to_string()))
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in self.tables() {
            writeln!(f, "{}", table)?;
            let joins = self.joins_from(table).map_err(|_| fmt::Error)?;
            let neighbors = self.neighbors(table).map_err(|_| fmt::Error)?;
            for neighbor in neighbors {
                writeln!(f, "  {}", neighbor)?;
                for edge in joins.iter().filter(|e| e.target_table == neighbor) {
                    writeln!(f, "    {}", edge.keys())?;
                }
            }
        }
        Ok(())
    }
}
