//! Serializable form of the dependency graph.
//!
//! The graph is stored as a plain adjacency list of named tables and edges,
//! versioned independently of the classifier state.

use serde::{Deserialize, Serialize};

use super::{DependencyGraph, GraphError, GraphResult, JoinEdge};

/// Current graph snapshot version. Bump this when the snapshot format changes.
pub const GRAPH_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub tables: Vec<String>,
    pub edges: Vec<JoinEdge>,
}

impl DependencyGraph {
    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            version: GRAPH_SNAPSHOT_VERSION,
            tables: self.tables().map(str::to_string).collect(),
            edges: self.edges().cloned().collect(),
        }
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> GraphResult<Self> {
        if snapshot.version != GRAPH_SNAPSHOT_VERSION {
            return Err(GraphError::SnapshotVersion {
                expected: GRAPH_SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }

        let mut graph = DependencyGraph::new();
        for table in &snapshot.tables {
            graph.add_table(table);
        }
        for edge in snapshot.edges {
            graph.add_join(edge);
        }
        Ok(graph)
    }
}
