//! Type definitions for the dependency graph.

use serde::{Deserialize, Serialize};

/// Table node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNode {
    /// Table name
    pub name: String,
}

/// A discovered join between two tables.
///
/// Directed: the values of `source_table.source_column` were found (mostly)
/// contained in `target_table.target_column`. The reverse was not tested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinEdge {
    pub source_table: String,
    pub target_table: String,
    pub source_column: String,
    pub target_column: String,
}

impl JoinEdge {
    pub fn new(
        source_table: impl Into<String>,
        source_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
        }
    }

    /// Join keys as `left=right`.
    pub fn keys(&self) -> String {
        format!("{}={}", self.source_column, self.target_column)
    }
}

/// Capped hop distance between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Distance {
    /// Same table
    Same = 0,
    /// Direct neighbour
    Adjacent = 1,
    /// Reachable through exactly one intermediate table
    TwoHops = 2,
    /// Anything further, or not reachable at all
    Far = 3,
}

impl Distance {
    pub fn hops(self) -> u8 {
        self as u8
    }

    /// Ranking decay factor `2^-hops`.
    pub fn decay(self) -> f64 {
        2f64.powi(-i32::from(self.hops()))
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hops())
    }
}
