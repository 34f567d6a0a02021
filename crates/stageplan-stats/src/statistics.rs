//! Vertex/edge counts and critical-path length of a dependency graph.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::order::topological_order;

/// Critical path of a cyclic graph.
pub const UNDEFINED: Option<usize> = None;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStatistics {
    vertices: usize,
    edges: usize,
    critical: Option<usize>,
}

impl GraphStatistics {
    /// Analyze `graph`.
    ///
    /// The critical path is the number of vertices on the longest chain of
    /// dependents; an isolated vertex has length 1 and the empty graph 0.
    /// It is [`UNDEFINED`] when the graph has a circuit.
    pub fn of<V: Ord + Clone>(graph: &Graph<V>) -> Self {
        Self {
            vertices: graph.node_count(),
            edges: graph.edge_count(),
            critical: critical_path(graph),
        }
    }

    pub fn vertices(&self) -> usize {
        self.vertices
    }

    pub fn edges(&self) -> usize {
        self.edges
    }

    pub fn critical_path_length(&self) -> Option<usize> {
        self.critical
    }

    pub fn is_acyclic(&self) -> bool {
        self.critical.is_some()
    }

    /// `vertices / critical`; 0 when the critical path is 0 or undefined.
    /// Diagnostic only.
    pub fn average_width(&self) -> f64 {
        match self.critical {
            Some(c) if c > 0 => self.vertices as f64 / c as f64,
            _ => 0.0,
        }
    }
}

impl fmt::Display for GraphStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{vertices={}, edges={}, critical=", self.vertices, self.edges)?;
        match self.critical {
            Some(c) => write!(f, "{c}")?,
            None => f.write_str("undefined")?,
        }
        write!(f, ", average-width={:.2}}}", self.average_width())
    }
}

fn critical_path<V: Ord + Clone>(graph: &Graph<V>) -> Option<usize> {
    let order = topological_order(graph).ok()?;
    let mut longest: BTreeMap<&V, usize> = BTreeMap::new();
    // Reverse topological order: every dependent is settled before `v`.
    for v in order.iter().rev() {
        let tail = graph
            .successors(v)
            .map(|s| longest.get(s).copied().unwrap_or(0))
            .max()
            .unwrap_or(0);
        longest.insert(v, tail + 1);
    }
    Some(longest.values().copied().max().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_vertex() {
        let mut g = Graph::new();
        g.add_node(0);
        let s = GraphStatistics::of(&g);
        assert_eq!((s.vertices(), s.edges()), (1, 0));
        assert_eq!(s.critical_path_length(), Some(1));
    }

    #[test]
    fn linear_chain() {
        let g = Graph::from_edges([(0, 1), (1, 2), (2, 3)]);
        let s = GraphStatistics::of(&g);
        assert_eq!((s.vertices(), s.edges()), (4, 3));
        assert_eq!(s.critical_path_length(), Some(4));
        assert_eq!(s.average_width(), 1.0);
    }

    #[test]
    fn chain_with_back_edge_is_undefined() {
        let g = Graph::from_edges([(0, 1), (1, 2), (2, 3), (3, 4), (3, 1)]);
        let s = GraphStatistics::of(&g);
        assert_eq!((s.vertices(), s.edges()), (5, 5));
        assert_eq!(s.critical_path_length(), UNDEFINED);
        assert_eq!(s.average_width(), 0.0);
        assert!(s.to_string().contains("critical=undefined"));
    }

    #[test]
    fn empty_graph_has_zero_critical_path() {
        let s = GraphStatistics::of(&Graph::<u32>::new());
        assert_eq!(s.critical_path_length(), Some(0));
        assert_eq!(s.average_width(), 0.0);
    }

    #[test]
    fn summary_format() {
        let g = Graph::from_edges([(0, 1), (0, 2), (1, 3), (2, 3)]);
        let s = GraphStatistics::of(&g);
        assert_eq!(
            s.to_string(),
            "{vertices=4, edges=4, critical=3, average-width=1.33}"
        );
    }
}
