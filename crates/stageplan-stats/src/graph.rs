//! Ordered adjacency-set graph.
//!
//! An edge `from -> to` means `to` is a dependent of `from`. Iteration
//! follows `V`'s ordering so every analysis here is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph<V: Ord> {
    adjacency: BTreeMap<V, BTreeSet<V>>,
}

impl<V: Ord> Default for Graph<V> {
    fn default() -> Self {
        Self {
            adjacency: BTreeMap::new(),
        }
    }
}

impl<V: Ord + Clone> Graph<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from an edge list; endpoints are added as nodes.
    pub fn from_edges<I: IntoIterator<Item = (V, V)>>(edges: I) -> Self {
        let mut g = Self::new();
        for (from, to) in edges {
            g.add_edge(from, to);
        }
        g
    }

    pub fn add_node(&mut self, v: V) -> bool {
        if self.adjacency.contains_key(&v) {
            return false;
        }
        self.adjacency.insert(v, BTreeSet::new());
        true
    }

    /// Add `from -> to`, adding missing endpoints. Returns false if the edge
    /// already existed.
    pub fn add_edge(&mut self, from: V, to: V) -> bool {
        self.add_node(to.clone());
        self.adjacency.entry(from).or_default().insert(to)
    }

    pub fn remove_edge(&mut self, from: &V, to: &V) -> bool {
        self.adjacency
            .get_mut(from)
            .map(|s| s.remove(to))
            .unwrap_or(false)
    }

    pub fn contains(&self, v: &V) -> bool {
        self.adjacency.contains_key(v)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &V> {
        self.adjacency.keys()
    }

    /// Direct dependents of `v` (empty for unknown nodes).
    pub fn successors(&self, v: &V) -> impl Iterator<Item = &V> {
        self.adjacency.get(v).into_iter().flatten()
    }

    /// Nodes with an edge into `v`.
    pub fn predecessors(&self, v: &V) -> Vec<V> {
        self.adjacency
            .iter()
            .filter(|(_, succ)| succ.contains(v))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&V, &V)> {
        self.adjacency
            .iter()
            .flat_map(|(from, succ)| succ.iter().map(move |to| (from, to)))
    }

    /// The same graph with every edge reversed.
    pub fn transpose(&self) -> Self {
        let mut g = Self::new();
        for v in self.nodes() {
            g.add_node(v.clone());
        }
        for (from, to) in self.edges() {
            g.add_edge(to.clone(), from.clone());
        }
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_register_both_endpoints() {
        let mut g = Graph::new();
        assert!(g.add_edge(1, 2));
        assert!(!g.add_edge(1, 2));
        assert!(g.contains(&2));
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.predecessors(&2), vec![1]);
        assert_eq!(g.transpose().successors(&2).copied().collect::<Vec<_>>(), vec![1]);
    }
}
