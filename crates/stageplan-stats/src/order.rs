//! Deterministic topological ordering (Kahn's algorithm).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::circuit::find_circuits;
use crate::graph::Graph;

/// Order nodes so every edge points forward.
///
/// Ties are broken by node order. On a cyclic graph the circuits are
/// returned instead.
pub fn topological_order<V: Ord + Clone>(graph: &Graph<V>) -> Result<Vec<V>, Vec<BTreeSet<V>>> {
    let mut in_degree: BTreeMap<&V, usize> = graph.nodes().map(|v| (v, 0)).collect();
    for (_, to) in graph.edges() {
        if let Some(d) = in_degree.get_mut(to) {
            *d += 1;
        }
    }

    let mut ready: VecDeque<&V> = in_degree
        .iter()
        .filter_map(|(v, &deg)| if deg == 0 { Some(*v) } else { None })
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(v) = ready.pop_front() {
        order.push(v.clone());
        for s in graph.successors(v) {
            if let Some(deg) = in_degree.get_mut(s) {
                *deg -= 1;
                if *deg == 0 {
                    ready.push_back(s);
                }
            }
        }
    }

    if order.len() == graph.node_count() {
        Ok(order)
    } else {
        Err(find_circuits(graph))
    }
}
