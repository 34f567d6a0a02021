//! Circuit search over `Graph<V>` (Tarjan's strongly connected components).
//!
//! Iterative, so deep chains cannot overflow the stack.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::Graph;

/// Every strongly connected component, including trivial single-node ones.
///
/// Components come out in reverse topological order of the condensation.
pub fn strongly_connected_components<V: Ord + Clone>(graph: &Graph<V>) -> Vec<BTreeSet<V>> {
    let nodes: Vec<&V> = graph.nodes().collect();
    let pos: BTreeMap<&V, usize> = nodes.iter().enumerate().map(|(i, v)| (*v, i)).collect();
    let succ: Vec<Vec<usize>> = nodes
        .iter()
        .map(|v| graph.successors(v).map(|s| pos[s]).collect())
        .collect();

    let n = nodes.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut counter = 0usize;
    let mut components = Vec::new();

    for root in 0..n {
        if index[root].is_some() {
            continue;
        }
        // (node, next successor to visit)
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        index[root] = Some(counter);
        low[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;

        loop {
            let Some(frame) = frames.last_mut() else {
                break;
            };
            let v = frame.0;
            if frame.1 < succ[v].len() {
                let w = succ[v][frame.1];
                frame.1 += 1;
                match index[w] {
                    None => {
                        index[w] = Some(counter);
                        low[w] = counter;
                        counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        frames.push((w, 0));
                    }
                    Some(wi) if on_stack[w] => low[v] = low[v].min(wi),
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if index[v] == Some(low[v]) {
                let mut component = BTreeSet::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.insert(nodes[w].clone());
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    components
}

/// Components that contain a cycle: more than one node, or a self-loop.
pub fn find_circuits<V: Ord + Clone>(graph: &Graph<V>) -> Vec<BTreeSet<V>> {
    strongly_connected_components(graph)
        .into_iter()
        .filter(|c| {
            c.len() > 1
                || c
                    .iter()
                    .next()
                    .map(|v| graph.successors(v).any(|s| s == v))
                    .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_has_no_circuit() {
        let g = Graph::from_edges([(0, 1), (1, 2), (2, 3)]);
        assert!(find_circuits(&g).is_empty());
        assert_eq!(strongly_connected_components(&g).len(), 4);
    }

    #[test]
    fn back_edge_forms_one_circuit() {
        let g = Graph::from_edges([(0, 1), (1, 2), (2, 3), (3, 4), (3, 1)]);
        let circuits = find_circuits(&g);
        assert_eq!(circuits.len(), 1);
        assert_eq!(circuits[0], BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn self_loop_is_a_circuit() {
        let mut g = Graph::new();
        g.add_edge("a", "a");
        g.add_node("b");
        assert_eq!(find_circuits(&g), vec![BTreeSet::from(["a"])]);
    }
}
