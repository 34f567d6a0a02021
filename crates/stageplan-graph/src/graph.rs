//! `OperatorGraph`: operator arena plus port connections.
//!
//! Invariants:
//! - every connection links ports with identical record types;
//! - every connection is recorded on both endpoints;
//! - no connection references an operator that is not in the arena.

use std::collections::{BTreeMap, BTreeSet};

use stageplan_core::error::{Error, Result};
use stageplan_core::id::OperatorId;
use stageplan_core::schema::Schema;
use tracing::debug;

use crate::operator::{InputRef, Operator, OperatorKind, OutputRef};

#[derive(Debug, Clone, Default)]
pub struct OperatorGraph {
    operators: BTreeMap<OperatorId, Operator>,
    next_id: u64,
}

impl OperatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detached operator and return its id in this graph.
    ///
    /// Connections the operator may still carry are dropped; use
    /// [`OperatorGraph::connect`] afterwards.
    pub fn add(&mut self, operator: Operator) -> OperatorId {
        let id = OperatorId::new(self.next_id);
        self.next_id += 1;
        let mut op = operator.copy();
        op.id = id;
        self.operators.insert(id, op);
        id
    }

    pub fn get(&self, id: OperatorId) -> Result<&Operator> {
        self.operators.get(&id).ok_or(Error::UnknownOperator(id))
    }

    pub fn contains(&self, id: OperatorId) -> bool {
        self.operators.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.operators.keys().copied()
    }

    /// All operators in id order.
    ///
    /// With `expand_nested_flows`, the contents of every `Flow` operator's
    /// nested graph follow the flow operator itself, recursively. Nested
    /// operators keep the ids of their own graph.
    pub fn operators(&self, expand_nested_flows: bool) -> Vec<&Operator> {
        let mut out = Vec::with_capacity(self.operators.len());
        for op in self.operators.values() {
            out.push(op);
            if expand_nested_flows && op.kind() == OperatorKind::Flow {
                if let Some(nested) = op.nested() {
                    out.extend(nested.operators(true));
                }
            }
        }
        out
    }

    pub fn input_schema(&self, port: InputRef) -> Result<&Schema> {
        self.get(port.operator)?
            .input(port.index)
            .map(|p| p.schema())
            .ok_or_else(|| unknown_port(port.operator, format!("in[{}]", port.index)))
    }

    pub fn output_schema(&self, port: OutputRef) -> Result<&Schema> {
        self.get(port.operator)?
            .output(port.index)
            .map(|p| p.schema())
            .ok_or_else(|| unknown_port(port.operator, format!("out[{}]", port.index)))
    }

    /// Connect an output port to an input port.
    ///
    /// Connecting an already connected pair is a no-op.
    pub fn connect(&mut self, upstream: OutputRef, downstream: InputRef) -> Result<()> {
        let out_schema = self.output_schema(upstream)?;
        let in_schema = self.input_schema(downstream)?;
        if out_schema != in_schema {
            return Err(Error::InvalidConnection {
                upstream: upstream.to_string(),
                downstream: downstream.to_string(),
                output_type: out_schema.name.clone(),
                input_type: in_schema.name.clone(),
            });
        }
        self.output_port_mut(upstream)?.connections.insert(downstream);
        self.input_port_mut(downstream)?.connections.insert(upstream);
        Ok(())
    }

    /// Remove one connection. Returns whether it existed.
    pub fn disconnect(&mut self, upstream: OutputRef, downstream: InputRef) -> bool {
        let removed_out = self
            .output_port_mut(upstream)
            .map(|p| p.connections.remove(&downstream))
            .unwrap_or(false);
        let removed_in = self
            .input_port_mut(downstream)
            .map(|p| p.connections.remove(&upstream))
            .unwrap_or(false);
        removed_out || removed_in
    }

    pub fn is_connected(&self, upstream: OutputRef, downstream: InputRef) -> bool {
        self.get(upstream.operator)
            .ok()
            .and_then(|op| op.output(upstream.index))
            .map(|p| p.connections().contains(&downstream))
            .unwrap_or(false)
    }

    /// Drop every connection of an operator. Returns how many were removed.
    pub fn disconnect_all(&mut self, id: OperatorId) -> Result<usize> {
        let op = self.get(id)?;
        let mut edges: Vec<(OutputRef, InputRef)> = Vec::new();
        for (i, port) in op.inputs().iter().enumerate() {
            for up in port.connections() {
                edges.push((*up, op.input_ref(i)));
            }
        }
        for (i, port) in op.outputs().iter().enumerate() {
            for down in port.connections() {
                edges.push((op.output_ref(i), *down));
            }
        }
        let mut count = 0;
        for (up, down) in edges {
            if self.disconnect(up, down) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Remove an operator that has no remaining connections.
    pub fn remove(&mut self, id: OperatorId) -> Result<Operator> {
        let connections = self.get(id)?.connection_count();
        if connections > 0 {
            return Err(Error::LiveConnections {
                operator: id,
                connections,
            });
        }
        self.operators.remove(&id).ok_or(Error::UnknownOperator(id))
    }

    /// Remove a single-input/single-output operator, connecting each of its
    /// upstreams directly to each of its downstreams.
    pub fn remove_and_splice(&mut self, id: OperatorId) -> Result<Operator> {
        let op = self.get(id)?;
        if op.inputs().len() != 1 || op.outputs().len() != 1 {
            return Err(Error::NotSpliceable {
                operator: id,
                reason: format!(
                    "expected exactly one input and one output, found {} and {}",
                    op.inputs().len(),
                    op.outputs().len()
                ),
            });
        }
        let upstreams: Vec<OutputRef> = op.inputs()[0].connections().iter().copied().collect();
        let downstreams: Vec<InputRef> = op.outputs()[0].connections().iter().copied().collect();

        // Validate every bypass edge before touching the graph.
        for up in &upstreams {
            let up_schema = self.output_schema(*up)?;
            for down in &downstreams {
                if up_schema != self.input_schema(*down)? {
                    return Err(Error::NotSpliceable {
                        operator: id,
                        reason: format!("{up} and {down} carry different record types"),
                    });
                }
            }
        }

        self.disconnect_all(id)?;
        for up in &upstreams {
            for down in &downstreams {
                self.connect(*up, *down)?;
            }
        }
        debug!(
            operator = %id,
            upstreams = upstreams.len(),
            downstreams = downstreams.len(),
            "spliced operator out of graph"
        );
        self.remove(id)
    }

    /// Distinct operators feeding any input of `id`.
    pub fn upstream(&self, id: OperatorId) -> Result<Vec<OperatorId>> {
        let op = self.get(id)?;
        let set: BTreeSet<OperatorId> = op
            .inputs()
            .iter()
            .flat_map(|p| p.connections().iter().map(|r| r.operator))
            .collect();
        Ok(set.into_iter().collect())
    }

    /// Distinct operators fed by any output of `id`.
    pub fn downstream(&self, id: OperatorId) -> Result<Vec<OperatorId>> {
        let op = self.get(id)?;
        let set: BTreeSet<OperatorId> = op
            .outputs()
            .iter()
            .flat_map(|p| p.connections().iter().map(|r| r.operator))
            .collect();
        Ok(set.into_iter().collect())
    }

    pub fn upstream_of(&self, port: InputRef) -> Result<&BTreeSet<OutputRef>> {
        self.get(port.operator)?
            .input(port.index)
            .map(|p| p.connections())
            .ok_or_else(|| unknown_port(port.operator, format!("in[{}]", port.index)))
    }

    pub fn downstream_of(&self, port: OutputRef) -> Result<&BTreeSet<InputRef>> {
        self.get(port.operator)?
            .output(port.index)
            .map(|p| p.connections())
            .ok_or_else(|| unknown_port(port.operator, format!("out[{}]", port.index)))
    }

    /// Every connection as `(upstream, downstream)`, in port order.
    pub fn edges(&self) -> Vec<(OutputRef, InputRef)> {
        let mut edges = Vec::new();
        for op in self.operators.values() {
            for (i, port) in op.outputs().iter().enumerate() {
                for down in port.connections() {
                    edges.push((op.output_ref(i), *down));
                }
            }
        }
        edges
    }

    /// Deep copy. Ids, origins, attributes, and connections are preserved.
    pub fn copy(&self) -> OperatorGraph {
        self.clone()
    }

    /// Check the graph invariants; used by tests and by callers that accept
    /// graphs from elsewhere.
    pub fn validate(&self) -> Result<()> {
        for (up, down) in self.edges() {
            let down_op = self
                .operators
                .get(&down.operator)
                .ok_or_else(|| Error::Invariant(format!("{up} references missing {down}")))?;
            let mirrored = down_op
                .input(down.index)
                .map(|p| p.connections().contains(&up))
                .unwrap_or(false);
            if !mirrored {
                return Err(Error::Invariant(format!(
                    "connection {up} -> {down} is not mirrored"
                )));
            }
            if self.output_schema(up)? != self.input_schema(down)? {
                return Err(Error::Invariant(format!(
                    "connection {up} -> {down} links different record types"
                )));
            }
        }
        for op in self.operators.values() {
            for (i, port) in op.inputs().iter().enumerate() {
                for up in port.connections() {
                    if !self.is_connected(*up, op.input_ref(i)) {
                        return Err(Error::Invariant(format!(
                            "{} lists {up} as upstream but the edge is missing",
                            op.input_ref(i)
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn output_port_mut(&mut self, port: OutputRef) -> Result<&mut crate::operator::OutputPort> {
        self.operators
            .get_mut(&port.operator)
            .ok_or(Error::UnknownOperator(port.operator))?
            .outputs
            .get_mut(port.index)
            .ok_or_else(|| unknown_port(port.operator, format!("out[{}]", port.index)))
    }

    fn input_port_mut(&mut self, port: InputRef) -> Result<&mut crate::operator::InputPort> {
        self.operators
            .get_mut(&port.operator)
            .ok_or(Error::UnknownOperator(port.operator))?
            .inputs
            .get_mut(port.index)
            .ok_or_else(|| unknown_port(port.operator, format!("in[{}]", port.index)))
    }
}

fn unknown_port(operator: OperatorId, port: String) -> Error {
    Error::UnknownPort { operator, port }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::DataSize;

    fn record() -> Schema {
        Schema::opaque("Record")
    }

    fn unary(g: &mut OperatorGraph, name: &str) -> OperatorId {
        g.add(
            Operator::builder(OperatorKind::Core, name)
                .input("in", record())
                .output("out", record())
                .build(),
        )
    }

    fn chain() -> (OperatorGraph, OperatorId, OperatorId, OperatorId) {
        let mut g = OperatorGraph::new();
        let src = g.add(
            Operator::builder(OperatorKind::Input, "src")
                .output("out", record())
                .data_size(DataSize::Small)
                .build(),
        );
        let mid = unary(&mut g, "mid");
        let dst = g.add(
            Operator::builder(OperatorKind::Output, "dst")
                .input("in", record())
                .build(),
        );
        g.connect(OutputRef::new(src, 0), InputRef::new(mid, 0)).unwrap();
        g.connect(OutputRef::new(mid, 0), InputRef::new(dst, 0)).unwrap();
        (g, src, mid, dst)
    }

    #[test]
    fn connect_rejects_type_mismatch() {
        let mut g = OperatorGraph::new();
        let a = g.add(
            Operator::builder(OperatorKind::Input, "a")
                .output("out", Schema::opaque("A"))
                .build(),
        );
        let b = g.add(
            Operator::builder(OperatorKind::Output, "b")
                .input("in", Schema::opaque("B"))
                .build(),
        );
        let err = g.connect(OutputRef::new(a, 0), InputRef::new(b, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidConnection { .. }));
        assert!(!g.is_connected(OutputRef::new(a, 0), InputRef::new(b, 0)));
    }

    #[test]
    fn connect_reports_unknown_port() {
        let (mut g, src, mid, _) = chain();
        let err = g.connect(OutputRef::new(src, 3), InputRef::new(mid, 0)).unwrap_err();
        assert!(matches!(err, Error::UnknownPort { .. }));
    }

    #[test]
    fn remove_requires_disconnect() {
        let (mut g, _, mid, _) = chain();
        let err = g.remove(mid).unwrap_err();
        assert!(matches!(err, Error::LiveConnections { connections: 2, .. }));
        assert_eq!(g.disconnect_all(mid).unwrap(), 2);
        g.remove(mid).unwrap();
        assert!(!g.contains(mid));
        g.validate().unwrap();
    }

    #[test]
    fn splice_reconnects_neighbors() {
        let (mut g, src, mid, dst) = chain();
        g.remove_and_splice(mid).unwrap();
        assert!(g.is_connected(OutputRef::new(src, 0), InputRef::new(dst, 0)));
        for op in g.operators(false) {
            for p in op.inputs() {
                assert!(p.connections().iter().all(|r| r.operator != mid));
            }
            for p in op.outputs() {
                assert!(p.connections().iter().all(|r| r.operator != mid));
            }
        }
        g.validate().unwrap();
    }

    #[test]
    fn splice_rejects_multi_port_operator() {
        let (mut g, src, _, _) = chain();
        let err = g.remove_and_splice(src).unwrap_err();
        assert!(matches!(err, Error::NotSpliceable { .. }));
        assert!(g.contains(src));
    }

    #[test]
    fn copy_is_isomorphic_and_keeps_origins() {
        let (g, ..) = chain();
        let c = g.copy();
        assert_eq!(g.edges(), c.edges());
        for (a, b) in g.operators(false).into_iter().zip(c.operators(false)) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.origin(), b.origin());
            assert_eq!(a.attributes(), b.attributes());
        }
    }

    #[test]
    fn nested_flows_expand_on_request() {
        let (inner, ..) = chain();
        let mut g = OperatorGraph::new();
        g.add(Operator::builder(OperatorKind::Flow, "part").nested(inner).build());
        assert_eq!(g.operators(false).len(), 1);
        assert_eq!(g.operators(true).len(), 4);
    }
}
