//! Operators, their ports, and typed attributes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use stageplan_core::id::{OperatorId, OriginId};
use stageplan_core::schema::Schema;

use crate::graph::OperatorGraph;
use crate::marker::PlanMarker;

/// Placeholder id of an operator that has not been added to a graph yet.
pub(crate) const DETACHED: OperatorId = OperatorId::new(u64::MAX);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatorKind {
    /// Built-in operators (checkpoint, project, extend, ...).
    Core,
    /// Operators declared by user code; see `Attributes::declaration`.
    User,
    /// Operators provided by extensions.
    Custom,
    /// External inputs.
    Input,
    /// External outputs.
    Output,
    /// Zero-width stage boundary tags.
    Marker,
    /// Nested flow parts.
    Flow,
}

/// Declared size class of an external input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataSize {
    Tiny,
    Small,
    Large,
    Unknown,
}

/// The closed set of attributes an operator may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub marker: Option<PlanMarker>,
    /// Identity of the user-facing declaration (e.g. `"CoGroup"`); used to
    /// dispatch estimators for `User` operators.
    pub declaration: Option<String>,
    pub data_size: Option<DataSize>,
    pub label: Option<String>,
}

/// Reference to an input port: operator plus port index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InputRef {
    pub operator: OperatorId,
    pub index: usize,
}

/// Reference to an output port: operator plus port index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputRef {
    pub operator: OperatorId,
    pub index: usize,
}

impl InputRef {
    pub const fn new(operator: OperatorId, index: usize) -> Self {
        Self { operator, index }
    }
}

impl OutputRef {
    pub const fn new(operator: OperatorId, index: usize) -> Self {
        Self { operator, index }
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.in[{}]", self.operator, self.index)
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.out[{}]", self.operator, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRef {
    Input(InputRef),
    Output(OutputRef),
}

impl PortRef {
    pub fn operator(&self) -> OperatorId {
        match self {
            PortRef::Input(r) => r.operator,
            PortRef::Output(r) => r.operator,
        }
    }
}

impl From<InputRef> for PortRef {
    fn from(r: InputRef) -> Self {
        PortRef::Input(r)
    }
}

impl From<OutputRef> for PortRef {
    fn from(r: OutputRef) -> Self {
        PortRef::Output(r)
    }
}

/// A typed port. `R` is the reference type of the opposite endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port<R: Ord> {
    name: String,
    schema: Schema,
    pub(crate) connections: BTreeSet<R>,
}

/// Input port; its connections are upstream outputs.
pub type InputPort = Port<OutputRef>;
/// Output port; its connections are downstream inputs.
pub type OutputPort = Port<InputRef>;

impl<R: Ord> Port<R> {
    fn new(name: String, schema: Schema) -> Self {
        Self {
            name,
            schema,
            connections: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn connections(&self) -> &BTreeSet<R> {
        &self.connections
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }
}

/// One data-parallel computation step.
///
/// Ports are fixed at construction; only their connection sets change, and
/// only through [`OperatorGraph`].
#[derive(Debug, Clone)]
pub struct Operator {
    pub(crate) id: OperatorId,
    origin: OriginId,
    kind: OperatorKind,
    name: String,
    pub(crate) inputs: Vec<InputPort>,
    pub(crate) outputs: Vec<OutputPort>,
    attributes: Attributes,
    nested: Option<Box<OperatorGraph>>,
}

impl Operator {
    pub fn builder(kind: OperatorKind, name: impl Into<String>) -> OperatorBuilder {
        OperatorBuilder::new(kind, name)
    }

    /// Id inside the owning graph.
    pub fn id(&self) -> OperatorId {
        self.id
    }

    pub fn origin(&self) -> OriginId {
        self.origin
    }

    pub fn kind(&self) -> OperatorKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    pub fn input(&self, index: usize) -> Option<&InputPort> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&OutputPort> {
        self.outputs.get(index)
    }

    pub fn input_ref(&self, index: usize) -> InputRef {
        InputRef::new(self.id, index)
    }

    pub fn output_ref(&self, index: usize) -> OutputRef {
        OutputRef::new(self.id, index)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Nested graph of a `Flow` operator.
    pub fn nested(&self) -> Option<&OperatorGraph> {
        self.nested.as_deref()
    }

    /// Total number of connection entries across all ports.
    pub fn connection_count(&self) -> usize {
        self.inputs.iter().map(|p| p.connections.len()).sum::<usize>()
            + self.outputs.iter().map(|p| p.connections.len()).sum::<usize>()
    }

    /// A detached copy: same origin, kind, ports, and attributes, but no
    /// connections and no graph id.
    pub fn copy(&self) -> Operator {
        let mut copy = self.clone();
        copy.id = DETACHED;
        for p in &mut copy.inputs {
            p.connections.clear();
        }
        for p in &mut copy.outputs {
            p.connections.clear();
        }
        copy
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}#{}", self.kind, self.name, self.id.get())
    }
}

pub struct OperatorBuilder {
    kind: OperatorKind,
    name: String,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
    attributes: Attributes,
    nested: Option<Box<OperatorGraph>>,
}

impl OperatorBuilder {
    pub fn new(kind: OperatorKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: Attributes::default(),
            nested: None,
        }
    }

    pub fn input(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.inputs.push(Port::new(name.into(), schema));
        self
    }

    pub fn output(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.outputs.push(Port::new(name.into(), schema));
        self
    }

    pub fn marker(mut self, marker: PlanMarker) -> Self {
        self.attributes.marker = Some(marker);
        self
    }

    pub fn declaration(mut self, declaration: impl Into<String>) -> Self {
        self.attributes.declaration = Some(declaration.into());
        self
    }

    pub fn data_size(mut self, size: DataSize) -> Self {
        self.attributes.data_size = Some(size);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.attributes.label = Some(label.into());
        self
    }

    pub fn nested(mut self, graph: OperatorGraph) -> Self {
        self.nested = Some(Box::new(graph));
        self
    }

    /// Finish the operator with a fresh origin id.
    pub fn build(self) -> Operator {
        Operator {
            id: DETACHED,
            origin: OriginId::fresh(),
            kind: self.kind,
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            attributes: self.attributes,
            nested: self.nested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_keeps_origin_and_attributes() {
        let op = Operator::builder(OperatorKind::Input, "orders")
            .output("out", Schema::opaque("Order"))
            .data_size(DataSize::Tiny)
            .build();
        let copy = op.copy();
        assert_eq!(copy.origin(), op.origin());
        assert_eq!(copy.attributes(), op.attributes());
        assert_eq!(copy.outputs().len(), 1);
        assert_eq!(copy.output(0).unwrap().schema().name, "Order");
    }

    #[test]
    fn builders_allocate_distinct_origins() {
        let a = Operator::builder(OperatorKind::Core, "x").build();
        let b = Operator::builder(OperatorKind::Core, "x").build();
        assert_ne!(a.origin(), b.origin());
    }
}
