//! `SubPlan`: one physical stage with its private operator graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stageplan_core::id::{OperatorId, SubPlanId};
use stageplan_graph::{Operator, OperatorGraph, PlanMarker};

use crate::equivalence::{EquivalenceKey, OperatorEquivalence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoundaryRole {
    /// Data enters the SubPlan through this marker copy.
    Input,
    /// Data leaves the SubPlan through this marker copy.
    Output,
}

/// Address of a boundary marker copy: owning SubPlan and local operator id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundaryRef {
    pub sub_plan: SubPlanId,
    pub operator: OperatorId,
}

impl BoundaryRef {
    pub const fn new(sub_plan: SubPlanId, operator: OperatorId) -> Self {
        Self { sub_plan, operator }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub role: BoundaryRole,
    /// Marker copy in the SubPlan's graph.
    pub operator: OperatorId,
    pub marker: PlanMarker,
    /// Counterpart in the adjacent SubPlan; `None` on the plan's outer edge.
    pub opposite: Option<BoundaryRef>,
}

#[derive(Debug, Clone)]
pub struct SubPlan {
    id: SubPlanId,
    graph: OperatorGraph,
    boundaries: BTreeMap<OperatorId, Boundary>,
    /// Local operator → operator of the source graph it was copied from.
    sources: BTreeMap<OperatorId, OperatorId>,
}

impl SubPlan {
    pub(crate) fn new(id: SubPlanId) -> Self {
        Self {
            id,
            graph: OperatorGraph::new(),
            boundaries: BTreeMap::new(),
            sources: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> SubPlanId {
        self.id
    }

    pub fn graph(&self) -> &OperatorGraph {
        &self.graph
    }

    /// Mutable access for later rewrite passes. Boundaries are managed
    /// through [`crate::Plan`] so opposite references stay symmetric.
    pub fn graph_mut(&mut self) -> &mut OperatorGraph {
        &mut self.graph
    }

    /// Copy `source` (operator `source_id` of the source graph) into this
    /// SubPlan and return the local id.
    pub(crate) fn adopt(&mut self, source_id: OperatorId, source: &Operator) -> OperatorId {
        let local = self.graph.add(source.copy());
        self.sources.insert(local, source_id);
        local
    }

    pub(crate) fn add_boundary(&mut self, boundary: Boundary) {
        self.boundaries.insert(boundary.operator, boundary);
    }

    pub(crate) fn boundary_mut(&mut self, operator: OperatorId) -> Option<&mut Boundary> {
        self.boundaries.get_mut(&operator)
    }

    pub(crate) fn take_boundary(&mut self, operator: OperatorId) -> Option<Boundary> {
        self.sources.remove(&operator);
        self.boundaries.remove(&operator)
    }

    pub fn boundary(&self, operator: OperatorId) -> Option<&Boundary> {
        self.boundaries.get(&operator)
    }

    pub fn boundaries(&self) -> impl Iterator<Item = &Boundary> {
        self.boundaries.values()
    }

    pub fn inputs(&self) -> Vec<&Boundary> {
        self.with_role(BoundaryRole::Input)
    }

    pub fn outputs(&self) -> Vec<&Boundary> {
        self.with_role(BoundaryRole::Output)
    }

    fn with_role(&self, role: BoundaryRole) -> Vec<&Boundary> {
        self.boundaries.values().filter(|b| b.role == role).collect()
    }

    /// Operators that are not boundary copies.
    pub fn interior(&self) -> Vec<&Operator> {
        self.graph
            .operators(false)
            .into_iter()
            .filter(|op| !self.boundaries.contains_key(&op.id()))
            .collect()
    }

    /// The source-graph operator a local operator was copied from.
    ///
    /// Operators added by later rewrites have no source.
    pub fn source_of(&self, local: OperatorId) -> Option<OperatorId> {
        self.sources.get(&local).copied()
    }

    /// Local copies of a source-graph operator.
    pub fn copies_of(&self, source: OperatorId) -> Vec<OperatorId> {
        self.sources
            .iter()
            .filter(|(_, s)| **s == source)
            .map(|(local, _)| *local)
            .collect()
    }

    /// Local operators whose key under `equivalence` is `key`.
    pub fn find(&self, equivalence: &dyn OperatorEquivalence, key: EquivalenceKey) -> Vec<OperatorId> {
        self.graph
            .operators(false)
            .into_iter()
            .filter(|op| equivalence.extract(self, op) == key)
            .map(Operator::id)
            .collect()
    }
}
