//! `Plan`: SubPlans plus the dependency edges between them.
//!
//! A built plan is a snapshot. Mutating a SubPlan or relinking boundaries
//! does not touch the dependency edges until
//! [`Plan::rebuild_dependencies`] is called.

use std::collections::BTreeSet;

use serde::Serialize;

use stageplan_core::error::{Error, Result};
use stageplan_core::hash::{hash_serde, Hash256};
use stageplan_core::id::{OperatorId, SubPlanId};
use stageplan_graph::{Attributes, OperatorGraph, OperatorKind};
use stageplan_stats::{find_circuits, topological_order, Graph, GraphStatistics};
use tracing::{info, warn};

use crate::equivalence::{EquivalenceKey, OperatorEquivalence};
use crate::partition::partition;
use crate::subplan::{Boundary, BoundaryRef, BoundaryRole, SubPlan};

#[derive(Debug, Clone)]
pub struct Plan {
    sub_plans: Vec<SubPlan>,
    /// `(upstream, downstream)` pairs.
    dependencies: BTreeSet<(SubPlanId, SubPlanId)>,
}

impl Plan {
    /// Partition `graph` at its plan markers.
    ///
    /// Markers must already sit on every edge that splits two stages.
    pub fn build(graph: &OperatorGraph) -> Result<Plan> {
        let plan = partition(graph)?;
        info!(
            sub_plans = plan.sub_plans.len(),
            statistics = %plan.statistics(),
            "built plan"
        );
        Ok(plan)
    }

    pub(crate) fn from_parts(sub_plans: Vec<SubPlan>) -> Self {
        Self {
            sub_plans,
            dependencies: BTreeSet::new(),
        }
    }

    pub fn sub_plans(&self) -> &[SubPlan] {
        &self.sub_plans
    }

    pub fn len(&self) -> usize {
        self.sub_plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_plans.is_empty()
    }

    pub fn sub_plan(&self, id: SubPlanId) -> Option<&SubPlan> {
        self.sub_plans.get(id.get() as usize)
    }

    pub fn sub_plan_mut(&mut self, id: SubPlanId) -> Option<&mut SubPlan> {
        self.sub_plans.get_mut(id.get() as usize)
    }

    pub fn dependencies(&self) -> &BTreeSet<(SubPlanId, SubPlanId)> {
        &self.dependencies
    }

    /// SubPlans that must finish before `id` can start.
    pub fn upstreams(&self, id: SubPlanId) -> Vec<SubPlanId> {
        self.dependencies
            .iter()
            .filter(|(_, down)| *down == id)
            .map(|(up, _)| *up)
            .collect()
    }

    /// SubPlans waiting on `id`.
    pub fn downstreams(&self, id: SubPlanId) -> Vec<SubPlanId> {
        self.dependencies
            .iter()
            .filter(|(up, _)| *up == id)
            .map(|(_, down)| *down)
            .collect()
    }

    /// The dependency edges as a graph over every SubPlan.
    pub fn dependency_graph(&self) -> Graph<SubPlanId> {
        let mut g = Graph::new();
        for sub in &self.sub_plans {
            g.add_node(sub.id());
        }
        for (up, down) in &self.dependencies {
            g.add_edge(*up, *down);
        }
        g
    }

    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics::of(&self.dependency_graph())
    }

    /// SubPlans ordered so each comes after all of its upstreams.
    pub fn topological_order(&self) -> Result<Vec<SubPlanId>> {
        topological_order(&self.dependency_graph()).map_err(|circuits| {
            Error::Invariant(format!("sub-plan dependencies are cyclic: {circuits:?}"))
        })
    }

    pub fn boundary(&self, at: BoundaryRef) -> Option<&Boundary> {
        self.sub_plan(at.sub_plan)?.boundary(at.operator)
    }

    pub fn opposite(&self, at: BoundaryRef) -> Option<BoundaryRef> {
        self.boundary(at)?.opposite
    }

    /// Pair an output boundary with an input boundary of another SubPlan.
    ///
    /// Any previous partner of either side is unlinked first, so opposite
    /// references stay symmetric.
    pub fn link(&mut self, output: BoundaryRef, input: BoundaryRef) -> Result<()> {
        self.expect_role(output, BoundaryRole::Output)?;
        self.expect_role(input, BoundaryRole::Input)?;
        self.unlink(output)?;
        self.unlink(input)?;
        self.set_opposite(output, Some(input))?;
        self.set_opposite(input, Some(output))?;
        Ok(())
    }

    /// Clear the opposite of `at` and of its partner. Returns the old partner.
    pub fn unlink(&mut self, at: BoundaryRef) -> Result<Option<BoundaryRef>> {
        let previous = self.boundary_or_err(at)?.opposite;
        self.set_opposite(at, None)?;
        if let Some(other) = previous {
            if self.boundary(other).map(|b| b.opposite) == Some(Some(at)) {
                self.set_opposite(other, None)?;
            }
        }
        Ok(previous)
    }

    /// Unlink and delete a boundary marker copy from its SubPlan.
    pub fn remove_boundary(&mut self, at: BoundaryRef) -> Result<Boundary> {
        self.unlink(at)?;
        let sub = self
            .sub_plan_mut(at.sub_plan)
            .ok_or_else(|| missing_sub_plan(at.sub_plan))?;
        sub.graph_mut().disconnect_all(at.operator)?;
        sub.graph_mut().remove(at.operator)?;
        sub.take_boundary(at.operator)
            .ok_or_else(|| Error::Invariant(format!("{} is not a boundary", at.operator)))
    }

    /// Recompute the dependency edges from the current opposite pairs and
    /// check that they are acyclic.
    pub fn rebuild_dependencies(&mut self) -> Result<()> {
        let mut deps = BTreeSet::new();
        for sub in &self.sub_plans {
            for b in sub.outputs() {
                match b.opposite {
                    Some(other) => {
                        deps.insert((sub.id(), other.sub_plan));
                    }
                    None if b.marker.is_inter_stage() => {
                        warn!(sub_plan = %sub.id(), marker = %b.marker, "unpaired output boundary");
                    }
                    None => {}
                }
            }
        }
        self.dependencies = deps;

        let stats = self.statistics();
        if !stats.is_acyclic() {
            let circuits = find_circuits(&self.dependency_graph());
            return Err(Error::Invariant(format!(
                "sub-plan dependency graph is cyclic {stats}: {circuits:?}"
            )));
        }
        Ok(())
    }

    /// Every operator across all SubPlans whose key under `equivalence` is `key`.
    pub fn find(
        &self,
        equivalence: &dyn OperatorEquivalence,
        key: EquivalenceKey,
    ) -> Vec<(SubPlanId, OperatorId)> {
        self.sub_plans
            .iter()
            .flat_map(|sub| {
                sub.find(equivalence, key)
                    .into_iter()
                    .map(move |op| (sub.id(), op))
            })
            .collect()
    }

    /// Check that every opposite reference points back.
    pub fn validate(&self) -> Result<()> {
        for sub in &self.sub_plans {
            for b in sub.boundaries() {
                let here = BoundaryRef::new(sub.id(), b.operator);
                if let Some(other) = b.opposite {
                    if self.opposite(other) != Some(here) {
                        return Err(Error::Invariant(format!(
                            "opposite of {here:?} is {other:?}, which does not point back"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Stable digest of the plan's structure.
    ///
    /// Origin ids are left out, so two compilations of the same flow yield
    /// the same fingerprint.
    pub fn fingerprint(&self) -> Result<Hash256> {
        let digest = PlanDigest {
            version: stageplan_core::VERSION,
            sub_plans: self.sub_plans.iter().map(SubPlanDigest::of).collect(),
            dependencies: self
                .dependencies
                .iter()
                .map(|(a, b)| (a.get(), b.get()))
                .collect(),
        };
        hash_serde(&digest)
    }

    fn boundary_or_err(&self, at: BoundaryRef) -> Result<&Boundary> {
        self.boundary(at)
            .ok_or_else(|| Error::Invariant(format!("no boundary at {at:?}")))
    }

    fn expect_role(&self, at: BoundaryRef, role: BoundaryRole) -> Result<()> {
        let b = self.boundary_or_err(at)?;
        if b.role != role {
            return Err(Error::Invariant(format!(
                "boundary {at:?} is an {:?} boundary, expected {role:?}",
                b.role
            )));
        }
        Ok(())
    }

    fn set_opposite(&mut self, at: BoundaryRef, opposite: Option<BoundaryRef>) -> Result<()> {
        let b = self
            .sub_plan_mut(at.sub_plan)
            .and_then(|sub| sub.boundary_mut(at.operator))
            .ok_or_else(|| Error::Invariant(format!("no boundary at {at:?}")))?;
        b.opposite = opposite;
        Ok(())
    }
}

fn missing_sub_plan(id: SubPlanId) -> Error {
    Error::Invariant(format!("no sub-plan {id}"))
}

#[derive(Serialize)]
struct PlanDigest<'a> {
    version: &'a str,
    sub_plans: Vec<SubPlanDigest<'a>>,
    dependencies: Vec<(u64, u64)>,
}

#[derive(Serialize)]
struct SubPlanDigest<'a> {
    operators: Vec<OperatorDigest<'a>>,
    edges: Vec<(u64, usize, u64, usize)>,
    boundaries: Vec<(u64, BoundaryRole, Option<(u64, u64)>)>,
}

#[derive(Serialize)]
struct OperatorDigest<'a> {
    id: u64,
    kind: OperatorKind,
    name: &'a str,
    inputs: Vec<&'a str>,
    outputs: Vec<&'a str>,
    attributes: &'a Attributes,
}

impl<'a> SubPlanDigest<'a> {
    fn of(sub: &'a SubPlan) -> Self {
        let graph = sub.graph();
        Self {
            operators: graph
                .operators(false)
                .into_iter()
                .map(|op| OperatorDigest {
                    id: op.id().get(),
                    kind: op.kind(),
                    name: op.name(),
                    inputs: op.inputs().iter().map(|p| p.schema().name.as_str()).collect(),
                    outputs: op.outputs().iter().map(|p| p.schema().name.as_str()).collect(),
                    attributes: op.attributes(),
                })
                .collect(),
            edges: graph
                .edges()
                .into_iter()
                .map(|(up, down)| (up.operator.get(), up.index, down.operator.get(), down.index))
                .collect(),
            boundaries: sub
                .boundaries()
                .map(|b| {
                    (
                        b.operator.get(),
                        b.role,
                        b.opposite.map(|o| (o.sub_plan.get(), o.operator.get())),
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stageplan_core::schema::Schema;
    use stageplan_graph::{InputRef, Operator, OutputRef, PlanMarker, PlanMarkers};

    use crate::equivalence::SAME_ORIGIN;

    fn three_stages() -> OperatorGraph {
        let rec = Schema::opaque("Record");
        let mut g = OperatorGraph::new();
        let mut chain = vec![g.add(
            Operator::builder(OperatorKind::Input, "in")
                .output("out", rec.clone())
                .build(),
        )];
        for step in ["begin", "a", "checkpoint", "b", "gather", "c", "end"] {
            let id = match step {
                "begin" => g.add(PlanMarkers::create(PlanMarker::Begin, rec.clone())),
                "checkpoint" => g.add(PlanMarkers::create(PlanMarker::Checkpoint, rec.clone())),
                "gather" => g.add(PlanMarkers::create(PlanMarker::Gather, rec.clone())),
                "end" => g.add(PlanMarkers::create(PlanMarker::End, rec.clone())),
                name => g.add(
                    Operator::builder(OperatorKind::Core, name)
                        .input("in", rec.clone())
                        .output("out", rec.clone())
                        .build(),
                ),
            };
            chain.push(id);
        }
        chain.push(g.add(
            Operator::builder(OperatorKind::Output, "out")
                .input("in", rec)
                .build(),
        ));
        for pair in chain.windows(2) {
            g.connect(OutputRef::new(pair[0], 0), InputRef::new(pair[1], 0))
                .unwrap();
        }
        g
    }

    fn sp(n: u64) -> SubPlanId {
        SubPlanId::new(n)
    }

    #[test]
    fn chain_of_stages_orders_topologically() {
        let plan = Plan::build(&three_stages()).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.topological_order().unwrap(), vec![sp(0), sp(1), sp(2)]);
        assert_eq!(plan.upstreams(sp(1)), vec![sp(0)]);
        assert_eq!(plan.downstreams(sp(1)), vec![sp(2)]);
        assert_eq!(
            plan.statistics().to_string(),
            "{vertices=3, edges=2, critical=3, average-width=1.00}"
        );
    }

    #[test]
    fn dependencies_are_a_snapshot_until_rebuilt() {
        let mut plan = Plan::build(&three_stages()).unwrap();
        let out = plan.sub_plan(sp(0)).unwrap().outputs()[0].operator;
        let at = BoundaryRef::new(sp(0), out);
        let partner = plan.opposite(at).unwrap();

        let removed = plan.remove_boundary(at).unwrap();
        assert_eq!(removed.marker, PlanMarker::Checkpoint);
        assert_eq!(plan.opposite(partner), None);
        assert!(plan.dependencies().contains(&(sp(0), sp(1))));

        plan.rebuild_dependencies().unwrap();
        assert_eq!(
            plan.dependencies().iter().copied().collect::<Vec<_>>(),
            vec![(sp(1), sp(2))]
        );
        assert!(!plan.sub_plan(sp(0)).unwrap().graph().contains(out));
        plan.validate().unwrap();
    }

    #[test]
    fn relinking_keeps_opposites_symmetric() {
        let mut plan = Plan::build(&three_stages()).unwrap();
        let first_out = BoundaryRef::new(sp(0), plan.sub_plan(sp(0)).unwrap().outputs()[0].operator);
        let last_in = BoundaryRef::new(sp(2), plan.sub_plan(sp(2)).unwrap().inputs()[0].operator);
        let old_partner = plan.opposite(first_out).unwrap();

        plan.link(first_out, last_in).unwrap();
        assert_eq!(plan.opposite(first_out), Some(last_in));
        assert_eq!(plan.opposite(last_in), Some(first_out));
        assert_eq!(plan.opposite(old_partner), None);
        plan.validate().unwrap();

        let err = plan.link(last_in, first_out).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn backward_link_makes_rebuild_fail() {
        let mut plan = Plan::build(&three_stages()).unwrap();
        let last_out = plan.sub_plan(sp(1)).unwrap().outputs()[0].operator;
        let first_in = plan.sub_plan(sp(0)).unwrap().inputs()[0].operator;
        plan.link(BoundaryRef::new(sp(1), last_out), BoundaryRef::new(sp(0), first_in))
            .unwrap();

        let err = plan.rebuild_dependencies().unwrap_err();
        assert!(matches!(err, Error::Invariant(_)));
        assert!(plan.topological_order().is_err());
    }

    #[test]
    fn same_origin_finds_boundary_pairs() {
        let plan = Plan::build(&three_stages()).unwrap();
        let first = plan.sub_plan(sp(0)).unwrap();
        let cp = first.graph().get(first.outputs()[0].operator).unwrap();
        let key = SAME_ORIGIN.extract(first, cp);

        let hits = plan.find(&SAME_ORIGIN, key);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, sp(0));
        assert_eq!(hits[1].0, sp(1));

        let a = first.interior()[0];
        assert_ne!(SAME_ORIGIN.extract(first, a), key);
    }

    #[test]
    fn fingerprint_ignores_origins() {
        let one = Plan::build(&three_stages()).unwrap();
        let two = Plan::build(&three_stages()).unwrap();
        assert_eq!(one.fingerprint().unwrap(), two.fingerprint().unwrap());

        let mut changed = two.clone();
        let at = BoundaryRef::new(sp(1), changed.sub_plan(sp(1)).unwrap().outputs()[0].operator);
        changed.unlink(at).unwrap();
        assert_ne!(one.fingerprint().unwrap(), changed.fingerprint().unwrap());
    }
}
