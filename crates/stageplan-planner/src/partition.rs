//! Partition an operator graph into SubPlans at its plan markers.
//!
//! Every marker `M` is split into two sides: `In(M)`, which receives M's
//! upstream connections, and `Out(M)`, which emits its downstream ones. The
//! source graph then falls apart into connected components over non-marker
//! operators and marker sides; `In(M)` and `Out(M)` are never joined.
//!
//! - A component whose only marker sides are `In(Begin)` / `Out(End)` lies
//!   outside the plan (external inputs and outputs) and is skipped.
//! - Every other component becomes exactly one SubPlan. `In(M)` turns into an
//!   output boundary, `Out(M)` into an input boundary.
//! - Each inter-stage marker links its two copies as opposites.
//!
//! `Flow` operators are treated as opaque interior operators.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use stageplan_core::error::{Error, Result};
use stageplan_core::id::{OperatorId, SubPlanId};
use stageplan_graph::{InputRef, OperatorGraph, OutputRef, PlanMarker, PlanMarkers};
use tracing::debug;

use crate::plan::Plan;
use crate::subplan::{Boundary, BoundaryRef, BoundaryRole, SubPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Element {
    Interior(OperatorId),
    /// Upstream side of a marker.
    In(OperatorId),
    /// Downstream side of a marker.
    Out(OperatorId),
}

struct Region {
    interior: Vec<OperatorId>,
    ins: Vec<OperatorId>,
    outs: Vec<OperatorId>,
    elements: BTreeSet<Element>,
}

pub fn partition(graph: &OperatorGraph) -> Result<Plan> {
    let markers: BTreeMap<OperatorId, PlanMarker> = graph
        .operators(false)
        .into_iter()
        .filter_map(|op| PlanMarkers::get(op).map(|m| (op.id(), m)))
        .collect();

    let regions = find_regions(graph, &markers);

    let mut sub_plans: Vec<SubPlan> = Vec::new();
    // Where each marker side ended up.
    let mut placed: BTreeMap<Element, BoundaryRef> = BTreeMap::new();

    for region in regions {
        if !classify(&region, &markers)? {
            continue;
        }
        let id = SubPlanId::new(sub_plans.len() as u64);
        let sub = build_sub_plan(id, graph, &markers, &region, &mut placed)?;
        debug!(
            sub_plan = %id,
            interior = region.interior.len(),
            inputs = region.outs.len(),
            outputs = region.ins.len(),
            "built sub-plan"
        );
        sub_plans.push(sub);
    }

    let mut plan = Plan::from_parts(sub_plans);
    for (&marker_id, marker) in &markers {
        if !marker.is_inter_stage() {
            continue;
        }
        let (Some(upstream), Some(downstream)) = (
            placed.get(&Element::In(marker_id)),
            placed.get(&Element::Out(marker_id)),
        ) else {
            return Err(Error::DanglingBoundary {
                operator: marker_id,
                reason: format!("{marker} marker is missing one of its sides"),
            });
        };
        plan.link(*upstream, *downstream)?;
    }
    plan.rebuild_dependencies()?;
    Ok(plan)
}

fn is_marker(markers: &BTreeMap<OperatorId, PlanMarker>, id: OperatorId) -> bool {
    markers.contains_key(&id)
}

fn upstream_element(markers: &BTreeMap<OperatorId, PlanMarker>, port: OutputRef) -> Element {
    if is_marker(markers, port.operator) {
        Element::Out(port.operator)
    } else {
        Element::Interior(port.operator)
    }
}

fn downstream_element(markers: &BTreeMap<OperatorId, PlanMarker>, port: InputRef) -> Element {
    if is_marker(markers, port.operator) {
        Element::In(port.operator)
    } else {
        Element::Interior(port.operator)
    }
}

/// Flood-fill the split graph. Regions come out ordered by their first
/// element in operator-id order.
fn find_regions(graph: &OperatorGraph, markers: &BTreeMap<OperatorId, PlanMarker>) -> Vec<Region> {
    let mut seeds: Vec<Element> = Vec::new();
    for id in graph.ids() {
        if is_marker(markers, id) {
            seeds.push(Element::In(id));
            seeds.push(Element::Out(id));
        } else {
            seeds.push(Element::Interior(id));
        }
    }

    let mut adjacency: BTreeMap<Element, Vec<Element>> = BTreeMap::new();
    for (up, down) in graph.edges() {
        let a = upstream_element(markers, up);
        let b = downstream_element(markers, down);
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }

    let mut visited: BTreeSet<Element> = BTreeSet::new();
    let mut regions = Vec::new();
    for seed in seeds {
        if !visited.insert(seed) {
            continue;
        }
        let mut elements = BTreeSet::new();
        let mut queue = VecDeque::from([seed]);
        while let Some(e) = queue.pop_front() {
            elements.insert(e);
            for next in adjacency.get(&e).into_iter().flatten() {
                if visited.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }

        let mut region = Region {
            interior: Vec::new(),
            ins: Vec::new(),
            outs: Vec::new(),
            elements,
        };
        for e in &region.elements {
            match *e {
                Element::Interior(id) => region.interior.push(id),
                Element::In(id) => region.ins.push(id),
                Element::Out(id) => region.outs.push(id),
            }
        }
        regions.push(region);
    }
    regions
}

/// Decide whether `region` is a stage (`true`) or lies outside the plan
/// (`false`), rejecting malformed regions.
fn classify(region: &Region, markers: &BTreeMap<OperatorId, PlanMarker>) -> Result<bool> {
    let outer_in: Vec<OperatorId> = region
        .ins
        .iter()
        .copied()
        .filter(|m| markers[m] == PlanMarker::Begin)
        .collect();
    let outer_out: Vec<OperatorId> = region
        .outs
        .iter()
        .copied()
        .filter(|m| markers[m] == PlanMarker::End)
        .collect();
    let sides = region.ins.len() + region.outs.len();

    if sides == 0 {
        let operator = region.interior.first().copied().unwrap_or(OperatorId::new(0));
        return Err(Error::IncompletePlan {
            operator,
            reason: "operators are not bounded by any plan marker".into(),
        });
    }
    if outer_in.len() + outer_out.len() == sides {
        return Ok(false);
    }
    if let Some(m) = outer_in.first() {
        return Err(Error::IncompletePlan {
            operator: *m,
            reason: "begin marker is fed from inside a stage".into(),
        });
    }
    if let Some(m) = outer_out.first() {
        return Err(Error::IncompletePlan {
            operator: *m,
            reason: "end marker feeds into a stage".into(),
        });
    }
    if region.interior.is_empty() && (region.ins.is_empty() || region.outs.is_empty()) {
        let m = region.ins.first().or(region.outs.first()).copied();
        let side = if region.ins.is_empty() { "downstream" } else { "upstream" };
        return Err(Error::DanglingBoundary {
            operator: m.unwrap_or(OperatorId::new(0)),
            reason: format!("nothing is connected on its {side} side"),
        });
    }
    Ok(true)
}

fn build_sub_plan(
    id: SubPlanId,
    graph: &OperatorGraph,
    markers: &BTreeMap<OperatorId, PlanMarker>,
    region: &Region,
    placed: &mut BTreeMap<Element, BoundaryRef>,
) -> Result<SubPlan> {
    let mut sub = SubPlan::new(id);
    let mut local: BTreeMap<Element, OperatorId> = BTreeMap::new();

    for &op_id in &region.interior {
        let op = graph.get(op_id)?;
        if op.inputs().is_empty() || op.outputs().is_empty() {
            return Err(Error::IncompletePlan {
                operator: op_id,
                reason: format!("{op} starts or ends a path without a plan marker"),
            });
        }
        let dangling = op.inputs().iter().any(|p| !p.is_connected())
            || op.outputs().iter().any(|p| !p.is_connected());
        if dangling {
            return Err(Error::IncompletePlan {
                operator: op_id,
                reason: format!("{op} has an unconnected port"),
            });
        }
        local.insert(Element::Interior(op_id), sub.adopt(op_id, op));
    }

    for (sides, role) in [(&region.ins, BoundaryRole::Output), (&region.outs, BoundaryRole::Input)] {
        for &marker_id in sides {
            let copy = sub.adopt(marker_id, graph.get(marker_id)?);
            let element = match role {
                BoundaryRole::Output => Element::In(marker_id),
                BoundaryRole::Input => Element::Out(marker_id),
            };
            local.insert(element, copy);
            placed.insert(element, BoundaryRef::new(id, copy));
            sub.add_boundary(Boundary {
                role,
                operator: copy,
                marker: markers[&marker_id],
                opposite: None,
            });
        }
    }

    for (up, down) in graph.edges() {
        let a = upstream_element(markers, up);
        let b = downstream_element(markers, down);
        if !(region.elements.contains(&a) && region.elements.contains(&b)) {
            continue;
        }
        let (Some(&la), Some(&lb)) = (local.get(&a), local.get(&b)) else {
            return Err(Error::Invariant(format!(
                "edge {up} -> {down} lies in a region but its endpoints were not copied"
            )));
        };
        sub.graph_mut()
            .connect(OutputRef::new(la, up.index), InputRef::new(lb, down.index))?;
    }
    Ok(sub)
}
