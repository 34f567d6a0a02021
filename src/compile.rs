//! One compilation: partition, estimate, characterize.

use stageplan_core::config::PlannerOptions;
use stageplan_core::id::{OperatorId, SubPlanId};
use stageplan_cost::builtin::{default_characterizers, default_estimators, JoinStrategy};
use stageplan_cost::{CharacteristicMap, CostEngine, CostError, EstimateMap, OperatorEstimate};
use stageplan_graph::OperatorGraph;
use stageplan_planner::Plan;
use tracing::info;

/// Everything the planner produces for one graph.
///
/// Estimates and characteristics are keyed by source-graph operator ids.
#[derive(Debug)]
pub struct Compilation {
    pub plan: Plan,
    pub estimates: EstimateMap,
    pub join_strategies: CharacteristicMap<JoinStrategy>,
}

impl Compilation {
    /// Estimate of an operator inside a SubPlan, found through the source
    /// operator it was copied from.
    pub fn estimate_of(&self, sub_plan: SubPlanId, local: OperatorId) -> Option<&OperatorEstimate> {
        let source = self.plan.sub_plan(sub_plan)?.source_of(local)?;
        self.estimates.get(&source)
    }

    pub fn join_strategy_of(&self, sub_plan: SubPlanId, local: OperatorId) -> Option<JoinStrategy> {
        let source = self.plan.sub_plan(sub_plan)?.source_of(local)?;
        self.join_strategies.get(&source).copied()
    }
}

/// Partition `graph` and run the built-in cost handlers over it.
///
/// Any failure aborts the whole compilation.
pub fn compile(graph: &OperatorGraph, options: &PlannerOptions) -> Result<Compilation, CostError> {
    let plan = Plan::build(graph)?;

    let estimators = default_estimators(options)?;
    let engine = CostEngine::new(options, &estimators);
    let estimates = engine.estimate(graph, graph.ids())?;
    let join_strategies =
        engine.characterize(graph, &estimates, &default_characterizers(), graph.ids())?;

    info!(
        sub_plans = plan.len(),
        estimated = estimates.len(),
        joins = join_strategies.len(),
        "compiled graph"
    );
    Ok(Compilation {
        plan,
        estimates,
        join_strategies,
    })
}
