//! Estimation phase: memoized, recursive size estimation.

use std::collections::BTreeSet;

use stageplan_core::config::PlannerOptions;
use stageplan_core::id::OperatorId;
use stageplan_graph::{InputRef, Operator, OperatorGraph, OutputRef};
use tracing::trace;

use crate::error::{CostError, Result};
use crate::estimate::{EstimateMap, OperatorEstimate, SizeEstimate};
use crate::registry::Registry;

/// Computes the port sizes of one operator.
///
/// Implementations read upstream sizes through `ctx`, which estimates them
/// on demand. Errors are not caught by the context.
pub trait OperatorEstimator: Send + Sync {
    /// Stable name used in logs and errors.
    fn name(&self) -> &str;

    fn perform(&self, ctx: &mut EstimatorContext<'_>, operator: &Operator) -> Result<OperatorEstimate>;
}

/// State of one estimation pass over one graph.
///
/// Results are cached for the lifetime of the context; build a new context
/// for every compilation.
pub struct EstimatorContext<'a> {
    graph: &'a OperatorGraph,
    options: &'a PlannerOptions,
    estimators: &'a Registry<dyn OperatorEstimator>,
    cache: EstimateMap,
    in_progress: BTreeSet<OperatorId>,
}

impl<'a> EstimatorContext<'a> {
    pub fn new(
        graph: &'a OperatorGraph,
        options: &'a PlannerOptions,
        estimators: &'a Registry<dyn OperatorEstimator>,
    ) -> Self {
        Self {
            graph,
            options,
            estimators,
            cache: EstimateMap::new(),
            in_progress: BTreeSet::new(),
        }
    }

    pub fn graph(&self) -> &'a OperatorGraph {
        self.graph
    }

    pub fn options(&self) -> &'a PlannerOptions {
        self.options
    }

    /// Estimate of `id`, computing it on first request.
    ///
    /// Uncached upstream operators are estimated first, sources before their
    /// consumers, so estimators reading their inputs only hit the cache.
    /// Operators no estimator matches get an all-unknown estimate.
    pub fn estimate(&mut self, id: OperatorId) -> Result<OperatorEstimate> {
        if let Some(hit) = self.cache.get(&id) {
            return Ok(hit.clone());
        }
        if self.in_progress.contains(&id) {
            return Err(CostError::Cycle(id));
        }
        for upstream in self.uncached_upstreams(id)? {
            self.estimate_one(upstream)?;
        }
        self.estimate_one(id)
    }

    fn estimate_one(&mut self, id: OperatorId) -> Result<OperatorEstimate> {
        if let Some(hit) = self.cache.get(&id) {
            return Ok(hit.clone());
        }
        if !self.in_progress.insert(id) {
            return Err(CostError::Cycle(id));
        }
        let result = self.compute(id);
        self.in_progress.remove(&id);
        let estimate = result?;
        trace!(operator = %id, inputs = ?estimate.inputs, outputs = ?estimate.outputs, "memoized estimate");
        self.cache.insert(id, estimate.clone());
        Ok(estimate)
    }

    /// Uncached operators upstream of `root` (excluding `root`) in DFS
    /// post-order, i.e. every operator after all of its upstreams.
    fn uncached_upstreams(&self, root: OperatorId) -> Result<Vec<OperatorId>> {
        let graph = self.graph;
        let mut order = Vec::new();
        let mut done: BTreeSet<OperatorId> = BTreeSet::new();
        let mut on_path: BTreeSet<OperatorId> = BTreeSet::from([root]);
        let mut stack = vec![(root, graph.upstream(root)?.into_iter())];

        while let Some((node, pending)) = stack.last_mut() {
            let node = *node;
            match pending.next() {
                Some(up) => {
                    if self.cache.contains_key(&up) || done.contains(&up) {
                        continue;
                    }
                    if on_path.contains(&up) || self.in_progress.contains(&up) {
                        return Err(CostError::Cycle(up));
                    }
                    on_path.insert(up);
                    stack.push((up, graph.upstream(up)?.into_iter()));
                }
                None => {
                    stack.pop();
                    on_path.remove(&node);
                    if node != root {
                        done.insert(node);
                        order.push(node);
                    }
                }
            }
        }
        Ok(order)
    }

    fn compute(&mut self, id: OperatorId) -> Result<OperatorEstimate> {
        let (graph, estimators) = (self.graph, self.estimators);
        let operator = graph.get(id)?;
        let Some(estimator) = estimators.find(operator) else {
            trace!(operator = %operator, "no estimator matched");
            return Ok(OperatorEstimate::unknown(operator));
        };
        trace!(operator = %operator, estimator = estimator.name(), "dispatching estimate");
        let estimate = estimator.perform(self, operator)?;
        if !estimate.fits(operator) {
            return Err(CostError::Estimator {
                name: estimator.name().to_string(),
                reason: format!(
                    "returned {}/{} port estimates for {operator} with {}/{} ports",
                    estimate.inputs.len(),
                    estimate.outputs.len(),
                    operator.inputs().len(),
                    operator.outputs().len()
                ),
            });
        }
        Ok(estimate)
    }

    /// Sum of the upstream output estimates feeding `port`.
    pub fn input_size(&mut self, port: InputRef) -> Result<SizeEstimate> {
        let graph = self.graph;
        let mut total = SizeEstimate::Known(0.0);
        for up in graph.upstream_of(port)? {
            total = total + self.output_size(*up)?;
        }
        Ok(total)
    }

    pub fn output_size(&mut self, port: OutputRef) -> Result<SizeEstimate> {
        Ok(self.estimate(port.operator)?.output(port.index))
    }

    /// Already computed estimate, without triggering estimation.
    pub fn cached(&self, id: OperatorId) -> Option<&OperatorEstimate> {
        self.cache.get(&id)
    }

    /// Every estimate computed during the pass.
    pub fn into_estimates(self) -> EstimateMap {
        self.cache
    }
}
