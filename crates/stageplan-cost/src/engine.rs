//! Both cost phases over one graph.

use stageplan_core::config::PlannerOptions;
use stageplan_core::id::OperatorId;
use stageplan_graph::OperatorGraph;
use tracing::debug;

use crate::characterizer::{CharacteristicMap, CharacterizerContext, OperatorCharacterizer};
use crate::error::Result;
use crate::estimate::EstimateMap;
use crate::estimator::{EstimatorContext, OperatorEstimator};
use crate::registry::Registry;

pub struct CostEngine<'a> {
    options: &'a PlannerOptions,
    estimators: &'a Registry<dyn OperatorEstimator>,
}

impl<'a> CostEngine<'a> {
    pub fn new(options: &'a PlannerOptions, estimators: &'a Registry<dyn OperatorEstimator>) -> Self {
        Self { options, estimators }
    }

    pub fn options(&self) -> &'a PlannerOptions {
        self.options
    }

    /// Estimate every operator in `ids` with a fresh context.
    ///
    /// The result also holds the estimates of any upstream operators that
    /// were needed along the way.
    pub fn estimate(
        &self,
        graph: &OperatorGraph,
        ids: impl IntoIterator<Item = OperatorId>,
    ) -> Result<EstimateMap> {
        let mut ctx = EstimatorContext::new(graph, self.options, self.estimators);
        for id in ids {
            ctx.estimate(id)?;
        }
        let estimates = ctx.into_estimates();
        debug!(operators = estimates.len(), "estimated operator sizes");
        Ok(estimates)
    }

    /// Run the first matching characterizer on every operator in `ids`.
    ///
    /// Takes the output of [`CostEngine::estimate`] for the same graph.
    pub fn characterize<C>(
        &self,
        graph: &OperatorGraph,
        estimates: &EstimateMap,
        characterizers: &Registry<dyn OperatorCharacterizer<C>>,
        ids: impl IntoIterator<Item = OperatorId>,
    ) -> Result<CharacteristicMap<C>> {
        let ctx = CharacterizerContext::new(graph, self.options, estimates);
        let mut out = CharacteristicMap::new();
        for id in ids {
            let operator = graph.get(id)?;
            let Some(characterizer) = characterizers.find(operator) else {
                continue;
            };
            if let Some(c) = characterizer.extract(&ctx, operator)? {
                out.insert(id, c);
            }
        }
        debug!(operators = out.len(), "characterized operators");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{default_characterizers, default_estimators, JoinStrategy, JOIN_DECLARATION};
    use crate::error::CostError;
    use crate::estimate::SizeEstimate;
    use crate::registry::Matcher;
    use stageplan_core::schema::Schema;
    use stageplan_graph::{DataSize, InputRef, Operator, OperatorKind, OutputRef};

    fn join_graph(left: DataSize, right: DataSize) -> (OperatorGraph, OperatorId) {
        let rec = Schema::opaque("Record");
        let mut g = OperatorGraph::new();
        let l = g.add(
            Operator::builder(OperatorKind::Input, "left")
                .output("out", rec.clone())
                .data_size(left)
                .build(),
        );
        let r = g.add(
            Operator::builder(OperatorKind::Input, "right")
                .output("out", rec.clone())
                .data_size(right)
                .build(),
        );
        let join = g.add(
            Operator::builder(OperatorKind::User, "join")
                .input("left", rec.clone())
                .input("right", rec.clone())
                .output("out", rec)
                .declaration(JOIN_DECLARATION)
                .build(),
        );
        g.connect(OutputRef::new(l, 0), InputRef::new(join, 0)).unwrap();
        g.connect(OutputRef::new(r, 0), InputRef::new(join, 1)).unwrap();
        (g, join)
    }

    fn options() -> PlannerOptions {
        PlannerOptions::new()
            .with("estimate.size.tiny", "1024")
            .with("estimate.size.large", "1e12")
            .with("broadcast.limit", "4096")
    }

    fn strategy(left: DataSize, right: DataSize) -> Option<JoinStrategy> {
        let (g, join) = join_graph(left, right);
        let options = options();
        let estimators = default_estimators(&options).unwrap();
        let engine = CostEngine::new(&options, &estimators);
        let estimates = engine.estimate(&g, g.ids()).unwrap();
        let strategies = engine
            .characterize(&g, &estimates, &default_characterizers(), g.ids())
            .unwrap();
        assert_eq!(strategies.len(), 1);
        strategies.get(&join).copied()
    }

    #[test]
    fn small_side_is_broadcast() {
        assert_eq!(
            strategy(DataSize::Large, DataSize::Tiny),
            Some(JoinStrategy::Broadcast { port: 1 })
        );
        assert_eq!(
            strategy(DataSize::Tiny, DataSize::Large),
            Some(JoinStrategy::Broadcast { port: 0 })
        );
    }

    #[test]
    fn large_or_unknown_sides_shuffle() {
        assert_eq!(strategy(DataSize::Large, DataSize::Large), Some(JoinStrategy::Shuffle));
        assert_eq!(strategy(DataSize::Large, DataSize::Small), Some(JoinStrategy::Shuffle));
    }

    #[test]
    fn estimates_include_upstreams() {
        let (g, join) = join_graph(DataSize::Tiny, DataSize::Tiny);
        let options = options();
        let estimators = default_estimators(&options).unwrap();
        let engine = CostEngine::new(&options, &estimators);
        let estimates = engine.estimate(&g, [join]).unwrap();
        assert_eq!(estimates.len(), 3);
        assert_eq!(estimates[&join].output(0), SizeEstimate::Known(2048.0));
    }

    struct Exploding;

    impl OperatorCharacterizer<JoinStrategy> for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        fn extract(
            &self,
            _ctx: &CharacterizerContext<'_>,
            _operator: &stageplan_graph::Operator,
        ) -> Result<Option<JoinStrategy>> {
            Err(CostError::Characterizer {
                name: self.name().to_string(),
                reason: "unsupported".into(),
            })
        }
    }

    #[test]
    fn characterizer_errors_abort_the_pass() {
        let (g, _) = join_graph(DataSize::Tiny, DataSize::Tiny);
        let options = options();
        let estimators = default_estimators(&options).unwrap();
        let engine = CostEngine::new(&options, &estimators);
        let estimates = engine.estimate(&g, g.ids()).unwrap();
        let registry =
            Registry::<dyn OperatorCharacterizer<JoinStrategy>>::new().with(Matcher::Any, Box::new(Exploding));
        let err = engine.characterize(&g, &estimates, &registry, g.ids()).unwrap_err();
        assert!(matches!(err, CostError::Characterizer { .. }));
    }

    #[test]
    fn bad_limit_is_reported() {
        let (g, _) = join_graph(DataSize::Tiny, DataSize::Tiny);
        let options = options().with("broadcast.limit", "-5");
        let estimators = default_estimators(&options).unwrap();
        let engine = CostEngine::new(&options, &estimators);
        let estimates = engine.estimate(&g, g.ids()).unwrap();
        let err = engine
            .characterize(&g, &estimates, &default_characterizers(), g.ids())
            .unwrap_err();
        assert!(matches!(err, CostError::Characterizer { .. }));
    }
}
