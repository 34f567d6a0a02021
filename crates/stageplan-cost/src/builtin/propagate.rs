use stageplan_graph::Operator;

use crate::error::Result;
use crate::estimate::{OperatorEstimate, SizeEstimate, UNKNOWN_SIZE};
use crate::estimator::{EstimatorContext, OperatorEstimator};

fn input_sizes(ctx: &mut EstimatorContext<'_>, operator: &Operator) -> Result<Vec<SizeEstimate>> {
    (0..operator.inputs().len())
        .map(|i| ctx.input_size(operator.input_ref(i)))
        .collect()
}

/// Every output carries everything that came in.
///
/// Operators without inputs have nothing to propagate and stay unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagateEstimator;

impl OperatorEstimator for PropagateEstimator {
    fn name(&self) -> &str {
        "propagate"
    }

    fn perform(&self, ctx: &mut EstimatorContext<'_>, operator: &Operator) -> Result<OperatorEstimate> {
        let inputs = input_sizes(ctx, operator)?;
        let total = if inputs.is_empty() {
            UNKNOWN_SIZE
        } else {
            inputs.iter().copied().sum()
        };
        Ok(OperatorEstimate {
            outputs: vec![total; operator.outputs().len()],
            inputs,
        })
    }
}

/// Plan markers are zero-width: output `i` equals input `i`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerEstimator;

impl OperatorEstimator for MarkerEstimator {
    fn name(&self) -> &str {
        "marker"
    }

    fn perform(&self, ctx: &mut EstimatorContext<'_>, operator: &Operator) -> Result<OperatorEstimate> {
        let inputs = input_sizes(ctx, operator)?;
        let outputs = (0..operator.outputs().len())
            .map(|i| inputs.get(i).copied().unwrap_or(UNKNOWN_SIZE))
            .collect();
        Ok(OperatorEstimate { inputs, outputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::default_estimators;
    use stageplan_core::config::PlannerOptions;
    use stageplan_core::schema::Schema;
    use stageplan_graph::{
        DataSize, InputRef, OperatorGraph, OperatorKind, OutputRef, PlanMarker, PlanMarkers,
    };

    #[test]
    fn union_sums_inputs_through_markers() {
        let rec = Schema::opaque("Record");
        let mut g = OperatorGraph::new();
        let a = g.add(
            Operator::builder(OperatorKind::Input, "a")
                .output("out", rec.clone())
                .data_size(DataSize::Tiny)
                .build(),
        );
        let b = g.add(
            Operator::builder(OperatorKind::Input, "b")
                .output("out", rec.clone())
                .data_size(DataSize::Small)
                .build(),
        );
        let cp = g.add(PlanMarkers::create(PlanMarker::Checkpoint, rec.clone()));
        let union = g.add(
            Operator::builder(OperatorKind::Core, "union")
                .input("in", rec.clone())
                .output("out", rec)
                .build(),
        );
        g.connect(OutputRef::new(a, 0), InputRef::new(cp, 0)).unwrap();
        g.connect(OutputRef::new(cp, 0), InputRef::new(union, 0)).unwrap();
        g.connect(OutputRef::new(b, 0), InputRef::new(union, 0)).unwrap();

        let options = PlannerOptions::new()
            .with("estimate.size.tiny", "10")
            .with("estimate.size.small", "100");
        let registry = default_estimators(&options).unwrap();
        let mut ctx = EstimatorContext::new(&g, &options, &registry);

        let est = ctx.estimate(union).unwrap();
        assert_eq!(est.inputs, vec![SizeEstimate::Known(110.0)]);
        assert_eq!(est.output(0), SizeEstimate::Known(110.0));
        assert_eq!(ctx.cached(cp).unwrap().output(0), SizeEstimate::Known(10.0));
    }

    #[test]
    fn unknown_input_poisons_the_total() {
        let rec = Schema::opaque("Record");
        let mut g = OperatorGraph::new();
        let known = g.add(
            Operator::builder(OperatorKind::Input, "k")
                .output("out", rec.clone())
                .data_size(DataSize::Tiny)
                .build(),
        );
        let unknown = g.add(
            Operator::builder(OperatorKind::Input, "u")
                .output("out", rec.clone())
                .build(),
        );
        let join = g.add(
            Operator::builder(OperatorKind::User, "join")
                .input("left", rec.clone())
                .input("right", rec.clone())
                .output("out", rec)
                .build(),
        );
        g.connect(OutputRef::new(known, 0), InputRef::new(join, 0)).unwrap();
        g.connect(OutputRef::new(unknown, 0), InputRef::new(join, 1)).unwrap();

        let options = PlannerOptions::new().with("estimate.size.tiny", "12");
        let registry = default_estimators(&options).unwrap();
        let mut ctx = EstimatorContext::new(&g, &options, &registry);

        let est = ctx.estimate(join).unwrap();
        assert_eq!(est.inputs, vec![SizeEstimate::Known(12.0), UNKNOWN_SIZE]);
        assert_eq!(est.outputs, vec![UNKNOWN_SIZE]);
    }
}
