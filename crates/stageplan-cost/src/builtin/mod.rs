//! Built-in estimators and characterizers.

pub mod broadcast;
pub mod external_input;
pub mod propagate;

pub use broadcast::{BroadcastJoinCharacterizer, JoinStrategy, JOIN_DECLARATION};
pub use external_input::{BasicExternalInputEstimator, SizeTable};
pub use propagate::{MarkerEstimator, PropagateEstimator};

use stageplan_core::config::PlannerOptions;
use stageplan_graph::OperatorKind;

use crate::characterizer::OperatorCharacterizer;
use crate::error::Result;
use crate::estimator::OperatorEstimator;
use crate::registry::{Matcher, Registry};

/// External inputs from the size table, markers pass through, everything
/// else propagates its input sizes.
pub fn default_estimators(options: &PlannerOptions) -> Result<Registry<dyn OperatorEstimator>> {
    let table = SizeTable::from_options(options)?;
    Ok(Registry::<dyn OperatorEstimator>::new()
        .with(
            Matcher::Kind(OperatorKind::Input),
            Box::new(BasicExternalInputEstimator::new(table)),
        )
        .with(Matcher::Kind(OperatorKind::Marker), Box::new(MarkerEstimator))
        .with(Matcher::Any, Box::new(PropagateEstimator)))
}

pub fn default_characterizers() -> Registry<dyn OperatorCharacterizer<JoinStrategy>> {
    Registry::<dyn OperatorCharacterizer<JoinStrategy>>::new().with(
        Matcher::user(JOIN_DECLARATION),
        Box::new(BroadcastJoinCharacterizer),
    )
}
