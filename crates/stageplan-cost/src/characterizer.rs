//! Characterization phase: non-numeric tags derived from finished estimates.

use std::collections::BTreeMap;

use stageplan_core::config::PlannerOptions;
use stageplan_core::id::OperatorId;
use stageplan_graph::{InputRef, OperatorGraph, Operator};

use crate::error::Result;
use crate::estimate::{EstimateMap, OperatorEstimate, SizeEstimate, UNKNOWN_SIZE};

/// Derives a characteristic of type `C` for one operator.
///
/// `Ok(None)` means the operator has no such characteristic.
pub trait OperatorCharacterizer<C>: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, ctx: &CharacterizerContext<'_>, operator: &Operator) -> Result<Option<C>>;
}

pub type CharacteristicMap<C> = BTreeMap<OperatorId, C>;

/// Read-only view of a completed estimation pass.
pub struct CharacterizerContext<'a> {
    graph: &'a OperatorGraph,
    options: &'a PlannerOptions,
    estimates: &'a EstimateMap,
}

impl<'a> CharacterizerContext<'a> {
    pub fn new(
        graph: &'a OperatorGraph,
        options: &'a PlannerOptions,
        estimates: &'a EstimateMap,
    ) -> Self {
        Self {
            graph,
            options,
            estimates,
        }
    }

    pub fn graph(&self) -> &'a OperatorGraph {
        self.graph
    }

    pub fn options(&self) -> &'a PlannerOptions {
        self.options
    }

    pub fn estimate(&self, id: OperatorId) -> Option<&'a OperatorEstimate> {
        self.estimates.get(&id)
    }

    /// Estimated size arriving at `port`; unknown if it was never estimated.
    pub fn input_size(&self, port: InputRef) -> SizeEstimate {
        self.estimate(port.operator)
            .map(|e| e.input(port.index))
            .unwrap_or(UNKNOWN_SIZE)
    }
}
