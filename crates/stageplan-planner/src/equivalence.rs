//! Correlating copies of one logical operator.
//!
//! Operators are copied whenever they move into a SubPlan or get duplicated
//! by later rewrites, so reference identity says nothing about whether two
//! operators stand for the same source operator. Passes that need to know
//! ask an `OperatorEquivalence` for a key instead.

use serde::{Deserialize, Serialize};

use stageplan_core::hash::Hash256;
use stageplan_core::id::OriginId;
use stageplan_graph::Operator;

use crate::subplan::SubPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquivalenceKey {
    Origin(OriginId),
    /// Key computed by a custom policy, e.g. a structural digest.
    Digest(Hash256),
}

pub trait OperatorEquivalence {
    fn extract(&self, owner: &SubPlan, operator: &Operator) -> EquivalenceKey;
}

/// Operators are equivalent iff they were copied from the same origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameOrigin;

pub const SAME_ORIGIN: SameOrigin = SameOrigin;

impl OperatorEquivalence for SameOrigin {
    fn extract(&self, _owner: &SubPlan, operator: &Operator) -> EquivalenceKey {
        EquivalenceKey::Origin(operator.origin())
    }
}
