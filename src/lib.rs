#![forbid(unsafe_code)]
//! stageplan: stage partitioning and cost estimation for batch dataflow
//! compilers.
//!
//! The front-end hands over an `OperatorGraph` with plan markers already in
//! place; [`compile`] cuts it into a [`Plan`] of SubPlans and annotates the
//! source operators with size estimates and join strategies. Backends read
//! per-SubPlan results through [`Compilation::estimate_of`].
//!
//! The member crates are re-exported for callers that plug in their own
//! estimators, characterizers, or equivalence policies.

pub mod compile;

pub use stageplan_core as base;
pub use stageplan_cost as cost;
pub use stageplan_graph as graph;
pub use stageplan_planner as planner;
pub use stageplan_stats as stats;

pub use compile::{compile, Compilation};
pub use stageplan_core::{Error, PlannerOptions, Result};
pub use stageplan_cost::{CostError, OperatorEstimate, SizeEstimate, UNKNOWN_SIZE};
pub use stageplan_graph::{Operator, OperatorGraph, OperatorKind, PlanMarker, PlanMarkers};
pub use stageplan_planner::{Plan, SubPlan, SAME_ORIGIN};
