#![forbid(unsafe_code)]
//! stageplan-stats: analysis of generic "depends-on" graphs.
//!
//! Responsibilities:
//! - A small ordered adjacency-set graph (`Graph<V>`).
//! - Circuit search (strongly connected components).
//! - Deterministic topological ordering.
//! - `GraphStatistics`: vertex/edge counts and critical-path length.
//!
//! **Pure functions only.** Nothing here knows about operators or plans; the
//! planner projects a `Plan` onto a `Graph<SubPlanId>` and asks for stats.

pub mod circuit;
pub mod graph;
pub mod order;
pub mod statistics;

pub use circuit::{find_circuits, strongly_connected_components};
pub use graph::Graph;
pub use order::topological_order;
pub use statistics::GraphStatistics;
