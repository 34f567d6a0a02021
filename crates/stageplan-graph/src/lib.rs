#![forbid(unsafe_code)]
//! stageplan-graph: the logical operator graph handed over by the front-end.
//!
//! Design:
//! - One `OperatorGraph` is an arena of `Operator`s keyed by `OperatorId`;
//!   connections are recorded on both port endpoints so removal can prove
//!   that nothing still points at a removed operator.
//! - Operators carry an immutable `OriginId` that survives copying, which is
//!   what later passes use to correlate copies (see `stageplan-planner`).
//! - `marker` holds the `PlanMarker` tags that tell the partitioner where a
//!   stage boundary must occur, plus the insertion utilities.

pub mod graph;
pub mod marker;
pub mod operator;

pub use graph::OperatorGraph;
pub use marker::{PlanMarker, PlanMarkers};
pub use operator::{
    Attributes, DataSize, InputPort, InputRef, Operator, OperatorBuilder, OperatorKind,
    OutputPort, OutputRef, Port, PortRef,
};
