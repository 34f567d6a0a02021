#![forbid(unsafe_code)]
//! stageplan-planner: operator graph with plan markers → `Plan` of SubPlans.
//!
//! Design:
//! - `partition` walks the source graph once and cuts it at every marker;
//!   each maximal marker-bounded region becomes one `SubPlan` owning copies
//!   of its operators.
//! - Each inter-stage marker is represented twice: an output boundary in the
//!   upstream SubPlan and an input boundary in the downstream one, each
//!   pointing at the other as its `opposite`.
//! - Plan-level dependencies are derived from opposite pairs and checked
//!   for cycles with `stageplan-stats`.
//! - Copies keep their origin ids; `equivalence` is how later passes
//!   recognize them as the same logical operator.

pub mod equivalence;
pub mod partition;
pub mod plan;
pub mod subplan;

pub use equivalence::{EquivalenceKey, OperatorEquivalence, SameOrigin, SAME_ORIGIN};
pub use plan::Plan;
pub use subplan::{Boundary, BoundaryRef, BoundaryRole, SubPlan};
