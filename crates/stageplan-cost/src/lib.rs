#![forbid(unsafe_code)]
//! stageplan-cost: per-operator size estimates and characteristics.
//!
//! Two phases, always in this order:
//! 1. **Estimation.** An `EstimatorContext` dispatches each operator to the
//!    first matching `OperatorEstimator` in a `Registry`, memoizing results
//!    for the lifetime of the pass. Estimators pull upstream sizes through
//!    the context, so one request may recursively estimate a whole subgraph.
//! 2. **Characterization.** `OperatorCharacterizer`s derive non-numeric tags
//!    (e.g. a join strategy) from the finished `EstimateMap`.
//!
//! Missing information is a value (`UNKNOWN_SIZE`, `None`), never an error.
//! Errors raised by a handler abort the whole pass.

pub mod builtin;
pub mod characterizer;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod estimator;
pub mod registry;

pub use characterizer::{CharacteristicMap, CharacterizerContext, OperatorCharacterizer};
pub use engine::CostEngine;
pub use error::{CostError, Result};
pub use estimate::{EstimateMap, OperatorEstimate, SizeEstimate, UNKNOWN_SIZE};
pub use estimator::{EstimatorContext, OperatorEstimator};
pub use registry::{Matcher, Registry};
