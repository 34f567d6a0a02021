//! Convenient re-exports for downstream crates.

pub use crate::config::{OptionKey, PlannerOptions};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::id::{OperatorId, OriginId, SubPlanId};
pub use crate::schema::{DataType, Field, Schema};
