#![forbid(unsafe_code)]
//! stageplan-core: ids, port record types, options, errors, and hashing
//! shared by every stageplan crate.
//!
//! Nothing here knows about graphs; the graph, planner, stats, and cost
//! crates build on these types.

pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod prelude;
pub mod schema;

pub use config::{OptionKey, PlannerOptions};
pub use error::{Error, Result};

/// Crate version string, recorded in plan fingerprints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
