use thiserror::Error;

use crate::id::OperatorId;

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid connection {upstream} -> {downstream}: type `{output_type}` does not match `{input_type}`")]
    InvalidConnection {
        upstream: String,
        downstream: String,
        output_type: String,
        input_type: String,
    },

    #[error("unknown operator: {0}")]
    UnknownOperator(OperatorId),

    #[error("unknown port {port} on {operator}")]
    UnknownPort { operator: OperatorId, port: String },

    #[error("{operator} still has {connections} live connection(s); disconnect it first")]
    LiveConnections {
        operator: OperatorId,
        connections: usize,
    },

    #[error("{operator} cannot be spliced out: {reason}")]
    NotSpliceable { operator: OperatorId, reason: String },

    #[error("{upstream} is not directly connected to {downstream}")]
    NotConnected { upstream: String, downstream: String },

    #[error("incomplete plan at {operator}: {reason}")]
    IncompletePlan { operator: OperatorId, reason: String },

    #[error("dangling boundary at marker {operator}: {reason}")]
    DanglingBoundary { operator: OperatorId, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Hashing error: {0}")]
    Hash(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    /// True for defects of an earlier compiler pass rather than of the
    /// user's dataflow. These are never worth reporting as user diagnostics.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Invariant(_) | Error::Hash(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Config(e.to_string())
    }
}
