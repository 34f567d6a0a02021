use stageplan_core::error::Error;
use stageplan_core::id::OperatorId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CostError {
    #[error("estimator '{name}' failed: {reason}")]
    Estimator { name: String, reason: String },

    #[error("characterizer '{name}' failed: {reason}")]
    Characterizer { name: String, reason: String },

    #[error("estimate of {0} depends on itself")]
    Cycle(OperatorId),

    #[error(transparent)]
    Core(#[from] Error),
}

pub type Result<T> = std::result::Result<T, CostError>;
