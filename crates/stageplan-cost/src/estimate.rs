//! Size estimates and per-operator estimate records.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use stageplan_core::id::OperatorId;
use stageplan_graph::Operator;

/// Estimated data size in bytes.
///
/// `Unknown` means "no information" and is distinct from `Known(0.0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SizeEstimate {
    Known(f64),
    #[default]
    Unknown,
}

pub const UNKNOWN_SIZE: SizeEstimate = SizeEstimate::Unknown;

impl SizeEstimate {
    pub fn known(self) -> Option<f64> {
        match self {
            SizeEstimate::Known(v) => Some(v),
            SizeEstimate::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, SizeEstimate::Unknown)
    }
}

/// Unknown on either side makes the sum unknown.
impl Add for SizeEstimate {
    type Output = SizeEstimate;

    fn add(self, rhs: SizeEstimate) -> SizeEstimate {
        match (self, rhs) {
            (SizeEstimate::Known(a), SizeEstimate::Known(b)) => SizeEstimate::Known(a + b),
            _ => SizeEstimate::Unknown,
        }
    }
}

impl Sum for SizeEstimate {
    fn sum<I: Iterator<Item = SizeEstimate>>(iter: I) -> SizeEstimate {
        iter.fold(SizeEstimate::Known(0.0), Add::add)
    }
}

impl fmt::Display for SizeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeEstimate::Known(v) => write!(f, "{v}"),
            SizeEstimate::Unknown => f.write_str("unknown"),
        }
    }
}

/// One estimate per input and output port of an operator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatorEstimate {
    pub inputs: Vec<SizeEstimate>,
    pub outputs: Vec<SizeEstimate>,
}

impl OperatorEstimate {
    /// All ports unknown.
    pub fn unknown(operator: &Operator) -> Self {
        Self {
            inputs: vec![UNKNOWN_SIZE; operator.inputs().len()],
            outputs: vec![UNKNOWN_SIZE; operator.outputs().len()],
        }
    }

    pub fn input(&self, index: usize) -> SizeEstimate {
        self.inputs.get(index).copied().unwrap_or(UNKNOWN_SIZE)
    }

    pub fn output(&self, index: usize) -> SizeEstimate {
        self.outputs.get(index).copied().unwrap_or(UNKNOWN_SIZE)
    }

    /// Whether the port counts match `operator`.
    pub fn fits(&self, operator: &Operator) -> bool {
        self.inputs.len() == operator.inputs().len()
            && self.outputs.len() == operator.outputs().len()
    }
}

pub type EstimateMap = BTreeMap<OperatorId, OperatorEstimate>;
