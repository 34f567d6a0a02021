//! Join strategy selection from estimated input sizes.

use serde::{Deserialize, Serialize};

use stageplan_core::config::BROADCAST_LIMIT;
use stageplan_graph::Operator;
use tracing::trace;

use crate::characterizer::{CharacterizerContext, OperatorCharacterizer};
use crate::error::{CostError, Result};

/// Declaration of `User` operators treated as equi-joins.
pub const JOIN_DECLARATION: &str = "join";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinStrategy {
    /// Replicate the input on `port` to every task of the join's stage.
    Broadcast { port: usize },
    /// Repartition every input by key.
    Shuffle,
}

/// Broadcasts the smallest input whose size is known and within
/// `broadcast.limit`; shuffles otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastJoinCharacterizer;

impl OperatorCharacterizer<JoinStrategy> for BroadcastJoinCharacterizer {
    fn name(&self) -> &str {
        "broadcast-join"
    }

    fn extract(&self, ctx: &CharacterizerContext<'_>, operator: &Operator) -> Result<Option<JoinStrategy>> {
        if operator.inputs().len() < 2 {
            return Ok(None);
        }
        let limit = ctx.options().get_f64(&BROADCAST_LIMIT)?;
        if limit.is_nan() || limit < 0.0 {
            return Err(CostError::Characterizer {
                name: self.name().to_string(),
                reason: format!("{} must be non-negative, got {limit}", BROADCAST_LIMIT.name),
            });
        }

        let mut best: Option<(usize, f64)> = None;
        for i in 0..operator.inputs().len() {
            let Some(size) = ctx.input_size(operator.input_ref(i)).known() else {
                continue;
            };
            if size <= limit && best.map_or(true, |(_, b)| size < b) {
                best = Some((i, size));
            }
        }
        let strategy = match best {
            Some((port, _)) => JoinStrategy::Broadcast { port },
            None => JoinStrategy::Shuffle,
        };
        trace!(operator = %operator, ?strategy, limit, "chose join strategy");
        Ok(Some(strategy))
    }
}
