use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stageplan_core::config::{PlannerOptions, SIZE_LARGE, SIZE_SMALL, SIZE_TINY};
use stageplan_core::error::Error;
use stageplan_graph::{DataSize, Operator};

use crate::error::Result;
use crate::estimate::{OperatorEstimate, SizeEstimate, UNKNOWN_SIZE};
use crate::estimator::{EstimatorContext, OperatorEstimator};

/// Numeric sizes for the declared size classes of external inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeTable {
    sizes: BTreeMap<DataSize, f64>,
}

impl SizeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `class` to `size`; NaN and negative sizes are rejected.
    pub fn with(mut self, class: DataSize, size: f64) -> Result<Self> {
        let size = checked_size(&format!("{class:?}"), size)?;
        self.sizes.insert(class, size);
        Ok(self)
    }

    /// Read `estimate.size.{tiny,small,large}`; absent keys stay unmapped.
    pub fn from_options(options: &PlannerOptions) -> Result<Self> {
        let mut table = Self::new();
        for (class, key) in [
            (DataSize::Tiny, SIZE_TINY),
            (DataSize::Small, SIZE_SMALL),
            (DataSize::Large, SIZE_LARGE),
        ] {
            if let Some(size) = options.get_opt_f64(&key)? {
                table.sizes.insert(class, checked_size(key.name, size)?);
            }
        }
        Ok(table)
    }

    pub fn get(&self, class: DataSize) -> SizeEstimate {
        self.sizes
            .get(&class)
            .map(|v| SizeEstimate::Known(*v))
            .unwrap_or(UNKNOWN_SIZE)
    }
}

fn checked_size(name: &str, size: f64) -> Result<f64> {
    if size.is_nan() || size < 0.0 {
        return Err(Error::Config(format!("'{name}' must be a non-negative size, got {size}")).into());
    }
    Ok(size)
}

/// Sizes external inputs by their declared `DataSize` class.
#[derive(Debug, Clone, Default)]
pub struct BasicExternalInputEstimator {
    table: SizeTable,
}

impl BasicExternalInputEstimator {
    pub fn new(table: SizeTable) -> Self {
        Self { table }
    }
}

impl OperatorEstimator for BasicExternalInputEstimator {
    fn name(&self) -> &str {
        "basic-external-input"
    }

    fn perform(&self, _ctx: &mut EstimatorContext<'_>, operator: &Operator) -> Result<OperatorEstimate> {
        let class = operator.attributes().data_size.unwrap_or(DataSize::Unknown);
        let size = self.table.get(class);
        Ok(OperatorEstimate {
            inputs: vec![UNKNOWN_SIZE; operator.inputs().len()],
            outputs: vec![size; operator.outputs().len()],
        })
    }
}
