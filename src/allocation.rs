use crate::metrics::{loss_for, EfficiencyMetrics, Weights};
use crate::{AllocationError, RegionId};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Delivered quantities plus the efficiency metrics of one allocation run.
///
/// Deliveries preserve the insertion order of the demand mapping; each
/// delivered amount is non-negative and never exceeds the region's demand,
/// and the total never exceeds the water supply.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationReport<T: RegionId> {
    pub deliveries: IndexMap<T, i64>,
    pub metrics: EfficiencyMetrics,
}

impl<T: RegionId> AllocationReport<T> {
    pub fn delivered(&self, region: &T) -> i64 {
        self.deliveries.get(region).copied().unwrap_or(0)
    }

    pub fn total_delivered(&self) -> i64 {
        self.deliveries.values().sum()
    }

    /// Flattened wire shape: one entry per region plus the reserved keys
    /// `util`, `loss`, `fairness` and `overall`. A region literally named
    /// one of the reserved words would collide; callers must avoid that.
    pub fn to_entries(&self) -> IndexMap<String, f64> {
        let mut entries = IndexMap::with_capacity(self.deliveries.len() + 4);
        for (region, delivered) in &self.deliveries {
            entries.insert(region.to_string(), *delivered as f64);
        }
        entries.insert("util".to_string(), self.metrics.utilization);
        entries.insert("loss".to_string(), self.metrics.loss);
        entries.insert("fairness".to_string(), self.metrics.fairness);
        entries.insert("overall".to_string(), self.metrics.overall);
        entries
    }
}

/// One allocation strategy. All strategies share this contract so a harness
/// can run them side by side without branching on the concrete type.
pub trait AllocationTechnique<T: RegionId> {
    fn name(&self) -> &'static str;

    fn allocate(
        &self,
        water_supply: i64,
        demands: &IndexMap<T, i64>,
        pipeline_losses: &HashMap<T, f64>,
        weights: Weights,
    ) -> Result<AllocationReport<T>, AllocationError>;
}

/// Validates the inputs and resolves the degenerate cases every strategy
/// short-circuits on. Returns `Ok(Some(report))` when the input is one of
/// the three fixed-outcome cases, `Ok(None)` when solving should proceed.
pub(crate) fn prepare<T: RegionId>(
    water_supply: i64,
    demands: &IndexMap<T, i64>,
    pipeline_losses: &HashMap<T, f64>,
) -> Result<Option<AllocationReport<T>>, AllocationError> {
    if water_supply < 0 {
        return Err(AllocationError::NegativeSupply(water_supply));
    }
    for (region, demand) in demands {
        if *demand < 0 {
            return Err(AllocationError::NegativeDemand(region.to_string(), *demand));
        }
        let loss = loss_for(pipeline_losses, region);
        if !(0.0..=1.0).contains(&loss) {
            return Err(AllocationError::LossOutOfRange(region.to_string(), loss));
        }
    }

    let zeroes = || demands.keys().map(|region| (region.clone(), 0)).collect();
    let fixed = |utilization, loss, fairness| {
        Some(AllocationReport {
            deliveries: zeroes(),
            metrics: EfficiencyMetrics {
                utilization,
                loss,
                fairness,
                overall: 0.0,
            },
        })
    };

    if water_supply == 0 {
        return Ok(fixed(0.0, 1.0, 0.0));
    }
    if demands.values().all(|demand| *demand == 0) {
        return Ok(fixed(0.0, 0.0, 1.0));
    }
    if demands
        .keys()
        .all(|region| loss_for(pipeline_losses, region) == 1.0)
    {
        return Ok(fixed(0.0, 1.0, 0.0));
    }

    // Outside the all-full-loss case a region losing everything in transit
    // while demanding water makes the inflated requirement undefined.
    for (region, demand) in demands {
        if *demand > 0 && loss_for(pipeline_losses, region) == 1.0 {
            return Err(AllocationError::FullLossWithDemand(region.to_string()));
        }
    }

    Ok(None)
}

/// Volume that must be pumped toward a region so that `demand` arrives
/// after transit losses.
pub(crate) fn inflated_demand(demand: i64, loss: f64) -> f64 {
    if demand == 0 {
        0.0
    } else {
        demand as f64 / (1.0 - loss)
    }
}

/// The allocation translator: converts per-region sent volumes into
/// delivered quantities. Delivered is `floor(sent * (1 - loss))`, capped at
/// the region's demand and at a running remaining-supply counter processed
/// in demand insertion order, so the total can never exceed the supply even
/// when capacities were truncated to integers.
pub(crate) fn settle<T: RegionId>(
    sent: &IndexMap<T, f64>,
    demands: &IndexMap<T, i64>,
    pipeline_losses: &HashMap<T, f64>,
    water_supply: i64,
) -> IndexMap<T, i64> {
    let mut deliveries = IndexMap::with_capacity(demands.len());
    let mut remaining = water_supply;
    for (region, demand) in demands {
        let volume = sent.get(region).copied().unwrap_or(0.0);
        let loss = loss_for(pipeline_losses, region);
        let delivered = (volume * (1.0 - loss)).floor() as i64;
        let delivered = delivered.min(*demand).min(remaining);
        remaining -= delivered;
        deliveries.insert(region.clone(), delivered);
    }
    deliveries
}
