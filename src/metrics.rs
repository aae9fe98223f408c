use crate::RegionId;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Weights of the three efficiency components in the overall score.
///
/// Calling convention only: the evaluator computes the weighted sum as
/// given and does not require the weights to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub utilization: f64,
    pub loss: f64,
    pub fairness: f64,
}

impl Weights {
    pub fn new(utilization: f64, loss: f64, fairness: f64) -> Self {
        Weights {
            utilization,
            loss,
            fairness,
        }
    }
}

impl From<[f64; 3]> for Weights {
    fn from([utilization, loss, fairness]: [f64; 3]) -> Self {
        Weights::new(utilization, loss, fairness)
    }
}

impl Default for Weights {
    fn default() -> Self {
        Weights::new(0.35, 0.35, 0.30)
    }
}

/// The composite efficiency bundle of one allocation, each value rounded
/// to two decimal places.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficiencyMetrics {
    pub utilization: f64,
    pub loss: f64,
    pub fairness: f64,
    pub overall: f64,
}

/// Evaluates an allocation:
/// - utilization: delivered fraction of the supply, clamped to 1;
/// - loss: 1 minus the fraction of the supply lost in transit, where the
///   lost volume is `sent * loss_fraction` per region;
/// - fairness: mean delivered/demand ratio over regions with positive
///   demand (zero-demand regions are excluded from the denominator);
/// - overall: weighted sum of the three.
pub fn evaluate<T: RegionId>(
    deliveries: &IndexMap<T, i64>,
    sent: &IndexMap<T, f64>,
    demands: &IndexMap<T, i64>,
    pipeline_losses: &HashMap<T, f64>,
    water_supply: i64,
    weights: Weights,
) -> EfficiencyMetrics {
    let (utilization, loss, fairness) =
        components(deliveries, sent, demands, pipeline_losses, water_supply);
    let overall =
        weights.utilization * utilization + weights.loss * loss + weights.fairness * fairness;
    EfficiencyMetrics {
        utilization: round2(utilization),
        loss: round2(loss),
        fairness: round2(fairness),
        overall: round2(overall),
    }
}

/// Unrounded overall score, used as the fitness function by the search
/// strategies where two-decimal rounding would be too coarse.
pub(crate) fn score<T: RegionId>(
    deliveries: &IndexMap<T, i64>,
    sent: &IndexMap<T, f64>,
    demands: &IndexMap<T, i64>,
    pipeline_losses: &HashMap<T, f64>,
    water_supply: i64,
    weights: Weights,
) -> f64 {
    let (utilization, loss, fairness) =
        components(deliveries, sent, demands, pipeline_losses, water_supply);
    weights.utilization * utilization + weights.loss * loss + weights.fairness * fairness
}

fn components<T: RegionId>(
    deliveries: &IndexMap<T, i64>,
    sent: &IndexMap<T, f64>,
    demands: &IndexMap<T, i64>,
    pipeline_losses: &HashMap<T, f64>,
    water_supply: i64,
) -> (f64, f64, f64) {
    let total_delivered: i64 = deliveries.values().sum();
    let total_lost: f64 = sent
        .iter()
        .map(|(region, volume)| volume * loss_for(pipeline_losses, region))
        .sum();

    let utilization = (total_delivered as f64 / water_supply as f64).min(1.0);
    let loss = 1.0 - total_lost / water_supply as f64;

    let mut ratio_sum = 0.0;
    let mut counted = 0;
    for (region, demand) in demands {
        if *demand > 0 {
            let delivered = deliveries.get(region).copied().unwrap_or(0);
            ratio_sum += delivered as f64 / *demand as f64;
            counted += 1;
        }
    }
    let fairness = if counted == 0 {
        1.0
    } else {
        ratio_sum / counted as f64
    };

    (utilization, loss, fairness)
}

pub(crate) fn loss_for<T: RegionId>(pipeline_losses: &HashMap<T, f64>, region: &T) -> f64 {
    pipeline_losses.get(region).copied().unwrap_or(0.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
