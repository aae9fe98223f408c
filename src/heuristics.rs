use crate::allocation::{inflated_demand, prepare, settle, AllocationReport, AllocationTechnique};
use crate::metrics::{evaluate, loss_for, Weights};
use crate::{AllocationError, RegionId};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Splits the supply in proportion to each region's loss-inflated demand.
/// When the supply covers every inflated demand, each region receives its
/// full requirement; under scarcity every region is scaled down by the same
/// factor.
pub struct ProportionalAllocation;

impl<T: RegionId> AllocationTechnique<T> for ProportionalAllocation {
    fn name(&self) -> &'static str {
        "proportional"
    }

    fn allocate(
        &self,
        water_supply: i64,
        demands: &IndexMap<T, i64>,
        pipeline_losses: &HashMap<T, f64>,
        weights: Weights,
    ) -> Result<AllocationReport<T>, AllocationError> {
        if let Some(report) = prepare(water_supply, demands, pipeline_losses)? {
            return Ok(report);
        }

        let mut inflated = IndexMap::with_capacity(demands.len());
        for (region, demand) in demands {
            let loss = loss_for(pipeline_losses, region);
            inflated.insert(region.clone(), inflated_demand(*demand, loss));
        }
        let total_inflated: f64 = inflated.values().sum();

        let supply = water_supply as f64;
        let factor = if supply >= total_inflated {
            1.0
        } else {
            supply / total_inflated
        };
        let sent: IndexMap<T, f64> = inflated
            .into_iter()
            .map(|(region, volume)| (region, volume * factor))
            .collect();

        let deliveries = settle(&sent, demands, pipeline_losses, water_supply);
        let metrics = evaluate(
            &deliveries,
            &sent,
            demands,
            pipeline_losses,
            water_supply,
            weights,
        );
        Ok(AllocationReport {
            deliveries,
            metrics,
        })
    }
}

/// Greedy heuristic: serves regions in ascending pipeline-loss order,
/// giving each its full inflated requirement until the pump budget runs
/// out. Favours cheap pipelines over even coverage.
pub struct DynamicAllocation;

impl<T: RegionId> AllocationTechnique<T> for DynamicAllocation {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn allocate(
        &self,
        water_supply: i64,
        demands: &IndexMap<T, i64>,
        pipeline_losses: &HashMap<T, f64>,
        weights: Weights,
    ) -> Result<AllocationReport<T>, AllocationError> {
        if let Some(report) = prepare(water_supply, demands, pipeline_losses)? {
            return Ok(report);
        }

        // stable sort keeps insertion order between equal losses
        let mut order: Vec<&T> = demands.keys().collect();
        order.sort_by(|a, b| {
            loss_for(pipeline_losses, *a).total_cmp(&loss_for(pipeline_losses, *b))
        });

        let mut budget = water_supply as f64;
        let mut sent = IndexMap::with_capacity(demands.len());
        for region in order {
            let demand = demands.get(region).copied().unwrap_or(0);
            let loss = loss_for(pipeline_losses, region);
            let volume = inflated_demand(demand, loss).min(budget);
            budget -= volume;
            sent.insert(region.clone(), volume);
        }

        let deliveries = settle(&sent, demands, pipeline_losses, water_supply);
        let metrics = evaluate(
            &deliveries,
            &sent,
            demands,
            pipeline_losses,
            water_supply,
            weights,
        );
        Ok(AllocationReport {
            deliveries,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    fn losses(entries: &[(&'static str, f64)]) -> HashMap<&'static str, f64> {
        entries.iter().copied().collect()
    }

    #[test]
    fn proportional_surplus_meets_every_demand() {
        let demands = indexmap! {"a" => 80, "b" => 40};
        let report = ProportionalAllocation
            .allocate(1000, &demands, &losses(&[("b", 0.5)]), Weights::default())
            .unwrap();
        assert_eq!(report.deliveries, indexmap! {"a" => 80, "b" => 40});
    }

    #[test]
    fn proportional_scarcity_scales_evenly() {
        // inflated requirements are 80 and 80, so a supply of 100 sends
        // 50 toward each region
        let demands = indexmap! {"a" => 80, "b" => 40};
        let report = ProportionalAllocation
            .allocate(100, &demands, &losses(&[("b", 0.5)]), Weights::default())
            .unwrap();
        assert_eq!(report.deliveries, indexmap! {"a" => 50, "b" => 25});
    }

    #[test]
    fn proportional_never_over_allocates() {
        let demands = indexmap! {"a" => 300, "b" => 700, "c" => 100};
        let pipeline_losses = losses(&[("a", 0.2), ("b", 0.4), ("c", 0.05)]);
        for water_supply in [1, 10, 500, 1200, 5000] {
            let report = ProportionalAllocation
                .allocate(water_supply, &demands, &pipeline_losses, Weights::default())
                .unwrap();
            assert!(report.total_delivered() <= water_supply);
            for (region, demand) in &demands {
                assert!(report.delivered(region) <= *demand);
            }
        }
    }

    #[test]
    fn dynamic_serves_cheapest_pipeline_first() {
        // b has the cheaper pipeline and is served fully even though a is
        // declared first
        let demands = indexmap! {"a" => 80, "b" => 40};
        let report = DynamicAllocation
            .allocate(60, &demands, &losses(&[("a", 0.5), ("b", 0.0)]), Weights::default())
            .unwrap();
        assert_eq!(report.delivered(&"b"), 40);
        assert_eq!(report.delivered(&"a"), 10);
    }

    #[test]
    fn dynamic_breaks_loss_ties_by_insertion_order() {
        let demands = indexmap! {"a" => 80, "b" => 80};
        let report = DynamicAllocation
            .allocate(100, &demands, &HashMap::new(), Weights::default())
            .unwrap();
        assert_eq!(report.deliveries, indexmap! {"a" => 80, "b" => 20});
    }

    #[test]
    fn dynamic_respects_supply_and_demand_bounds() {
        let demands = indexmap! {"a" => 300, "b" => 700, "c" => 100};
        let pipeline_losses = losses(&[("a", 0.2), ("b", 0.4), ("c", 0.05)]);
        for water_supply in [1, 10, 500, 1200, 5000] {
            let report = DynamicAllocation
                .allocate(water_supply, &demands, &pipeline_losses, Weights::default())
                .unwrap();
            assert!(report.total_delivered() <= water_supply);
            for (region, demand) in &demands {
                assert!(report.delivered(region) <= *demand);
            }
        }
    }

    #[test]
    fn both_short_circuit_on_zero_supply() {
        let demands = indexmap! {"a" => 80};
        for technique in [
            &ProportionalAllocation as &dyn AllocationTechnique<&str>,
            &DynamicAllocation,
        ] {
            let report = technique
                .allocate(0, &demands, &HashMap::new(), Weights::default())
                .unwrap();
            assert_eq!(report.total_delivered(), 0);
            assert_eq!(report.metrics.loss, 1.0);
        }
    }
}
