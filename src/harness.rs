use crate::allocation::{AllocationReport, AllocationTechnique};
use crate::flow::FlowAllocation;
use crate::heuristics::{DynamicAllocation, ProportionalAllocation};
use crate::metrics::Weights;
use crate::search::{BruteForceAllocation, GeneticAllocation};
use crate::{AllocationError, RegionId};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Which strategies a comparison run exercises and with which weights.
/// Explicit configuration instead of module-level globals, so callers can
/// benchmark any subset.
pub struct HarnessConfig<T: RegionId> {
    pub weights: Weights,
    pub techniques: Vec<Box<dyn AllocationTechnique<T>>>,
}

impl<T: RegionId> Default for HarnessConfig<T> {
    fn default() -> Self {
        HarnessConfig {
            weights: Weights::default(),
            techniques: vec![
                Box::new(FlowAllocation),
                Box::new(BruteForceAllocation::default()),
                Box::new(ProportionalAllocation),
                Box::new(DynamicAllocation),
                Box::new(GeneticAllocation::default()),
            ],
        }
    }
}

/// Outcome of one strategy on one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TechniqueResult<T: RegionId> {
    pub technique: &'static str,
    pub report: AllocationReport<T>,
}

/// Runs every configured strategy on the same instance. The first failing
/// strategy aborts the run; validation errors apply to all of them anyway.
pub fn run_techniques<T: RegionId>(
    config: &HarnessConfig<T>,
    water_supply: i64,
    demands: &IndexMap<T, i64>,
    pipeline_losses: &HashMap<T, f64>,
) -> Result<Vec<TechniqueResult<T>>, AllocationError> {
    config
        .techniques
        .iter()
        .map(|technique| {
            let report =
                technique.allocate(water_supply, demands, pipeline_losses, config.weights)?;
            Ok(TechniqueResult {
                technique: technique.name(),
                report,
            })
        })
        .collect()
}

/// The result with the highest overall efficiency, ties going to the
/// earlier technique in the configuration.
pub fn best_overall<'r, T: RegionId>(
    results: &'r [TechniqueResult<T>],
) -> Option<&'r TechniqueResult<T>> {
    results.iter().reduce(|best, candidate| {
        if candidate.report.metrics.overall > best.report.metrics.overall {
            candidate
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[test]
    fn runs_every_configured_technique() {
        let demands = indexmap! {"R1" => 400, "R2" => 300, "R3" => 500};
        let pipeline_losses =
            HashMap::from([("R1", 0.05), ("R2", 0.03), ("R3", 0.07)]);
        let config = HarnessConfig::default();

        let results = run_techniques(&config, 1000, &demands, &pipeline_losses).unwrap();
        assert_eq!(results.len(), 5);
        let names: Vec<&str> = results.iter().map(|r| r.technique).collect();
        assert_eq!(
            names,
            ["flow", "brute_force", "proportional", "dynamic", "genetic"]
        );
        for result in &results {
            assert!(result.report.total_delivered() <= 1000);
            for (region, demand) in &demands {
                assert!(result.report.delivered(region) <= *demand);
            }
            let metrics = result.report.metrics;
            for value in [metrics.utilization, metrics.loss, metrics.fairness, metrics.overall] {
                assert!((0.0..=1.0).contains(&value), "{}: {value}", result.technique);
            }
        }
    }

    #[test]
    fn a_subset_configuration_is_honoured() {
        let demands = indexmap! {"R1" => 10};
        let config = HarnessConfig {
            weights: Weights::new(0.4, 0.4, 0.2),
            techniques: vec![Box::new(FlowAllocation), Box::new(ProportionalAllocation)],
        };
        let results = run_techniques(&config, 100, &demands, &HashMap::new()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].technique, "flow");
    }

    #[test]
    fn validation_errors_abort_the_run() {
        let demands = indexmap! {"R1" => -3};
        let config: HarnessConfig<&str> = HarnessConfig::default();
        assert_eq!(
            run_techniques(&config, 100, &demands, &HashMap::new()),
            Err(AllocationError::NegativeDemand("R1".to_string(), -3))
        );
    }

    #[test]
    fn best_overall_prefers_the_higher_score() {
        let demands = indexmap! {"R1" => 400, "R2" => 300};
        let config = HarnessConfig::default();
        let results = run_techniques(&config, 500, &demands, &HashMap::new()).unwrap();
        let best = best_overall(&results).unwrap();
        for result in &results {
            assert!(best.report.metrics.overall >= result.report.metrics.overall);
        }
        assert!(best_overall::<&str>(&[]).is_none());
    }
}
