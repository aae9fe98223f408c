use crate::allocation::{inflated_demand, prepare, settle, AllocationReport, AllocationTechnique};
use crate::metrics::{evaluate, loss_for, score, Weights};
use crate::{AllocationError, RegionId};
use indexmap::IndexMap;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Exhaustive grid search over candidate sent volumes. Each region's sent
/// volume ranges over `steps + 1` evenly spaced values between zero and its
/// inflated requirement (capped at the supply); assignments whose total
/// exceeds the supply are pruned. Exponential in the number of regions, so
/// only suitable for small instances.
pub struct BruteForceAllocation {
    pub steps: usize,
}

impl Default for BruteForceAllocation {
    fn default() -> Self {
        BruteForceAllocation { steps: 10 }
    }
}

impl<T: RegionId> AllocationTechnique<T> for BruteForceAllocation {
    fn name(&self) -> &'static str {
        "brute_force"
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

        let steps = self.steps.max(1);
        let caps = sent_caps(water_supply, demands, pipeline_losses);
        let mut best_score = f64::NEG_INFINITY;
        let mut best = vec![0.0; caps.len()];
        let mut current = vec![0.0; caps.len()];
        descend(
            0,
            water_supply as f64,
            steps,
            &caps,
            &mut current,
            &mut best_score,
            &mut best,
            water_supply,
            demands,
            pipeline_losses,
            weights,
        );

        let sent = to_sent(demands, &best);
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

/// Stochastic search: a small genetic algorithm over per-region sent
/// fractions. Tournament selection, uniform crossover, per-gene mutation,
/// single-individual elitism. Deterministic for a fixed seed.
pub struct GeneticAllocation {
    pub population: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub seed: u64,
}

impl Default for GeneticAllocation {
    fn default() -> Self {
        GeneticAllocation {
            population: 60,
            generations: 120,
            mutation_rate: 0.1,
            seed: 0,
        }
    }
}

impl<T: RegionId> AllocationTechnique<T> for GeneticAllocation {
    fn name(&self) -> &'static str {
        "genetic"
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

        let population_size = self.population.max(2);
        let caps = sent_caps(water_supply, demands, pipeline_losses);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let fitness = |genome: &[f64]| {
            let sent = decode(genome, &caps, water_supply, demands);
            let deliveries = settle(&sent, demands, pipeline_losses, water_supply);
            score(
                &deliveries,
                &sent,
                demands,
                pipeline_losses,
                water_supply,
                weights,
            )
        };

        let mut population: Vec<(Vec<f64>, f64)> = (0..population_size)
            .map(|_| {
                let genome: Vec<f64> = (0..caps.len()).map(|_| rng.gen::<f64>()).collect();
                let fit = fitness(&genome);
                (genome, fit)
            })
            .collect();

        for _ in 0..self.generations {
            let elite = population
                .iter()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(genome, fit)| (genome.clone(), *fit))
                .unwrap_or((vec![0.0; caps.len()], f64::NEG_INFINITY));

            let mut next = Vec::with_capacity(population_size);
            next.push(elite);
            while next.len() < population_size {
                let mother = tournament(&population, &mut rng);
                let father = tournament(&population, &mut rng);
                let mut child: Vec<f64> = mother
                    .iter()
                    .zip(father)
                    .map(|(m, f)| if rng.gen_bool(0.5) { *m } else { *f })
                    .collect();
                for gene in &mut child {
                    if rng.gen::<f64>() < self.mutation_rate {
                        *gene = rng.gen::<f64>();
                    }
                }
                let fit = fitness(&child);
                next.push((child, fit));
            }
            population = next;
        }

        let best = population
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(genome, _)| genome.clone())
            .unwrap_or(vec![0.0; caps.len()]);

        let sent = decode(&best, &caps, water_supply, demands);
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

/// Depth-first enumeration of the sent-volume grid, pruning prefixes that
/// already exceed the pump budget.
#[allow(clippy::too_many_arguments)]
fn descend<T: RegionId>(
    index: usize,
    budget: f64,
    steps: usize,
    caps: &[f64],
    current: &mut Vec<f64>,
    best_score: &mut f64,
    best: &mut Vec<f64>,
    water_supply: i64,
    demands: &IndexMap<T, i64>,
    pipeline_losses: &HashMap<T, f64>,
    weights: Weights,
) {
    if index == caps.len() {
        let sent = to_sent(demands, current);
        let deliveries = settle(&sent, demands, pipeline_losses, water_supply);
        let candidate = score(
            &deliveries,
            &sent,
            demands,
            pipeline_losses,
            water_supply,
            weights,
        );
        if candidate > *best_score {
            *best_score = candidate;
            best.clone_from(current);
        }
        return;
    }
    for step in 0..=steps {
        let volume = caps[index] * step as f64 / steps as f64;
        if volume > budget {
            break;
        }
        current[index] = volume;
        descend(
            index + 1,
            budget - volume,
            steps,
            caps,
            current,
            best_score,
            best,
            water_supply,
            demands,
            pipeline_losses,
            weights,
        );
    }
}

/// Upper bound on the volume worth sending toward each region, in demand
/// insertion order.
fn sent_caps<T: RegionId>(
    water_supply: i64,
    demands: &IndexMap<T, i64>,
    pipeline_losses: &HashMap<T, f64>,
) -> Vec<f64> {
    demands
        .iter()
        .map(|(region, demand)| {
            inflated_demand(*demand, loss_for(pipeline_losses, region)).min(water_supply as f64)
        })
        .collect()
}

fn to_sent<T: RegionId>(demands: &IndexMap<T, i64>, volumes: &[f64]) -> IndexMap<T, f64> {
    demands
        .keys()
        .cloned()
        .zip(volumes.iter().copied())
        .collect()
}

/// Maps fractional genes onto sent volumes, rescaling when the total would
/// overshoot the pump budget.
fn decode<T: RegionId>(
    genome: &[f64],
    caps: &[f64],
    water_supply: i64,
    demands: &IndexMap<T, i64>,
) -> IndexMap<T, f64> {
    let mut volumes: Vec<f64> = genome
        .iter()
        .zip(caps)
        .map(|(gene, cap)| gene * cap)
        .collect();
    let total: f64 = volumes.iter().sum();
    let supply = water_supply as f64;
    if total > supply && total > 0.0 {
        let factor = supply / total;
        for volume in &mut volumes {
            *volume *= factor;
        }
    }
    to_sent(demands, &volumes)
}

fn tournament<'p, R: Rng>(population: &'p [(Vec<f64>, f64)], rng: &mut R) -> &'p [f64] {
    let first = &population[rng.gen_range(0..population.len())];
    let second = &population[rng.gen_range(0..population.len())];
    if first.1 >= second.1 {
        &first.0
    } else {
        &second.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::ProportionalAllocation;
    use indexmap::indexmap;

    fn losses(entries: &[(&'static str, f64)]) -> HashMap<&'static str, f64> {
        entries.iter().copied().collect()
    }

    #[test]
    fn brute_force_respects_bounds() {
        let demands = indexmap! {"a" => 80, "b" => 40};
        let report = BruteForceAllocation::default()
            .allocate(100, &demands, &losses(&[("b", 0.5)]), Weights::default())
            .unwrap();
        assert!(report.total_delivered() <= 100);
        assert!(report.delivered(&"a") <= 80);
        assert!(report.delivered(&"b") <= 40);
    }

    #[test]
    fn brute_force_saturates_an_easy_instance() {
        // lossless, supply covers both demands, so the grid contains the
        // exact optimum
        let demands = indexmap! {"a" => 50, "b" => 50};
        let report = BruteForceAllocation::default()
            .allocate(100, &demands, &HashMap::new(), Weights::new(0.4, 0.4, 0.2))
            .unwrap();
        assert_eq!(report.deliveries, indexmap! {"a" => 50, "b" => 50});
        assert_eq!(report.metrics.utilization, 1.0);
        assert_eq!(report.metrics.fairness, 1.0);
    }

    #[test]
    fn brute_force_is_at_least_as_good_as_proportional() {
        let demands = indexmap! {"a" => 80, "b" => 40};
        let pipeline_losses = losses(&[("a", 0.2), ("b", 0.5)]);
        let weights = Weights::new(0.4, 0.4, 0.2);

        let brute = BruteForceAllocation { steps: 20 }
            .allocate(100, &demands, &pipeline_losses, weights)
            .unwrap();
        let proportional = ProportionalAllocation
            .allocate(100, &demands, &pipeline_losses, weights)
            .unwrap();
        // both scores are rounded to two decimals, so allow that much slack
        assert!(brute.metrics.overall >= proportional.metrics.overall - 0.01);
    }

    #[test]
    fn genetic_is_deterministic_for_a_fixed_seed() {
        let demands = indexmap! {"a" => 300, "b" => 700, "c" => 100};
        let pipeline_losses = losses(&[("a", 0.2), ("b", 0.4), ("c", 0.05)]);
        let technique = GeneticAllocation::default();

        let first = technique
            .allocate(600, &demands, &pipeline_losses, Weights::default())
            .unwrap();
        let second = technique
            .allocate(600, &demands, &pipeline_losses, Weights::default())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn genetic_respects_bounds() {
        let demands = indexmap! {"a" => 300, "b" => 700, "c" => 100};
        let pipeline_losses = losses(&[("a", 0.2), ("b", 0.4), ("c", 0.05)]);
        for water_supply in [1, 50, 600, 2000] {
            let report = GeneticAllocation::default()
                .allocate(water_supply, &demands, &pipeline_losses, Weights::default())
                .unwrap();
            assert!(report.total_delivered() <= water_supply);
            for (region, demand) in &demands {
                assert!(report.delivered(region) >= 0);
                assert!(report.delivered(region) <= *demand);
            }
        }
    }

    #[test]
    fn search_strategies_short_circuit_degenerate_inputs() {
        let demands = indexmap! {"a" => 0, "b" => 0};
        for technique in [
            &BruteForceAllocation::default() as &dyn AllocationTechnique<&str>,
            &GeneticAllocation::default(),
        ] {
            let report = technique
                .allocate(900, &demands, &HashMap::new(), Weights::default())
                .unwrap();
            assert_eq!(report.total_delivered(), 0);
            assert_eq!(report.metrics.fairness, 1.0);
        }
    }
}
