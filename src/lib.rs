//! Allocation of a finite water supply across competing regions with lossy
//! delivery pipelines. The core solver models the problem as a maximum-flow
//! computation on a bipartite graph; alternative strategies (proportional,
//! greedy, brute-force, genetic) implement the same contract so their
//! efficiency scores can be compared.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use thiserror::Error;

pub mod allocation;
pub mod flow;
pub mod harness;
pub mod heuristics;
pub mod max_flow;
pub mod metrics;
pub mod search;

pub use allocation::{AllocationReport, AllocationTechnique};
pub use flow::FlowAllocation;
pub use harness::{best_overall, run_techniques, HarnessConfig, TechniqueResult};
pub use heuristics::{DynamicAllocation, ProportionalAllocation};
pub use max_flow::{max_flow, Capacity, CapacityGraph};
pub use metrics::{EfficiencyMetrics, Weights};
pub use search::{BruteForceAllocation, GeneticAllocation};

pub trait RegionId: Eq + Hash + Debug + Clone + Display {}
impl<T> RegionId for T where T: Eq + Hash + Debug + Clone + Display {}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error("water supply must be non-negative (found {0})")]
    NegativeSupply(i64),
    #[error("demand for region {0} must be non-negative (found {1})")]
    NegativeDemand(String, i64),
    #[error("pipeline loss for region {0} must lie in [0, 1] (found {1})")]
    LossOutOfRange(String, f64),
    #[error("region {0} has full pipeline loss but positive demand")]
    FullLossWithDemand(String),
    #[error("node {0} is missing from the flow graph")]
    InvalidGraph(String),
}
