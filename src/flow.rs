use crate::allocation::{inflated_demand, prepare, settle, AllocationReport, AllocationTechnique};
use crate::max_flow::{max_flow, Capacity, CapacityGraph};
use crate::metrics::{evaluate, loss_for, Weights};
use crate::{AllocationError, RegionId};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Source and sink terminals wrapped around the region nodes of the
/// bipartite supply graph.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Node<T: RegionId> {
    Source,
    Region(T),
    Sink,
}

impl<T: RegionId> fmt::Display for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Source => write!(f, "source"),
            Node::Region(region) => write!(f, "{region}"),
            Node::Sink => write!(f, "sink"),
        }
    }
}

/// The core strategy: allocation as single-commodity maximum flow.
///
/// Each region sits between the source and the sink; the source->region
/// edge carries the loss-inflated requirement (capped at the supply) and
/// the region->sink edge carries the raw demand, so the optimal flow sends
/// exactly as much toward each region as can arrive as satisfied demand.
pub struct FlowAllocation;

impl<T: RegionId> AllocationTechnique<T> for FlowAllocation {
    fn name(&self) -> &'static str {
        "flow"
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

        let graph = build_graph(water_supply, demands, pipeline_losses);
        let (_, flow) = max_flow(&graph, &Node::Source, &Node::Sink)?;

        let mut sent = IndexMap::with_capacity(demands.len());
        for region in demands.keys() {
            let raw = flow
                .get(&Node::Source)
                .and_then(|neighbours| neighbours.get(&Node::Region(region.clone())))
                .copied()
                .unwrap_or(0);
            sent.insert(region.clone(), raw as f64);
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

fn build_graph<T: RegionId>(
    water_supply: i64,
    demands: &IndexMap<T, i64>,
    pipeline_losses: &HashMap<T, f64>,
) -> CapacityGraph<Node<T>> {
    let mut graph: CapacityGraph<Node<T>> = HashMap::new();
    for (region, demand) in demands {
        let loss = loss_for(pipeline_losses, region);
        let inflated = inflated_demand(*demand, loss).floor() as Capacity;
        graph
            .entry(Node::Source)
            .or_default()
            .insert(Node::Region(region.clone()), inflated.min(water_supply));
        graph
            .entry(Node::Region(region.clone()))
            .or_default()
            .insert(Node::Sink, *demand);
    }
    graph
}
