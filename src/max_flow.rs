use crate::AllocationError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::hash::Hash;

pub type Capacity = i64;

/// Adjacency representation shared by the capacity graph, the residual
/// graph and the flow network: node -> neighbour -> capacity (or net flow).
pub type CapacityGraph<N> = HashMap<N, HashMap<N, Capacity>>;

/// Computes the maximum flow from `source` to `sink` with the Edmonds-Karp
/// variant of Ford-Fulkerson (BFS augmenting paths, O(V * E^2)).
///
/// Returns the total flow together with the flow network, which records the
/// signed net flow for every directed edge pair: at all times
/// `flow[u][v] == -flow[v][u]` and `residual[u][v] == capacity(u, v) - flow[u][v]`.
///
/// Fails with `InvalidGraph` when `source` has no outgoing edges or `sink`
/// never appears in the graph; silently returning zero flow there would
/// masquerade as an empty allocation.
pub fn max_flow<N>(
    graph: &CapacityGraph<N>,
    source: &N,
    sink: &N,
) -> Result<(Capacity, CapacityGraph<N>), AllocationError>
where
    N: Eq + Hash + Clone + Display,
{
    if !graph.contains_key(source) {
        return Err(AllocationError::InvalidGraph(source.to_string()));
    }
    let sink_present = graph.contains_key(sink)
        || graph.values().any(|neighbours| neighbours.contains_key(sink));
    if !sink_present {
        return Err(AllocationError::InvalidGraph(sink.to_string()));
    }

    // Residual graph: every declared edge plus an implicit reverse edge at
    // capacity 0 unless one is already declared.
    let mut residual: CapacityGraph<N> = graph.clone();
    let mut flow: CapacityGraph<N> = HashMap::new();
    for (u, neighbours) in graph {
        for v in neighbours.keys() {
            residual
                .entry(v.clone())
                .or_default()
                .entry(u.clone())
                .or_insert(0);
            flow.entry(u.clone())
                .or_default()
                .entry(v.clone())
                .or_insert(0);
            flow.entry(v.clone())
                .or_default()
                .entry(u.clone())
                .or_insert(0);
        }
    }

    let mut total_flow = 0;
    while let Some(parents) = augmenting_path(&residual, source, sink) {
        let mut bottleneck = Capacity::MAX;
        let mut v = sink.clone();
        while v != *source {
            let u = parents[&v].clone();
            bottleneck = bottleneck.min(residual[&u][&v]);
            v = u;
        }

        let mut v = sink.clone();
        while v != *source {
            let u = parents[&v].clone();
            adjust(&mut flow, &u, &v, bottleneck);
            adjust(&mut flow, &v, &u, -bottleneck);
            adjust(&mut residual, &u, &v, -bottleneck);
            adjust(&mut residual, &v, &u, bottleneck);
            v = u;
        }
        total_flow += bottleneck;
    }

    Ok((total_flow, flow))
}

/// Breadth-first search over the residual graph. Follows only edges with
/// strictly positive residual capacity, visits each node at most once, and
/// returns the parent map as soon as `sink` is reached, so the reconstructed
/// path is shortest by edge count.
fn augmenting_path<N>(residual: &CapacityGraph<N>, source: &N, sink: &N) -> Option<HashMap<N, N>>
where
    N: Eq + Hash + Clone,
{
    let mut visited = HashSet::new();
    visited.insert(source.clone());
    let mut parents = HashMap::new();
    let mut queue = VecDeque::from([source.clone()]);

    while let Some(u) = queue.pop_front() {
        let Some(neighbours) = residual.get(&u) else {
            continue;
        };
        for (v, capacity) in neighbours {
            if *capacity > 0 && visited.insert(v.clone()) {
                parents.insert(v.clone(), u.clone());
                if v == sink {
                    return Some(parents);
                }
                queue.push_back(v.clone());
            }
        }
    }
    None
}

fn adjust<N>(graph: &mut CapacityGraph<N>, u: &N, v: &N, delta: Capacity)
where
    N: Eq + Hash + Clone,
{
    *graph
        .entry(u.clone())
        .or_default()
        .entry(v.clone())
        .or_insert(0) += delta;
}
