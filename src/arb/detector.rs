//! # Cycle Detection
//!
//! Profitable loops are negative cycles once edge weights are negated to
//! `-ln(net rate)`. Bellman-Ford is run from every node: after `|nodes| - 1`
//! rounds any edge that still relaxes leads into a negative cycle, which is
//! recovered by walking predecessor links.

use std::collections::HashSet;

use super::cycle::Cycle;
use super::graph::GraphSnapshot;

/// Shortest-path state of one Bellman-Ford run
struct Relaxation {
    /// Tentative cumulative negated weight per node
    dist: Vec<f64>,
    /// Predecessor of each node on its tentative shortest path
    pred: Vec<Option<usize>>,
}

/// Finds the profitable cycles of `graph`, most profitable first.
///
/// Only cycles returning more than `1 + min_spread` per unit after fees are
/// reported. Each cycle is canonical (rotated to start at its smallest node)
/// and reported once. A graph without edges yields no cycles.
#[must_use]
pub fn find_cycles(graph: &GraphSnapshot, min_spread: f64) -> Vec<Cycle> {
    let node_count = graph.node_count();
    if graph.edges.is_empty() || node_count < 2 {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut cycles = Vec::new();

    for source in 0..node_count {
        let mut relaxation = relax_from(graph, source);

        for edge in &graph.edges {
            let (u, v) = (edge.from_node, edge.to_node);
            if relaxation.dist[u].is_infinite() {
                continue;
            }
            if relaxation.dist[u] - edge.weight >= relaxation.dist[v] {
                continue;
            }

            // v lies on or is reachable from a negative cycle
            relaxation.pred[v] = Some(u);
            let Some(nodes) = reconstruct(&relaxation.pred, v, node_count) else {
                continue;
            };

            let cycle = match Cycle::new(nodes, graph) {
                Ok(cycle) => cycle.canonical(),
                Err(e) => {
                    log::debug!("arb::detector: Discarding reconstructed path: {e}");
                    continue;
                }
            };

            if cycle.is_profitable(min_spread) && seen.insert(cycle.nodes.clone()) {
                cycles.push(cycle);
            }
        }
    }

    cycles.sort_by_key(Cycle::rank_key);

    if !cycles.is_empty() {
        log::debug!(
            "arb::detector: Found {} profitable cycles at {}, best {:?}",
            cycles.len(),
            graph.timestamp,
            cycles[0]
        );
    }
    cycles
}

/// The single most profitable cycle, if any
#[must_use]
pub fn best_cycle(graph: &GraphSnapshot, min_spread: f64) -> Option<Cycle> {
    find_cycles(graph, min_spread).into_iter().next()
}

/// Runs `|nodes| - 1` Bellman-Ford rounds from `source` over negated weights
fn relax_from(graph: &GraphSnapshot, source: usize) -> Relaxation {
    let node_count = graph.node_count();
    let mut dist = vec![f64::INFINITY; node_count];
    let mut pred = vec![None; node_count];
    dist[source] = 0.0;

    for _ in 1..node_count {
        let mut updated = false;
        for edge in &graph.edges {
            let (u, v) = (edge.from_node, edge.to_node);
            if dist[u].is_infinite() {
                continue;
            }
            let candidate = dist[u] - edge.weight;
            if candidate < dist[v] {
                dist[v] = candidate;
                pred[v] = Some(u);
                updated = true;
            }
        }
        if !updated {
            break;
        }
    }

    Relaxation { dist, pred }
}

/// Recovers the cycle behind a node that relaxed in the extra round.
///
/// Walking back `node_count` predecessors guarantees landing inside the cycle;
/// from there predecessors are followed until the walk closes. The result is a
/// closed node path in edge direction.
fn reconstruct(pred: &[Option<usize>], from: usize, node_count: usize) -> Option<Vec<usize>> {
    let mut start = from;
    for _ in 0..node_count {
        start = pred[start]?;
    }

    let mut backwards = vec![start];
    let mut node = pred[start]?;
    while node != start {
        if backwards.len() > node_count {
            return None;
        }
        backwards.push(node);
        node = pred[node]?;
    }

    // backwards is [start, p1, .., pk] with edges pk -> .. -> p1 -> start -> pk
    let mut nodes = Vec::with_capacity(backwards.len() + 1);
    nodes.push(start);
    nodes.extend(backwards[1..].iter().rev());
    nodes.push(start);
    Some(nodes)
}
