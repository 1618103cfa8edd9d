/// Cycle is a closed node path `[n0, n1, .., nk = n0]` through a graph snapshot.
/// It is primarily used to rank opportunities by log-profit and to walk the legs on execution.
use std::{
    cmp::Reverse,
    collections::HashSet,
    fmt::{self, Debug},
};

use eyre::{bail, Result};
use serde::Serialize;

use super::asset::Asset;
use super::graph::{nodes_to_assets, Edge, GraphSnapshot};

/// Tolerance on log-profit comparisons
pub const LOG_EPSILON: f64 = 1e-9;

/// Scale used to quantize log-profit for deterministic ordering
const LOG_SCALE: f64 = 1e9;

/// A closed loop of conversions
#[derive(Clone, PartialEq, Serialize)]
pub struct Cycle {
    /// Node path, first and last node are the same
    pub nodes: Vec<usize>,

    /// Sum of edge weights, i.e. `ln` of the product of net rates
    pub log_profit: f64,
}

impl Debug for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle({} @ {:.6})",
            self.nodes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" > "),
            self.log_profit
        )
    }
}

impl Cycle {
    /// Creates a cycle over `nodes` in `graph`, computing its log-profit from the edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not closed, has fewer than 2 legs, visits
    /// a node twice, or uses a leg missing from the snapshot.
    pub fn new(nodes: Vec<usize>, graph: &GraphSnapshot) -> Result<Self> {
        Self::validate_nodes(&nodes)?;

        let mut log_profit = 0.0;
        for pair in nodes.windows(2) {
            let Some(edge) = graph.edge(pair[0], pair[1]) else {
                bail!("No edge from node {} to node {}", pair[0], pair[1]);
            };
            log_profit += edge.weight;
        }

        Ok(Self { nodes, log_profit })
    }

    fn validate_nodes(nodes: &[usize]) -> Result<()> {
        if nodes.len() < 3 {
            bail!("Cycle must have at least 2 legs");
        }

        if nodes.first() != nodes.last() {
            bail!("Cycle must end on its starting node");
        }

        let mut seen = HashSet::new();
        for node in &nodes[..nodes.len() - 1] {
            if !seen.insert(node) {
                bail!("Cycle visits node {node} more than once");
            }
        }
        Ok(())
    }

    /// Number of legs
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// A valid cycle always has legs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest node index on the cycle
    #[must_use]
    pub fn min_node(&self) -> usize {
        self.nodes.iter().copied().min().unwrap_or_default()
    }

    /// Net profit ratio of one pass around the cycle: `exp(log_profit) - 1`
    #[must_use]
    pub fn profit_ratio(&self) -> f64 {
        self.log_profit.exp_m1()
    }

    /// Whether one pass returns more than `1 + min_spread` per unit.
    /// Based on quoted rates net of fees; slippage is not modeled.
    #[must_use]
    pub fn is_profitable(&self, min_spread: f64) -> bool {
        self.log_profit > min_spread.ln_1p() + LOG_EPSILON
    }

    /// The same cycle rotated to start at its smallest node index
    #[must_use]
    pub fn canonical(&self) -> Self {
        let open = &self.nodes[..self.nodes.len() - 1];
        let start = open
            .iter()
            .enumerate()
            .min_by_key(|(_, node)| **node)
            .map_or(0, |(i, _)| i);
        Self {
            nodes: self.rotated_nodes(start),
            log_profit: self.log_profit,
        }
    }

    /// Closed node path starting at position `start` of the open path
    #[must_use]
    pub fn rotated_nodes(&self, start: usize) -> Vec<usize> {
        let open = &self.nodes[..self.nodes.len() - 1];
        let mut nodes: Vec<usize> = open[start..].iter().chain(&open[..start]).copied().collect();
        nodes.push(nodes[0]);
        nodes
    }

    /// Total order used to rank cycles: log-profit descending, then fewer legs,
    /// then lowest minimum node, then the node path itself
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rank_key(&self) -> (Reverse<i64>, usize, usize, Vec<usize>) {
        (
            Reverse((self.log_profit * LOG_SCALE).round() as i64),
            self.len(),
            self.min_node(),
            self.nodes.clone(),
        )
    }

    /// Edges along the cycle
    #[must_use]
    pub fn edges<'a>(&self, graph: &'a GraphSnapshot) -> Vec<&'a Edge> {
        graph.path_edges(&self.nodes).unwrap_or_default()
    }

    /// Assets along the cycle
    #[must_use]
    pub fn assets(&self, graph: &GraphSnapshot) -> Vec<Asset> {
        nodes_to_assets(&self.nodes, &graph.assets)
    }
}
