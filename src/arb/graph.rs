/// A graph snapshot is the market at one timestamp: assets are nodes, quoted
/// conversions are directed edges weighted by the log of the net rate.
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};

use serde::Serialize;

use super::asset::{Asset, AssetKey};
use super::fees::FeePolicy;
use crate::quote::QuoteSource;

/// Kind of leg an edge represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    /// Conversion between two symbols on one platform
    Trade,
    /// Move of one symbol between two platforms
    Transfer,
}

impl LegKind {
    /// Leg kind between two connected assets
    #[must_use]
    pub fn between(from: &Asset, to: &Asset) -> Self {
        if from.is_transfer_to(to) {
            Self::Transfer
        } else {
            Self::Trade
        }
    }
}

/// A directed, quoted conversion between two assets
#[derive(Clone, PartialEq, Serialize)]
pub struct Edge {
    /// Source asset
    pub from_asset: Asset,
    /// Index of the source node
    pub from_node: usize,
    /// Target asset
    pub to_asset: Asset,
    /// Index of the target node
    pub to_node: usize,
    /// Trade or transfer
    pub kind: LegKind,
    /// Gross quoted rate
    pub rate: f64,
    /// Fee fraction charged on the leg output
    pub fee: f64,
    /// `ln(rate * (1 - fee))`
    pub weight: f64,
}

impl Edge {
    /// Rate after fees
    #[must_use]
    pub fn net_rate(&self) -> f64 {
        self.rate * (1.0 - self.fee)
    }
}

impl Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Edge({:?} -> {:?} @ {} fee {} w {:.6})",
            self.from_asset, self.to_asset, self.rate, self.fee, self.weight
        )
    }
}

/// Immutable weighted graph of the market at one timestamp
#[derive(Clone, Debug, Serialize)]
pub struct GraphSnapshot {
    /// Timestamp the quotes were taken at
    pub timestamp: i64,
    /// Assets in node order
    pub assets: Vec<Asset>,
    /// Asset key to node index
    pub nodes: BTreeMap<AssetKey, usize>,
    /// Edges in construction order
    pub edges: Vec<Edge>,
    /// `(from_node, to_node)` to position in `edges`
    #[serde(skip)]
    index: HashMap<(usize, usize), usize>,
}

impl GraphSnapshot {
    /// Builds the snapshot for `timestamp`.
    ///
    /// Every ordered pair of distinct assets sharing a platform or a symbol is
    /// quoted. A missing, non-finite or non-positive rate is a gap: the edge is
    /// left out and construction carries on.
    pub fn build<Q: QuoteSource + ?Sized>(
        assets: &[Asset],
        timestamp: i64,
        time_span: i64,
        quotes: &Q,
        fees: &FeePolicy,
    ) -> Self {
        let mut nodes = BTreeMap::new();
        let mut edges = Vec::new();
        let mut gaps = 0_usize;

        for (from_node, from_asset) in assets.iter().enumerate() {
            nodes.entry(from_asset.key()).or_insert(from_node);
            for (to_node, to_asset) in assets.iter().enumerate() {
                if from_node == to_node || !from_asset.is_connected_to(to_asset) {
                    continue;
                }

                let Some(rate) = quotes
                    .quote(timestamp, from_asset, to_asset, time_span)
                    .filter(|rate| rate.is_finite() && *rate > 0.0)
                else {
                    gaps += 1;
                    continue;
                };

                let fee = fees.leg_fee(from_asset, to_asset);
                let net_rate = rate * (1.0 - fee);
                if net_rate <= 0.0 || !net_rate.is_finite() {
                    gaps += 1;
                    continue;
                }

                edges.push(Edge {
                    from_asset: from_asset.clone(),
                    from_node,
                    to_asset: to_asset.clone(),
                    to_node,
                    kind: LegKind::between(from_asset, to_asset),
                    rate,
                    fee,
                    weight: net_rate.ln(),
                });
            }
        }

        if gaps > 0 {
            log::debug!(
                "arb::graph: {} quote gaps at {}, built {} edges",
                gaps,
                timestamp,
                edges.len()
            );
        }

        Self::from_edges(timestamp, assets.to_vec(), nodes, edges)
    }

    /// Assembles a snapshot from prepared edges
    fn from_edges(
        timestamp: i64,
        assets: Vec<Asset>,
        nodes: BTreeMap<AssetKey, usize>,
        edges: Vec<Edge>,
    ) -> Self {
        let index = edges
            .iter()
            .enumerate()
            .map(|(i, edge)| ((edge.from_node, edge.to_node), i))
            .collect();
        Self {
            timestamp,
            assets,
            nodes,
            edges,
            index,
        }
    }

    /// Number of nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.assets.len()
    }

    /// The edge from `from` to `to`, if it was quoted
    #[must_use]
    pub fn edge(&self, from: usize, to: usize) -> Option<&Edge> {
        self.index.get(&(from, to)).map(|i| &self.edges[*i])
    }

    /// Node index of an asset
    #[must_use]
    pub fn node_of(&self, asset: &Asset) -> Option<usize> {
        self.nodes.get(&asset.key()).copied()
    }

    /// Edges along a closed node path `[n0, .., nk = n0]`, or `None` if a leg is missing
    #[must_use]
    pub fn path_edges(&self, nodes: &[usize]) -> Option<Vec<&Edge>> {
        nodes
            .windows(2)
            .map(|pair| self.edge(pair[0], pair[1]))
            .collect()
    }
}

/// A leg of the asset universe that could be quoted
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArbitragePair {
    /// Trade or transfer
    pub kind: LegKind,
    /// Source asset
    pub from: Asset,
    /// Target asset
    pub to: Asset,
}

/// Lists every ordered leg of the universe spanned by `platforms` and `symbols`,
/// in graph construction order
#[must_use]
pub fn arbitrage_pairs(platforms: &[String], symbols: &[String]) -> Vec<ArbitragePair> {
    let assets = super::asset::universe(platforms, symbols);
    assets
        .iter()
        .flat_map(|from| {
            assets
                .iter()
                .filter(move |to| from.is_connected_to(to))
                .map(move |to| ArbitragePair {
                    kind: LegKind::between(from, to),
                    from: from.clone(),
                    to: to.clone(),
                })
        })
        .collect()
}

/// Maps node indices back to the assets they stand for. Unknown indices are skipped.
#[must_use]
pub fn nodes_to_assets(nodes: &[usize], assets: &[Asset]) -> Vec<Asset> {
    nodes
        .iter()
        .filter_map(|node| assets.get(*node).cloned())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::fees::FeeSchedule;
    use crate::arb::test_helpers::*;

    #[test]
    fn test_construction_rule() {
        let assets = assets(&["X_BTC", "X_ETH", "Y_BTC", "Y_ETH"]);
        let quotes = uniform_quotes(&assets, 1.0);
        let graph = GraphSnapshot::build(&assets, 0, 60, &quotes, &FeePolicy::disabled());

        for (i, from) in assets.iter().enumerate() {
            for (j, to) in assets.iter().enumerate() {
                let connected = i != j && (from.platform == to.platform || from.symbol == to.symbol);
                assert_eq!(graph.edge(i, j).is_some(), connected, "{from} -> {to}");
            }
        }
        // 4 nodes, each connected to 2 others
        assert_eq!(graph.edges.len(), 8);
    }

    #[test]
    fn test_node_mapping_follows_input_order() {
        let assets = assets(&["Y_ETH", "X_BTC", "X_ETH"]);
        let graph = GraphSnapshot::build(&assets, 0, 60, &TableQuotes::new(), &FeePolicy::disabled());
        assert_eq!(graph.nodes.get(&AssetKey("Y_ETH".into())), Some(&0));
        assert_eq!(graph.nodes.get(&AssetKey("X_BTC".into())), Some(&1));
        assert_eq!(graph.node_of(&asset("X_ETH")), Some(2));
    }

    #[test]
    fn test_weight_is_log_rate() {
        let assets = assets(&["X_BTC", "X_ETH"]);
        let quotes = TableQuotes::new()
            .with_rate(&assets[0], &assets[1], 15.0)
            .with_rate(&assets[1], &assets[0], 0.066);
        let graph = GraphSnapshot::build(&assets, 0, 60, &quotes, &FeePolicy::disabled());

        assert!((graph.edge(0, 1).unwrap().weight - 15.0_f64.ln()).abs() < 1e-12);
        assert!((graph.edge(1, 0).unwrap().weight - 0.066_f64.ln()).abs() < 1e-12);
        assert_eq!(graph.edge(0, 1).unwrap().kind, LegKind::Trade);
    }

    #[test]
    fn test_fees_lower_weights() {
        let assets = assets(&["X_BTC", "Y_BTC"]);
        let quotes = uniform_quotes(&assets, 1.0);
        let mut schedule = FeeSchedule::default();
        schedule.transfer.insert("X".to_string(), 0.01);
        let graph = GraphSnapshot::build(&assets, 0, 60, &quotes, &FeePolicy::enabled(schedule));

        let edge = graph.edge(0, 1).unwrap();
        assert_eq!(edge.kind, LegKind::Transfer);
        assert!((edge.weight - 0.99_f64.ln()).abs() < 1e-12);
        assert!((edge.net_rate() - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_gaps_are_omitted() {
        let assets = assets(&["X_BTC", "X_ETH", "X_USD"]);
        let quotes = TableQuotes::new()
            .with_rate(&assets[0], &assets[1], 15.0)
            .with_rate(&assets[1], &assets[0], 0.0)
            .with_rate(&assets[1], &assets[2], f64::NAN)
            .with_rate(&assets[2], &assets[1], -3.0)
            .with_rate(&assets[0], &assets[2], f64::INFINITY);
        let graph = GraphSnapshot::build(&assets, 0, 60, &quotes, &FeePolicy::disabled());

        assert_eq!(graph.edges.len(), 1);
        assert!(graph.edge(0, 1).is_some());
    }

    #[test]
    fn test_path_edges() {
        let assets = assets(&["X_BTC", "X_ETH", "X_USD"]);
        let quotes = TableQuotes::new()
            .with_rate(&assets[0], &assets[1], 2.0)
            .with_rate(&assets[1], &assets[0], 0.5);
        let graph = GraphSnapshot::build(&assets, 0, 60, &quotes, &FeePolicy::disabled());

        assert_eq!(graph.path_edges(&[0, 1, 0]).unwrap().len(), 2);
        assert!(graph.path_edges(&[0, 1, 2, 0]).is_none());
    }

    #[test]
    fn test_arbitrage_pairs_match_graph_edges() {
        let platforms = vec!["X".to_string(), "Y".to_string()];
        let symbols = vec!["BTC".to_string(), "ETH".to_string(), "USD".to_string()];
        let pairs = arbitrage_pairs(&platforms, &symbols);

        let universe = crate::arb::asset::universe(&platforms, &symbols);
        let graph = GraphSnapshot::build(
            &universe,
            0,
            60,
            &uniform_quotes(&universe, 1.0),
            &FeePolicy::disabled(),
        );

        assert_eq!(pairs.len(), graph.edges.len());
        for (pair, edge) in pairs.iter().zip(&graph.edges) {
            assert_eq!(pair.from, edge.from_asset);
            assert_eq!(pair.to, edge.to_asset);
            assert_eq!(pair.kind, edge.kind);
        }
        assert_eq!(
            pairs.iter().filter(|p| p.kind == LegKind::Transfer).count(),
            symbols.len() * 2
        );
    }

    #[test]
    fn test_nodes_to_assets() {
        let assets = assets(&["X_BTC", "X_ETH"]);
        assert_eq!(
            nodes_to_assets(&[0, 1, 0, 7], &assets),
            vec![assets[0].clone(), assets[1].clone(), assets[0].clone()]
        );
    }
}
