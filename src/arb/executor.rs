//! Trade execution against a simulated portfolio.
//!
//! A cycle is only traded when it clears the minimum spread and the portfolio
//! holds one of its assets. The trade is applied to the portfolio as a single
//! set of net changes.

use std::collections::HashMap;

use serde::Serialize;

use super::asset::Asset;
use super::cycle::Cycle;
use super::graph::GraphSnapshot;
use super::portfolio::Portfolio;

/// One executed opportunity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    /// Step timestamp
    pub timestamp: i64,
    /// Assets along the traded loop, starting and ending at `start_asset`
    pub cycle: Vec<Asset>,
    /// Asset the loop was entered and exited with
    pub start_asset: Asset,
    /// Amount of `start_asset` put in
    pub volume: f64,
    /// Amount of `start_asset` received back, net of fees
    pub proceeds: f64,
    /// `proceeds - volume`
    pub profit: f64,
    /// Fees paid, in `start_asset` units
    pub fees: f64,
    /// Net profit ratio of the loop
    pub profit_ratio: f64,
}

/// Why a cycle was not traded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Net profit ratio is under the minimum spread
    BelowSpread,
    /// No asset on the loop is held
    NoHolding,
    /// A leg is missing from the snapshot
    MissingLeg,
}

/// Result of an execution attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The trade was applied
    Executed(TradeRecord),
    /// Nothing happened
    Skipped(SkipReason),
}

impl Outcome {
    /// The trade record, if a trade happened
    #[must_use]
    pub fn into_record(self) -> Option<TradeRecord> {
        match self {
            Self::Executed(record) => Some(record),
            Self::Skipped(_) => None,
        }
    }
}

/// Sizes and applies trades
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeExecutor {
    /// Share of the starting holding put into one trade, in `(0, 1]`
    pub max_trade_ratio: f64,
    /// Minimum net profit ratio, in `[0, 1)`
    pub min_spread: f64,
}

impl TradeExecutor {
    /// Creates an executor
    #[must_use]
    pub const fn new(max_trade_ratio: f64, min_spread: f64) -> Self {
        Self {
            max_trade_ratio,
            min_spread,
        }
    }

    /// Attempts to trade `cycle` against `portfolio` at the snapshot's rates.
    ///
    /// The loop is entered at the first asset, walking the canonical order, that
    /// the portfolio holds. Volume is `max_trade_ratio` of that holding. Each leg
    /// converts at its net rate; intermediate holdings net out to zero change.
    pub fn execute(
        &self,
        cycle: &Cycle,
        graph: &GraphSnapshot,
        portfolio: &mut Portfolio,
    ) -> Outcome {
        if !cycle.is_profitable(self.min_spread) {
            log::debug!(
                "arb::executor: {:?} below min spread {}",
                cycle,
                self.min_spread
            );
            return Outcome::Skipped(SkipReason::BelowSpread);
        }

        let canonical = cycle.canonical();
        let Some((nodes, holding)) = (0..canonical.len()).find_map(|start| {
            let node = canonical.nodes[start];
            let holding = portfolio.balance(graph.assets.get(node)?);
            (holding > 0.0).then(|| (canonical.rotated_nodes(start), holding))
        }) else {
            log::debug!("arb::executor: No holdings on {:?}", canonical);
            return Outcome::Skipped(SkipReason::NoHolding);
        };

        let volume = holding.min(self.max_trade_ratio * holding);
        if volume <= 0.0 {
            return Outcome::Skipped(SkipReason::NoHolding);
        }

        let Some(edges) = graph.path_edges(&nodes) else {
            log::debug!("arb::executor: {:?} uses a leg missing from the snapshot", cycle);
            return Outcome::Skipped(SkipReason::MissingLeg);
        };

        let mut deltas: HashMap<usize, f64> = HashMap::new();
        let mut amount = volume;
        let mut gross = volume;
        for edge in &edges {
            *deltas.entry(edge.from_node).or_default() -= amount;
            amount *= edge.net_rate();
            gross *= edge.rate;
            *deltas.entry(edge.to_node).or_default() += amount;
        }
        let proceeds = amount;

        let changes: Vec<(Asset, f64)> = deltas
            .into_iter()
            .map(|(node, delta)| (graph.assets[node].clone(), delta))
            .collect();
        portfolio.apply(&changes);

        let record = TradeRecord {
            timestamp: graph.timestamp,
            cycle: nodes.iter().map(|node| graph.assets[*node].clone()).collect(),
            start_asset: graph.assets[nodes[0]].clone(),
            volume,
            proceeds,
            profit: proceeds - volume,
            fees: gross - proceeds,
            profit_ratio: cycle.profit_ratio(),
        };

        log::info!(
            "arb::executor: Traded {} {} around {} legs at {}, profit {:.8}",
            record.volume,
            record.start_asset,
            edges.len(),
            record.timestamp,
            record.profit
        );

        Outcome::Executed(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::detector::best_cycle;
    use crate::arb::fees::{FeePolicy, FeeSchedule};
    use crate::arb::test_helpers::*;

    fn two_leg_graph() -> GraphSnapshot {
        graph(&[("X_BTC", "X_ETH", 1.02), ("X_ETH", "X_BTC", 1.0)])
    }

    #[test]
    fn test_accepts_above_spread() {
        let graph = two_leg_graph();
        let cycle = best_cycle(&graph, 0.0).unwrap();
        let mut portfolio = portfolio(&[("X_BTC", 10.0)]);

        let record = TradeExecutor::new(0.5, 0.01)
            .execute(&cycle, &graph, &mut portfolio)
            .into_record()
            .unwrap();

        assert!((record.volume - 5.0).abs() < 1e-12);
        assert!((record.proceeds - 5.1).abs() < 1e-12);
        assert!((record.profit - 0.1).abs() < 1e-12);
        assert!(record.fees.abs() < 1e-12);
        assert_eq!(record.start_asset, asset("X_BTC"));
        assert_eq!(record.cycle, assets(&["X_BTC", "X_ETH", "X_BTC"]));
        assert!((portfolio.balance(&asset("X_BTC")) - 10.1).abs() < 1e-12);
        assert!(portfolio.balance(&asset("X_ETH")).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_below_spread() {
        let graph = two_leg_graph();
        let cycle = best_cycle(&graph, 0.0).unwrap();
        let mut portfolio = portfolio(&[("X_BTC", 10.0)]);
        let before = portfolio.clone();

        let outcome = TradeExecutor::new(0.5, 0.05).execute(&cycle, &graph, &mut portfolio);
        assert_eq!(outcome, Outcome::Skipped(SkipReason::BelowSpread));
        assert_eq!(portfolio, before);
    }

    #[test]
    fn test_no_holding() {
        let graph = two_leg_graph();
        let cycle = best_cycle(&graph, 0.0).unwrap();
        let mut portfolio = portfolio(&[("Y_BTC", 10.0), ("X_BTC", 0.0)]);

        let outcome = TradeExecutor::new(1.0, 0.0).execute(&cycle, &graph, &mut portfolio);
        assert_eq!(outcome, Outcome::Skipped(SkipReason::NoHolding));
    }

    #[test]
    fn test_enters_at_first_held_asset() {
        let graph = two_leg_graph();
        let cycle = best_cycle(&graph, 0.0).unwrap();
        let mut portfolio = portfolio(&[("X_ETH", 4.0)]);

        let record = TradeExecutor::new(1.0, 0.0)
            .execute(&cycle, &graph, &mut portfolio)
            .into_record()
            .unwrap();
        assert_eq!(record.start_asset, asset("X_ETH"));
        assert!((record.volume - 4.0).abs() < 1e-12);
        assert!((portfolio.balance(&asset("X_ETH")) - 4.08).abs() < 1e-12);
    }

    #[test]
    fn test_volume_bounded_by_ratio_and_holding() {
        let graph = two_leg_graph();
        let cycle = best_cycle(&graph, 0.0).unwrap();

        for (holding, ratio) in [(10.0, 0.25), (10.0, 1.0), (0.001, 0.5), (3.0, 0.999)] {
            let mut portfolio = portfolio(&[("X_BTC", holding)]);
            let record = TradeExecutor::new(ratio, 0.0)
                .execute(&cycle, &graph, &mut portfolio)
                .into_record()
                .unwrap();
            assert!(record.volume <= ratio * holding);
            assert!(record.volume <= holding);
        }
    }

    #[test]
    fn test_intermediate_holdings_unchanged() {
        let graph = graph(&[
            ("X_BTC", "X_ETH", 16.0),
            ("X_ETH", "X_USD", 2000.0),
            ("X_USD", "X_BTC", 1.0 / 30000.0),
        ]);
        let cycle = best_cycle(&graph, 0.0).unwrap();
        let mut portfolio = portfolio(&[("X_BTC", 1.0), ("X_ETH", 3.0), ("X_USD", 100.0)]);

        let record = TradeExecutor::new(0.5, 0.0)
            .execute(&cycle, &graph, &mut portfolio)
            .into_record()
            .unwrap();

        assert_eq!(record.start_asset, asset("X_BTC"));
        assert!((portfolio.balance(&asset("X_ETH")) - 3.0).abs() < f64::EPSILON);
        assert!((portfolio.balance(&asset("X_USD")) - 100.0).abs() < f64::EPSILON);
        assert!(
            (portfolio.balance(&asset("X_BTC")) - (0.5 + record.proceeds)).abs() < 1e-12
        );
    }

    #[test]
    fn test_fees_are_charged() {
        let assets = assets(&["X_BTC", "X_ETH"]);
        let quotes = TableQuotes::new()
            .with_rate(&assets[0], &assets[1], 1.05)
            .with_rate(&assets[1], &assets[0], 1.0);
        let mut schedule = FeeSchedule::default();
        schedule.trade.insert("X".to_string(), 0.01);
        let graph = GraphSnapshot::build(&assets, 0, 60, &quotes, &FeePolicy::enabled(schedule));
        let cycle = best_cycle(&graph, 0.0).unwrap();
        let mut portfolio = portfolio(&[("X_BTC", 100.0)]);

        let record = TradeExecutor::new(1.0, 0.0)
            .execute(&cycle, &graph, &mut portfolio)
            .into_record()
            .unwrap();

        let net = 1.05 * 0.99 * 0.99;
        assert!((record.proceeds - 100.0 * net).abs() < 1e-9);
        assert!((record.fees - 100.0 * (1.05 - net)).abs() < 1e-9);
        assert!(record.fees > 0.0);
        assert!((record.profit_ratio - (net - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_fees_can_remove_opportunity() {
        let assets = assets(&["X_BTC", "X_ETH"]);
        let quotes = TableQuotes::new()
            .with_rate(&assets[0], &assets[1], 1.01)
            .with_rate(&assets[1], &assets[0], 1.0);
        let mut schedule = FeeSchedule::default();
        schedule.default_trade = 0.01;
        let graph = GraphSnapshot::build(&assets, 0, 60, &quotes, &FeePolicy::enabled(schedule));
        assert!(best_cycle(&graph, 0.0).is_none());
    }
}
