use std::collections::BTreeMap;
use std::sync::Arc;

use derive_more::Display;
use serde::{Serialize, Serializer};

use crate::arb::executor::TradeRecord;
use crate::arb::graph::GraphSnapshot;
use crate::arb::portfolio::Portfolio;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not started
    #[default]
    #[display("idle")]
    Idle,
    /// Stepping through time
    #[display("running")]
    Running,
    /// Reached the end timestamp
    #[display("completed")]
    Completed,
    /// Rejected by validation
    #[display("failed")]
    Failed,
}

impl RunStatus {
    /// Whether the run can no longer change
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Trades of a run in time order.
///
/// Records are shared, so cloning a report copies pointers only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    /// Executed trades, time-ascending
    #[serde(serialize_with = "serialize_shared")]
    pub trades: Vec<Arc<TradeRecord>>,
}

/// Trades aggregated over one secondary-granularity window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportBucket {
    /// First timestamp of the window
    pub start: i64,
    /// Number of trades
    pub trades: usize,
    /// Sum of trade volumes
    pub volume: f64,
    /// Sum of realized profits
    pub profit: f64,
    /// Sum of fees paid
    pub fees: f64,
}

impl Report {
    /// Appends a trade
    pub fn push(&mut self, record: TradeRecord) {
        self.trades.push(Arc::new(record));
    }

    /// Number of trades
    #[must_use]
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    /// Whether no trade was executed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Sum of realized profits, each in its trade's start-asset units
    #[must_use]
    pub fn total_profit(&self) -> f64 {
        self.trades.iter().map(|trade| trade.profit).sum()
    }

    /// Sum of fees paid, each in its trade's start-asset units
    #[must_use]
    pub fn total_fees(&self) -> f64 {
        self.trades.iter().map(|trade| trade.fees).sum()
    }

    /// Groups trades into windows of `granularity` seconds counted from `start`.
    /// Windows without trades are left out.
    #[must_use]
    pub fn buckets(&self, start: i64, granularity: i64) -> Vec<ReportBucket> {
        let granularity = i128::from(granularity.max(1));
        let mut buckets: BTreeMap<i128, ReportBucket> = BTreeMap::new();
        for trade in &self.trades {
            // Offsets from `start` can exceed i64, window starts cannot
            let index = (i128::from(trade.timestamp) - i128::from(start)).div_euclid(granularity);
            let bucket = buckets.entry(index).or_insert_with(|| ReportBucket {
                start: i64::try_from(i128::from(start) + index * granularity)
                    .unwrap_or(trade.timestamp),
                ..ReportBucket::default()
            });
            bucket.trades += 1;
            bucket.volume += trade.volume;
            bucket.profit += trade.profit;
            bucket.fees += trade.fees;
        }
        buckets.into_values().collect()
    }
}

/// Gross quoted rates per ordered pair, keyed `"{from_key}/{to_key}"`.
///
/// Built on demand from the snapshots of a run, which keep every quoted rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PriceHistory(pub BTreeMap<String, Vec<(i64, f64)>>);

impl PriceHistory {
    /// Records every rate quoted in `graph`
    pub fn record(&mut self, graph: &GraphSnapshot) {
        for edge in &graph.edges {
            self.0
                .entry(format!("{}/{}", edge.from_asset.key(), edge.to_asset.key()))
                .or_default()
                .push((graph.timestamp, edge.rate));
        }
    }

    /// Rates quoted across `graphs`, in step order
    #[must_use]
    pub fn from_graphs(graphs: &[Arc<GraphSnapshot>]) -> Self {
        let mut prices = Self::default();
        for graph in graphs {
            prices.record(graph);
        }
        prices
    }

    /// Rates observed for one pair
    #[must_use]
    pub fn series(&self, pair: &str) -> &[(i64, f64)] {
        self.0.get(pair).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Everything a run has produced so far.
///
/// History is held behind `Arc`s so a step hands out a copy without
/// duplicating trades or snapshots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunState {
    /// Status when the state was taken
    pub status: RunStatus,
    /// Timestamp of the last step
    pub timestamp: i64,
    /// Steps taken
    pub steps: usize,
    /// Share of the time range covered, in `[0, 100]`
    pub progress: f64,
    /// Executed trades
    pub report: Report,
    /// One snapshot per step
    #[serde(serialize_with = "serialize_shared")]
    pub graphs: Vec<Arc<GraphSnapshot>>,
    /// Holdings after the last step
    pub portfolio: Portfolio,
}

impl RunState {
    /// Observed rates up to the last step
    #[must_use]
    pub fn prices(&self) -> PriceHistory {
        PriceHistory::from_graphs(&self.graphs)
    }
}

/// Serializes values behind their `Arc`s
fn serialize_shared<T: Serialize, S: Serializer>(
    items: &[Arc<T>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(items.iter().map(|item| &**item))
}
