use std::collections::{BTreeMap, HashMap};

use serde::{Serialize, Serializer};

use super::asset::Asset;

/// Represents a portfolio of simulated holdings.
///
/// A portfolio tracks the amount held of each asset. Amounts are never
/// negative. Only the trade executor mutates a portfolio during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    /// Map of assets to the amount held
    holdings: HashMap<Asset, f64>,
}

impl Portfolio {
    /// Creates a new portfolio with the given holdings.
    ///
    /// # Arguments
    ///
    /// * `holdings` - A map of assets to their amounts
    ///
    /// # Returns
    ///
    /// A new Portfolio instance
    #[must_use]
    pub const fn new(holdings: HashMap<Asset, f64>) -> Self {
        Self { holdings }
    }

    /// Returns the amount held of `asset`, zero if it is not in the portfolio.
    ///
    /// # Arguments
    ///
    /// * `asset` - The asset to query
    #[must_use]
    pub fn balance(&self, asset: &Asset) -> f64 {
        self.holdings.get(asset).copied().unwrap_or_default()
    }

    /// Iterates over every holding
    pub fn iter(&self) -> impl Iterator<Item = (&Asset, f64)> {
        self.holdings.iter().map(|(asset, amount)| (asset, *amount))
    }

    /// Number of assets held, including empty positions
    #[must_use]
    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    /// Whether the portfolio holds nothing at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Applies a set of net changes at once. Balances are floored at zero.
    pub(crate) fn apply(&mut self, deltas: &[(Asset, f64)]) {
        for (asset, delta) in deltas {
            if *delta == 0.0 {
                continue;
            }
            let balance = self.holdings.entry(asset.clone()).or_default();
            *balance = (*balance + delta).max(0.0);
        }
    }
}

impl Serialize for Portfolio {
    /// Serializes as `{ platform: { symbol: amount } }`, the same layout runs are configured with
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut nested: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
        for (asset, amount) in &self.holdings {
            nested
                .entry(asset.platform.as_str())
                .or_default()
                .insert(asset.symbol.as_str(), *amount);
        }
        nested.serialize(serializer)
    }
}
