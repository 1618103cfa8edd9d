use std::collections::HashMap;

pub use crate::quote::TableQuotes;

use super::asset::Asset;
use super::fees::FeePolicy;
use super::graph::GraphSnapshot;
use super::portfolio::Portfolio;

#[allow(dead_code)]
pub fn asset(key: &str) -> Asset {
    Asset::try_from(key).unwrap()
}

#[allow(dead_code)]
pub fn assets(keys: &[&str]) -> Vec<Asset> {
    keys.iter().map(|key| asset(key)).collect()
}

/// Quotes every connected ordered pair of `assets` at `rate`
#[allow(dead_code)]
pub fn uniform_quotes(assets: &[Asset], rate: f64) -> TableQuotes {
    let mut quotes = TableQuotes::new();
    for from in assets {
        for to in assets.iter().filter(|to| from.is_connected_to(to)) {
            quotes = quotes.with_rate(from, to, rate);
        }
    }
    quotes
}

/// Fee-free snapshot at timestamp 0 quoting exactly `rates`.
/// Nodes are numbered in order of first appearance.
#[allow(dead_code)]
pub fn graph(rates: &[(&str, &str, f64)]) -> GraphSnapshot {
    let mut keys: Vec<&str> = Vec::new();
    for (from, to, _) in rates {
        for key in [*from, *to] {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    let quotes = rates
        .iter()
        .fold(TableQuotes::new(), |quotes, (from, to, rate)| {
            quotes.with_rate(&asset(from), &asset(to), *rate)
        });

    GraphSnapshot::build(&assets(&keys), 0, 60, &quotes, &FeePolicy::disabled())
}

#[allow(dead_code)]
pub fn portfolio(holdings: &[(&str, f64)]) -> Portfolio {
    Portfolio::new(
        holdings
            .iter()
            .map(|(key, amount)| (asset(key), *amount))
            .collect::<HashMap<_, _>>(),
    )
}
