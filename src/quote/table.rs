use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};

use super::QuoteSource;
use crate::arb::asset::{Asset, AssetKey};

/// Deterministic quote table.
///
/// Holds constant rates and timestamped samples per ordered asset pair. A lookup
/// at `t` with span `s` returns the latest sample in `(t - s, t]`, falls back to
/// the constant rate, and otherwise reports a gap.
#[derive(Debug, Clone, Default)]
pub struct TableQuotes {
    /// Rates valid at every timestamp
    constant: HashMap<(AssetKey, AssetKey), f64>,
    /// Timestamped rates, ordered by time
    samples: HashMap<(AssetKey, AssetKey), BTreeMap<i64, f64>>,
}

/// One entry of a quote file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoteEntry {
    /// Sample time, absent for constant rates
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Source asset key, `{platform}_{symbol}`
    pub from: String,
    /// Target asset key, `{platform}_{symbol}`
    pub to: String,
    /// Units of `to` per unit of `from`
    pub rate: f64,
}

/// On-disk layout of a quote file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct QuoteFile {
    /// Constant rates
    pub constant: Vec<QuoteEntry>,
    /// Timestamped samples
    pub samples: Vec<QuoteEntry>,
}

impl TableQuotes {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rate valid at every timestamp
    #[must_use]
    pub fn with_rate(mut self, from: &Asset, to: &Asset, rate: f64) -> Self {
        self.constant.insert((from.key(), to.key()), rate);
        self
    }

    /// Adds a rate observed at `timestamp`
    #[must_use]
    pub fn with_sample(mut self, timestamp: i64, from: &Asset, to: &Asset, rate: f64) -> Self {
        self.insert_sample(timestamp, from.key(), to.key(), rate);
        self
    }

    /// Adds a rate observed at `timestamp`
    pub fn insert_sample(&mut self, timestamp: i64, from: AssetKey, to: AssetKey, rate: f64) {
        self.samples
            .entry((from, to))
            .or_default()
            .insert(timestamp, rate);
    }

    /// Number of pairs with at least one rate
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.samples
            .keys()
            .chain(self.constant.keys())
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    /// Loads a table from a JSON quote file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or an
    /// entry names a malformed asset key.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read quote file {}", path.display()))?;
        let file: QuoteFile = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("Failed to parse quote file {}", path.display()))?;
        Self::try_from(file)
    }
}

impl TryFrom<QuoteFile> for TableQuotes {
    type Error = eyre::Error;

    fn try_from(file: QuoteFile) -> Result<Self> {
        let mut table = Self::new();
        for entry in file.constant {
            let from = Asset::try_from(entry.from.as_str())?;
            let to = Asset::try_from(entry.to.as_str())?;
            table.constant.insert((from.key(), to.key()), entry.rate);
        }
        for entry in file.samples {
            let timestamp = entry
                .timestamp
                .ok_or_else(|| eyre!("Sample {} -> {} has no timestamp", entry.from, entry.to))?;
            let from = Asset::try_from(entry.from.as_str())?;
            let to = Asset::try_from(entry.to.as_str())?;
            table.insert_sample(timestamp, from.key(), to.key(), entry.rate);
        }
        log::debug!(
            "quote::table: Loaded quotes for {} asset pairs",
            table.pair_count()
        );
        Ok(table)
    }
}

impl QuoteSource for TableQuotes {
    fn quote(&self, timestamp: i64, from: &Asset, to: &Asset, time_span: i64) -> Option<f64> {
        let pair = (from.key(), to.key());

        let sampled = self.samples.get(&pair).and_then(|series| {
            series
                .range(..=timestamp)
                .next_back()
                .filter(|(ts, _)| {
                    (time_span <= 0 && **ts == timestamp)
                        || i128::from(**ts) > i128::from(timestamp) - i128::from(time_span)
                })
                .map(|(_, rate)| *rate)
        });

        sampled.or_else(|| self.constant.get(&pair).copied())
    }
}
