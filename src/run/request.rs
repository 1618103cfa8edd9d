use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::strategy::Strategy;
use crate::arb::asset::{universe, Asset};
use crate::arb::executor::TradeExecutor;
use crate::arb::fees::{FeePolicy, FeeSchedule};
use crate::arb::portfolio::Portfolio;

/// Reasons a run request is rejected before any step executes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    /// End is not after start
    #[error("End timestamp {end} must be after start timestamp {start}")]
    InvalidTimeRange {
        /// Requested start
        start: i64,
        /// Requested end
        end: i64,
    },

    /// A granularity is zero or negative
    #[error("{name} granularity must be positive, got {value}")]
    InvalidGranularity {
        /// `Primary` or `Secondary`
        name: &'static str,
        /// Requested value
        value: i64,
    },

    /// Trade ratio outside `(0, 1]`
    #[error("max_trade_ratio must be in (0, 1], got {0}")]
    MaxTradeRatioOutOfRange(f64),

    /// Spread outside `[0, 1)`
    #[error("min_spread must be in [0, 1), got {0}")]
    MinSpreadOutOfRange(f64),

    /// No platforms or no symbols
    #[error("Asset universe is empty: {platforms} platforms, {symbols} symbols")]
    EmptyUniverse {
        /// Number of platforms requested
        platforms: usize,
        /// Number of symbols requested
        symbols: usize,
    },

    /// A platform or symbol is listed twice
    #[error("Asset universe lists {0} more than once")]
    DuplicateAsset(String),

    /// The portfolio is not `{ platform: { symbol: amount } }`
    #[error("Malformed portfolio: {0}")]
    MalformedPortfolio(String),

    /// A fee fraction is outside `[0, 1)`
    #[error("Fee {name} must be in [0, 1), got {fee}")]
    InvalidFee {
        /// Schedule entry, e.g. `trade.binance`
        name: String,
        /// Requested fraction
        fee: f64,
    },

    /// A holding is negative or not a finite number
    #[error("Holding of {asset} must be a non-negative finite amount, got {amount}")]
    InvalidHolding {
        /// Asset key
        asset: String,
        /// Requested amount
        amount: f64,
    },

    /// The portfolio holds an asset the run does not trade
    #[error("Portfolio asset {0} is outside the asset universe")]
    UnknownPortfolioAsset(String),

    /// `start` was called on a run that is not idle
    #[error("Run has already been started")]
    AlreadyStarted,
}

/// A simulation request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunRequest {
    /// First timestamp, in seconds
    pub start_timestamp: i64,
    /// Last timestamp, in seconds
    pub end_timestamp: i64,
    /// Step size, also used as the quote time span
    pub primary_granularity: i64,
    /// Bucket size for report aggregation
    pub secondary_granularity: i64,
    /// Symbols traded on every platform
    pub assets: Vec<String>,
    /// Platforms traded on
    pub platforms: Vec<String>,
    /// Holdings as `{ platform: { symbol: amount } }`
    pub initial_portfolio: Value,
    /// Share of the starting holding put into one trade
    pub max_trade_ratio: f64,
    /// Minimum net profit ratio for a trade
    pub min_spread: f64,
    /// Charge fees on every leg
    #[serde(default)]
    pub fees_enabled: bool,
    /// Which cycles to trade each step
    #[serde(default)]
    pub strategy: Strategy,
    /// Fees charged when enabled; defaults apply when absent
    #[serde(default)]
    pub fee_schedule: Option<FeeSchedule>,
}

/// A validated request, ready to drive a run
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// First timestamp
    pub start: i64,
    /// Last timestamp
    pub end: i64,
    /// Step size
    pub granularity: i64,
    /// Report bucket size
    pub secondary_granularity: i64,
    /// Assets in node order
    pub universe: Vec<Asset>,
    /// Initial holdings
    pub portfolio: Portfolio,
    /// Fees charged on each leg
    pub fees: FeePolicy,
    /// Trade sizing
    pub executor: TradeExecutor,
    /// Cycle selection
    pub strategy: Strategy,
}

impl RunRequest {
    /// Reads a request from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the request layout
    pub fn from_json(raw: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Checks the request and resolves it into a plan.
    ///
    /// # Errors
    ///
    /// * If `end_timestamp` is not after `start_timestamp`
    /// * If a granularity is not positive
    /// * If `max_trade_ratio` is outside `(0, 1]` or `min_spread` outside `[0, 1)`
    /// * If the asset universe is empty or lists an entry twice
    /// * If the fee schedule holds a fraction outside `[0, 1)`
    /// * If the portfolio is malformed, holds a negative amount, or holds an
    ///   asset outside the universe
    pub fn validate(&self) -> Result<RunPlan, RunError> {
        if self.end_timestamp <= self.start_timestamp {
            return Err(RunError::InvalidTimeRange {
                start: self.start_timestamp,
                end: self.end_timestamp,
            });
        }
        if self.primary_granularity <= 0 {
            return Err(RunError::InvalidGranularity {
                name: "Primary",
                value: self.primary_granularity,
            });
        }
        if self.secondary_granularity <= 0 {
            return Err(RunError::InvalidGranularity {
                name: "Secondary",
                value: self.secondary_granularity,
            });
        }
        if !(self.max_trade_ratio > 0.0 && self.max_trade_ratio <= 1.0) {
            return Err(RunError::MaxTradeRatioOutOfRange(self.max_trade_ratio));
        }
        if !(self.min_spread >= 0.0 && self.min_spread < 1.0) {
            return Err(RunError::MinSpreadOutOfRange(self.min_spread));
        }

        let universe = self.universe()?;
        let portfolio = parse_portfolio(&self.initial_portfolio, &universe)?;

        if let Some((name, fee)) = self.fee_schedule.as_ref().and_then(FeeSchedule::invalid_fee) {
            return Err(RunError::InvalidFee { name, fee });
        }
        let fees = if self.fees_enabled {
            FeePolicy::enabled(self.fee_schedule.clone().unwrap_or_default())
        } else {
            FeePolicy::disabled()
        };

        Ok(RunPlan {
            start: self.start_timestamp,
            end: self.end_timestamp,
            granularity: self.primary_granularity,
            secondary_granularity: self.secondary_granularity,
            universe,
            portfolio,
            fees,
            executor: TradeExecutor::new(self.max_trade_ratio, self.min_spread),
            strategy: self.strategy,
        })
    }

    /// Every `(platform, symbol)` combination, platform-major
    fn universe(&self) -> Result<Vec<Asset>, RunError> {
        if self.platforms.is_empty() || self.assets.is_empty() {
            return Err(RunError::EmptyUniverse {
                platforms: self.platforms.len(),
                symbols: self.assets.len(),
            });
        }
        for names in [&self.platforms, &self.assets] {
            let mut seen = HashSet::new();
            if let Some(duplicate) = names.iter().find(|name| !seen.insert(name.as_str())) {
                return Err(RunError::DuplicateAsset(duplicate.clone()));
            }
        }
        Ok(universe(&self.platforms, &self.assets))
    }
}

/// Parses `{ platform: { symbol: amount } }` into a portfolio over `universe`
fn parse_portfolio(value: &Value, universe: &[Asset]) -> Result<Portfolio, RunError> {
    let platforms = value
        .as_object()
        .ok_or_else(|| RunError::MalformedPortfolio(format!("expected an object, got {value}")))?;

    let mut holdings = std::collections::HashMap::new();
    for (platform, symbols) in platforms {
        let symbols = symbols.as_object().ok_or_else(|| {
            RunError::MalformedPortfolio(format!("platform {platform} must map symbols to amounts"))
        })?;

        for (symbol, amount) in symbols {
            let asset = Asset::new(platform.as_str(), symbol.as_str());
            let amount = amount.as_f64().ok_or_else(|| {
                RunError::MalformedPortfolio(format!("amount of {} is not a number", asset.key()))
            })?;
            if !amount.is_finite() || amount < 0.0 {
                return Err(RunError::InvalidHolding {
                    asset: asset.key().to_string(),
                    amount,
                });
            }
            if !universe.contains(&asset) {
                return Err(RunError::UnknownPortfolioAsset(asset.key().to_string()));
            }
            holdings.insert(asset, amount);
        }
    }

    Ok(Portfolio::new(holdings))
}
