//! Fee schedule applied to every leg of a cycle.
//!
//! Same-platform legs pay the source platform's trade fee, cross-platform legs
//! pay the source platform's transfer fee. Fees are fractions of the leg output.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::asset::Asset;

/// Default trade fee (0.1%)
pub const DEFAULT_TRADE_FEE: f64 = 0.001;
/// Default transfer fee (0.05%)
pub const DEFAULT_TRANSFER_FEE: f64 = 0.0005;

/// Per-platform fee fractions
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Trade fee by platform
    pub trade: HashMap<String, f64>,
    /// Withdrawal/transfer fee by source platform
    pub transfer: HashMap<String, f64>,
    /// Trade fee for platforms missing from `trade`
    pub default_trade: f64,
    /// Transfer fee for platforms missing from `transfer`
    pub default_transfer: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            trade: HashMap::new(),
            transfer: HashMap::new(),
            default_trade: DEFAULT_TRADE_FEE,
            default_transfer: DEFAULT_TRANSFER_FEE,
        }
    }
}

impl FeeSchedule {
    /// First fee outside `[0, 1)`, named `default_trade`, `default_transfer`,
    /// `trade.{platform}` or `transfer.{platform}`
    #[must_use]
    pub fn invalid_fee(&self) -> Option<(String, f64)> {
        let defaults = [
            ("default_trade".to_string(), self.default_trade),
            ("default_transfer".to_string(), self.default_transfer),
        ];
        let platforms = [("trade", &self.trade), ("transfer", &self.transfer)]
            .into_iter()
            .flat_map(|(kind, fees)| {
                fees.iter()
                    .sorted_by(|a, b| a.0.cmp(b.0))
                    .map(move |(platform, fee)| (format!("{kind}.{platform}"), *fee))
            });

        defaults
            .into_iter()
            .chain(platforms)
            .find(|(_, fee)| !(0.0..1.0).contains(fee))
    }

    /// Trade fee charged by `platform`
    #[must_use]
    pub fn trade_fee(&self, platform: &str) -> f64 {
        self.trade.get(platform).copied().unwrap_or(self.default_trade)
    }

    /// Transfer fee charged when moving funds out of `platform`
    #[must_use]
    pub fn transfer_fee(&self, platform: &str) -> f64 {
        self.transfer
            .get(platform)
            .copied()
            .unwrap_or(self.default_transfer)
    }
}

/// Fee schedule plus the per-run switch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeePolicy {
    /// When false every leg is free
    pub enabled: bool,
    /// Fees applied when enabled
    pub schedule: FeeSchedule,
}

impl FeePolicy {
    /// A policy charging nothing
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            schedule: FeeSchedule::default(),
        }
    }

    /// A policy charging `schedule`
    #[must_use]
    pub const fn enabled(schedule: FeeSchedule) -> Self {
        Self {
            enabled: true,
            schedule,
        }
    }

    /// Fee fraction charged on the `from -> to` leg
    #[must_use]
    pub fn leg_fee(&self, from: &Asset, to: &Asset) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        if from.is_transfer_to(to) {
            self.schedule.transfer_fee(&from.platform)
        } else {
            self.schedule.trade_fee(&from.platform)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_policy_is_free() {
        let policy = FeePolicy::disabled();
        let fee = policy.leg_fee(&Asset::new("X", "BTC"), &Asset::new("X", "ETH"));
        assert!(fee.abs() < f64::EPSILON);
    }

    #[test]
    fn test_leg_fee_by_kind() {
        let mut schedule = FeeSchedule::default();
        schedule.trade.insert("X".to_string(), 0.002);
        schedule.transfer.insert("X".to_string(), 0.01);
        let policy = FeePolicy::enabled(schedule);

        let trade = policy.leg_fee(&Asset::new("X", "BTC"), &Asset::new("X", "ETH"));
        assert!((trade - 0.002).abs() < f64::EPSILON);

        let transfer = policy.leg_fee(&Asset::new("X", "BTC"), &Asset::new("Y", "BTC"));
        assert!((transfer - 0.01).abs() < f64::EPSILON);

        // Platform Y is not in the schedule, defaults apply
        let trade = policy.leg_fee(&Asset::new("Y", "BTC"), &Asset::new("Y", "ETH"));
        assert!((trade - DEFAULT_TRADE_FEE).abs() < f64::EPSILON);
        let transfer = policy.leg_fee(&Asset::new("Y", "BTC"), &Asset::new("X", "BTC"));
        assert!((transfer - DEFAULT_TRANSFER_FEE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_fee() {
        assert_eq!(FeeSchedule::default().invalid_fee(), None);

        let mut schedule = FeeSchedule {
            default_trade: -0.5,
            ..FeeSchedule::default()
        };
        assert_eq!(
            schedule.invalid_fee(),
            Some(("default_trade".to_string(), -0.5))
        );

        schedule.default_trade = 0.0;
        schedule.transfer.insert("X".to_string(), 1.0);
        assert_eq!(
            schedule.invalid_fee(),
            Some(("transfer.X".to_string(), 1.0))
        );

        schedule.transfer.clear();
        schedule.trade.insert("Y".to_string(), f64::INFINITY);
        assert_eq!(schedule.invalid_fee().map(|(name, _)| name).as_deref(), Some("trade.Y"));
    }

    #[test]
    fn test_schedule_deserializes_with_defaults() {
        let schedule: FeeSchedule =
            serde_json::from_str(r#"{ "trade": { "binance": 0.00075 } }"#).unwrap_or_default();
        assert!((schedule.trade_fee("binance") - 0.00075).abs() < f64::EPSILON);
        assert!((schedule.transfer_fee("binance") - DEFAULT_TRANSFER_FEE).abs() < f64::EPSILON);
    }
}
