/// An asset is a tradable instrument held on a specific platform.
/// The same symbol on two platforms is two different assets connected by a transfer leg.
use std::fmt::{self, Debug, Display};

use derive_more::Display as DeriveDisplay;
use eyre::{bail, Error};
use serde::{Deserialize, Serialize};

/// Key identifying an asset, formatted as `{platform}_{symbol}`
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, DeriveDisplay, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(pub String);

impl Debug for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `(platform, symbol)` pair
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Asset {
    /// Exchange the asset is held on
    pub platform: String,
    /// Instrument symbol, e.g. `BTC`
    pub symbol: String,
}

impl Asset {
    /// Creates a new asset
    pub fn new(platform: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            symbol: symbol.into(),
        }
    }

    /// Returns the `{platform}_{symbol}` key of the asset
    #[must_use]
    pub fn key(&self) -> AssetKey {
        AssetKey(format!("{}_{}", self.platform, self.symbol))
    }

    /// Whether an exchange leg between the two assets is possible.
    /// Two distinct assets are connected iff they share a platform or a symbol.
    #[must_use]
    pub fn is_connected_to(&self, other: &Self) -> bool {
        self != other && (self.platform == other.platform || self.symbol == other.symbol)
    }

    /// Whether moving from `self` to `other` is a transfer between platforms
    #[must_use]
    pub fn is_transfer_to(&self, other: &Self) -> bool {
        self.platform != other.platform && self.symbol == other.symbol
    }
}

impl Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.platform)
    }
}

impl Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.platform)
    }
}

impl TryFrom<&str> for Asset {
    type Error = Error;

    /// Parses a `{platform}_{symbol}` key. The platform ends at the first underscore.
    fn try_from(key: &str) -> Result<Self, Self::Error> {
        match key.split_once('_') {
            Some((platform, symbol)) if !platform.is_empty() && !symbol.is_empty() => {
                Ok(Self::new(platform, symbol))
            }
            _ => bail!("Invalid asset key '{key}', expected <platform>_<symbol>"),
        }
    }
}

impl From<&Asset> for AssetKey {
    fn from(asset: &Asset) -> Self {
        asset.key()
    }
}

/// Builds the asset universe: every symbol on every platform, platform-major.
/// Node indices of a graph snapshot follow this order.
#[must_use]
pub fn universe(platforms: &[String], symbols: &[String]) -> Vec<Asset> {
    platforms
        .iter()
        .flat_map(|platform| symbols.iter().map(move |symbol| Asset::new(platform, symbol)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_and_display() {
        let asset = Asset::new("binance", "BTC");
        assert_eq!(asset.key(), AssetKey("binance_BTC".to_string()));
        assert_eq!(asset.to_string(), "BTC@binance");
    }

    #[test]
    fn test_parse_key() {
        let asset = Asset::try_from("kraken_ETH").unwrap();
        assert_eq!(asset, Asset::new("kraken", "ETH"));

        // Symbols may contain underscores, platforms may not
        let asset = Asset::try_from("kraken_USD_T").unwrap();
        assert_eq!(asset.symbol, "USD_T");

        assert_eq!(
            Asset::try_from("kraken").err().unwrap().to_string(),
            "Invalid asset key 'kraken', expected <platform>_<symbol>"
        );
        assert!(Asset::try_from("_BTC").is_err());
    }

    #[test]
    fn test_connectivity() {
        let btc_x = Asset::new("X", "BTC");
        let eth_x = Asset::new("X", "ETH");
        let btc_y = Asset::new("Y", "BTC");
        let eth_y = Asset::new("Y", "ETH");

        assert!(btc_x.is_connected_to(&eth_x));
        assert!(btc_x.is_connected_to(&btc_y));
        assert!(!btc_x.is_connected_to(&eth_y));
        assert!(!btc_x.is_connected_to(&btc_x));

        assert!(btc_x.is_transfer_to(&btc_y));
        assert!(!btc_x.is_transfer_to(&eth_x));
    }

    #[test]
    fn test_universe_order() {
        let platforms = vec!["X".to_string(), "Y".to_string()];
        let symbols = vec!["BTC".to_string(), "ETH".to_string()];
        let assets = universe(&platforms, &symbols);
        assert_eq!(
            assets,
            vec![
                Asset::new("X", "BTC"),
                Asset::new("X", "ETH"),
                Asset::new("Y", "BTC"),
                Asset::new("Y", "ETH"),
            ]
        );
    }
}
