use std::env;
use std::path::PathBuf;
use std::time::Duration;

use eyre::{Result, WrapErr};
use log::LevelFilter;

/// Default interval between progress polls
const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
/// Default directory reports are written to
const DEFAULT_OUTPUT_DIR: &str = "reports";

/// Application settings read from the environment.
///
/// Values come from the process environment, with a `.env` file in the
/// working directory loaded first. CLI flags override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum log level (`ARBSIM_LOG_LEVEL`, falling back to `RUST_LOG`)
    pub log_level: LevelFilter,
    /// How often the progress poller reads the sink (`ARBSIM_POLL_INTERVAL_MS`)
    pub poll_interval: Duration,
    /// Where run reports are written (`ARBSIM_OUTPUT_DIR`)
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Info,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads the configuration from the environment.
    ///
    /// # Errors
    /// * If `ARBSIM_LOG_LEVEL` is not a log level
    /// * If `ARBSIM_POLL_INTERVAL_MS` is not a whole number of milliseconds
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the configuration from a variable lookup
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(level) = var("ARBSIM_LOG_LEVEL") {
            config.log_level = level
                .parse()
                .wrap_err_with(|| format!("Invalid log level '{level}'"))?;
        } else if let Some(level) = var("RUST_LOG").and_then(|level| level.parse().ok()) {
            // RUST_LOG may carry per-module directives, only a bare level is used
            config.log_level = level;
        }

        if let Some(interval) = var("ARBSIM_POLL_INTERVAL_MS") {
            let millis: u64 = interval
                .parse()
                .wrap_err_with(|| format!("Invalid ARBSIM_POLL_INTERVAL_MS '{interval}'"))?;
            config.poll_interval = Duration::from_millis(millis.max(1));
        }

        if let Some(dir) = var("ARBSIM_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]).unwrap(), Config::default());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("ARBSIM_LOG_LEVEL", "debug"),
            ("ARBSIM_POLL_INTERVAL_MS", "50"),
            ("ARBSIM_OUTPUT_DIR", "/tmp/out"),
        ])
        .unwrap();
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_rust_log_fallback() {
        let config = config(&[("RUST_LOG", "warn")]).unwrap();
        assert_eq!(config.log_level, LevelFilter::Warn);
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            config(&[("ARBSIM_LOG_LEVEL", "loud")])
                .err()
                .unwrap()
                .to_string(),
            "Invalid log level 'loud'"
        );
        assert!(config(&[("ARBSIM_POLL_INTERVAL_MS", "soon")]).is_err());
    }
}
