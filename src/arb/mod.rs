//! # Arbitrage Module
//!
//! This module contains core arbitrage detection and execution logic.
//! It builds the market graph at a timestamp, finds profitable conversion
//! loops and trades them against a simulated portfolio.

/// Assets and asset keys
pub mod asset;
/// Core cycle representation and ranking
pub mod cycle;
/// Negative cycle search
pub mod detector;
/// Trade execution against the portfolio
pub mod executor;
/// Per-platform fees
pub mod fees;
/// Market graph snapshots
pub mod graph;
/// Portfolio management
pub mod portfolio;
/// Test helpers and utilities
#[cfg(test)]
pub(crate) mod test_helpers;
