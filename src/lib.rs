/*!
 * # Arbsim - Arbitrage Detection and Trading Simulation
 *
 * Arbsim models tradable assets as nodes of a weighted graph whose edges are
 * exchange rates, searches each snapshot for profitable conversion loops and
 * trades them against a simulated portfolio over a time window.
 *
 * ## Core Features
 *
 * - **Graph Snapshots**: Quoted trade and transfer legs weighted by log rate
 * - **Cycle Detection**: Bellman-Ford negative cycle search on every snapshot
 * - **Execution Simulation**: Ratio-limited trades with per-platform fees
 * - **Progress Streaming**: Runs publish every step to a pollable sink
 *
 * ## Module Structure
 *
 * - `arb`: Graph construction, cycle detection and trade execution
 * - `config`: Configuration management for the system
 * - `quote`: Quote sources
 * - `run`: Time-stepped runs and the progress sink
 * - `utils`: Utility functions and helpers
 */

/// Arbitrage detection and execution logic
pub mod arb;
/// Configuration management for the system
pub mod config;
/// Exchange rate sources
pub mod quote;
/// Simulation runs
pub mod run;
/// Utility functions and helpers
pub mod utils;
