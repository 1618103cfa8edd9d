//! # Run Module
//!
//! Time-stepped simulation runs and the sink their progress is polled from.

/// Step loop and state machine
pub mod orchestrator;
/// Run requests and their validation
pub mod request;
/// Latest-state slots per run id
pub mod sink;
/// Run output types
pub mod state;
/// Cycle selection per step
pub mod strategy;

pub use orchestrator::{spawn_run, Run, RunExit};
pub use request::{RunError, RunPlan, RunRequest};
pub use sink::{Generation, Progress, ProgressSink};
pub use state::{PriceHistory, Report, ReportBucket, RunState, RunStatus};
pub use strategy::Strategy;
