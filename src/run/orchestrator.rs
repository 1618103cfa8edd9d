//! # Run Orchestrator
//!
//! A run walks from the start timestamp to the end timestamp in steps of the
//! primary granularity. Each step builds a graph snapshot, detects cycles,
//! trades the ones the strategy selects and hands back the accumulated state.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::request::{RunError, RunPlan, RunRequest};
use super::sink::ProgressSink;
use super::state::{RunState, RunStatus};
use crate::arb::detector::find_cycles;
use crate::arb::executor::Outcome;
use crate::arb::graph::GraphSnapshot;
use crate::quote::QuoteSource;

/// A simulation run over one quote source
pub struct Run<Q> {
    /// Request as submitted
    request: RunRequest,
    /// Rates for every step
    quotes: Q,
    /// Validated request, set by `start`
    plan: Option<RunPlan>,
    /// Next timestamp to step, `None` once the end was stepped
    next: Option<i64>,
    /// Accumulated output
    state: RunState,
    /// Validation failure, if any
    error: Option<RunError>,
}

impl<Q: QuoteSource> Run<Q> {
    /// Creates an idle run
    pub fn new(request: RunRequest, quotes: Q) -> Self {
        Self {
            request,
            quotes,
            plan: None,
            next: None,
            state: RunState::default(),
            error: None,
        }
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.state.status
    }

    /// Why the run failed
    #[must_use]
    pub const fn error(&self) -> Option<&RunError> {
        self.error.as_ref()
    }

    /// Output so far
    #[must_use]
    pub const fn state(&self) -> &RunState {
        &self.state
    }

    /// The request the run was created with
    #[must_use]
    pub const fn request(&self) -> &RunRequest {
        &self.request
    }

    /// Validates the request and moves to `Running`.
    ///
    /// # Errors
    ///
    /// Returns the validation error and moves to `Failed` if the request is
    /// invalid, or [`RunError::AlreadyStarted`] if the run is not idle.
    pub fn start(&mut self) -> Result<(), RunError> {
        if self.state.status != RunStatus::Idle {
            return Err(RunError::AlreadyStarted);
        }

        match self.request.validate() {
            Ok(plan) => {
                log::info!(
                    "run::start: {} assets from {} to {} every {}s, strategy {}",
                    plan.universe.len(),
                    plan.start,
                    plan.end,
                    plan.granularity,
                    plan.strategy
                );
                self.next = Some(plan.start);
                self.state.timestamp = plan.start;
                self.state.portfolio = plan.portfolio.clone();
                self.state.status = RunStatus::Running;
                self.plan = Some(plan);
                Ok(())
            }
            Err(e) => {
                log::error!("run::start: Rejected run request: {e}");
                self.state.status = RunStatus::Failed;
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Runs one step and returns the accumulated state, or `None` if the run
    /// is not running.
    pub fn step(&mut self) -> Option<RunState> {
        if self.state.status != RunStatus::Running {
            return None;
        }
        let (Some(plan), Some(timestamp)) = (&self.plan, self.next) else {
            return None;
        };

        let graph = GraphSnapshot::build(
            &plan.universe,
            timestamp,
            plan.granularity,
            &self.quotes,
            &plan.fees,
        );

        let ranked = find_cycles(&graph, plan.executor.min_spread);
        let found = ranked.len();
        let mut traded = 0;
        for cycle in &ranked {
            if !plan.strategy.wants_more(traded) {
                break;
            }
            if let Outcome::Executed(record) =
                plan.executor
                    .execute(cycle, &graph, &mut self.state.portfolio)
            {
                self.state.report.push(record);
                traded += 1;
            }
        }

        self.state.graphs.push(Arc::new(graph));
        self.state.timestamp = timestamp;
        self.state.steps += 1;

        if timestamp >= plan.end {
            self.state.progress = 100.0;
            self.state.status = RunStatus::Completed;
            self.next = None;
        } else {
            self.state.progress = progress(plan.start, plan.end, timestamp);
            self.next = Some(timestamp.saturating_add(plan.granularity).min(plan.end));
        }

        log::debug!(
            "run::step: t={} progress {:.1}% cycles {} traded {}",
            timestamp,
            self.state.progress,
            found,
            traded
        );
        if self.state.status == RunStatus::Completed {
            log::info!(
                "run::step: Completed after {} steps with {} trades",
                self.state.steps,
                self.state.report.len()
            );
        }

        Some(self.state.clone())
    }
}

/// Starts the run on first use, then yields one state per step
impl<Q: QuoteSource> Iterator for Run<Q> {
    type Item = RunState;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.status == RunStatus::Idle && self.start().is_err() {
            return None;
        }
        self.step()
    }
}

/// Percentage of `[start, end]` covered at `timestamp`, clamped to `[0, 100]`.
/// Differences are taken in `i128`, a range may span the whole of `i64`.
#[allow(clippy::cast_precision_loss)]
fn progress(start: i64, end: i64, timestamp: i64) -> f64 {
    let span = (i128::from(end) - i128::from(start)) as f64;
    let covered = (i128::from(timestamp) - i128::from(start)) as f64;
    (covered / span * 100.0).clamp(0.0, 100.0)
}

/// How a spawned run ended
#[derive(Debug)]
pub enum RunExit {
    /// Reached the end timestamp
    Completed(RunState),
    /// A newer run for the same id began, or the id was cleared
    Superseded,
    /// The request was rejected
    Failed(RunError),
}

/// Drives `run` on a blocking task, mirroring every state into `sink` under `run_id`.
///
/// The slot is reset before the task starts. The run stops as soon as its
/// generation goes stale.
pub fn spawn_run<Q>(sink: Arc<ProgressSink>, run_id: &str, mut run: Run<Q>) -> JoinHandle<RunExit>
where
    Q: QuoteSource + 'static,
{
    let generation = sink.begin(run_id);
    let run_id = run_id.to_string();

    tokio::task::spawn_blocking(move || {
        if let Err(e) = run.start() {
            sink.finish(&run_id, generation, RunStatus::Failed);
            return RunExit::Failed(e);
        }

        while let Some(state) = run.step() {
            if !sink.publish(&run_id, generation, state) {
                log::warn!("run::spawn_run: Run {run_id} generation {generation} superseded, stopping");
                return RunExit::Superseded;
            }
        }

        sink.finish(&run_id, generation, run.status());
        RunExit::Completed(run.state)
    })
}
