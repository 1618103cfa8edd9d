//! Latest-state slots for polling runs from outside the run task.
//!
//! Every `begin` or `clear` bumps the generation of a run id. Writes carrying
//! an older generation are dropped, so a superseded run can never overwrite
//! the state of the run that replaced it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::state::{RunState, RunStatus};

/// Generation of a run id, issued by [`ProgressSink::begin`]
pub type Generation = u64;

/// What a poller sees for a run id
#[derive(Debug, Clone)]
pub struct Progress {
    /// Current status
    pub status: RunStatus,
    /// Latest published state, `None` before the first step
    pub state: Option<Arc<RunState>>,
}

impl Progress {
    /// Progress percentage, zero before the first step
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.state.as_ref().map_or(0.0, |state| state.progress)
    }
}

/// Slot of one run id
#[derive(Debug)]
struct Slot {
    /// Generation that owns the slot
    generation: Generation,
    /// Last status written
    status: RunStatus,
    /// Last state written
    state: Option<Arc<RunState>>,
}

/// Slots and generations, guarded together
#[derive(Debug, Default)]
struct Slots {
    /// Latest generation per run id. Entries outlive `clear` so generations of
    /// an id never repeat, which makes the map grow with the number of ids used
    generations: HashMap<String, Generation>,
    /// Live slots
    slots: HashMap<String, Slot>,
}

impl Slots {
    /// Advances the generation of `run_id`
    fn bump(&mut self, run_id: &str) -> Generation {
        let generation = self.generations.entry(run_id.to_string()).or_default();
        *generation += 1;
        *generation
    }

    /// The slot of `run_id` if `generation` still owns it
    fn owned(&mut self, run_id: &str, generation: Generation) -> Option<&mut Slot> {
        self.slots
            .get_mut(run_id)
            .filter(|slot| slot.generation == generation)
    }
}

/// Map of run id to its latest published state
#[derive(Debug, Default)]
pub struct ProgressSink {
    /// Guarded state
    inner: Mutex<Slots>,
}

impl ProgressSink {
    /// Creates an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the slot of `run_id` for a new run and returns its generation.
    /// Writes from earlier generations are ignored from here on.
    pub fn begin(&self, run_id: &str) -> Generation {
        let mut inner = self.inner.lock();
        let generation = inner.bump(run_id);
        inner.slots.insert(
            run_id.to_string(),
            Slot {
                generation,
                status: RunStatus::Idle,
                state: None,
            },
        );
        log::debug!("run::sink: Began {run_id} generation {generation}");
        generation
    }

    /// Swaps in the latest state. Returns false if `generation` is stale.
    pub fn publish(&self, run_id: &str, generation: Generation, state: RunState) -> bool {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.owned(run_id, generation) else {
            log::debug!("run::sink: Dropped stale publish for {run_id} generation {generation}");
            return false;
        };
        slot.status = state.status;
        slot.state = Some(Arc::new(state));
        true
    }

    /// Records the final status. Returns false if `generation` is stale.
    pub fn finish(&self, run_id: &str, generation: Generation, status: RunStatus) -> bool {
        let mut inner = self.inner.lock();
        match inner.owned(run_id, generation) {
            Some(slot) => {
                slot.status = status;
                true
            }
            None => false,
        }
    }

    /// Latest progress of `run_id`, `None` if nothing was begun or it was cleared
    #[must_use]
    pub fn read(&self, run_id: &str) -> Option<Progress> {
        self.inner.lock().slots.get(run_id).map(|slot| Progress {
            status: slot.status,
            state: slot.state.clone(),
        })
    }

    /// Whether `generation` still owns `run_id`
    #[must_use]
    pub fn is_current(&self, run_id: &str, generation: Generation) -> bool {
        self.inner.lock().owned(run_id, generation).is_some()
    }

    /// Empties the slot of `run_id` and invalidates its generation. Clearing
    /// an empty slot is a no-op beyond the generation bump.
    pub fn clear(&self, run_id: &str) {
        let mut inner = self.inner.lock();
        inner.bump(run_id);
        if inner.slots.remove(run_id).is_some() {
            log::debug!("run::sink: Cleared {run_id}");
        }
    }
}
