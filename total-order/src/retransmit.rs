//! Per-request retransmission tasks.
//!
//! Every broadcast awaiting its sequencer grant owns one repeating task
//! keyed by its local sequence id.  The grant acknowledges the id and
//! cancels the task; `reset` tears everything down on stop or
//! disconnect.

use {
    dashmap::DashMap,
    groupmesh_stack::scheduler::{Scheduler, TaskHandle},
    log::debug,
    std::time::Duration,
};

/// Tracks one repeating retransmission task per outstanding request.
pub struct Retransmitter {
    scheduler: Scheduler,
    intervals: Vec<Duration>,
    tasks: DashMap<u64, TaskHandle>,
}

impl Retransmitter {
    /// Create a retransmitter firing on the given backoff schedule.
    pub fn new(intervals: Vec<Duration>) -> Self {
        Self {
            scheduler: Scheduler::new(),
            intervals,
            tasks: DashMap::new(),
        }
    }

    /// Start retransmitting for `local_seq`.  Returns false (and starts
    /// nothing) when a task for that id already runs.
    pub fn add<F>(&self, local_seq: u64, task: F) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        match self.tasks.entry(local_seq) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(self.scheduler.schedule_repeating(self.intervals.clone(), task));
                true
            }
        }
    }

    /// Acknowledge `local_seq`: cancel and forget its task.  Returns
    /// whether a task existed.
    pub fn ack(&self, local_seq: u64) -> bool {
        match self.tasks.remove(&local_seq) {
            Some((_, handle)) => {
                handle.cancel();
                debug!("retransmission for request {local_seq} acknowledged");
                true
            }
            None => false,
        }
    }

    /// Cancel every outstanding task.
    pub fn reset(&self) {
        self.tasks.retain(|_, handle| {
            handle.cancel();
            false
        });
    }

    /// Number of requests still awaiting acknowledgement.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is outstanding.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
