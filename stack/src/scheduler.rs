//! Cancellable repeating tasks.
//!
//! Protocol layers must never run private sleep loops for
//! retransmission; they register a task with a [`Scheduler`] and hold
//! the returned [`TaskHandle`].  A task fires repeatedly on a backoff
//! schedule — after the schedule is exhausted the last interval
//! repeats — until its handle is cancelled.  Cancellation is
//! idempotent and takes effect at the next wakeup at the latest.

use {
    log::error,
    parking_lot::{Condvar, Mutex},
    std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    },
};

/// Shared cancellation flag between a handle and its worker thread.
#[derive(Default)]
struct TaskState {
    cancelled: Mutex<bool>,
    wakeup: Condvar,
}

/// Handle to a scheduled task.  Dropping the handle does NOT cancel the
/// task; cancellation is always explicit.
pub struct TaskHandle {
    state: Arc<TaskState>,
}

impl TaskHandle {
    /// Stop the task.  Safe to call more than once; the first call wins.
    pub fn cancel(&self) {
        let mut cancelled = self.state.cancelled.lock();
        *cancelled = true;
        self.state.wakeup.notify_all();
    }

    /// Whether the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.state.cancelled.lock()
    }

    /// A handle that was never backed by a running task.
    fn dead() -> Self {
        let state = Arc::new(TaskState {
            cancelled: Mutex::new(true),
            wakeup: Condvar::new(),
        });
        Self { state }
    }
}

/// Runs cancellable repeating tasks, one worker thread per task.
///
/// The task count here is small and bounded (one per unacknowledged
/// broadcast request), so a thread per task keeps the wakeup logic
/// trivially correct.
#[derive(Debug, Default)]
pub struct Scheduler;

impl Scheduler {
    /// Create a scheduler.
    pub fn new() -> Self {
        Self
    }

    /// Run `task` repeatedly: wait `intervals[0]`, fire, wait
    /// `intervals[1]`, fire, … repeating the last interval once the
    /// schedule is exhausted.  Returns the task's cancellation handle.
    ///
    /// An empty schedule is a configuration error: the task is not
    /// started and the returned handle is already cancelled.
    pub fn schedule_repeating<F>(&self, intervals: Vec<Duration>, mut task: F) -> TaskHandle
    where
        F: FnMut() + Send + 'static,
    {
        if intervals.is_empty() {
            error!("schedule_repeating called with an empty interval schedule");
            return TaskHandle::dead();
        }

        let state = Arc::new(TaskState::default());
        let worker_state = Arc::clone(&state);

        let spawned = thread::Builder::new()
            .name("gmScheduler".to_string())
            .spawn(move || {
                let mut idx = 0usize;
                loop {
                    let interval = intervals[idx.min(intervals.len().saturating_sub(1))];
                    if wait_or_cancel(&worker_state, interval) {
                        break;
                    }
                    task();
                    idx = idx.saturating_add(1);
                }
            });

        match spawned {
            Ok(_) => TaskHandle { state },
            Err(e) => {
                error!("failed to spawn scheduler thread: {e}");
                TaskHandle::dead()
            }
        }
    }
}

/// Sleep for `interval` unless cancelled first.  Returns true when the
/// task was cancelled.
fn wait_or_cancel(state: &TaskState, interval: Duration) -> bool {
    let mut cancelled = state.cancelled.lock();
    if *cancelled {
        return true;
    }
    let Some(deadline) = Instant::now().checked_add(interval) else {
        // Unreachable for sane intervals; treat as cancellation.
        return true;
    };
    loop {
        if Instant::now() >= deadline {
            return *cancelled;
        }
        state.wakeup.wait_until(&mut cancelled, deadline);
        if *cancelled {
            return true;
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
