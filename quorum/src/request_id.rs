//! Monotonic request ids.
//!
//! Every group call carries a fresh request id so the correlation layer
//! can route responses back to the right session.  Ids are strictly
//! increasing within a process and at least the wall-clock time (in
//! milliseconds) at the moment of issue, so they also order calls
//! across process restarts well enough for log correlation.  The source
//! is an injected value, not a global: callers share one instance per
//! process via `Arc`.

use {
    parking_lot::Mutex,
    std::time::{SystemTime, UNIX_EPOCH},
};

/// Issues strictly increasing request ids.
#[derive(Debug, Default)]
pub struct RequestIdSource {
    last: Mutex<u64>,
}

impl RequestIdSource {
    /// Create a fresh source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id: at least the current wall-clock milliseconds and always
    /// strictly greater than every id issued before it, even under
    /// clock ties or clock regression.
    pub fn next(&self) -> u64 {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let mut last = self.last.lock();
        let id = now_ms.max(last.saturating_add(1));
        *last = id;
        id
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
