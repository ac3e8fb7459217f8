//! Configuration of the total-order layer.

use std::time::Duration;

/// Backoff schedule applied to unacknowledged sequence requests: wait
/// 1s, 2s, 3s, then every 4s until the grant arrives.
const DEFAULT_RETRANSMIT_INTERVALS: [Duration; 4] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(3),
    Duration::from_secs(4),
];

/// Tunables of the total-order layer.
#[derive(Debug, Clone)]
pub struct TotalOrderConfig {
    /// Retransmission backoff for sequence requests awaiting a grant.
    /// After the schedule is exhausted the last interval repeats.  Must
    /// not be empty.
    pub retransmit_intervals: Vec<Duration>,
}

impl Default for TotalOrderConfig {
    fn default() -> Self {
        Self {
            retransmit_intervals: DEFAULT_RETRANSMIT_INTERVALS.to_vec(),
        }
    }
}

impl TotalOrderConfig {
    /// Aggressive timings so tests observe retransmissions quickly.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default() -> Self {
        Self {
            retransmit_intervals: vec![Duration::from_millis(20), Duration::from_millis(20)],
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
