//! Configuration for a quorum collector session.

use std::time::Duration;

/// Tunables for one [`crate::request::QuorumRequest`].
///
/// Supplied programmatically at construction time; there is no file or
/// CLI surface in this crate.
#[derive(Debug, Clone)]
pub struct QuorumConfig {
    /// How long `execute()` waits for the policy to be satisfied.
    /// `Duration::ZERO` means wait forever (sensible when a failure
    /// detector feeds `suspect()`, so crashed members cannot block the
    /// call indefinitely).
    pub timeout: Duration,

    /// Capacity of the bounded suspect history.  Oldest entries are
    /// evicted first; this bounds memory, it is not a correctness knob.
    pub max_suspects: usize,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            max_suspects: 40,
        }
    }
}

impl QuorumConfig {
    /// Config suitable for local testing: short finite timeout, tiny
    /// suspect history.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            max_suspects: 4,
        }
    }
}
