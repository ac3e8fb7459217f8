//! Operating states of the total-order layer.

use std::fmt;

/// Lifecycle state.  The layer starts in `Null`, enters `Run` when the
/// first view is installed, and cycles through `Flush`/`Block` during a
/// membership change before the next view returns it to `Run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingState {
    /// Not yet started, or stopped.  All traffic is dropped.
    Null,
    /// Normal operation.
    Run,
    /// Flush in progress: no new broadcasts are accepted, but pending
    /// traffic (retransmissions, grants, deliveries) still moves so the
    /// group can drain in-flight messages.
    Flush,
    /// Blocked for a view installation: sequencer traffic is parked.
    Block,
}

impl OperatingState {
    /// Whether new application broadcasts are accepted.  A flush still
    /// accepts them: they enter the request path and drain with the
    /// rest of the in-flight traffic.
    pub fn accepts_sends(&self) -> bool {
        matches!(self, Self::Run | Self::Flush)
    }
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Run => "run",
            Self::Flush => "flush",
            Self::Block => "block",
        };
        write!(f, "{name}")
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
