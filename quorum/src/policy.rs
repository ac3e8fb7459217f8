//! Completion policies.
//!
//! A policy decides, from the per-member status counts of a session,
//! whether a group call is complete.  The predicate is re-evaluated on
//! every wakeup of the blocked caller, so it must be a pure function of
//! the counts.

use std::fmt;

/// Snapshot of a session's per-member status counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    /// Members whose response has arrived.
    pub received: usize,
    /// Members suspected of having crashed.
    pub suspected: usize,
    /// Members still outstanding.
    pub not_received: usize,
}

impl StatusCounts {
    /// Total number of original targets.
    pub fn total(&self) -> usize {
        self.received
            .saturating_add(self.suspected)
            .saturating_add(self.not_received)
    }
}

/// How many responses constitute "enough" for one group call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePolicy {
    /// Complete on the first response, or once every target is suspected.
    First,
    /// Complete once every non-suspected target has responded.
    All,
    /// Complete once received + suspected reaches a majority of the
    /// original target count.  Suspicions count toward the majority, so
    /// crashed members cannot block the call.
    Majority,
    /// Complete once received alone reaches a majority of the original
    /// target count.  Suspicions are ignored: with a crashed majority
    /// this blocks until timeout.
    AbsoluteMajority,
    /// Complete once `n` responses have arrived.  With `n` at or above
    /// the target count this behaves as [`Self::All`]; when suspicions
    /// make `n` responses unreachable, the call completes as soon as
    /// received + suspected covers `n`.
    AtLeast(usize),
    /// Fire and forget: complete immediately, collect nothing.
    FireAndForget,
}

impl ResponsePolicy {
    /// Majority of `n` original targets: `n` itself below 2, else
    /// `n/2 + 1`.
    pub fn majority(n: usize) -> usize {
        if n < 2 {
            n
        } else {
            (n / 2).saturating_add(1)
        }
    }

    /// Whether the call is complete under this policy.
    pub fn is_satisfied(&self, counts: &StatusCounts) -> bool {
        let total = counts.total();
        match *self {
            Self::First => counts.received > 0 || counts.suspected >= total,
            Self::All => counts.not_received == 0,
            Self::Majority => {
                counts.received.saturating_add(counts.suspected) >= Self::majority(total)
            }
            Self::AbsoluteMajority => counts.received >= Self::majority(total),
            Self::AtLeast(n) => {
                if n >= total {
                    return Self::All.is_satisfied(counts);
                }
                if counts.received >= n {
                    return true;
                }
                // Not enough live targets left to ever reach n responses:
                // settle for responses + suspicions covering n.
                if counts.received.saturating_add(counts.not_received) < n {
                    return counts.received.saturating_add(counts.suspected) >= n;
                }
                false
            }
            Self::FireAndForget => true,
        }
    }

    /// Whether this policy expects any responses at all.
    pub fn expects_responses(&self) -> bool {
        !matches!(self, Self::FireAndForget)
    }
}

impl fmt::Display for ResponsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::All => write!(f, "all"),
            Self::Majority => write!(f, "majority"),
            Self::AbsoluteMajority => write!(f, "absolute_majority"),
            Self::AtLeast(n) => write!(f, "at_least({n})"),
            Self::FireAndForget => write!(f, "fire_and_forget"),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
