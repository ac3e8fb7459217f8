//! Per-member outcome of a finished group call.
//!
//! After `execute()` returns, the caller inspects a [`ResponseTally`] to
//! tell "timed out" from "suspected" per member: a failed call with
//! [`ResponseOutcome::NotReceived`] entries is a timeout, while
//! [`ResponseOutcome::Suspected`] entries were excluded by the failure
//! detector or a view change.

use {groupmesh_stack::member::MemberId, std::fmt};

/// What happened for one original target member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The member responded with this payload.
    Received(Vec<u8>),
    /// The member was suspected of having crashed.
    Suspected,
    /// No response arrived before the call finished.
    NotReceived,
}

/// Outcomes for every original target of one group call, in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseTally {
    entries: Vec<(MemberId, ResponseOutcome)>,
}

impl ResponseTally {
    /// Build a tally from per-member entries (in original target order).
    pub fn new(entries: Vec<(MemberId, ResponseOutcome)>) -> Self {
        Self { entries }
    }

    /// The outcome for one member, if it was an original target.
    pub fn get(&self, member: &MemberId) -> Option<&ResponseOutcome> {
        self.entries.iter().find(|(m, _)| m == member).map(|(_, o)| o)
    }

    /// Iterator over all entries in original target order.
    pub fn iter(&self) -> impl Iterator<Item = &(MemberId, ResponseOutcome)> {
        self.entries.iter()
    }

    /// Every received payload, paired with its sender.
    pub fn received(&self) -> impl Iterator<Item = (&MemberId, &[u8])> {
        self.entries.iter().filter_map(|(m, o)| match o {
            ResponseOutcome::Received(payload) => Some((m, payload.as_slice())),
            _ => None,
        })
    }

    /// Members that were suspected.
    pub fn suspected(&self) -> impl Iterator<Item = &MemberId> {
        self.entries.iter().filter_map(|(m, o)| {
            matches!(o, ResponseOutcome::Suspected).then_some(m)
        })
    }

    /// Members that never responded (timeout outcome on a failed call).
    pub fn not_received(&self) -> impl Iterator<Item = &MemberId> {
        self.entries.iter().filter_map(|(m, o)| {
            matches!(o, ResponseOutcome::NotReceived).then_some(m)
        })
    }

    /// Number of original targets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tally is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ResponseTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let received = self.received().count();
        let suspected = self.suspected().count();
        let missing = self.not_received().count();
        write!(
            f,
            "{} targets: {} received, {} suspected, {} not received",
            self.len(),
            received,
            suspected,
            missing
        )
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
