//! Membership views.
//!
//! A [`View`] is an agreed, immutable snapshot of the group: a
//! monotonically increasing id plus an ordered member list.  Views are
//! produced by an external membership service on every join, leave, or
//! crash; protocol layers only ever read them.  The member at position
//! zero is the view's coordinator and doubles as the total-order
//! sequencer.

use {
    crate::member::MemberId,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// An immutable membership snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// Monotonically increasing view id.  Externally assigned; a higher
    /// id always denotes a later view.
    id: u64,
    /// The agreed, ordered member list.  Position 0 is the coordinator.
    members: Vec<MemberId>,
}

impl View {
    /// Create a view from its externally-agreed id and member list.
    pub fn new(id: u64, members: Vec<MemberId>) -> Self {
        Self { id, members }
    }

    /// The view id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The ordered member list.
    pub fn members(&self) -> &[MemberId] {
        &self.members
    }

    /// The coordinator: first member of the list, if any.
    pub fn coordinator(&self) -> Option<&MemberId> {
        self.members.first()
    }

    /// Whether `member` belongs to this view.
    pub fn contains(&self, member: &MemberId) -> bool {
        self.members.contains(member)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the view is empty (degenerate, but representable).
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view {} ({} members)", self.id, self.members.len())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
