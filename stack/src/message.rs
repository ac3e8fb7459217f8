//! The message unit moved by the transport below.
//!
//! A [`Message`] carries an opaque payload from a source member to either
//! one member or the whole group.  Protocol layers that need their own
//! metadata (sequence numbers, correlation ids) wrap messages in their
//! own closed wire types rather than attaching headers to this one.

use {
    crate::member::MemberId,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Where a message is going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// Every member of the current view.
    All,
    /// A single member.
    Member(MemberId),
}

impl Destination {
    /// Whether this destination addresses the whole group.
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Member(m) => write!(f, "{m}"),
        }
    }
}

/// One message: source, destination, opaque payload.
///
/// The payload is immutable once the message is built; layers pass the
/// message along or consume it, they never rewrite it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The sending member.
    pub src: MemberId,
    /// A single member or the whole group.
    pub dest: Destination,
    /// Opaque application bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Build a broadcast message.
    pub fn broadcast(src: MemberId, payload: Vec<u8>) -> Self {
        Self {
            src,
            dest: Destination::All,
            payload,
        }
    }

    /// Build a unicast message.
    pub fn unicast(src: MemberId, dest: MemberId, payload: Vec<u8>) -> Self {
        Self {
            src,
            dest: Destination::Member(dest),
            payload,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
