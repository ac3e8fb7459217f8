//! Member identity.
//!
//! A [`MemberId`] names one process in the group.  It is opaque to every
//! protocol layer: the only operations are equality, ordering, hashing,
//! and display.  Ordering is bytewise and stable across processes, so
//! any two members sort a member list identically.

use {
    serde::{Deserialize, Serialize},
    std::{
        fmt,
        sync::atomic::{AtomicU64, Ordering},
    },
};

/// Width of a member identity in bytes.
pub const MEMBER_ID_BYTES: usize = 16;

/// Opaque identity of a group member.
///
/// Wire-comparable: equality and ordering are defined on the raw bytes
/// and are consistent with hashing.  Immutable once created.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct MemberId([u8; MEMBER_ID_BYTES]);

impl MemberId {
    /// Build an identity from raw bytes (e.g. handed up by the transport).
    pub const fn new(bytes: [u8; MEMBER_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Return the raw identity bytes.
    pub const fn as_bytes(&self) -> &[u8; MEMBER_ID_BYTES] {
        &self.0
    }

    /// Generate a process-locally unique identity.
    ///
    /// Useful for tests and for bootstrapping a member before the
    /// transport assigns it a real address-derived identity.
    pub fn new_unique() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; MEMBER_ID_BYTES];
        bytes[..8].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; MEMBER_ID_BYTES]> for MemberId {
    fn from(bytes: [u8; MEMBER_ID_BYTES]) -> Self {
        Self(bytes)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ids_differ() {
        let a = MemberId::new_unique();
        let b = MemberId::new_unique();
        assert_ne!(a, b);
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let lo = MemberId::new([0u8; MEMBER_ID_BYTES]);
        let mut hi_bytes = [0u8; MEMBER_ID_BYTES];
        hi_bytes[0] = 1;
        let hi = MemberId::new(hi_bytes);
        assert!(lo < hi);
        assert_eq!(lo.cmp(&lo), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_display_is_hex() {
        let id = MemberId::new([0xab; MEMBER_ID_BYTES]);
        let s = id.to_string();
        assert_eq!(s.len(), MEMBER_ID_BYTES.saturating_mul(2));
        assert!(s.starts_with("abab"));
    }
}
