//! Bounded FIFO history of suspected members.
//!
//! The collector remembers which members have been declared suspect so
//! that (a) responses from declared-dead members are discarded and (b) a
//! reused session pre-marks known suspects.  The history is a memory
//! bound, not a correctness requirement: once full, the oldest entry is
//! evicted first.

use {
    groupmesh_stack::member::MemberId,
    std::collections::{HashSet, VecDeque},
};

/// Fixed-capacity FIFO set of suspected members.
///
/// Insertion order is preserved; duplicates are ignored; inserting into
/// a full history evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct BoundedSuspectList {
    order: VecDeque<MemberId>,
    present: HashSet<MemberId>,
    capacity: usize,
}

impl BoundedSuspectList {
    /// Create a history holding at most `capacity` members.
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            present: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a suspect.  Returns true if the member was newly added.
    pub fn insert(&mut self, member: MemberId) -> bool {
        if self.capacity == 0 || self.present.contains(&member) {
            return false;
        }
        self.order.push_back(member);
        self.present.insert(member);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.present.remove(&evicted);
            }
        }
        true
    }

    /// Whether `member` is currently in the history.
    pub fn contains(&self, member: &MemberId) -> bool {
        self.present.contains(member)
    }

    /// Number of suspects currently remembered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snapshot of the history, oldest first.
    pub fn members(&self) -> Vec<MemberId> {
        self.order.iter().copied().collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut list = BoundedSuspectList::new(4);
        let m = MemberId::new_unique();
        assert!(list.insert(m));
        assert!(list.contains(&m));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_ignored() {
        let mut list = BoundedSuspectList::new(4);
        let m = MemberId::new_unique();
        assert!(list.insert(m));
        assert!(!list.insert(m));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let mut list = BoundedSuspectList::new(3);
        let members: Vec<MemberId> = (0..5).map(|_| MemberId::new_unique()).collect();
        for m in &members {
            list.insert(*m);
        }
        assert_eq!(list.len(), 3);
        // The two oldest are gone, the three newest remain in order.
        assert!(!list.contains(&members[0]));
        assert!(!list.contains(&members[1]));
        assert_eq!(list.members(), members[2..].to_vec());
    }

    #[test]
    fn test_zero_capacity_accepts_nothing() {
        let mut list = BoundedSuspectList::new(0);
        assert!(!list.insert(MemberId::new_unique()));
        assert!(list.is_empty());
    }
}
