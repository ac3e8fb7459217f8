//! The blocking collector session.
//!
//! One [`QuorumRequest`] owns the state of one outstanding group call:
//! the original target list, a status slot per target, the bounded
//! suspect history, and the completion policy.  `execute()` blocks the
//! calling thread on a condition variable; the transport's correlation
//! layer and the failure detector feed `receive_response()`,
//! `suspect()`, and `view_change()` from their own threads.  A single
//! mutex serializes every mutation, so no callback ever observes a
//! partial update.
//!
//! Status slots move `NotReceived → Received` or `NotReceived →
//! Suspected` and never backward; a suspicion overrides an earlier
//! response (the response of a declared-dead member is untrusted), but
//! a response never un-suspects.

use {
    crate::{
        channel::RequestSender,
        config::QuorumConfig,
        error::{QuorumError, Result},
        policy::{ResponsePolicy, StatusCounts},
        request_id::RequestIdSource,
        suspects::BoundedSuspectList,
        tally::{ResponseOutcome, ResponseTally},
    },
    groupmesh_stack::{member::MemberId, message::Message, view::View},
    log::{debug, error, info, warn},
    parking_lot::{Condvar, Mutex},
    std::{
        sync::Arc,
        time::{Duration, Instant},
    },
};

/// Status of one original target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotStatus {
    NotReceived,
    Received(Vec<u8>),
    Suspected,
}

/// Mutable session state, guarded by the session mutex.
struct Session {
    request: Message,
    /// Original targets.  Never grows after construction or
    /// `reset_targets`; a member joining later could not have seen the
    /// request, so waiting on it would block forever.
    targets: Vec<MemberId>,
    /// One slot per original target, same order.
    status: Vec<SlotStatus>,
    /// Membership as of the last view change (starts as the targets).
    current_members: Vec<MemberId>,
    suspects: BoundedSuspectList,
    policy: ResponsePolicy,
    timeout: Duration,
    done: bool,
    req_id: u64,
}

impl Session {
    fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            received: 0,
            suspected: 0,
            not_received: 0,
        };
        for slot in &self.status {
            match slot {
                SlotStatus::Received(_) => counts.received = counts.received.saturating_add(1),
                SlotStatus::Suspected => counts.suspected = counts.suspected.saturating_add(1),
                SlotStatus::NotReceived => {
                    counts.not_received = counts.not_received.saturating_add(1)
                }
            }
        }
        counts
    }

    /// Re-derive suspicion from the tracked membership and history.
    /// Cheap safety net run on every wakeup: a target that left the
    /// group or sits in the suspect history must not stay NotReceived.
    fn adjust_membership(&mut self) {
        for (idx, target) in self.targets.iter().enumerate() {
            if self.status[idx] == SlotStatus::Suspected {
                continue;
            }
            if !self.current_members.contains(target) || self.suspects.contains(target) {
                self.suspects.insert(*target);
                self.status[idx] = SlotStatus::Suspected;
            }
        }
    }

    fn mark_suspected(&mut self, member: &MemberId) -> bool {
        let Some(idx) = self.targets.iter().position(|m| m == member) else {
            return false;
        };
        self.suspects.insert(*member);
        self.status[idx] = SlotStatus::Suspected;
        true
    }
}

/// A quorum-based group call: send once, wait for enough replies.
pub struct QuorumRequest {
    sender: RequestSender,
    ids: Arc<RequestIdSource>,
    inner: Mutex<Session>,
    satisfied: Condvar,
}

impl QuorumRequest {
    /// Create a session for `request` aimed at `targets`.
    ///
    /// Fails fast on an empty target set — there is nothing to wait
    /// for, and silently "succeeding" would mask a caller bug.
    pub fn new(
        request: Message,
        targets: Vec<MemberId>,
        policy: ResponsePolicy,
        sender: RequestSender,
        ids: Arc<RequestIdSource>,
        config: QuorumConfig,
    ) -> Result<Self> {
        if targets.is_empty() {
            return Err(QuorumError::NoTargets);
        }
        let status = vec![SlotStatus::NotReceived; targets.len()];
        let current_members = targets.clone();
        Ok(Self {
            sender,
            ids,
            inner: Mutex::new(Session {
                request,
                targets,
                status,
                current_members,
                suspects: BoundedSuspectList::new(config.max_suspects),
                policy,
                timeout: config.timeout,
                done: false,
                req_id: 0,
            }),
            satisfied: Condvar::new(),
        })
    }

    /// Send the request and block until the policy is satisfied or the
    /// timeout elapses.  Returns whether the call completed; on `false`
    /// the caller inspects [`Self::results`] to tell timed-out from
    /// suspected targets.  Communication errors are never propagated.
    pub fn execute(&self) -> bool {
        let mut session = self.inner.lock();
        session.done = false;
        session.req_id = self.ids.next();
        let req_id = session.req_id;

        // Fresh slate, except that known suspects stay suspected.
        for idx in 0..session.status.len() {
            let target = session.targets[idx];
            session.status[idx] = if session.suspects.contains(&target) {
                SlotStatus::Suspected
            } else {
                SlotStatus::NotReceived
            };
        }

        let collect = session.policy.expects_responses();
        if let Err(e) =
            self.sender
                .send_request(req_id, &session.targets, &session.request, collect)
        {
            error!("group request {req_id}: send failed: {e}");
            self.sender.done(req_id);
            session.done = true;
            return false;
        }
        debug!(
            "group request {req_id}: sent to {} targets, policy {}",
            session.targets.len(),
            session.policy
        );

        let completed = if session.timeout.is_zero() {
            self.wait_indefinitely(&mut session)
        } else {
            let timeout = session.timeout;
            self.wait_with_deadline(&mut session, timeout)
        };

        // Release server-side correlation state on every exit path.
        self.sender.done(req_id);
        session.done = true;
        if !completed {
            info!(
                "group request {req_id}: incomplete under policy {} ({:?})",
                session.policy,
                session.counts()
            );
        }
        completed
    }

    fn wait_indefinitely(&self, session: &mut parking_lot::MutexGuard<'_, Session>) -> bool {
        loop {
            session.adjust_membership();
            let counts = session.counts();
            if session.policy.is_satisfied(&counts) {
                return true;
            }
            self.satisfied.wait(session);
        }
    }

    fn wait_with_deadline(
        &self,
        session: &mut parking_lot::MutexGuard<'_, Session>,
        timeout: Duration,
    ) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait_indefinitely(session);
        };
        loop {
            session.adjust_membership();
            let counts = session.counts();
            if session.policy.is_satisfied(&counts) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            self.satisfied.wait_until(session, deadline);
        }
    }

    // ── Callbacks (correlation layer / failure detector threads) ────────

    /// A response arrived for this session's request id.
    ///
    /// Discarded when the session is already finished or when the
    /// sender sits in the suspect history; otherwise the sender's slot
    /// moves to Received exactly once (duplicates are no-ops).
    pub fn receive_response(&self, msg: &Message) {
        let mut session = self.inner.lock();
        if session.done {
            warn!("response from {} after completion; discarding", msg.src);
            return;
        }
        if session.suspects.contains(&msg.src) {
            warn!("response from suspected member {}; discarding", msg.src);
            return;
        }
        let Some(idx) = session.targets.iter().position(|m| *m == msg.src) else {
            warn!("response from non-target {}; discarding", msg.src);
            return;
        };
        if session.status[idx] == SlotStatus::NotReceived {
            session.status[idx] = SlotStatus::Received(msg.payload.clone());
            self.satisfied.notify_all();
        }
    }

    /// The failure detector suspects `member` of having crashed.  Any
    /// prior response from it is cleared; the waiters are woken so the
    /// policy can settle without it.
    pub fn suspect(&self, member: &MemberId) {
        let mut session = self.inner.lock();
        if session.mark_suspected(member) {
            debug!("member {member} suspected ({} in history)", session.suspects.len());
            self.satisfied.notify_all();
        }
    }

    /// A new view was installed.  Original targets missing from it are
    /// marked suspected.  Members new to the view are deliberately NOT
    /// added to the target set: they never received the request, so
    /// waiting on their response would block the call forever.
    pub fn view_change(&self, view: &View) {
        let mut session = self.inner.lock();
        if session.targets.is_empty() {
            return;
        }
        session.current_members = view.members().to_vec();
        let missing: Vec<MemberId> = session
            .targets
            .iter()
            .filter(|m| !view.contains(m))
            .copied()
            .collect();
        for member in missing {
            session.mark_suspected(&member);
        }
        self.satisfied.notify_all();
    }

    // ── Results and reuse ───────────────────────────────────────────────

    /// Per-member outcome for every original target.
    pub fn results(&self) -> ResponseTally {
        let session = self.inner.lock();
        let entries = session
            .targets
            .iter()
            .zip(session.status.iter())
            .map(|(member, slot)| {
                let outcome = match slot {
                    SlotStatus::Received(payload) => ResponseOutcome::Received(payload.clone()),
                    SlotStatus::Suspected => ResponseOutcome::Suspected,
                    SlotStatus::NotReceived => ResponseOutcome::NotReceived,
                };
                (*member, outcome)
            })
            .collect();
        ResponseTally::new(entries)
    }

    /// Re-arm a finished session for another call with a new request,
    /// policy, and timeout, keeping the target set and suspect history.
    pub fn reset(&self, request: Message, policy: ResponsePolicy, timeout: Duration) {
        let mut session = self.inner.lock();
        session.request = request;
        session.policy = policy;
        session.timeout = timeout;
        session.done = false;
        self.satisfied.notify_all();
    }

    /// Replace the target set (and status slots) for the next call.
    pub fn reset_targets(&self, targets: Vec<MemberId>) {
        let mut session = self.inner.lock();
        session.status = vec![SlotStatus::NotReceived; targets.len()];
        session.current_members = targets.clone();
        session.targets = targets;
        self.satisfied.notify_all();
    }

    /// Whether the last call has finished.
    pub fn is_done(&self) -> bool {
        self.inner.lock().done
    }

    /// Number of members in the suspect history.
    pub fn num_suspects(&self) -> usize {
        self.inner.lock().suspects.len()
    }

    /// Snapshot of the suspect history, oldest first.
    pub fn suspects(&self) -> Vec<MemberId> {
        self.inner.lock().suspects.members()
    }

    /// Request id of the current/last call (0 before the first call).
    pub fn request_id(&self) -> u64 {
        self.inner.lock().req_id
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
