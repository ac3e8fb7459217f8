//! Sequencer-based total-order broadcast.
//!
//! Every broadcast takes three hops: the sender unicasts a sequence
//! REQUEST to the sequencer (the view coordinator), the sequencer
//! unicasts back a REPLY granting the next group-wide order number, and
//! the sender then broadcasts the message stamped with that number.
//! Receivers deliver strictly in order-number sequence, buffering
//! anything that arrives early.
//!
//! Requests are retransmitted on a backoff schedule until granted.  A
//! retransmitted request can be granted twice; the duplicate grant is
//! answered with a placeholder broadcast that burns the extra order
//! number so no receiver waits on it forever.
//!
//! The layer talks to its neighbours through channels: frames for the
//! transport go out on `down_tx`, delivered application messages go up
//! on `up_tx`, and the transport feeds received frames into
//! [`TotalOrder::handle_frame`].

use {
    crate::{
        config::TotalOrderConfig,
        error::{Result, TotalOrderError},
        retransmit::Retransmitter,
        state::OperatingState,
        wire::{OrderFrame, OrderHeader},
    },
    crossbeam_channel::Sender,
    dashmap::DashMap,
    groupmesh_stack::{member::MemberId, message::Message, view::View},
    log::{debug, error, info, warn},
    parking_lot::{Mutex, RwLock},
    std::{
        collections::BTreeMap,
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, Weak,
        },
    },
};

/// Roles and lifecycle, swapped atomically on view changes.
struct Mode {
    state: OperatingState,
    local: Option<MemberId>,
    sequencer: Option<MemberId>,
}

/// A broadcast received but not yet deliverable.
struct BufferedBcast {
    /// Placeholders advance the delivery counter without reaching the
    /// application.
    placeholder: bool,
    body: Message,
}

/// Receive-side delivery state.
struct UpState {
    /// Highest order number delivered so far.
    delivered: u64,
    /// Early arrivals keyed by order number.
    pending: BTreeMap<u64, BufferedBcast>,
}

struct Shared {
    mode: RwLock<Mode>,
    /// Next local request id to hand out.
    local_seq: AtomicU64,
    /// Sequencer side: next order number to grant.
    order_counter: AtomicU64,
    up: Mutex<UpState>,
    /// Sender side: messages awaiting their grant, keyed by local id.
    pending_requests: DashMap<u64, Message>,
    retransmitter: Retransmitter,
    down_tx: Sender<OrderFrame>,
    up_tx: Sender<Message>,
}

impl Shared {
    /// Unicast a sequence request for `local_seq` to the sequencer
    /// known by `mode`.  The caller holds the mode lock; no lock is
    /// taken here, so this is safe from the retransmission task as well
    /// as from under a write guard during replay.
    fn transmit_request(&self, mode: &Mode, local_seq: u64) -> Result<()> {
        let local = mode.local.ok_or(TotalOrderError::LocalUnset)?;
        let sequencer = mode.sequencer.ok_or(TotalOrderError::NoSequencer)?;
        let frame = OrderFrame::new(
            OrderHeader::Request { local_seq },
            Message::unicast(local, sequencer, vec![]),
        );
        self.down_tx
            .send(frame)
            .map_err(|_| TotalOrderError::ChannelClosed)
    }

    fn send_down(&self, frame: OrderFrame) -> Result<()> {
        self.down_tx
            .send(frame)
            .map_err(|_| TotalOrderError::ChannelClosed)
    }

    fn deliver_up(&self, msg: Message) -> Result<()> {
        self.up_tx
            .send(msg)
            .map_err(|_| TotalOrderError::ChannelClosed)
    }
}

/// Keep re-requesting `local_seq` until the grant cancels the task.
/// The task holds a weak reference so a dropped layer tears down
/// cleanly even with tasks still scheduled.
fn register_retransmit(shared: &Arc<Shared>, local_seq: u64) {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    shared.retransmitter.add(local_seq, move || {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        if !shared.pending_requests.contains_key(&local_seq) {
            // The grant raced ahead of the cancellation.
            shared.retransmitter.ack(local_seq);
            return;
        }
        let mode = shared.mode.read();
        match mode.state {
            OperatingState::Null => {
                debug!("retransmission of request {local_seq} while stopped; giving up");
                return;
            }
            OperatingState::Block => return,
            OperatingState::Run | OperatingState::Flush => {}
        }
        debug!("retransmitting sequence request {local_seq}");
        if let Err(e) = shared.transmit_request(&mode, local_seq) {
            warn!("retransmission of request {local_seq} failed: {e}");
        }
    });
}

/// The total-order broadcast layer of one member.
pub struct TotalOrder {
    shared: Arc<Shared>,
}

impl TotalOrder {
    /// Create the layer.  It starts in [`OperatingState::Null`] and
    /// becomes operational when the first view is installed.
    pub fn new(config: TotalOrderConfig, down_tx: Sender<OrderFrame>, up_tx: Sender<Message>) -> Self {
        Self {
            shared: Arc::new(Shared {
                mode: RwLock::new(Mode {
                    state: OperatingState::Null,
                    local: None,
                    sequencer: None,
                }),
                local_seq: AtomicU64::new(1),
                order_counter: AtomicU64::new(1),
                up: Mutex::new(UpState {
                    delivered: 0,
                    pending: BTreeMap::new(),
                }),
                pending_requests: DashMap::new(),
                retransmitter: Retransmitter::new(config.retransmit_intervals),
                down_tx,
                up_tx,
            }),
        }
    }

    /// Record this member's own address.  Must happen before the first
    /// view is installed.
    pub fn set_local_member(&self, member: MemberId) {
        let mut mode = self.shared.mode.write();
        mode.local = Some(member);
    }

    // ── Downward path (application → wire) ──────────────────────────────

    /// Send an application message.  Unicasts pass straight through;
    /// broadcasts enter the request/grant protocol and come back up on
    /// every member in the agreed total order.
    pub fn send(&self, msg: Message) -> Result<()> {
        if !msg.dest.is_broadcast() {
            let mode = self.shared.mode.read();
            match mode.state {
                OperatingState::Null => {
                    error!("unicast send while not started; rejected");
                    return Err(TotalOrderError::NotOperational(mode.state));
                }
                OperatingState::Block => {
                    debug!("unicast send while blocked; discarded");
                    return Err(TotalOrderError::NotOperational(mode.state));
                }
                OperatingState::Run | OperatingState::Flush => {}
            }
            drop(mode);
            return self
                .shared
                .send_down(OrderFrame::new(OrderHeader::Unicast, msg));
        }

        let mode = self.shared.mode.read();
        if !mode.state.accepts_sends() {
            return Err(TotalOrderError::NotOperational(mode.state));
        }
        let local_seq = self.shared.local_seq.fetch_add(1, Ordering::SeqCst);
        self.shared.pending_requests.insert(local_seq, msg);
        register_retransmit(&self.shared, local_seq);
        self.shared.transmit_request(&mode, local_seq)
    }

    // ── Upward path (wire → application) ────────────────────────────────

    /// Feed one received frame into the layer.
    pub fn handle_frame(&self, frame: OrderFrame) -> Result<()> {
        match frame.header {
            OrderHeader::Request { local_seq } => self.recv_request(local_seq, &frame.body),
            OrderHeader::Reply {
                local_seq,
                order_seq,
            } => self.recv_reply(local_seq, order_seq),
            OrderHeader::Unicast => self.recv_unicast(frame.body),
            OrderHeader::Broadcast {
                local_seq,
                order_seq,
            } => self.recv_broadcast(local_seq, order_seq, frame.body),
        }
    }

    /// Sequencer side: grant the next order number to a request.  A
    /// retransmitted request is granted again; the requester's
    /// placeholder burns the surplus number.
    fn recv_request(&self, local_seq: u64, body: &Message) -> Result<()> {
        let mode = self.shared.mode.read();
        match mode.state {
            OperatingState::Null => {
                warn!("sequence request from {} while not started; dropped", body.src);
                return Ok(());
            }
            OperatingState::Block => {
                debug!("sequence request from {} while blocked; dropped", body.src);
                return Ok(());
            }
            OperatingState::Run | OperatingState::Flush => {}
        }
        let Some(local) = mode.local else {
            return Err(TotalOrderError::LocalUnset);
        };
        if mode.sequencer != Some(local) {
            error!(
                "sequence request from {} but this member is not the sequencer; dropped",
                body.src
            );
            return Ok(());
        }
        let order_seq = self.shared.order_counter.fetch_add(1, Ordering::SeqCst);
        debug!("granting order {order_seq} to request {local_seq} from {}", body.src);
        self.shared.send_down(OrderFrame::new(
            OrderHeader::Reply {
                local_seq,
                order_seq,
            },
            Message::unicast(local, body.src, vec![]),
        ))
    }

    /// Requester side: a grant arrived.  Broadcast the held message
    /// stamped with the order number, or a placeholder when the grant
    /// is a duplicate for an already-broadcast request.
    fn recv_reply(&self, local_seq: u64, order_seq: u64) -> Result<()> {
        let mode = self.shared.mode.read();
        match mode.state {
            OperatingState::Null => {
                warn!("grant {order_seq} while not started; dropped");
                return Ok(());
            }
            OperatingState::Block => {
                debug!("grant {order_seq} while blocked; dropped");
                return Ok(());
            }
            OperatingState::Run | OperatingState::Flush => {}
        }
        let Some(local) = mode.local else {
            return Err(TotalOrderError::LocalUnset);
        };
        match self.shared.pending_requests.remove(&local_seq) {
            Some((_, msg)) => {
                self.shared.retransmitter.ack(local_seq);
                self.shared.send_down(OrderFrame::new(
                    OrderHeader::Broadcast {
                        local_seq: Some(local_seq),
                        order_seq,
                    },
                    msg,
                ))
            }
            None => {
                // Duplicate grant after a retransmission race.
                info!("grant {order_seq} for unknown request {local_seq}; broadcasting placeholder");
                self.shared.send_down(OrderFrame::new(
                    OrderHeader::Broadcast {
                        local_seq: None,
                        order_seq,
                    },
                    Message::broadcast(local, vec![]),
                ))
            }
        }
    }

    fn recv_unicast(&self, body: Message) -> Result<()> {
        let mode = self.shared.mode.read();
        if mode.state == OperatingState::Null {
            warn!("unicast from {} while not started; dropped", body.src);
            return Ok(());
        }
        drop(mode);
        self.shared.deliver_up(body)
    }

    /// Receive side: buffer the broadcast and deliver every
    /// consecutively-numbered message starting at `delivered + 1`.
    fn recv_broadcast(
        &self,
        local_seq: Option<u64>,
        order_seq: u64,
        body: Message,
    ) -> Result<()> {
        let mode = self.shared.mode.read();
        if mode.state == OperatingState::Null {
            warn!("broadcast {order_seq} while not started; dropped");
            return Ok(());
        }
        drop(mode);

        let mut up = self.shared.up.lock();
        if order_seq <= up.delivered {
            debug!("duplicate broadcast {order_seq} (delivered {}); dropped", up.delivered);
            return Ok(());
        }
        up.pending.entry(order_seq).or_insert(BufferedBcast {
            placeholder: local_seq.is_none(),
            body,
        });

        let mut ready = Vec::new();
        loop {
            let next = up.delivered.saturating_add(1);
            let Some(buffered) = up.pending.remove(&next) else {
                break;
            };
            up.delivered = next;
            if buffered.placeholder {
                debug!("placeholder {next} consumed");
            } else {
                ready.push(buffered.body);
            }
        }
        drop(up);

        for msg in ready {
            self.shared.deliver_up(msg)?;
        }
        Ok(())
    }

    // ── Membership and lifecycle ────────────────────────────────────────

    /// Install a new view.  The coordinator becomes the sequencer, the
    /// layer (re-)enters `Run`, and the order numbering restarts for
    /// the new epoch: the delivery counter resets and buffered
    /// undelivered broadcasts are discarded — those this member sent
    /// itself are resubmitted as fresh requests, while foreign ones are
    /// left for their senders to resubmit.
    pub fn view_change(&self, view: &View) {
        let mut mode = self.shared.mode.write();
        let previous_sequencer = mode.sequencer;
        mode.sequencer = view.coordinator().copied();
        mode.state = OperatingState::Run;
        info!(
            "{view} installed; sequencer {}",
            mode.sequencer.map(|m| m.to_string()).unwrap_or_else(|| "none".to_string())
        );

        if mode.local.is_some() && mode.local == mode.sequencer {
            // Numbering restarts with every epoch, even when the
            // coordinator is unchanged; only the takeover is news.
            self.shared.order_counter.store(1, Ordering::SeqCst);
            if previous_sequencer != mode.sequencer {
                info!("this member is now the sequencer");
            }
        }

        // Requests never granted in the old epoch chase the new
        // sequencer immediately rather than waiting out the backoff.
        let ungranted: Vec<u64> = self
            .shared
            .pending_requests
            .iter()
            .map(|entry| *entry.key())
            .collect();
        for local_seq in ungranted {
            if let Err(e) = self.shared.transmit_request(&mode, local_seq) {
                warn!("re-requesting {local_seq} after view change failed: {e}");
            }
        }

        let buffered = {
            let mut up = self.shared.up.lock();
            up.delivered = 0;
            std::mem::take(&mut up.pending)
        };

        for (order_seq, bcast) in buffered {
            if bcast.placeholder {
                continue;
            }
            if mode.local == Some(bcast.body.src) {
                let local_seq = self.shared.local_seq.fetch_add(1, Ordering::SeqCst);
                info!(
                    "resubmitting own undelivered broadcast (was order {order_seq}) as request {local_seq}"
                );
                self.shared.pending_requests.insert(local_seq, bcast.body);
                register_retransmit(&self.shared, local_seq);
                if let Err(e) = self.shared.transmit_request(&mode, local_seq) {
                    warn!("resubmission of request {local_seq} failed: {e}");
                }
            } else {
                info!(
                    "discarding undelivered broadcast {order_seq} from {}; its sender resubmits",
                    bcast.body.src
                );
            }
        }
    }

    /// Stop accepting new broadcasts ahead of a membership change.
    /// In-flight traffic keeps moving so the group can drain.
    pub fn block_prepare(&self) {
        let mut mode = self.shared.mode.write();
        mode.state = OperatingState::Flush;
    }

    /// Park sequencer traffic entirely for the view installation.
    pub fn block_confirmed(&self) {
        let mut mode = self.shared.mode.write();
        mode.state = OperatingState::Block;
    }

    /// Stop the layer and forget all protocol state.
    pub fn stop(&self) {
        let mut mode = self.shared.mode.write();
        mode.state = OperatingState::Null;
        mode.local = None;
        mode.sequencer = None;
        self.shared.retransmitter.reset();
        self.shared.pending_requests.clear();
        self.shared.local_seq.store(1, Ordering::SeqCst);
        self.shared.order_counter.store(1, Ordering::SeqCst);
        let mut up = self.shared.up.lock();
        up.delivered = 0;
        up.pending.clear();
    }

    // ── Introspection ───────────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn state(&self) -> OperatingState {
        self.shared.mode.read().state
    }

    /// Highest order number delivered to the application.
    pub fn delivered_seq(&self) -> u64 {
        self.shared.up.lock().delivered
    }

    /// Broadcasts buffered awaiting earlier order numbers.
    pub fn pending_broadcasts(&self) -> usize {
        self.shared.up.lock().pending.len()
    }

    /// Own broadcasts still awaiting their grant.
    pub fn outstanding_requests(&self) -> usize {
        self.shared.pending_requests.len()
    }
}

impl Drop for TotalOrder {
    fn drop(&mut self) {
        self.shared.retransmitter.reset();
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {
        super::*,
        crossbeam_channel::{unbounded, Receiver},
        std::{thread, time::Duration},
    };

    fn quiet_config() -> TotalOrderConfig {
        TotalOrderConfig {
            retransmit_intervals: vec![Duration::from_secs(60)],
        }
    }

    fn node(config: TotalOrderConfig) -> (TotalOrder, Receiver<OrderFrame>, Receiver<Message>) {
        let (down_tx, down_rx) = unbounded();
        let (up_tx, up_rx) = unbounded();
        (TotalOrder::new(config, down_tx, up_tx), down_rx, up_rx)
    }

    fn bcast_frame(src: MemberId, local_seq: Option<u64>, order_seq: u64, payload: &[u8]) -> OrderFrame {
        OrderFrame::new(
            OrderHeader::Broadcast {
                local_seq,
                order_seq,
            },
            Message::broadcast(src, payload.to_vec()),
        )
    }

    #[test]
    fn test_send_rejected_before_first_view() {
        let (layer, _down, _up) = node(quiet_config());
        let src = MemberId::new_unique();
        let err = layer.send(Message::broadcast(src, b"early".to_vec())).unwrap_err();
        assert!(matches!(
            err,
            TotalOrderError::NotOperational(OperatingState::Null)
        ));
        let peer = MemberId::new_unique();
        let err = layer.send(Message::unicast(src, peer, b"early".to_vec())).unwrap_err();
        assert!(matches!(
            err,
            TotalOrderError::NotOperational(OperatingState::Null)
        ));
    }

    // Single member: it is its own sequencer, and routing its frames
    // back into itself walks the full request → grant → broadcast →
    // delivery pipeline.
    #[test]
    fn test_full_pipeline_on_single_member() {
        let (layer, down_rx, up_rx) = node(quiet_config());
        let me = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![me]));
        assert_eq!(layer.state(), OperatingState::Run);

        layer.send(Message::broadcast(me, b"ordered".to_vec())).unwrap();

        let req = down_rx.try_recv().unwrap();
        assert_eq!(req.kind(), "req");
        layer.handle_frame(req).unwrap();

        let rep = down_rx.try_recv().unwrap();
        assert_eq!(rep.kind(), "rep");
        layer.handle_frame(rep).unwrap();

        let bcast = down_rx.try_recv().unwrap();
        assert_eq!(bcast.kind(), "bcast");
        layer.handle_frame(bcast).unwrap();

        let delivered = up_rx.try_recv().unwrap();
        assert_eq!(delivered.payload, b"ordered".to_vec());
        assert_eq!(layer.delivered_seq(), 1);
        assert_eq!(layer.outstanding_requests(), 0);
    }

    #[test]
    fn test_unicast_bypasses_sequencer() {
        let (layer, down_rx, up_rx) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![peer, me]));

        layer.send(Message::unicast(me, peer, b"direct".to_vec())).unwrap();
        let frame = down_rx.try_recv().unwrap();
        assert_eq!(frame.kind(), "ucast");

        layer.handle_frame(frame).unwrap();
        assert_eq!(up_rx.try_recv().unwrap().payload, b"direct".to_vec());
        // Unordered path leaves the delivery counter untouched.
        assert_eq!(layer.delivered_seq(), 0);
    }

    #[test]
    fn test_out_of_order_broadcasts_buffered_until_gap_closes() {
        let (layer, _down, up_rx) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![peer, me]));

        layer.handle_frame(bcast_frame(peer, Some(2), 2, b"second")).unwrap();
        assert!(up_rx.try_recv().is_err());
        assert_eq!(layer.pending_broadcasts(), 1);

        layer.handle_frame(bcast_frame(peer, Some(1), 1, b"first")).unwrap();
        assert_eq!(up_rx.try_recv().unwrap().payload, b"first".to_vec());
        assert_eq!(up_rx.try_recv().unwrap().payload, b"second".to_vec());
        assert_eq!(layer.delivered_seq(), 2);
        assert_eq!(layer.pending_broadcasts(), 0);
    }

    #[test]
    fn test_duplicate_broadcast_dropped() {
        let (layer, _down, up_rx) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![peer, me]));

        layer.handle_frame(bcast_frame(peer, Some(1), 1, b"once")).unwrap();
        layer.handle_frame(bcast_frame(peer, Some(1), 1, b"once")).unwrap();

        assert_eq!(up_rx.try_recv().unwrap().payload, b"once".to_vec());
        assert!(up_rx.try_recv().is_err());
        assert_eq!(layer.delivered_seq(), 1);
    }

    #[test]
    fn test_placeholder_fills_gap_without_delivery() {
        let (layer, _down, up_rx) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![peer, me]));

        layer.handle_frame(bcast_frame(peer, Some(1), 1, b"one")).unwrap();
        layer.handle_frame(bcast_frame(peer, Some(3), 3, b"three")).unwrap();
        // Order number 2 was burned by a retransmission race.
        layer.handle_frame(bcast_frame(peer, None, 2, b"")).unwrap();

        assert_eq!(up_rx.try_recv().unwrap().payload, b"one".to_vec());
        assert_eq!(up_rx.try_recv().unwrap().payload, b"three".to_vec());
        assert!(up_rx.try_recv().is_err());
        assert_eq!(layer.delivered_seq(), 3);
    }

    #[test]
    fn test_sequencer_grants_fresh_number_per_request() {
        let (layer, down_rx, _up) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![me, peer]));

        let req = |local_seq| {
            OrderFrame::new(
                OrderHeader::Request { local_seq },
                Message::unicast(peer, me, vec![]),
            )
        };
        layer.handle_frame(req(10)).unwrap();
        layer.handle_frame(req(11)).unwrap();
        // Retransmission of request 10: granted again, not deduplicated.
        layer.handle_frame(req(10)).unwrap();

        let grants: Vec<(u64, u64)> = (0..3)
            .map(|_| match down_rx.try_recv().unwrap().header {
                OrderHeader::Reply {
                    local_seq,
                    order_seq,
                } => (local_seq, order_seq),
                other => panic!("expected reply, got {other:?}"),
            })
            .collect();
        assert_eq!(grants, vec![(10, 1), (11, 2), (10, 3)]);
    }

    #[test]
    fn test_duplicate_grant_triggers_placeholder_broadcast() {
        let (layer, down_rx, _up) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![peer, me]));

        // No pending request 99: this grant is a retransmission
        // leftover and must be answered with a placeholder.
        layer
            .handle_frame(OrderFrame::new(
                OrderHeader::Reply {
                    local_seq: 99,
                    order_seq: 5,
                },
                Message::unicast(peer, me, vec![]),
            ))
            .unwrap();

        let frame = down_rx.try_recv().unwrap();
        assert_eq!(frame.kind(), "bcast-null");
        match frame.header {
            OrderHeader::Broadcast {
                local_seq,
                order_seq,
            } => {
                assert_eq!(local_seq, None);
                assert_eq!(order_seq, 5);
            }
            other => panic!("expected broadcast, got {other:?}"),
        }
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_view_change_resubmits_own_undelivered_broadcasts() {
        let (layer, down_rx, up_rx) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        let old_sequencer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![old_sequencer, me, peer]));

        // Undelivered: order 1 never arrived, so both stay buffered.
        layer.handle_frame(bcast_frame(me, Some(5), 2, b"mine")).unwrap();
        layer.handle_frame(bcast_frame(peer, Some(9), 3, b"theirs")).unwrap();
        assert_eq!(layer.pending_broadcasts(), 2);

        // Old sequencer crashed; peer takes over.
        layer.view_change(&View::new(2, vec![peer, me]));

        // Own broadcast re-enters the pipeline with a fresh request;
        // the foreign one is left for its sender.
        let req = down_rx.try_recv().unwrap();
        assert_eq!(req.kind(), "req");
        assert_eq!(req.body.dest, groupmesh_stack::message::Destination::Member(peer));
        assert!(down_rx.try_recv().is_err());

        assert_eq!(layer.outstanding_requests(), 1);
        assert_eq!(layer.pending_broadcasts(), 0);
        assert_eq!(layer.delivered_seq(), 0);
        assert!(up_rx.try_recv().is_err());
    }

    #[test]
    fn test_view_change_re_requests_ungranted_broadcasts() {
        let (layer, down_rx, _up) = node(quiet_config());
        let me = MemberId::new_unique();
        let old_sequencer = MemberId::new_unique();
        let new_sequencer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![old_sequencer, me]));

        layer.send(Message::broadcast(me, b"pending".to_vec())).unwrap();
        let first = down_rx.try_recv().unwrap();
        assert_eq!(first.body.dest, groupmesh_stack::message::Destination::Member(old_sequencer));

        // Grant never arrives; the next view re-aims the request.
        layer.view_change(&View::new(2, vec![new_sequencer, me]));
        let second = down_rx.try_recv().unwrap();
        assert_eq!(second.kind(), "req");
        assert_eq!(second.body.dest, groupmesh_stack::message::Destination::Member(new_sequencer));
    }

    #[test]
    fn test_becoming_sequencer_restarts_order_numbering() {
        let (layer, down_rx, _up) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![me, peer]));

        let req = OrderFrame::new(
            OrderHeader::Request { local_seq: 1 },
            Message::unicast(peer, me, vec![]),
        );
        layer.handle_frame(req.clone()).unwrap();
        layer.handle_frame(req.clone()).unwrap();
        down_rx.try_recv().unwrap();
        down_rx.try_recv().unwrap();

        // Still the coordinator in the next view: numbering restarts
        // with the new epoch.
        layer.view_change(&View::new(2, vec![me, peer]));
        layer.handle_frame(req).unwrap();
        match down_rx.try_recv().unwrap().header {
            OrderHeader::Reply { order_seq, .. } => assert_eq!(order_seq, 1),
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn test_block_parks_sequencer_traffic() {
        let (layer, down_rx, _up) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![me, peer]));
        layer.block_confirmed();
        assert_eq!(layer.state(), OperatingState::Block);

        layer
            .handle_frame(OrderFrame::new(
                OrderHeader::Request { local_seq: 1 },
                Message::unicast(peer, me, vec![]),
            ))
            .unwrap();
        assert!(down_rx.try_recv().is_err());
    }

    // A flush drains in-flight traffic; broadcasts submitted during it
    // still enter the request path and deliveries keep flowing.
    #[test]
    fn test_flush_accepts_broadcasts_and_keeps_delivering() {
        let (layer, down_rx, up_rx) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![peer, me]));
        layer.block_prepare();
        assert_eq!(layer.state(), OperatingState::Flush);

        layer.send(Message::broadcast(me, b"draining send".to_vec())).unwrap();
        let frame = down_rx.try_recv().unwrap();
        assert_eq!(frame.kind(), "req");
        assert_eq!(layer.outstanding_requests(), 1);

        layer.handle_frame(bcast_frame(peer, Some(1), 1, b"draining recv")).unwrap();
        assert_eq!(up_rx.try_recv().unwrap().payload, b"draining recv".to_vec());
    }

    #[test]
    fn test_block_discards_outgoing_unicasts() {
        let (layer, down_rx, _up) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![peer, me]));
        layer.block_confirmed();

        let err = layer
            .send(Message::unicast(me, peer, b"parked".to_vec()))
            .unwrap_err();
        assert!(matches!(
            err,
            TotalOrderError::NotOperational(OperatingState::Block)
        ));
        assert!(down_rx.try_recv().is_err());

        // Broadcasts are discarded in BLOCK as well.
        let err = layer.send(Message::broadcast(me, b"parked".to_vec())).unwrap_err();
        assert!(matches!(
            err,
            TotalOrderError::NotOperational(OperatingState::Block)
        ));
        assert!(down_rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_forgets_all_state() {
        let (layer, _down, up_rx) = node(quiet_config());
        let me = MemberId::new_unique();
        let peer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![peer, me]));
        layer.send(Message::broadcast(me, b"doomed".to_vec())).unwrap();
        layer.handle_frame(bcast_frame(peer, Some(1), 2, b"buffered")).unwrap();

        layer.stop();
        assert_eq!(layer.state(), OperatingState::Null);
        assert_eq!(layer.outstanding_requests(), 0);
        assert_eq!(layer.pending_broadcasts(), 0);
        assert_eq!(layer.delivered_seq(), 0);

        layer.handle_frame(bcast_frame(peer, Some(2), 1, b"ignored")).unwrap();
        assert!(up_rx.try_recv().is_err());
    }

    // Full three-node run with a delayed grant: the sequencer hands out
    // orders 1..3, the grant for 1 reaches its requester only after the
    // request was re-sent and granted 4, so slot 1 is burned with a
    // placeholder and one receiver delivers everything exactly once in
    // order 1,2,3,4.
    #[test]
    fn test_delayed_grant_keeps_single_delivery_order_across_nodes() {
        let (sequencer, seq_down, _seq_up) = node(quiet_config());
        let (sender, sender_down, _sender_up) = node(quiet_config());
        let (receiver, _recv_down, recv_up) = node(quiet_config());
        let s = MemberId::new_unique();
        let a = MemberId::new_unique();
        let r = MemberId::new_unique();
        sequencer.set_local_member(s);
        sender.set_local_member(a);
        receiver.set_local_member(r);
        for layer in [&sequencer, &sender, &receiver] {
            layer.view_change(&View::new(1, vec![s, a, r]));
        }

        // A asks for an order number; the grant (order 1) is delayed in
        // transit.
        sender.send(Message::broadcast(a, b"from-a".to_vec())).unwrap();
        let a_req = sender_down.try_recv().unwrap();
        assert_eq!(a_req.kind(), "req");
        sequencer.handle_frame(a_req.clone()).unwrap();
        let delayed_grant = seq_down.try_recv().unwrap();
        assert_eq!(delayed_grant.kind(), "rep");

        // Meanwhile S broadcasts twice itself, taking orders 2 and 3.
        let mut s_bcasts = Vec::new();
        for payload in [b"m2".as_slice(), b"m3".as_slice()] {
            sequencer.send(Message::broadcast(s, payload.to_vec())).unwrap();
            let req = seq_down.try_recv().unwrap();
            sequencer.handle_frame(req).unwrap();
            let rep = seq_down.try_recv().unwrap();
            sequencer.handle_frame(rep).unwrap();
            s_bcasts.push(seq_down.try_recv().unwrap());
        }
        for bcast in &s_bcasts {
            receiver.handle_frame(bcast.clone()).unwrap();
        }
        // Orders 2 and 3 wait on the gap at 1.
        assert!(recv_up.try_recv().is_err());
        assert_eq!(receiver.pending_broadcasts(), 2);

        // The transport re-delivers A's request; the sequencer grants a
        // fresh number (4), never re-issuing an old one.
        sequencer.handle_frame(a_req).unwrap();
        let fresh_grant = seq_down.try_recv().unwrap();
        sender.handle_frame(fresh_grant).unwrap();
        let a_bcast = sender_down.try_recv().unwrap();
        assert_eq!(a_bcast.kind(), "bcast");
        receiver.handle_frame(a_bcast).unwrap();

        // The delayed grant for order 1 finally lands; its request is
        // long gone, so A burns the slot with a placeholder.
        sender.handle_frame(delayed_grant).unwrap();
        let placeholder = sender_down.try_recv().unwrap();
        assert_eq!(placeholder.kind(), "bcast-null");
        receiver.handle_frame(placeholder).unwrap();

        // Placeholder closes the gap: 2, 3, then A's payload at 4.
        assert_eq!(recv_up.try_recv().unwrap().payload, b"m2".to_vec());
        assert_eq!(recv_up.try_recv().unwrap().payload, b"m3".to_vec());
        assert_eq!(recv_up.try_recv().unwrap().payload, b"from-a".to_vec());
        assert!(recv_up.try_recv().is_err());
        assert_eq!(receiver.delivered_seq(), 4);
        assert_eq!(sender.outstanding_requests(), 0);
    }

    #[test]
    fn test_request_retransmitted_until_granted() {
        let (layer, down_rx, _up) = node(TotalOrderConfig::dev_default());
        let me = MemberId::new_unique();
        let sequencer = MemberId::new_unique();
        layer.set_local_member(me);
        layer.view_change(&View::new(1, vec![sequencer, me]));

        layer.send(Message::broadcast(me, b"retry me".to_vec())).unwrap();
        thread::sleep(Duration::from_millis(120));

        let requests = down_rx.try_iter().filter(|f| f.kind() == "req").count();
        assert!(requests >= 2, "expected retransmissions, saw {requests} request(s)");

        // The grant cancels the retransmission task.
        layer
            .handle_frame(OrderFrame::new(
                OrderHeader::Reply {
                    local_seq: 1,
                    order_seq: 1,
                },
                Message::unicast(sequencer, me, vec![]),
            ))
            .unwrap();
        // Let any in-flight firing land before draining.
        thread::sleep(Duration::from_millis(60));
        while down_rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(120));
        assert!(down_rx.try_iter().all(|f| f.kind() != "req"));
        assert_eq!(layer.outstanding_requests(), 0);
    }
}
