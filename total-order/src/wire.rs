//! Closed wire format of the total-order layer.
//!
//! Every message the layer puts on the wire is an [`OrderFrame`]: an
//! [`OrderHeader`] naming the frame's role in the protocol plus the
//! carried [`Message`].  Peers exchange nothing else, so a decode
//! failure always means a corrupt or foreign frame and the frame is
//! dropped.
//!
//! `local_seq` values are meaningful only to the member that issued
//! them; `order_seq` values are the group-wide total order assigned by
//! the sequencer.

use {
    crate::error::Result,
    groupmesh_stack::message::Message,
    serde::{Deserialize, Serialize},
};

/// Role of a frame in the sequencing protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderHeader {
    /// Unicast to the sequencer: "assign an order number to my
    /// broadcast identified by `local_seq`".  The body carries no
    /// payload; the requester keeps the message until granted.
    Request { local_seq: u64 },
    /// Unicast grant from the sequencer back to the requester.
    Reply { local_seq: u64, order_seq: u64 },
    /// Ordinary point-to-point message, passed through unordered.
    Unicast,
    /// The ordered broadcast itself.  `local_seq` is `None` on a
    /// placeholder: an empty frame that burns `order_seq` so receivers
    /// do not wait forever on a grant whose request was retransmitted.
    Broadcast {
        local_seq: Option<u64>,
        order_seq: u64,
    },
}

/// One wire frame: protocol header plus the carried message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFrame {
    pub header: OrderHeader,
    pub body: Message,
}

impl OrderFrame {
    pub fn new(header: OrderHeader, body: Message) -> Self {
        Self { header, body }
    }

    /// Serialize for the transport below.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(Into::into)
    }

    /// Deserialize a frame received from the transport.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(Into::into)
    }

    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match &self.header {
            OrderHeader::Request { .. } => "req",
            OrderHeader::Reply { .. } => "rep",
            OrderHeader::Unicast => "ucast",
            OrderHeader::Broadcast {
                local_seq: Some(_), ..
            } => "bcast",
            OrderHeader::Broadcast {
                local_seq: None, ..
            } => "bcast-null",
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
