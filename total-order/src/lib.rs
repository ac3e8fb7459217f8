//! Sequencer-based total-order broadcast.
//!
//! Guarantees that every group member delivers the same broadcasts in
//! the same order.  One member per view — the coordinator — acts as the
//! sequencer: senders ask it for an order number, then broadcast the
//! message stamped with that number, and receivers deliver strictly in
//! numbered order.
//!
//! ```text
//!  sender                sequencer             every member
//!  ──────                ─────────             ────────────
//!  REQ(local_seq) ─────►
//!                 ◄───── REP(local_seq, n)
//!  BCAST(n, msg) ─────────────────────────────► deliver in n-order
//! ```
//!
//! Requests retransmit on a backoff schedule until granted; duplicate
//! grants are burned with placeholder broadcasts so the numbering never
//! develops a permanent gap.  On a view change the new coordinator
//! takes over sequencing and the numbering restarts for the new epoch.
//!
//! ## Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`protocol`]   | The total-order layer itself |
//! | [`wire`]       | Closed wire format (`OrderFrame`) |
//! | [`retransmit`] | Per-request retransmission tasks |
//! | [`state`]      | Lifecycle states |
//! | [`config`]     | Layer configuration |
//! | [`error`]      | Crate-wide error enum |

pub mod config;
pub mod error;
pub mod protocol;
pub mod retransmit;
pub mod state;
pub mod wire;

pub use {
    config::TotalOrderConfig,
    error::TotalOrderError,
    protocol::TotalOrder,
    state::OperatingState,
    wire::{OrderFrame, OrderHeader},
};
