//! Quorum-based response collector.
//!
//! Sends one request to a set of group members and decides, under a
//! selectable [`policy::ResponsePolicy`], when "enough" responses have
//! arrived — staying correct when members crash mid-call.  The caller
//! blocks in [`request::QuorumRequest::execute`]; the transport's
//! correlation layer feeds responses, suspicion reports, and view
//! changes in from its own threads.
//!
//! ```text
//!  caller thread          callback threads (transport / failure detector)
//!  ─────────────          ───────────────────────────────────────────────
//!  execute() ──┐
//!              │ wait     receive_response(msg) ──┐
//!              │◄─────────suspect(member) ────────┤ notify
//!              │          view_change(view) ──────┘
//!  true/false ◄┘
//! ```
//!
//! ## Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`policy`]     | Completion policies and majority arithmetic |
//! | [`request`]    | The blocking collector session itself |
//! | [`tally`]      | Per-member outcome of a finished call |
//! | [`suspects`]   | Bounded FIFO history of suspected members |
//! | [`channel`]    | Send-side seams (correlated or raw) |
//! | [`request_id`] | Monotonic request-id service |
//! | [`config`]     | Session configuration |
//! | [`error`]      | Crate-wide error enum |

pub mod channel;
pub mod config;
pub mod error;
pub mod policy;
pub mod request;
pub mod request_id;
pub mod suspects;
pub mod tally;

pub use {
    policy::ResponsePolicy,
    request::QuorumRequest,
    tally::{ResponseOutcome, ResponseTally},
};
