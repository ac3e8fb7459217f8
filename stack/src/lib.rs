//! Groupmesh shared substrate.
//!
//! This crate carries the small set of types every groupmesh protocol
//! layer agrees on:
//!
//! - **Member identity** — an opaque, totally-ordered [`member::MemberId`]
//!   identifying one process in the group.
//! - **Views** — an immutable [`view::View`] snapshot of the agreed
//!   membership, produced externally on every membership change.  The
//!   first member of a view doubles as its coordinator.
//! - **Messages** — the [`message::Message`] unit the transport below
//!   moves around, addressed to a single member or to the whole group.
//! - **Scheduling** — a [`scheduler::Scheduler`] that runs cancellable
//!   repeating tasks on a backoff schedule, used by protocol layers for
//!   retransmission instead of private sleep loops.
//!
//! How views are computed, how bytes hit the wire, and how crashed
//! members are detected are all owned by collaborating layers; nothing
//! in this crate talks to a socket.
//!
//! ## Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`member`]    | `MemberId` identity type |
//! | [`view`]      | `View` membership snapshots |
//! | [`message`]   | `Message` / `Destination` wire unit |
//! | [`scheduler`] | Cancellable repeating tasks with backoff |

pub mod member;
pub mod message;
pub mod scheduler;
pub mod view;
