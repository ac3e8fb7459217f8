//! Error types for the quorum collector.

use thiserror::Error;

/// Errors that can occur while setting up or sending a group request.
///
/// Communication failures during the wait phase are never surfaced
/// here; they show up as a `false` return from `execute()` plus the
/// per-member tally.
#[derive(Error, Debug)]
pub enum QuorumError {
    /// The request could not be handed to the send channel.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The session was constructed with an empty target set.
    #[error("empty target member set")]
    NoTargets,
}

/// Convenience result type for quorum operations.
pub type Result<T> = std::result::Result<T, QuorumError>;
