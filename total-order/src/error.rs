//! Error taxonomy of the total-order layer.

use {crate::state::OperatingState, thiserror::Error};

/// Errors surfaced by the total-order layer.
#[derive(Error, Debug)]
pub enum TotalOrderError {
    #[error("frame codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("layer not operational (state {0})")]
    NotOperational(OperatingState),

    #[error("local member address not set")]
    LocalUnset,

    #[error("no sequencer known (no view installed)")]
    NoSequencer,

    #[error("transport channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, TotalOrderError>;
