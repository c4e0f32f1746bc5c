//! Error types for sequencing and session handling.

use thiserror::Error;

/// Router failures. All of them mean the sequenced stream is corrupt;
/// none are recoverable without a resync.
#[derive(Error, Debug)]
pub enum RouterError {
    /// An inbound envelope without a `server_seq`.
    #[error("inbound envelope is missing server_seq")]
    MissingSequence,

    /// A `server_seq` already applied or already buffered arrived again.
    #[error("duplicate or regressed server_seq {seq}")]
    DuplicateSequence { seq: u64 },

    /// The session dropped its playback receiver.
    #[error("playback channel closed")]
    ChannelClosed,
}

/// Transport failures.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The other end of the transport is gone.
    #[error("transport closed")]
    Closed,

    /// The arbiter refused to sequence an operation.
    #[error("arbiter rejected operation: {0}")]
    Rejected(String),
}

/// Session-level failures. Transform conflicts and acknowledgment
/// anomalies leave the session desynced; callers must rejoin via replay
/// into a fresh session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Transformation against pending local operations failed.
    #[error("transform failed, session desynced")]
    Desynced(#[from] shodo_ot::OtError),

    /// A locally produced operation did not apply to the local document.
    #[error("local operation {0} does not apply")]
    StaleLocalOperation(String),

    /// The arbiter acknowledged our operations out of order.
    #[error("acknowledgment out of order for nonce {0}")]
    AckOutOfOrder(String),

    /// The session already desynced; only inspection is allowed.
    #[error("session is desynced")]
    SessionDesynced,
}

/// Result type for session calls.
pub type Result<T> = std::result::Result<T, SessionError>;
