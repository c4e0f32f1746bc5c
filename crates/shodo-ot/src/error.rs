//! Error types for the operation model.

use thiserror::Error;

/// Errors that can occur in the operation / transformation layer.
///
/// Stale operation targets are deliberately *not* an error: `execute`
/// returns `false` for those and the session skips them. Everything here
/// indicates corrupted input or a causality violation that local code
/// cannot repair.
#[derive(Error, Debug)]
pub enum OtError {
    /// A pair of operations could not be transformed against each other.
    ///
    /// Concurrent operations from the same member are the canonical case:
    /// a member's own operations are totally ordered by its session, so two
    /// of them can never be concurrent. Seeing that means the transport or
    /// a peer is corrupt.
    #[error("cannot transform {a} against concurrent {b}")]
    TransformConflict { a: String, b: String },

    /// An opspec failed to deserialize into a known operation.
    #[error("malformed or unknown opspec: {0}")]
    InvalidSpec(String),
}

/// Result type for operation-model calls.
pub type Result<T> = std::result::Result<T, OtError>;
