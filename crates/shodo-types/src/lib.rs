//! Shared identity and wire types for Shodo.
//!
//! This crate is the relational foundation: typed IDs, member identities,
//! and the sequencing wire envelope. It has **no internal shodo
//! dependencies** — a pure leaf crate that other crates build on.
//!
//! # Entity-Relationship Overview
//!
//! ```text
//! Document (DocumentId) ← one shared editing surface
//!     └── edited within Session (SessionId, one per replica)
//!     └── authored by Member (MemberId)
//!
//! Member (MemberId) ← a collaborating editor identity
//!     └── owns exactly one cursor per document
//!     └── authors operations (memberid stamped on every opspec)
//!
//! OpEnvelope ← an opspec plus sequencing metadata
//!     └── client_nonce  "C:<memberid>:<seq>"   (outbound, dedup/ack key)
//!     └── parent_op     "<seq>+<sends>"        (outbound, causal context)
//!     └── server_seq                           (inbound, total order)
//! ```
//!
//! # Key Types
//!
//! | Type                | Purpose                                    |
//! |---------------------|--------------------------------------------|
//! | [`DocumentId`]      | Which shared document                      |
//! | [`SessionId`]       | Which replica session                      |
//! | [`MemberId`]        | Who (wire-visible string, e.g. `alice_1`)  |
//! | [`Member`]          | Identity plus display properties           |
//! | [`OpEnvelope`]      | Opspec + sequencing metadata on the wire   |

pub mod ids;
pub mod member;
pub mod wire;

// Re-export primary types at crate root for convenience.
pub use ids::{DocumentId, MemberId, SessionId};
pub use member::{Member, MemberProperties};
pub use wire::{OpEnvelope, client_nonce, parent_op};

/// Current time as Unix milliseconds. Used by constructors throughout the crate.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
