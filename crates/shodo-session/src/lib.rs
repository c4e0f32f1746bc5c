//! Sequencing and session layer for collaborative documents.
//!
//! `shodo-ot` provides the state machine and its transform algebra; this
//! crate makes replicas out of it:
//!
//! ```text
//! component        role
//! ───────────────  ───────────────────────────────────────────────
//! OperationRouter  outbound stamping, inbound total-order restore
//! Transport        seam to the central arbiter (LocalHub in-process)
//! EditingSession   document replica + pending list + event surface
//! ```
//!
//! The arbiter assigns every operation a `server_seq`; the router
//! re-establishes that order per client; the session transforms inbound
//! operations against its unacknowledged local ones. Any two sessions
//! that have pumped the same sequenced prefix hold canonically equal
//! documents.

pub mod error;
pub mod router;
pub mod session;
pub mod transport;

pub use error::{Result, RouterError, SessionError, TransportError};
pub use router::OperationRouter;
pub use session::{EditingSession, SessionContext, SessionEvent};
pub use transport::{LocalHub, LocalClient, Transport};
