//! The sequencing wire envelope.
//!
//! Operations travel as JSON opspecs. The router adds sequencing metadata
//! around the opspec fields:
//!
//! - outbound: `client_nonce = "C:<memberid>:<seq>"` (ack/dedup key) and
//!   `parent_op = "<last_server_seq>+<sends_since_server_op>"` (the causal
//!   context the op was generated against)
//! - inbound: `server_seq`, the arbiter-assigned total-order index
//!
//! [`OpEnvelope`] keeps the opspec itself opaque (`serde_json::Value`) — the
//! envelope layer never needs to understand operation semantics, only route
//! them. Numeric fields coming off the wire are parsed defensively: peers
//! have been observed sending numbers as strings, so [`de`] provides
//! number-or-string deserializers for opspec-level use.

use serde::{Deserialize, Serialize};

use crate::ids::MemberId;

/// An opspec plus sequencing metadata, as it travels on the wire.
///
/// Serializes flat: the metadata fields sit next to the opspec's own fields
/// in one JSON object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpEnvelope {
    /// Server-assigned total-order index. Present on inbound envelopes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_seq: Option<u64>,

    /// Client-assigned nonce, `"C:<memberid>:<seq>"`. Stamped on push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_nonce: Option<String>,

    /// Causal context marker, `"<last_server_seq>+<sends_since_server_op>"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_op: Option<String>,

    /// The opspec itself (`{optype, memberid, timestamp, ...}`).
    #[serde(flatten)]
    pub opspec: serde_json::Value,
}

impl OpEnvelope {
    /// Wrap a bare opspec with no sequencing metadata yet.
    pub fn new(opspec: serde_json::Value) -> Self {
        Self {
            server_seq: None,
            client_nonce: None,
            parent_op: None,
            opspec,
        }
    }

    /// The `optype` tag of the wrapped opspec, when present.
    pub fn optype(&self) -> Option<&str> {
        self.opspec.get("optype").and_then(|v| v.as_str())
    }
}

/// Build a client nonce: `"C:<memberid>:<seq>"`.
pub fn client_nonce(memberid: &MemberId, seq: u64) -> String {
    format!("C:{}:{}", memberid, seq)
}

/// Build a parent-op marker: `"<last_server_seq>+<sends_since_server_op>"`.
pub fn parent_op(last_server_seq: i64, sends_since_server_op: u32) -> String {
    format!("{}+{}", last_server_seq, sends_since_server_op)
}

/// Defensive deserializers for numeric opspec fields.
///
/// Some peers send numbers as quoted strings, so a `"42"` must decode the
/// same as `42`, and a missing field falls back to the type default.
pub mod de {
    use std::fmt;

    use serde::de::{Deserializer, Error, Visitor};

    struct NumOrStr;

    impl Visitor<'_> for NumOrStr {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer or a numeric string")
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<i64, E> {
            Ok(v as i64)
        }

        fn visit_f64<E: Error>(self, v: f64) -> Result<i64, E> {
            Ok(v as i64)
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<i64, E> {
            v.trim().parse().map_err(E::custom)
        }
    }

    /// Deserialize a step position: integer or numeric string, clamped at 0.
    pub fn step<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let n = d.deserialize_any(NumOrStr)?;
        Ok(n.max(0) as u32)
    }

    /// Deserialize a signed length: integer or numeric string.
    pub fn length<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        d.deserialize_any(NumOrStr)
    }

    /// Deserialize a timestamp: integer or numeric string, clamped at 0.
    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let n = d.deserialize_any(NumOrStr)?;
        Ok(n.max(0) as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================
