//! The transport seam and the in-process arbiter.
//!
//! A [`Transport`] carries stamped envelopes to the central arbiter and
//! sequenced envelopes back. The network implementation lives outside
//! this crate; [`LocalHub`] is the in-process arbiter used by tests and
//! single-machine setups.
//!
//! The arbiter does more than assign sequence numbers. A client generates
//! an operation against the state named by its `parent_op` marker; by the
//! time the operation arrives, other members' operations may already be
//! sequenced past that point. The hub transforms the incoming operation
//! against that gap. The sender's own gap operations are causally prior,
//! not concurrent: each one moves the sender's generation frame forward,
//! so the gap is threaded through them rather than transformed against
//! them. The client side symmetrically transforms inbound operations
//! against its unacknowledged pending list; together the two halves keep
//! every replica on the same total order.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use shodo_ot::{transform, Operation, OperationFactory};
use shodo_types::wire::OpEnvelope;

use crate::error::TransportError;

/// Carries envelopes between a session and the arbiter.
pub trait Transport {
    /// Hand a stamped envelope to the arbiter for sequencing.
    fn deliver_op(&mut self, envelope: OpEnvelope) -> Result<(), TransportError>;

    /// Sequenced envelopes delivered since the last poll.
    fn poll(&mut self) -> Result<Vec<OpEnvelope>, TransportError>;

    /// The full sequenced history, for joining or resyncing sessions.
    fn replay(&self) -> Result<Vec<OpEnvelope>, TransportError>;
}

struct HubState {
    log: Vec<OpEnvelope>,
    clients: Vec<UnboundedSender<OpEnvelope>>,
}

/// In-process central arbiter. Cheap to clone; all clones share the log.
#[derive(Clone)]
pub struct LocalHub {
    state: Arc<Mutex<HubState>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                log: Vec::new(),
                clients: Vec::new(),
            })),
        }
    }

    /// Connect a client. The returned handle receives every envelope
    /// sequenced from now on; history is available through `replay`.
    pub fn connect(&self) -> LocalClient {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().clients.push(tx);
        LocalClient {
            state: Arc::clone(&self.state),
            rx,
        }
    }

    /// Number of sequenced operations.
    pub fn sequenced_len(&self) -> usize {
        self.state.lock().log.len()
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One client's connection to a [`LocalHub`].
pub struct LocalClient {
    state: Arc<Mutex<HubState>>,
    rx: UnboundedReceiver<OpEnvelope>,
}

impl Transport for LocalClient {
    fn deliver_op(&mut self, envelope: OpEnvelope) -> Result<(), TransportError> {
        let mut state = self.state.lock();

        let factory = OperationFactory::new();
        let Some(op) = factory.create(&envelope.opspec) else {
            // A malformed op never reaches the log; the sender finds out
            // by never seeing an acknowledgment.
            return Err(TransportError::Rejected("unparseable opspec".into()));
        };

        // Operations the sender had not seen when it generated this op.
        // Its own gap entries are causally prior, not concurrent: each one
        // advances the sender's generation frame, so the gap collected so
        // far is re-expressed past it — the same entry-by-entry threading
        // the session applies to its pending list.
        let base = parent_seq(&envelope);
        let mut gap: Vec<Operation> = Vec::new();
        for entry in state
            .log
            .iter()
            .filter(|e| e.server_seq.is_some_and(|s| s as i64 > base))
        {
            let Some(logged) = factory.create(&entry.opspec) else {
                continue;
            };
            if logged.memberid == op.memberid {
                gap = transform(gap, vec![logged])
                    .map_err(|e| TransportError::Rejected(e.to_string()))?
                    .local;
            } else {
                gap.push(logged);
            }
        }

        let sequenced = transform(vec![op], gap)
            .map_err(|e| TransportError::Rejected(e.to_string()))?
            .local;

        for op in sequenced {
            let seq = state.log.len() as u64;
            let out = OpEnvelope {
                server_seq: Some(seq),
                client_nonce: envelope.client_nonce.clone(),
                parent_op: None,
                opspec: op.spec(),
            };
            state.log.push(out.clone());
            state.clients.retain(|tx| {
                let alive = tx.send(out.clone()).is_ok();
                if !alive {
                    warn!("dropping disconnected arbiter client");
                }
                alive
            });
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<OpEnvelope>, TransportError> {
        let mut out = Vec::new();
        while let Ok(env) = self.rx.try_recv() {
            out.push(env);
        }
        Ok(out)
    }

    fn replay(&self) -> Result<Vec<OpEnvelope>, TransportError> {
        Ok(self.state.lock().log.clone())
    }
}

/// The `<seq>` half of a `parent_op` marker; `-1` when absent or odd.
fn parent_seq(envelope: &OpEnvelope) -> i64 {
    envelope
        .parent_op
        .as_deref()
        .and_then(|s| s.split('+').next())
        .and_then(|s| s.parse().ok())
        .unwrap_or(-1)
}

// ============================================================================
// Tests
// ============================================================================
