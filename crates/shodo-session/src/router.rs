//! Per-session sequencing router.
//!
//! Outbound, the router stamps envelopes with a client nonce (the
//! acknowledgment key) and a `parent_op` marker naming the causal context
//! the operation was generated in. Inbound, it restores the arbiter's
//! total order: contiguous envelopes flow straight to the playback
//! channel, gapped ones wait in a reorder buffer until the missing
//! sequence numbers arrive.
//!
//! The playback side is a `tokio` unbounded channel drained synchronously
//! by the owning session; the router never applies operations itself.

use std::collections::BTreeMap;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use shodo_types::wire::{self, OpEnvelope};
use shodo_types::MemberId;

use crate::error::RouterError;
use crate::transport::Transport;

/// Stamps outbound envelopes and re-orders inbound ones.
pub struct OperationRouter {
    memberid: MemberId,
    /// Highest server_seq handed to playback. `-1` before the first.
    last_server_seq: i64,
    /// Outbound sends since the last sequenced op was played back.
    sends_since_server_op: u32,
    /// Monotonic nonce counter.
    router_sequence: u64,
    reorder_queue: BTreeMap<u64, OpEnvelope>,
    playback_tx: UnboundedSender<OpEnvelope>,
}

impl OperationRouter {
    /// Create a router and the playback receiver its session drains.
    pub fn new(memberid: MemberId) -> (Self, UnboundedReceiver<OpEnvelope>) {
        let (playback_tx, playback_rx) = mpsc::unbounded_channel();
        (
            Self {
                memberid,
                last_server_seq: -1,
                sends_since_server_op: 0,
                router_sequence: 0,
                reorder_queue: BTreeMap::new(),
                playback_tx,
            },
            playback_rx,
        )
    }

    /// Highest sequence number played back so far, `-1` for none.
    pub fn last_server_seq(&self) -> i64 {
        self.last_server_seq
    }

    /// Envelopes parked waiting for a gap to fill.
    pub fn reorder_queue_len(&self) -> usize {
        self.reorder_queue.len()
    }

    /// Stamp an outbound envelope with nonce and causal context. The
    /// returned nonce is the acknowledgment key to remember.
    pub fn stamp(&mut self, mut envelope: OpEnvelope) -> (OpEnvelope, String) {
        let nonce = wire::client_nonce(&self.memberid, self.router_sequence);
        self.router_sequence += 1;
        envelope.client_nonce = Some(nonce.clone());
        envelope.parent_op = Some(wire::parent_op(
            self.last_server_seq,
            self.sends_since_server_op,
        ));
        self.sends_since_server_op += 1;
        (envelope, nonce)
    }

    /// Take in one sequenced envelope. Returns how many envelopes were
    /// released to playback (zero when this one is parked behind a gap).
    pub fn receive(&mut self, envelope: OpEnvelope) -> Result<usize, RouterError> {
        let seq = envelope.server_seq.ok_or(RouterError::MissingSequence)?;
        if seq as i64 <= self.last_server_seq || self.reorder_queue.contains_key(&seq) {
            return Err(RouterError::DuplicateSequence { seq });
        }
        self.reorder_queue.insert(seq, envelope);

        let mut released = 0;
        while let Some(entry) = self
            .reorder_queue
            .first_entry()
            .filter(|e| *e.key() as i64 == self.last_server_seq + 1)
        {
            let (seq, env) = entry.remove_entry();
            self.playback_tx
                .send(env)
                .map_err(|_| RouterError::ChannelClosed)?;
            self.last_server_seq = seq as i64;
            self.sends_since_server_op = 0;
            released += 1;
        }
        if released == 0 {
            debug!(
                seq,
                expected = self.last_server_seq + 1,
                "parked out-of-order envelope"
            );
        }
        Ok(released)
    }

    /// Pull the transport's full history through the receive path,
    /// skipping what was already played back. Returns the count released.
    pub fn replay<T: Transport>(&mut self, transport: &T) -> Result<usize, RouterError> {
        let mut released = 0;
        for env in transport
            .replay()
            .map_err(|_| RouterError::ChannelClosed)?
        {
            let already = env
                .server_seq
                .is_some_and(|s| s as i64 <= self.last_server_seq);
            if !already {
                released += self.receive(env)?;
            }
        }
        Ok(released)
    }
}

// ============================================================================
// Tests
// ============================================================================
