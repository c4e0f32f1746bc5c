//! The editing session: local pipeline around one document replica.
//!
//! A session owns a [`DocumentModel`] and keeps it converged with every
//! other session on the same hub:
//!
//! - local operations execute immediately, go on the *pending* list, and
//!   are stamped and delivered to the arbiter;
//! - inbound sequenced operations that carry a nonce this session issued
//!   are acknowledgments: the matching pending entries are dropped,
//!   nothing re-executes. A nonce from an earlier life of the same member
//!   id is not ours; that envelope is ordinary history and executes;
//! - other inbound operations are transformed against the pending list
//!   (entry by entry, so a fragmented entry keeps its nonce) and then
//!   executed. An execute returning `false` is a stale target; it is
//!   logged and skipped, never fatal.
//!
//! A transform conflict or a misordered acknowledgment marks the session
//! *desynced*: the replica can no longer be trusted and the caller must
//! rejoin through a fresh session and `request_replay`.

use std::collections::{HashSet, VecDeque};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use shodo_ot::{transform, DocumentModel, OperationFactory, OpKind, Operation};
use shodo_types::wire::OpEnvelope;
use shodo_types::{now_millis, DocumentId, MemberId};

use crate::error::{Result, SessionError};
use crate::router::OperationRouter;
use crate::transport::Transport;

/// Identity of one session: which document, as which member.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub document_id: DocumentId,
    pub memberid: MemberId,
}

impl SessionContext {
    pub fn new(document_id: DocumentId, memberid: MemberId) -> Self {
        Self {
            document_id,
            memberid,
        }
    }
}

/// Notifications emitted while applying inbound operations.
#[derive(Clone, Debug, PartialEq, strum::AsRefStr)]
pub enum SessionEvent {
    OperationApplied { memberid: MemberId, optype: String },
    OperationSkipped { memberid: MemberId, optype: String },
    MemberJoined(MemberId),
    MemberLeft(MemberId),
    CursorMoved(MemberId),
    Desynced,
}

/// A locally executed, not yet acknowledged operation.
struct PendingOp {
    nonce: String,
    op: Operation,
}

/// One member's live replica of a shared document.
pub struct EditingSession<T: Transport> {
    ctx: SessionContext,
    doc: DocumentModel,
    factory: OperationFactory,
    router: OperationRouter,
    playback: UnboundedReceiver<OpEnvelope>,
    transport: T,
    pending: VecDeque<PendingOp>,
    /// Every nonce this session has stamped. Fragments of an operation
    /// share its nonce, so an acknowledged nonce can arrive again.
    issued: HashSet<String>,
    subscribers: Vec<UnboundedSender<SessionEvent>>,
    desynced: bool,
}

impl<T: Transport> EditingSession<T> {
    pub fn new(ctx: SessionContext, transport: T) -> Self {
        let (router, playback) = OperationRouter::new(ctx.memberid.clone());
        Self {
            ctx,
            doc: DocumentModel::new(),
            factory: OperationFactory::new(),
            router,
            playback,
            transport,
            pending: VecDeque::new(),
            issued: HashSet::new(),
            subscribers: Vec::new(),
            desynced: false,
        }
    }

    pub fn memberid(&self) -> &MemberId {
        &self.ctx.memberid
    }

    pub fn document_id(&self) -> DocumentId {
        self.ctx.document_id
    }

    pub fn document(&self) -> &DocumentModel {
        &self.doc
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    /// Receive session events. Every subscriber sees every event.
    pub fn subscribe(&mut self) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Execute operations locally and send them for sequencing.
    pub fn enqueue_local(&mut self, kinds: Vec<OpKind>) -> Result<()> {
        self.check_live()?;
        for kind in kinds {
            let op = Operation::new(self.ctx.memberid.clone(), now_millis(), kind);
            if !op.execute(&mut self.doc) {
                return Err(SessionError::StaleLocalOperation(op.optype().to_string()));
            }
            let (envelope, nonce) = self.router.stamp(OpEnvelope::new(op.spec()));
            self.issued.insert(nonce.clone());
            self.pending.push_back(PendingOp { nonce, op });
            self.transport.deliver_op(envelope)?;
        }
        Ok(())
    }

    /// Poll the transport and process everything the router releases.
    /// Returns the number of envelopes played back.
    pub fn pump(&mut self) -> Result<usize> {
        self.check_live()?;
        for envelope in self.transport.poll()? {
            self.router.receive(envelope)?;
        }
        self.drain_playback()
    }

    /// Pull the full history through the router, for joining a document
    /// with existing content. Returns the number of envelopes applied.
    pub fn request_replay(&mut self) -> Result<usize> {
        self.check_live()?;
        let released = self.router.replay(&self.transport)?;
        let processed = self.drain_playback()?;
        info!(document = %self.ctx.document_id.short(), processed, "replay complete");
        debug_assert_eq!(released, processed);
        Ok(processed)
    }

    fn check_live(&self) -> Result<()> {
        if self.desynced {
            return Err(SessionError::SessionDesynced);
        }
        Ok(())
    }

    fn drain_playback(&mut self) -> Result<usize> {
        let mut processed = 0;
        while let Ok(envelope) = self.playback.try_recv() {
            if let Err(e) = self.process_envelope(envelope) {
                self.desynced = true;
                self.emit(SessionEvent::Desynced);
                return Err(e);
            }
            processed += 1;
        }
        Ok(processed)
    }

    fn process_envelope(&mut self, envelope: OpEnvelope) -> Result<()> {
        // Only a nonce this session stamped is an acknowledgment. Replayed
        // envelopes from an earlier session under the same member id carry
        // foreign nonces and fall through to ordinary execution.
        if let Some(nonce) = envelope
            .client_nonce
            .as_deref()
            .filter(|n| self.issued.contains(*n))
        {
            return self.acknowledge(nonce);
        }

        let Some(remote) = self.factory.create(&envelope.opspec) else {
            // Factory already warned; a malformed remote op is dropped.
            return Ok(());
        };
        self.apply_remote(remote)
    }

    /// Drop the pending entries (an operation and all its fragments share
    /// one nonce) that this acknowledgment covers.
    fn acknowledge(&mut self, nonce: &str) -> Result<()> {
        while self
            .pending
            .front()
            .is_some_and(|p| p.nonce == nonce)
        {
            self.pending.pop_front();
        }
        // A later entry with this nonce would mean the arbiter skipped
        // over earlier sends.
        if self.pending.iter().any(|p| p.nonce == nonce) {
            return Err(SessionError::AckOutOfOrder(nonce.to_string()));
        }
        Ok(())
    }

    fn apply_remote(&mut self, remote: Operation) -> Result<()> {
        // Thread the remote operation through the pending list one entry
        // at a time; fragments of an entry inherit its nonce.
        let mut remote_ops = vec![remote];
        let mut rewritten = VecDeque::with_capacity(self.pending.len());
        for entry in self.pending.drain(..) {
            let t = transform(vec![entry.op], remote_ops)?;
            remote_ops = t.remote;
            for op in t.local {
                rewritten.push_back(PendingOp {
                    nonce: entry.nonce.clone(),
                    op,
                });
            }
        }
        self.pending = rewritten;

        for op in remote_ops {
            let memberid = op.memberid.clone();
            let optype = op.optype().to_string();
            if op.execute(&mut self.doc) {
                self.emit(match &op.kind {
                    OpKind::AddMember { .. } => SessionEvent::MemberJoined(memberid),
                    OpKind::RemoveMember {} => SessionEvent::MemberLeft(memberid),
                    OpKind::MoveCursor { .. } => SessionEvent::CursorMoved(memberid),
                    _ => SessionEvent::OperationApplied { memberid, optype },
                });
            } else {
                warn!(optype = %optype, member = %memberid, "skipping stale operation");
                self.emit(SessionEvent::OperationSkipped { memberid, optype });
            }
        }
        Ok(())
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
