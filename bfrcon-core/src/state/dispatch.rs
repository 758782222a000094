//! Send-side bookkeeping for the connection manager.
//!
//! Tracks the sequence counter, the requests waiting for a reply, the
//! requests waiting to be written, and the priority gate. Holds no I/O;
//! the manager decides when frames actually hit the socket.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::RconError;
use crate::message::{MessageType, Origin};
use crate::packet::Packet;
use crate::sequence::Sequence;

/// Where a request's outcome is delivered.
pub type ReplySender = oneshot::Sender<Result<Packet, RconError>>;

// ── TrackedRequest ────────────────────────────────────────────────

/// A command owned by the manager, queued or in flight.
#[derive(Debug)]
pub struct TrackedRequest {
    /// Unique per request; counters may repeat after wrapping.
    pub id: u64,
    /// The frame to write.
    pub packet: Packet,
    /// Jumps the queue and holds back ordinary traffic until answered.
    pub priorized: bool,
    /// Priority step whose reply leaves the gate closed.
    pub hold_gate: bool,
    /// Goes back to the queue on disconnect instead of failing.
    pub requeue: bool,
    /// Reply window, counted from the moment the frame is written.
    pub timeout: Option<Duration>,
    /// When the frame was last written.
    pub sent_at: Option<Instant>,
    /// Handle of the armed timeout task, if any.
    pub timer: Option<AbortHandle>,
    reply: Option<ReplySender>,
}

impl TrackedRequest {
    pub fn new(id: u64, packet: Packet, reply: ReplySender) -> Self {
        Self {
            id,
            packet,
            priorized: false,
            hold_gate: false,
            requeue: true,
            timeout: None,
            sent_at: None,
            timer: None,
            reply: Some(reply),
        }
    }

    pub fn counter(&self) -> u32 {
        self.packet.sequence().counter()
    }

    /// Command text for diagnostics.
    pub fn command(&self) -> Vec<String> {
        self.packet.to_strings()
    }

    /// How long the frame has been in flight.
    pub fn elapsed(&self) -> Option<Duration> {
        self.sent_at.map(|t| t.elapsed())
    }

    /// Cancel the armed timeout, if any.
    pub fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Deliver the outcome. A caller that stopped waiting is ignored.
    pub fn complete(mut self, result: Result<Packet, RconError>) {
        self.disarm();
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(result);
        }
    }
}

// ── DispatchState ─────────────────────────────────────────────────

/// A request removed from `pending`, and whether removing it lifted the
/// priority gate.
#[derive(Debug)]
pub struct Resolved {
    pub request: TrackedRequest,
    pub released: bool,
}

#[derive(Debug, Default)]
pub struct DispatchState {
    /// Written, awaiting a reply; in write order.
    pending: VecDeque<TrackedRequest>,

    /// Not yet written; priority requests first, FIFO within each group.
    queued: VecDeque<TrackedRequest>,

    /// Last sequence handed out.
    sequence: Option<Sequence>,

    /// While set, only priority requests may be written.
    wait_for_priorized: bool,
}

impl DispatchState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Sequencing ────────────────────────────────────────────────

    /// Issue the header for a new client command.
    pub fn next_sequence(&mut self) -> Sequence {
        let next = match self.sequence {
            Some(last) => last.next(Origin::Client, MessageType::Request),
            None => Sequence::first(Origin::Client, MessageType::Request),
        };
        self.sequence = Some(next);
        next
    }

    // ── Gate ──────────────────────────────────────────────────────

    pub fn wait_for_priorized(&self) -> bool {
        self.wait_for_priorized
    }

    /// Whether the gate lets `request` through right now.
    pub fn may_send(&self, request: &TrackedRequest) -> bool {
        request.priorized || !self.wait_for_priorized
    }

    fn release_if_idle(&mut self) -> bool {
        if self.pending.is_empty() && self.wait_for_priorized {
            self.wait_for_priorized = false;
            return true;
        }
        false
    }

    // ── Queue ─────────────────────────────────────────────────────

    /// Park a request until it can be written.
    pub fn enqueue(&mut self, request: TrackedRequest) {
        if request.priorized {
            let at = self.queued.iter().take_while(|r| r.priorized).count();
            self.queued.insert(at, request);
        } else {
            self.queued.push_back(request);
        }
    }

    /// Drain the queue for a flush, priority requests first.
    pub fn take_queued(&mut self) -> Vec<TrackedRequest> {
        let (mut first, rest): (Vec<_>, Vec<_>) =
            self.queued.drain(..).partition(|r| r.priorized);
        first.extend(rest);
        first
    }

    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// Counters of the queued requests, in flush order.
    pub fn queued_counters(&self) -> Vec<u32> {
        self.queued.iter().map(TrackedRequest::counter).collect()
    }

    // ── Pending ───────────────────────────────────────────────────

    /// Record that `request` was written.
    ///
    /// An older pending entry with the same counter is displaced and
    /// returned so the caller can fail it.
    pub fn mark_sent(&mut self, mut request: TrackedRequest) -> Option<TrackedRequest> {
        let superseded = self
            .pending
            .iter()
            .position(|r| r.counter() == request.counter())
            .and_then(|i| self.pending.remove(i));

        if request.priorized {
            self.wait_for_priorized = true;
        }
        request.sent_at = Some(Instant::now());
        self.pending.push_back(request);
        superseded
    }

    /// Take the pending request answered by a frame with `counter`.
    /// A `hold_gate` reply never lifts the gate.
    pub fn take_response(&mut self, counter: u32) -> Option<Resolved> {
        let index = self.pending.iter().position(|r| r.counter() == counter)?;
        let request = self.pending.remove(index)?;
        let released = !request.hold_gate && self.release_if_idle();
        Some(Resolved { request, released })
    }

    /// Remove a pending request by id (its timeout fired).
    pub fn expire(&mut self, id: u64) -> Option<Resolved> {
        let index = self.pending.iter().position(|r| r.id == id)?;
        let request = self.pending.remove(index)?;
        let released = self.release_if_idle();
        Some(Resolved { request, released })
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, counter: u32) -> bool {
        self.pending.iter().any(|r| r.counter() == counter)
    }

    // ── Disconnect ────────────────────────────────────────────────

    /// Move in-flight requests back to the front of the queue, in their
    /// original order, and close the gate until a priority request is
    /// answered.
    ///
    /// Returns the requests flagged to be dropped instead.
    pub fn requeue_pending(&mut self) -> Vec<TrackedRequest> {
        let mut dropped = Vec::new();
        let mut survivors = Vec::new();
        for mut request in self.pending.drain(..) {
            request.disarm();
            request.sent_at = None;
            if request.requeue {
                survivors.push(request);
            } else {
                dropped.push(request);
            }
        }
        for request in survivors.into_iter().rev() {
            self.queued.push_front(request);
        }
        self.wait_for_priorized = true;
        dropped
    }
}

// ── Tests ─────────────────────────────────────────────────────────
