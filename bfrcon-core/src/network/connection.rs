//! The connection manager.
//!
//! [`Rcon`] owns one TCP stream, split into a reader task and a writer
//! task that talk to the socket through [`RconCodec`]. All bookkeeping
//! (sequence counter, queued and pending requests, priority gate) lives
//! in a single [`DispatchState`] behind a mutex, so every mutation is
//! serialized no matter which task triggers it.
//!
//! ```text
//!  Request::send ──► dispatch ──► queued ──(flush)──┐
//!                        │                          ▼
//!                        └──────────────► writer task ──► socket
//!                                                            │
//!  reply / event ◄── on_packet ◄── reader task ◄─────────────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::codec::RconCodec;
use crate::config::RconConfig;
use crate::error::RconError;
use crate::message::{Argument, command_words};
use crate::packet::Packet;
use crate::request::Request;
use crate::state::{ConnectionPhase, DispatchState, Resolved, TrackedRequest};
use crate::word::Word;

/// Frames handed to the writer task but not yet on the wire. A full
/// buffer counts as "not writable" and sends go to the queue instead.
const WRITE_BUFFER: usize = 64;

/// Subscriber capacity for lifecycle notifications.
const LIFECYCLE_CAPACITY: usize = 32;

/// Called with the event name and its arguments for every server-origin
/// request frame.
pub type EventHandler = Arc<dyn Fn(&str, &[Word]) + Send + Sync>;

/// Socket-level notifications, for reconnect policy and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Connected,
    /// The stream ended. `reason` is set when it ended on an error.
    Closed { reason: Option<String> },
    /// A recoverable problem: an unmatched reply, an empty event, or the
    /// read error that is about to close the stream.
    Error(String),
}

// ── Rcon ──────────────────────────────────────────────────────────

/// Handle to a connection manager. Cheap to clone; all clones share the
/// same socket and queues.
#[derive(Clone)]
pub struct Rcon {
    shared: Arc<Shared>,
}

struct Shared {
    config: RconConfig,
    inner: Mutex<Inner>,
    lifecycle: broadcast::Sender<Lifecycle>,
    on_event: EventHandler,
    next_id: AtomicU64,
}

#[derive(Default)]
struct Inner {
    phase: ConnectionPhase,
    link: Option<Link>,
    dispatch: DispatchState,
    /// Bumped on every connect so callbacks from a dead socket are ignored.
    generation: u64,
}

struct Link {
    generation: u64,
    writer: mpsc::Sender<Packet>,
    reader: AbortHandle,
}

impl Rcon {
    pub fn new<F>(config: RconConfig, on_event: F) -> Self
    where
        F: Fn(&str, &[Word]) + Send + Sync + 'static,
    {
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner::default()),
                lifecycle,
                on_event: Arc::new(on_event),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn from_weak(shared: &Weak<Shared>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &RconConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Lifecycle> {
        self.shared.lifecycle.subscribe()
    }

    fn notify(&self, event: Lifecycle) {
        // No subscribers is fine.
        let _ = self.shared.lifecycle.send(event);
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.lock().phase.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().phase.is_connected()
    }

    /// Requests written and awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.lock().dispatch.pending_count()
    }

    /// Requests waiting to be written.
    pub fn queued_count(&self) -> usize {
        self.lock().dispatch.queued_count()
    }

    /// Whether ordinary traffic is held back behind a priority request.
    pub fn is_waiting_for_priorized(&self) -> bool {
        self.lock().dispatch.wait_for_priorized()
    }

    // ── Connect / stop ───────────────────────────────────────────

    /// Open the socket and flush anything queued while disconnected.
    pub async fn connect(&self) -> Result<(), RconError> {
        self.lock().phase.begin_connect()?;

        let network = &self.shared.config.network;
        let address = network.address();
        let timeout = network.connect_timeout();
        debug!("connecting to {address}");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.lock().phase.force_disconnect();
                return Err(RconError::ConnectFailed { address, source });
            }
            Err(_) => {
                self.lock().phase.force_disconnect();
                return Err(RconError::ConnectTimeout { address, timeout });
            }
        };
        if let Err(source) = stream.set_nodelay(true) {
            self.lock().phase.force_disconnect();
            return Err(RconError::ConnectFailed { address, source });
        }
        let (read_half, write_half) = stream.into_split();
        let (writer, outbox) = mpsc::channel(WRITE_BUFFER);

        {
            let mut inner = self.lock();
            inner.phase.complete_connect()?;
            inner.generation += 1;
            let generation = inner.generation;
            let weak = Arc::downgrade(&self.shared);

            tokio::spawn(write_loop(
                weak.clone(),
                generation,
                FramedWrite::new(write_half, RconCodec),
                outbox,
            ));
            let reader = tokio::spawn(read_loop(
                weak,
                generation,
                FramedRead::new(read_half, RconCodec),
            ));

            inner.link = Some(Link {
                generation,
                writer,
                reader: reader.abort_handle(),
            });
            self.flush(&mut inner);
        }

        info!("connected to {address}");
        self.notify(Lifecycle::Connected);
        Ok(())
    }

    /// Close the socket. In-flight requests are requeued or dropped
    /// exactly as on a remote close.
    pub fn stop(&self) {
        let generation = {
            let inner = self.lock();
            match &inner.link {
                Some(link) => {
                    link.reader.abort();
                    link.generation
                }
                None => return,
            }
        };
        self.on_disconnect(generation, None);
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Build a command with the next sequence number. Nothing is sent
    /// until [`Request::send`].
    pub fn create_command<I, A>(&self, name: &str, args: I) -> Request
    where
        I: IntoIterator<Item = A>,
        A: Into<Argument>,
    {
        let words = command_words(name, args.into_iter().map(Into::into));
        let sequence = self.lock().dispatch.next_sequence();
        Request::new(
            self.clone(),
            Packet::new(sequence, words),
            self.shared.config.requests.timeout(),
        )
    }

    pub(crate) fn next_request_id(&self) -> u64 {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Write `request` now if the socket and the gate allow it, queue it
    /// otherwise.
    pub(crate) fn dispatch(&self, request: TrackedRequest) {
        let mut inner = self.lock();
        self.submit(&mut inner, request);
    }

    fn submit(&self, inner: &mut Inner, mut request: TrackedRequest) {
        let Inner {
            phase,
            link,
            dispatch,
            ..
        } = inner;

        let link = match link {
            Some(link) if phase.is_connected() => link,
            _ => {
                dispatch.enqueue(request);
                return;
            }
        };
        if !dispatch.may_send(&request) {
            debug!(counter = request.counter(), "held behind priority request");
            dispatch.enqueue(request);
            return;
        }
        let permit = match link.writer.try_reserve() {
            Ok(permit) => permit,
            Err(_) => {
                debug!(counter = request.counter(), "socket not writable; queued");
                dispatch.enqueue(request);
                return;
            }
        };

        permit.send(request.packet.clone());
        self.arm_timer(&mut request);
        debug!(
            counter = request.counter(),
            priorized = request.priorized,
            "sent {:?}",
            request.command()
        );
        if let Some(old) = dispatch.mark_sent(request) {
            let counter = old.counter();
            warn!(counter, "counter reused while still pending; failing older request");
            old.complete(Err(RconError::Superseded { counter }));
        }
    }

    /// Try to write everything queued, priority requests first.
    fn flush(&self, inner: &mut Inner) {
        for request in inner.dispatch.take_queued() {
            self.submit(inner, request);
        }
    }

    fn arm_timer(&self, request: &mut TrackedRequest) {
        let Some(timeout) = request.timeout else {
            return;
        };
        let shared = Arc::downgrade(&self.shared);
        let id = request.id;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(rcon) = Rcon::from_weak(&shared) {
                rcon.expire(id, timeout);
            }
        });
        request.timer = Some(timer.abort_handle());
    }

    // ── Socket callbacks ─────────────────────────────────────────

    fn on_packet(&self, generation: u64, packet: Packet) {
        let counter = packet.sequence().counter();
        let resolved = {
            let mut inner = self.lock();
            if inner.link.as_ref().map(|link| link.generation) != Some(generation) {
                return;
            }
            let resolved = inner.dispatch.take_response(counter);
            if let Some(Resolved { released, .. }) = &resolved {
                if *released {
                    debug!(counter, "priority reply received; releasing queue");
                }
                if *released || inner.dispatch.queued_count() > 0 {
                    self.flush(&mut inner);
                }
            }
            resolved
        };

        match resolved {
            Some(Resolved { request, .. }) => request.complete(Ok(packet)),
            None if packet.sequence().is_response() => {
                let err = RconError::UnrecognizedResponse { counter };
                warn!("{err}");
                self.notify(Lifecycle::Error(err.to_string()));
            }
            None => match packet.first_word() {
                Some(name) => (self.shared.on_event)(&name.to_text(), packet.arguments()),
                None => {
                    warn!(counter, "server sent an empty event");
                    self.notify(Lifecycle::Error(format!("empty event (counter {counter})")));
                }
            },
        }
    }

    fn expire(&self, id: u64, timeout: Duration) {
        let resolved = {
            let mut inner = self.lock();
            let resolved = inner.dispatch.expire(id);
            if let Some(Resolved { released, .. }) = &resolved {
                if *released || inner.dispatch.queued_count() > 0 {
                    self.flush(&mut inner);
                }
            }
            resolved
        };

        if let Some(Resolved { mut request, .. }) = resolved {
            // This task is the timer; nothing left to abort.
            request.timer = None;
            let command = request.command();
            warn!("{command:?} timed out after {timeout:?}");
            request.complete(Err(RconError::RequestTimeout { command, timeout }));
        }
    }

    fn on_disconnect(&self, generation: u64, reason: Option<String>) {
        let dropped = {
            let mut inner = self.lock();
            match &inner.link {
                Some(link) if link.generation == generation => {}
                _ => return,
            }
            if let Some(link) = inner.link.take() {
                link.reader.abort();
            }
            inner.phase.force_disconnect();
            let dropped = inner.dispatch.requeue_pending();
            info!(
                requeued = inner.dispatch.queued_count(),
                dropped = dropped.len(),
                "connection closed"
            );
            dropped
        };

        for request in dropped {
            let command = request.command();
            request.complete(Err(RconError::DroppedOnDisconnect { command }));
        }
        self.notify(Lifecycle::Closed { reason });
    }
}

impl fmt::Debug for Rcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Rcon")
            .field("address", &self.shared.config.network.address())
            .field("phase", &inner.phase)
            .field("pending", &inner.dispatch.pending_count())
            .field("queued", &inner.dispatch.queued_count())
            .field("wait_for_priorized", &inner.dispatch.wait_for_priorized())
            .finish()
    }
}

// ── Socket tasks ──────────────────────────────────────────────────

async fn read_loop(
    shared: Weak<Shared>,
    generation: u64,
    mut frames: FramedRead<OwnedReadHalf, RconCodec>,
) {
    let reason = loop {
        match frames.next().await {
            Some(Ok(packet)) => match Rcon::from_weak(&shared) {
                Some(rcon) => rcon.on_packet(generation, packet),
                None => return,
            },
            Some(Err(e)) => {
                warn!("read error: {e}");
                if let Some(rcon) = Rcon::from_weak(&shared) {
                    rcon.notify(Lifecycle::Error(e.to_string()));
                }
                break Some(e.to_string());
            }
            None => break None,
        }
    };
    if let Some(rcon) = Rcon::from_weak(&shared) {
        rcon.on_disconnect(generation, reason);
    }
}

async fn write_loop(
    shared: Weak<Shared>,
    generation: u64,
    mut sink: FramedWrite<OwnedWriteHalf, RconCodec>,
    mut outbox: mpsc::Receiver<Packet>,
) {
    while let Some(packet) = outbox.recv().await {
        if let Err(e) = sink.send(packet).await {
            warn!("write error: {e}");
            if let Some(rcon) = Rcon::from_weak(&shared) {
                rcon.notify(Lifecycle::Error(e.to_string()));
                rcon.on_disconnect(generation, Some(e.to_string()));
            }
            return;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────
