//! Caller-side handle for one command.
//!
//! A `Request` is built synchronously by [`Rcon::create_command`] and
//! transmitted by [`Request::send`], which resolves exactly once: with
//! the formatted result words, or with an error.
//!
//! [`Rcon::create_command`]: crate::Rcon::create_command

use std::fmt;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::RconError;
use crate::network::Rcon;
use crate::packet::{HEADER_SIZE, MAX_FRAME_SIZE, Packet};
use crate::sequence::Sequence;
use crate::state::TrackedRequest;
use crate::word::{Word, words_to_strings};

/// Turns the words after the `OK` status into the caller's type.
pub type Formatter<T> = Box<dyn FnOnce(&[Word]) -> Result<T, RconError> + Send>;

pub struct Request<T = Vec<String>> {
    rcon: Rcon,
    packet: Packet,
    priorized: bool,
    hold_gate: bool,
    requeue: bool,
    timeout: Option<Duration>,
    formatter: Formatter<T>,
}

impl Request<Vec<String>> {
    pub(crate) fn new(rcon: Rcon, packet: Packet, timeout: Option<Duration>) -> Self {
        Self {
            rcon,
            packet,
            priorized: false,
            hold_gate: false,
            requeue: true,
            timeout,
            formatter: Box::new(|words| Ok(words_to_strings(words))),
        }
    }
}

impl<T: Send + 'static> Request<T> {
    /// Send ahead of ordinary traffic and hold it back until answered.
    pub fn priorize(mut self) -> Self {
        self.priorized = true;
        self
    }

    /// Priority step of a longer exchange: its reply does not reopen the
    /// queue. The chain must end with a plain [`priorize`](Self::priorize)
    /// request, whose reply does.
    pub fn hold_gate(mut self) -> Self {
        self.priorized = true;
        self.hold_gate = true;
        self
    }

    /// Fail instead of retransmitting if the connection drops mid-flight.
    pub fn drop_on_disconnect(mut self) -> Self {
        self.requeue = false;
        self
    }

    /// Override the configured reply window.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait for the reply indefinitely.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Map the result words on success.
    pub fn format<U, F>(self, f: F) -> Request<U>
    where
        F: FnOnce(&[Word]) -> U + Send + 'static,
    {
        self.try_format(move |words| Ok(f(words)))
    }

    /// Map the result words on success; the mapping may fail.
    pub fn try_format<U, F>(self, f: F) -> Request<U>
    where
        F: FnOnce(&[Word]) -> Result<U, RconError> + Send + 'static,
    {
        Request {
            rcon: self.rcon,
            packet: self.packet,
            priorized: self.priorized,
            hold_gate: self.hold_gate,
            requeue: self.requeue,
            timeout: self.timeout,
            formatter: Box::new(f),
        }
    }

    /// Command name followed by its arguments.
    pub fn words(&self) -> &[Word] {
        self.packet.words()
    }

    pub fn sequence(&self) -> Sequence {
        *self.packet.sequence()
    }

    pub fn is_priorized(&self) -> bool {
        self.priorized
    }

    /// Transmit (or queue) the command and wait for its outcome.
    pub async fn send(self) -> Result<T, RconError> {
        let size = self.packet.encoded_len();
        if size > MAX_FRAME_SIZE {
            return Err(RconError::InvalidFrameSize {
                size,
                min: HEADER_SIZE,
                max: MAX_FRAME_SIZE,
            });
        }

        let command = self.packet.to_strings();
        let (tx, rx) = oneshot::channel();
        let mut tracked = TrackedRequest::new(self.rcon.next_request_id(), self.packet, tx);
        tracked.priorized = self.priorized;
        tracked.hold_gate = self.hold_gate;
        tracked.requeue = self.requeue;
        tracked.timeout = self.timeout;
        self.rcon.dispatch(tracked);

        let response = rx.await.map_err(|_| RconError::ConnectionClosed)??;
        interpret(response, command, self.formatter)
    }
}

/// Resolve on an exact `OK` status, reject with the status text otherwise.
fn interpret<T>(
    response: Packet,
    command: Vec<String>,
    formatter: Formatter<T>,
) -> Result<T, RconError> {
    match response.first_word() {
        None => Err(RconError::EmptyResponse { command }),
        Some(_) if response.is_ok() => formatter(response.arguments()),
        Some(status) => Err(RconError::CommandRejected {
            status: status.to_text().into_owned(),
            command,
        }),
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("packet", &self.packet)
            .field("priorized", &self.priorized)
            .field("hold_gate", &self.hold_gate)
            .field("requeue", &self.requeue)
            .field("timeout", &self.timeout)
            .finish()
    }
}
