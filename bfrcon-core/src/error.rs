//! Domain-specific error types for the RCON transport.
//!
//! All fallible operations return `Result<T, RconError>`.
//! Malformed wire data never panics; every failure is a typed error.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the RCON transport.
#[derive(Debug, Error)]
pub enum RconError {
    // ── Frame Errors ─────────────────────────────────────────────
    /// A word or header extends past the end of the available bytes.
    #[error("truncated frame: needed {needed} bytes, only {available} available")]
    TruncatedFrame { needed: usize, available: usize },

    /// Fewer complete words were present than the header declared.
    #[error("malformed word count: header declared {declared} words, decoded {decoded}")]
    MalformedWordCount { declared: u32, decoded: u32 },

    /// The size field disagrees with the real length of the frame.
    #[error("size mismatch: header declared {declared} bytes, frame has {actual}")]
    SizeMismatch { declared: usize, actual: usize },

    /// The size field is outside the range a frame may legally have.
    #[error("invalid frame size {size} (must be between {min} and {max})")]
    InvalidFrameSize { size: usize, min: usize, max: usize },

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP connect attempt failed.
    #[error("could not connect to {address}: {source}")]
    ConnectFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The TCP connect attempt did not finish in time.
    #[error("connect to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    /// `connect()` was called while a connection is open or opening.
    #[error("already connected")]
    AlreadyConnected,

    /// The connection manager went away before the request completed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The TCP/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // ── Request Errors ───────────────────────────────────────────
    /// The server answered with a status other than `OK`.
    #[error("command {} rejected: {status}", .command.join(" "))]
    CommandRejected { status: String, command: Vec<String> },

    /// No response arrived within the request's window.
    #[error("command {} timed out after {timeout:?}", .command.join(" "))]
    RequestTimeout {
        command: Vec<String>,
        timeout: Duration,
    },

    /// The connection dropped while a non-survivable request was in flight.
    #[error("command {} dropped on disconnect", .command.join(" "))]
    DroppedOnDisconnect { command: Vec<String> },

    /// A newer request was issued with the same (wrapped) sequence counter.
    #[error("request with sequence {counter} superseded by a newer request")]
    Superseded { counter: u32 },

    /// A response frame carried no status word.
    #[error("empty response to command {}", .command.join(" "))]
    EmptyResponse { command: Vec<String> },

    /// A response arrived for a sequence number nobody is waiting on.
    #[error("unrecognized response for sequence {counter}")]
    UnrecognizedResponse { counter: u32 },

    /// The response formatter could not interpret the result words.
    #[error("format error: {0}")]
    Format(String),
}

impl RconError {
    /// Returns `true` for errors that leave frame boundaries unreliable.
    ///
    /// The connection must be torn down after any of these.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RconError::TruncatedFrame { .. }
                | RconError::MalformedWordCount { .. }
                | RconError::SizeMismatch { .. }
                | RconError::InvalidFrameSize { .. }
        )
    }
}

impl From<String> for RconError {
    fn from(s: String) -> Self {
        RconError::Format(s)
    }
}

impl From<&str> for RconError {
    fn from(s: &str) -> Self {
        RconError::Format(s.to_string())
    }
}
