//! Socket phase of one RCON connection.
//!
//! Transitions are checked and return `Result`; the manager uses the
//! errors to reject a second `connect()` while one is running or up.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::RconError;

// ── ConnectionPhase ──────────────────────────────────────────────

/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲               │              │
///       └───────────────┴──────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,

    /// TCP connect (with its timeout) in flight.
    Connecting,

    /// Frames may be written.
    Connected { since: Instant },
}

impl ConnectionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected { .. } => "connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        *self == Self::Disconnected
    }

    /// Time since the socket came up.
    pub fn uptime(&self) -> Option<Duration> {
        if let Self::Connected { since } = self {
            Some(since.elapsed())
        } else {
            None
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// `Disconnected -> Connecting`. Anything else means a connect is
    /// already running or done.
    pub fn begin_connect(&mut self) -> Result<(), RconError> {
        if !self.is_disconnected() {
            return Err(RconError::AlreadyConnected);
        }
        *self = Self::Connecting;
        Ok(())
    }

    /// `Connecting -> Connected`. Fails if the attempt was torn down in
    /// the meantime.
    pub fn complete_connect(&mut self) -> Result<(), RconError> {
        if *self != Self::Connecting {
            return Err(RconError::ConnectionClosed);
        }
        *self = Self::Connected {
            since: Instant::now(),
        };
        Ok(())
    }

    /// Back to `Disconnected` from any phase.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Tests ────────────────────────────────────────────────────────
