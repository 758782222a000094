//! # bfrcon-core
//!
//! Transport layer for the Battlefield RCON protocol.
//!
//! This crate contains:
//! - **Wire types**: `Word`, `Sequence`, `Packet`, `SequenceFlags`
//! - **Codec**: `RconCodec` for framed TCP I/O via `tokio_util`, plus
//!   `split_frames` for reassembling frames from raw chunks
//! - **Network**: `Rcon`, the connection manager with priority gating,
//!   requeue on disconnect and per-request timeouts
//! - **Request**: `Request`, the caller-side builder for one command
//! - **State**: `ConnectionPhase` and `DispatchState`, the manager's
//!   pure bookkeeping
//! - **Config**: `RconConfig`, loadable from TOML
//! - **Error**: `RconError`, a typed, `thiserror`-based error enum

pub mod codec;
pub mod config;
pub mod error;
pub mod flags;
pub mod message;
pub mod network;
pub mod packet;
pub mod request;
pub mod sequence;
pub mod state;
pub mod word;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::RconCodec;
pub use config::{NetworkConfig, RconConfig, RequestConfig};
pub use error::RconError;
pub use flags::{COUNTER_MASK, SequenceFlags};
pub use message::{Argument, MessageType, Origin, command_words};
pub use network::{EventHandler, Lifecycle, Rcon};
pub use packet::{HEADER_SIZE, MAX_FRAME_SIZE, Packet, RESPONSE_OK, peek_frame_len, split_frames};
pub use request::{Formatter, Request};
pub use sequence::{MAX_COUNTER, Sequence};
pub use state::{ConnectionPhase, DispatchState, TrackedRequest};
pub use word::{Word, words_to_strings};
