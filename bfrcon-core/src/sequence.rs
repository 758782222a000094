//! The 32-bit sequence header.
//!
//! ```text
//! bit 31:    origin   (1 = Client, 0 = Server)
//! bit 30:    type     (1 = Response, 0 = Request)
//! bits 0-29: counter
//! ```
//!
//! The origin mapping is fixed by this crate and kept symmetric between
//! encode and decode. Correlation uses the counter only.

use std::fmt;

use crate::flags::{COUNTER_MASK, SequenceFlags};
use crate::message::{MessageType, Origin};

/// Encoded size on the wire.
pub const SEQUENCE_SIZE: usize = 4;

/// Largest counter value before wrapping to zero.
pub const MAX_COUNTER: u32 = 0x3FFF_FFFF;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sequence {
    counter: u32,
    origin: Origin,
    message_type: MessageType,
}

impl Sequence {
    /// Bits above the counter range are discarded.
    pub fn new(counter: u32, origin: Origin, message_type: MessageType) -> Self {
        Self {
            counter: counter & COUNTER_MASK,
            origin,
            message_type,
        }
    }

    /// First sequence a client issues.
    pub fn first(origin: Origin, message_type: MessageType) -> Self {
        Self::new(0, origin, message_type)
    }

    /// The following exchange. Origin and type come from the caller.
    pub fn next(&self, origin: Origin, message_type: MessageType) -> Self {
        let counter = if self.counter >= MAX_COUNTER {
            0
        } else {
            self.counter + 1
        };
        Self::new(counter, origin, message_type)
    }

    /// The reply header for this exchange.
    pub fn response(&self) -> Self {
        Self::new(self.counter, self.origin, MessageType::Response)
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn is_response(&self) -> bool {
        self.message_type == MessageType::Response
    }

    pub fn to_u32(&self) -> u32 {
        let mut flags = SequenceFlags::empty();
        flags.set(SequenceFlags::CLIENT_ORIGIN, self.origin == Origin::Client);
        flags.set(
            SequenceFlags::RESPONSE,
            self.message_type == MessageType::Response,
        );
        self.counter | flags.bits()
    }

    pub fn from_u32(raw: u32) -> Self {
        let flags = SequenceFlags::from_bits_truncate(raw);
        let origin = if flags.contains(SequenceFlags::CLIENT_ORIGIN) {
            Origin::Client
        } else {
            Origin::Server
        };
        let message_type = if flags.contains(SequenceFlags::RESPONSE) {
            MessageType::Response
        } else {
            MessageType::Request
        };
        Self::new(raw & COUNTER_MASK, origin, message_type)
    }

    pub fn to_bytes(&self) -> [u8; SEQUENCE_SIZE] {
        self.to_u32().to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; SEQUENCE_SIZE]) -> Self {
        Self::from_u32(u32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("counter", &self.counter)
            .field("origin", &self.origin)
            .field("message_type", &self.message_type)
            .finish()
    }
}
