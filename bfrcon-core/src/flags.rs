use bitflags::bitflags;

bitflags! {
    /// The two high bits of a sequence header.
    ///
    /// The remaining 30 bits carry the counter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SequenceFlags: u32 {
        /// Set when the exchange was started by the client.
        const CLIENT_ORIGIN = 0x8000_0000;
        /// Set when the frame answers an earlier request.
        const RESPONSE = 0x4000_0000;
    }
}

/// Mask selecting the counter bits.
pub const COUNTER_MASK: u32 = !SequenceFlags::all().bits();
