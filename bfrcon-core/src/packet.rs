//! Frames: a sequence header, a size, a word count, and the words.
//!
//! ```text
//! sequence:   u32  (4)
//! total_size: u32  (4)  header + all encoded words
//! word_count: u32  (4)
//! words:      [Word] (total_size - 12)
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::RconError;
use crate::sequence::{SEQUENCE_SIZE, Sequence};
use crate::word::{Word, words_to_strings};

/// Size of the fixed frame header.
pub const HEADER_SIZE: usize = 12;

/// Largest frame either side may send.
pub const MAX_FRAME_SIZE: usize = 16384;

const SIZE_OFFSET: usize = 4;
const WORD_COUNT_OFFSET: usize = 8;

/// Status word of a successful response.
pub const RESPONSE_OK: &str = "OK";

#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    sequence: Sequence,
    words: Vec<Word>,
}

impl Packet {
    pub fn new(sequence: Sequence, words: Vec<Word>) -> Self {
        Self { sequence, words }
    }

    /// The reply to `request` carrying `words` (status first).
    pub fn response_to(request: &Sequence, words: Vec<Word>) -> Self {
        Self::new(request.response(), words)
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn into_words(self) -> Vec<Word> {
        self.words
    }

    /// The first word: command/event name, or response status.
    pub fn first_word(&self) -> Option<&Word> {
        self.words.first()
    }

    /// Everything after the first word.
    pub fn arguments(&self) -> &[Word] {
        self.words.get(1..).unwrap_or(&[])
    }

    /// `true` when this is a response whose status is exactly `OK`.
    pub fn is_ok(&self) -> bool {
        self.first_word()
            .is_some_and(|w| w.as_bytes() == RESPONSE_OK.as_bytes())
    }

    /// Total encoded size, header included.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.words.iter().map(Word::encoded_len).sum::<usize>()
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_slice(&self.sequence.to_bytes());
        dst.put_u32_le(self.encoded_len() as u32);
        dst.put_u32_le(self.words.len() as u32);
        for word in &self.words {
            word.encode(dst);
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode exactly one complete, already-delimited frame.
    pub fn decode(frame: &[u8]) -> Result<Self, RconError> {
        if frame.len() < HEADER_SIZE {
            return Err(RconError::TruncatedFrame {
                needed: HEADER_SIZE,
                available: frame.len(),
            });
        }
        let declared = read_u32(frame, SIZE_OFFSET) as usize;
        if declared != frame.len() {
            return Err(RconError::SizeMismatch {
                declared,
                actual: frame.len(),
            });
        }

        let mut sequence = [0u8; SEQUENCE_SIZE];
        sequence.copy_from_slice(&frame[..SEQUENCE_SIZE]);
        let sequence = Sequence::from_bytes(sequence);

        let word_count = read_u32(frame, WORD_COUNT_OFFSET);
        let mut words = Vec::with_capacity(word_count.min(256) as usize);
        let mut offset = HEADER_SIZE;
        for decoded in 0..word_count {
            match Word::decode(frame, offset) {
                Ok((word, used)) => {
                    words.push(word);
                    offset += used;
                }
                Err(RconError::TruncatedFrame { .. }) => {
                    return Err(RconError::MalformedWordCount {
                        declared: word_count,
                        decoded,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if offset != frame.len() {
            return Err(RconError::SizeMismatch {
                declared,
                actual: offset,
            });
        }

        Ok(Self { sequence, words })
    }

    /// Command text for diagnostics.
    pub fn to_strings(&self) -> Vec<String> {
        words_to_strings(&self.words)
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("sequence", &self.sequence)
            .field("words", &self.words)
            .finish()
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

// ── Stream reassembly ────────────────────────────────────────────

/// Length of the frame at the start of `buf`, once its size field is
/// readable. `Ok(None)` means more bytes are needed to know.
pub fn peek_frame_len(buf: &[u8]) -> Result<Option<usize>, RconError> {
    if buf.len() < SIZE_OFFSET + 4 {
        return Ok(None);
    }
    let size = read_u32(buf, SIZE_OFFSET) as usize;
    if !(HEADER_SIZE..=MAX_FRAME_SIZE).contains(&size) {
        return Err(RconError::InvalidFrameSize {
            size,
            min: HEADER_SIZE,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(Some(size))
}

/// Split a byte stream into complete frames plus the leftover tail.
///
/// The remainder must be prepended to the next chunk read from the
/// socket. Frames are returned undecoded.
pub fn split_frames(buf: &[u8]) -> Result<(Vec<Bytes>, Bytes), RconError> {
    let mut frames = Vec::new();
    let mut rest = buf;
    while let Some(size) = peek_frame_len(rest)? {
        if rest.len() < size {
            break;
        }
        let (frame, tail) = rest.split_at(size);
        frames.push(Bytes::copy_from_slice(frame));
        rest = tail;
    }
    Ok((frames, Bytes::copy_from_slice(rest)))
}
