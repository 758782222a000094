//! The word: a length-prefixed, NUL-terminated byte string.
//!
//! ```text
//! length:     u32  (4, little-endian, excludes terminator)
//! content:    [u8] (length)
//! terminator: u8   (1, always 0x00)
//! ```

use std::borrow::Cow;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::RconError;

/// Size of the length prefix.
pub const WORD_LENGTH_SIZE: usize = 4;

/// Size of the trailing NUL.
pub const WORD_TERMINATOR_SIZE: usize = 1;

/// A single protocol word. Immutable once built.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Word {
    content: Bytes,
}

impl Word {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Raw content bytes, without prefix or terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Bytes this word occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        WORD_LENGTH_SIZE + self.content.len() + WORD_TERMINATOR_SIZE
    }

    /// Content as text. Invalid UTF-8 is replaced, never rejected.
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// Parse the longest leading float, skipping leading whitespace, so
    /// `"12abc"` is 12. `NaN` when the text does not start with a number.
    pub fn to_number(&self) -> f64 {
        leading_float(&self.to_text())
    }

    /// Only the exact, lowercase literal `true` is true.
    pub fn to_boolean(&self) -> bool {
        self.content.as_ref() == b"true"
    }

    /// Append the wire form of this word to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u32_le(self.content.len() as u32);
        dst.put_slice(&self.content);
        dst.put_u8(0);
    }

    /// Decode the word starting at `offset`.
    ///
    /// Returns the word and the number of bytes it consumed.
    pub fn decode(bytes: &[u8], offset: usize) -> Result<(Word, usize), RconError> {
        let header_end = offset + WORD_LENGTH_SIZE;
        if header_end > bytes.len() {
            return Err(RconError::TruncatedFrame {
                needed: header_end,
                available: bytes.len(),
            });
        }
        let mut length = [0u8; WORD_LENGTH_SIZE];
        length.copy_from_slice(&bytes[offset..header_end]);
        let length = u32::from_le_bytes(length) as usize;

        let consumed = WORD_LENGTH_SIZE + length + WORD_TERMINATOR_SIZE;
        if offset + consumed > bytes.len() {
            return Err(RconError::TruncatedFrame {
                needed: offset + consumed,
                available: bytes.len(),
            });
        }

        let content = Bytes::copy_from_slice(&bytes[header_end..header_end + length]);
        Ok((Word { content }, consumed))
    }
}

impl From<&str> for Word {
    fn from(s: &str) -> Self {
        Word::new(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Word {
    fn from(s: String) -> Self {
        Word::new(s.into_bytes())
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:?})", self.to_text())
    }
}

/// Lossy text of every word, for diagnostics.
pub fn words_to_strings(words: &[Word]) -> Vec<String> {
    words.iter().map(|w| w.to_text().into_owned()).collect()
}

fn leading_float(text: &str) -> f64 {
    let s = text.trim_start();
    let b = s.as_bytes();
    let digits = |from: usize| b.iter().skip(from).take_while(|c| c.is_ascii_digit()).count();

    let mut end = usize::from(matches!(b.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return if b.first() == Some(&b'-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let whole = digits(end);
    end += whole;
    let mut fraction = 0;
    if b.get(end) == Some(&b'.') {
        fraction = digits(end + 1);
        if whole + fraction > 0 {
            end += 1 + fraction;
        }
    }
    if whole + fraction == 0 {
        return f64::NAN;
    }

    if matches!(b.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(b.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let n = digits(exponent);
        if n > 0 {
            end = exponent + n;
        }
    }
    s[..end].parse().unwrap_or(f64::NAN)
}
