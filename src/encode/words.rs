//! Word writer.
//!
//! Streams are built as `u32` words and only turned into bytes when a module
//! is written out. The byte order is the host's: the format is defined as
//! host-endian, and readers detect the order from the magic number.

use std::io::{self, Write};

use crate::core::error::DecodeError;
use crate::core::session::WordBuffer;

/// Destination for encoded words.
pub trait WordSink {
    fn push_word(&mut self, word: u32);
}

impl WordSink for Vec<u32> {
    fn push_word(&mut self, word: u32) {
        self.push(word);
    }
}

impl WordSink for WordBuffer<'_> {
    fn push_word(&mut self, word: u32) {
        self.push(word);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the machine running the encoder.
    pub const fn host() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    pub fn word_to_bytes(self, word: u32) -> [u8; 4] {
        match self {
            Endianness::Little => word.to_le_bytes(),
            Endianness::Big => word.to_be_bytes(),
        }
    }

    pub fn word_from_bytes(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// Write `words` to `out` in the given byte order.
pub fn write_words<W: Write + ?Sized>(out: &mut W, words: &[u32], order: Endianness) -> io::Result<()> {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    for &word in words {
        bytes.extend_from_slice(&order.word_to_bytes(word));
    }
    out.write_all(&bytes)
}

/// Serialize `words` into a byte vector.
pub fn words_to_bytes(words: &[u32], order: Endianness) -> Vec<u8> {
    words.iter().flat_map(|&w| order.word_to_bytes(w)).collect()
}

/// Split a byte stream back into words.
pub fn bytes_to_words(bytes: &[u8], order: Endianness) -> Result<Vec<u32>, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::UnalignedBytes { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| order.word_from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_order_matches_native_bytes() {
        let word = 0x0723_0203u32;
        assert_eq!(Endianness::host().word_to_bytes(word), word.to_ne_bytes());
    }

    #[test]
    fn test_explicit_orders() {
        assert_eq!(Endianness::Little.word_to_bytes(0x0102_0304), [4, 3, 2, 1]);
        assert_eq!(Endianness::Big.word_to_bytes(0x0102_0304), [1, 2, 3, 4]);
    }

    #[test]
    fn test_write_and_split() {
        let words = [1u32, 0xdead_beef, 42];
        let mut out = Vec::new();
        write_words(&mut out, &words, Endianness::Big).unwrap();
        assert_eq!(out, words_to_bytes(&words, Endianness::Big));
        assert_eq!(bytes_to_words(&out, Endianness::Big).unwrap(), words);
        assert_eq!(
            bytes_to_words(&out[..5], Endianness::Big),
            Err(DecodeError::UnalignedBytes { len: 5 })
        );
    }
}
