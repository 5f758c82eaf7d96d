//! Module assembly.
//!
//! Wraps per-function streams in the five-word module preamble (magic,
//! version, generator, id bound, schema) and concatenates them in module
//! order. Byte order is fixed to the host's when the assembler is created.

use std::io::{self, Write};

use crate::core::error::DecodeError;
use crate::encode::words::{write_words, words_to_bytes, Endianness};

pub const MAGIC: u32 = 0x0723_0203;
pub const HEADER_WORDS: usize = 5;

/// Header fields that are not derived from the functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleOptions {
    pub version_major: u8,
    pub version_minor: u8,
    pub generator: u32,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self { version_major: 1, version_minor: 0, generator: 0 }
    }
}

impl ModuleOptions {
    pub fn version_word(&self) -> u32 {
        (u32::from(self.version_major) << 16) | (u32::from(self.version_minor) << 8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHeader {
    pub magic: u32,
    pub version: u32,
    pub generator: u32,
    pub bound: u32,
    pub schema: u32,
}

impl ModuleHeader {
    pub fn to_words(&self) -> [u32; HEADER_WORDS] {
        [self.magic, self.version, self.generator, self.bound, self.schema]
    }

    pub fn parse(words: &[u32]) -> Result<Self, DecodeError> {
        let [magic, version, generator, bound, schema] = match words.get(..HEADER_WORDS) {
            Some(&[a, b, c, d, e]) => [a, b, c, d, e],
            _ => return Err(DecodeError::ShortHeader { len: words.len() }),
        };
        if magic != MAGIC {
            return Err(DecodeError::BadMagic { found: magic });
        }
        Ok(Self { magic, version, generator, bound, schema })
    }
}

/// Collects function streams and produces the final module.
#[derive(Debug, Clone)]
pub struct ModuleAssembler {
    options: ModuleOptions,
    endianness: Endianness,
    bound: u32,
    body: Vec<u32>,
    functions: usize,
}

impl ModuleAssembler {
    pub fn new(options: ModuleOptions) -> Self {
        Self {
            options,
            endianness: Endianness::host(),
            bound: 1,
            body: Vec::new(),
            functions: 0,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Append one function's stream. `id_count` is the number of ids the
    /// stream may reference; encoded ids run from 1 to `id_count`.
    pub fn append_function(&mut self, words: &[u32], id_count: u32) {
        self.bound = self.bound.max(id_count.saturating_add(1));
        self.body.extend_from_slice(words);
        self.functions += 1;
    }

    pub fn function_count(&self) -> usize {
        self.functions
    }

    pub fn header(&self) -> ModuleHeader {
        ModuleHeader {
            magic: MAGIC,
            version: self.options.version_word(),
            generator: self.options.generator,
            bound: self.bound,
            schema: 0,
        }
    }

    /// Header followed by every appended stream.
    pub fn finish(&self) -> Vec<u32> {
        let mut words = Vec::with_capacity(HEADER_WORDS + self.body.len());
        words.extend_from_slice(&self.header().to_words());
        words.extend_from_slice(&self.body);
        words
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.finish(), self.endianness)
    }

    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        write_words(out, &self.finish(), self.endianness)
    }
}
