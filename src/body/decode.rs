//! Strict, incremental text decoding for request bodies.
//!
//! The encoding is asserted by configuration, never detected: there is no
//! byte-order-mark sniffing, and a UTF-8 BOM at the start of a body decodes to
//! `U+FEFF` like any other character. Invalid input is an error, never a
//! replacement character, so a trace line is always byte-for-byte faithful.

use std::fmt;

use crate::error::Error;

/// The text encoding a request body is decoded with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// 7-bit US-ASCII. Any byte above `0x7F` is rejected.
    Ascii,
    /// ISO-8859-1. Every byte maps to the code point of the same value.
    Latin1,
}

impl TextEncoding {
    /// Returns the IANA charset label (e.g. `"UTF-8"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8   => "UTF-8",
            Self::Ascii  => "US-ASCII",
            Self::Latin1 => "ISO-8859-1",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes a body fed in arbitrary chunks.
///
/// A UTF-8 sequence cut in two by a chunk boundary is held back until the next
/// chunk completes it. [`finish`](Decoder::finish) rejects a sequence that is
/// still incomplete when the stream ends.
#[derive(Debug)]
pub(crate) struct Decoder {
    encoding: TextEncoding,
    // Trailing bytes of an incomplete UTF-8 sequence, at most 3.
    pending: Vec<u8>,
    // Body offset of the first byte not yet decoded.
    offset: usize,
}

impl Decoder {
    /// A decoder whose first byte sits at `offset` in the body, so errors
    /// report absolute body offsets.
    pub(crate) fn starting_at(encoding: TextEncoding, offset: usize) -> Self {
        Self { encoding, pending: Vec::new(), offset }
    }

    /// Decodes `chunk` and appends the text to `out`.
    pub(crate) fn decode(&mut self, chunk: &[u8], out: &mut String) -> Result<(), Error> {
        match self.encoding {
            TextEncoding::Utf8   => self.decode_utf8(chunk, out),
            TextEncoding::Ascii  => self.decode_ascii(chunk, out),
            TextEncoding::Latin1 => {
                out.extend(chunk.iter().map(|&b| char::from(b)));
                self.offset += chunk.len();
                Ok(())
            }
        }
    }

    /// Ends the stream. Fails if bytes of an unfinished sequence remain.
    pub(crate) fn finish(self) -> Result<(), Error> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(self.error_at(self.offset))
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8], out: &mut String) -> Result<(), Error> {
        let joined;
        let input: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            self.pending.extend_from_slice(chunk);
            joined = std::mem::take(&mut self.pending);
            &joined
        };

        match std::str::from_utf8(input) {
            Ok(text) => {
                out.push_str(text);
                self.offset += input.len();
                Ok(())
            }
            Err(e) => {
                let valid = e.valid_up_to();
                if let Ok(text) = std::str::from_utf8(&input[..valid]) {
                    out.push_str(text);
                }
                match e.error_len() {
                    Some(_) => Err(self.error_at(self.offset + valid)),
                    // Incomplete sequence at the end: wait for more bytes.
                    None => {
                        self.pending = input[valid..].to_vec();
                        self.offset += valid;
                        Ok(())
                    }
                }
            }
        }
    }

    fn decode_ascii(&mut self, chunk: &[u8], out: &mut String) -> Result<(), Error> {
        if let Some(pos) = chunk.iter().position(|b| !b.is_ascii()) {
            return Err(self.error_at(self.offset + pos));
        }
        out.extend(chunk.iter().map(|&b| char::from(b)));
        self.offset += chunk.len();
        Ok(())
    }

    fn error_at(&self, offset: usize) -> Error {
        Error::Decoding { encoding: self.encoding, offset }
    }
}
