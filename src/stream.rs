//! Byte framing for encoded streams.
//!
//! All integers are little-endian. The layout is fixed; changing any field
//! breaks compatibility with existing streams.
//!
//! ```text
//! offset  size  field
//!      0     4  magic b"rANS"
//!      4     1  format version (1)
//!      5     1  word width in bytes (1, 2 or 4)
//!      6     1  precision bits
//!      7     1  rounding (0 = nearest, 1 = floor)
//!      8     8  initial decoder state
//!     16     8  word count n
//!     24   n*w  renormalization words in emission order, w bytes each
//! ```

use log::warn;

use crate::config::{CoderConfig, Rounding, WordWidth};
use crate::error::{Error, Result};
use crate::rans::RansDecoder;

/// Stream magic.
pub const MAGIC: [u8; 4] = *b"rANS";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 24;

/// The output of one encoder: configuration, final state and words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedStream {
    config: CoderConfig,
    state: u64,
    words: Vec<u32>,
}

impl EncodedStream {
    pub(crate) fn new(config: CoderConfig, state: u64, words: Vec<u32>) -> Self {
        Self {
            config,
            state,
            words,
        }
    }

    /// Configuration the stream was encoded with.
    pub fn config(&self) -> &CoderConfig {
        &self.config
    }

    /// Final encoder state, which is the decoder's initial state.
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Renormalization words in emission order.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Length of [`EncodedStream::to_bytes`] output.
    pub fn byte_len(&self) -> usize {
        HEADER_LEN + self.words.len() * self.config.word_width.bytes()
    }

    /// Serialize header and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let width = self.config.word_width.bytes();
        let mut out = Vec::with_capacity(self.byte_len());
        out.extend_from_slice(&MAGIC);
        out.push(FORMAT_VERSION);
        out.push(width as u8);
        out.push(self.config.precision_bits as u8);
        out.push(self.config.rounding.to_byte());
        out.extend_from_slice(&self.state.to_le_bytes());
        out.extend_from_slice(&(self.words.len() as u64).to_le_bytes());
        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes()[..width]);
        }
        out
    }

    /// Parse a stream produced by [`EncodedStream::to_bytes`].
    ///
    /// # Errors
    /// - `Error::InvalidHeader` for a short or malformed header, or bytes past
    ///   the declared body.
    /// - `Error::StreamExhausted` if the body holds fewer words than declared.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::InvalidHeader(format!(
                "need {HEADER_LEN} header bytes, got {}",
                bytes.len()
            )));
        }
        let (header, body) = bytes.split_at(HEADER_LEN);
        if header[..4] != MAGIC {
            return Err(Error::InvalidHeader("bad magic".to_string()));
        }
        if header[4] != FORMAT_VERSION {
            return Err(Error::InvalidHeader(format!(
                "unsupported format version {}",
                header[4]
            )));
        }
        let word_width = WordWidth::from_bytes(header[5])
            .ok_or_else(|| Error::InvalidHeader(format!("bad word width {}", header[5])))?;
        let rounding = Rounding::from_byte(header[7])
            .ok_or_else(|| Error::InvalidHeader(format!("bad rounding {}", header[7])))?;
        let config = CoderConfig::new(word_width, u32::from(header[6]), rounding)
            .map_err(|e| Error::InvalidHeader(e.to_string()))?;
        let state = read_u64(&header[8..16]);
        let count = read_u64(&header[16..24]);

        let width = word_width.bytes();
        let available = (body.len() / width) as u64;
        if available < count {
            warn!("stream truncated: header declares {count} words, body holds {available}");
            return Err(Error::StreamExhausted {
                needed: count,
                available,
            });
        }
        // count <= available, so the multiplication cannot overflow.
        let body_len = count as usize * width;
        if body.len() != body_len {
            return Err(Error::InvalidHeader(format!(
                "{} trailing bytes after body",
                body.len() - body_len
            )));
        }

        let words = body
            .chunks_exact(width)
            .map(|chunk| {
                let mut buf = [0u8; 4];
                buf[..width].copy_from_slice(chunk);
                u32::from_le_bytes(buf)
            })
            .collect();
        Ok(Self {
            config,
            state,
            words,
        })
    }

    /// Build a decoder positioned at the start of the stream.
    pub fn into_decoder(self) -> Result<RansDecoder> {
        RansDecoder::new(&self.config, self.state, self.words)
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
