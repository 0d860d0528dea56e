//! Error types for rANS coding over discretized logistic models.

use std::fmt;

use thiserror::Error;

/// What fell outside the model's support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolFault {
    /// A symbol outside the alphabet was presented for encoding.
    Symbol(i64),
    /// A decoded slot did not land in any symbol's interval.
    Slot(u64),
}

impl fmt::Display for SymbolFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolFault::Symbol(s) => write!(f, "symbol {s}"),
            SymbolFault::Slot(slot) => write!(f, "slot {slot}"),
        }
    }
}

/// Error variants for coding operations.
///
/// Every variant is fatal for the stream that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// A frequency table or continuous distribution is unusable for coding
    /// (zero frequency, mass not summing to the total, non-finite parameters).
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    /// An interval total exceeds what the configured precision can represent.
    #[error("precision overflow: total {total} exceeds maximum {max}")]
    PrecisionOverflow {
        /// Total mass requested by the interval.
        total: u64,
        /// Largest total the coder accepts.
        max: u64,
    },

    /// Decoding needed more words than the stream holds.
    #[error("stream exhausted: needed {needed} more word(s), {available} available")]
    StreamExhausted {
        /// Words required to continue.
        needed: u64,
        /// Words actually present.
        available: u64,
    },

    /// A symbol or slot has no entry in the model.
    #[error("out of range: {0}")]
    SymbolOutOfRange(SymbolFault),

    /// The coder configuration is not usable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The stream header is malformed.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The stream was produced with a different configuration than the decoder's.
    #[error("config mismatch: expected {expected}, found {found}")]
    ConfigMismatch {
        /// Configuration the decoder was built with.
        expected: String,
        /// Configuration recorded in the stream header.
        found: String,
    },

    /// Decoding was declared complete while the stream still holds data.
    #[error("unconsumed stream: {remaining_words} word(s) left, state {state:#x}")]
    UnconsumedStream {
        /// Words not yet consumed.
        remaining_words: usize,
        /// Decoder state at the time of the check.
        state: u64,
    },

    /// An I/O error occurred while reading or writing configuration.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration JSON could not be parsed or produced.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn distribution(msg: impl Into<String>) -> Self {
        Error::InvalidDistribution(msg.into())
    }
}

/// A specialized Result type for coding operations.
pub type Result<T> = std::result::Result<T, Error>;
