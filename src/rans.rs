//! Range Asymmetric Numeral Systems (rANS).
//!
//! rANS keeps a single integer state `x` and updates it with a multiplication
//! and a division per symbol. Between operations the state stays in the
//! canonical range `[L, H)`, with `L = 2^(64 - word_bits)` and
//! `H = L << word_bits = 2^64`; words of `word_bits` bits are shifted out
//! before encoding and shifted back in after decoding to keep it there.
//!
//! The coder is a stack: the decoder yields symbols in the reverse order the
//! encoder consumed them. [`crate::session`] hides this from callers.

use log::trace;

use crate::config::CoderConfig;
use crate::error::{Error, Result, SymbolFault};
use crate::quantize::EntropyModel;
use crate::stream::EncodedStream;

/// Half-open cumulative interval `[low, high)` of one symbol out of `total`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interval {
    /// Cumulative mass of all preceding symbols.
    pub low: u64,
    /// `low` plus the symbol's frequency.
    pub high: u64,
    /// Total mass of the distribution.
    pub total: u64,
}

impl Interval {
    /// Create an interval. Call [`Interval::validate`] before trusting it.
    pub const fn new(low: u64, high: u64, total: u64) -> Self {
        Self { low, high, total }
    }

    /// Frequency of the symbol.
    pub const fn freq(&self) -> u64 {
        self.high.saturating_sub(self.low)
    }

    /// Whether `slot` falls in `[low, high)`.
    pub const fn contains(&self, slot: u64) -> bool {
        self.low <= slot && slot < self.high
    }

    /// Check `low < high <= total`.
    ///
    /// # Errors
    /// `Error::InvalidDistribution` if the frequency is zero or the interval
    /// runs past the total.
    pub fn validate(&self) -> Result<()> {
        if self.high <= self.low || self.high > self.total {
            return Err(Error::distribution(format!(
                "interval [{}, {}) of total {} has no mass or overruns the total",
                self.low, self.high, self.total
            )));
        }
        Ok(())
    }
}

/// Reject a model total other than the configured `M`.
pub(crate) fn check_total(config: &CoderConfig, total: u64) -> Result<()> {
    let max = config.total();
    if total > max {
        return Err(Error::PrecisionOverflow { total, max });
    }
    if total != max {
        return Err(Error::distribution(format!(
            "model total {total} does not match coder total {max}"
        )));
    }
    Ok(())
}

/// Reject intervals the coder cannot use under `config`.
pub(crate) fn check_interval(config: &CoderConfig, start: u64, freq: u64, total: u64) -> Result<()> {
    check_total(config, total)?;
    let end = start
        .checked_add(freq)
        .ok_or_else(|| Error::distribution("interval end overflows"))?;
    Interval::new(start, end, total).validate()
}

/// rANS encoder.
#[derive(Debug)]
pub struct RansEncoder {
    config: CoderConfig,
    state: u64,
    /// Renormalization words in emission order.
    output: Vec<u32>,
}

impl RansEncoder {
    /// Create a new rANS encoder with state `L`.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if `config` does not validate.
    pub fn new(config: &CoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: *config,
            state: config.lower_bound(),
            output: Vec::new(),
        })
    }

    /// Encode a symbol with cumulative frequency `start` and frequency `freq`.
    ///
    /// `total` must equal the configured total mass.
    ///
    /// # Errors
    /// - `Error::PrecisionOverflow` if `total` exceeds the configured precision
    ///   or the new state does not fit the register.
    /// - `Error::InvalidDistribution` if `freq` is zero, the interval overruns
    ///   `total`, or `total` is below the configured total.
    pub fn encode(&mut self, start: u64, freq: u64, total: u64) -> Result<()> {
        check_interval(&self.config, start, freq, total)?;

        let word_bits = self.config.word_width.bits();
        let mask = self.config.word_width.mask();

        // Renormalize
        // state must be in [L / total * freq, L / total * freq * 2^word_bits) before encoding
        let x_max = (u128::from(self.config.lower_bound() >> self.config.precision_bits)
            * u128::from(freq))
            << word_bits;
        while u128::from(self.state) >= x_max {
            let word = (self.state & mask) as u32;
            trace!("rans encode: emit word {word:#x}");
            self.output.push(word);
            self.state >>= word_bits;
        }

        // state = (x / freq) * total + (x % freq) + start
        let x = self.state;
        let next = u128::from(x / freq) * u128::from(total) + u128::from(x % freq + start);
        self.state = u64::try_from(next).map_err(|_| Error::PrecisionOverflow {
            total,
            max: self.config.total(),
        })?;
        debug_assert!(self.state >= self.config.lower_bound());
        Ok(())
    }

    /// Encode a symbol given as an [`Interval`].
    pub fn encode_interval(&mut self, interval: Interval) -> Result<()> {
        self.encode(interval.low, interval.freq(), interval.total)
    }

    /// Finish encoding and return the framed stream.
    pub fn finish(self) -> EncodedStream {
        EncodedStream::new(self.config, self.state, self.output)
    }

    /// Return the current internal state.
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Number of words emitted so far.
    pub fn words_emitted(&self) -> usize {
        self.output.len()
    }

    /// Configuration the encoder was built with.
    pub fn config(&self) -> &CoderConfig {
        &self.config
    }
}

/// rANS decoder.
#[derive(Debug)]
pub struct RansDecoder {
    config: CoderConfig,
    state: u64,
    /// Words in emission order; consumed from the back.
    words: Vec<u32>,
}

impl RansDecoder {
    /// Create a new rANS decoder from the encoder's final state and its words
    /// in emission order.
    ///
    /// # Errors
    /// `Error::InvalidHeader` if `state` is below `L`, `Error::InvalidConfig`
    /// if `config` does not validate.
    pub fn new(config: &CoderConfig, state: u64, words: Vec<u32>) -> Result<Self> {
        config.validate()?;
        if state < config.lower_bound() {
            return Err(Error::InvalidHeader(format!(
                "initial state {state:#x} below lower bound {:#x}",
                config.lower_bound()
            )));
        }
        Ok(Self {
            config: *config,
            state,
            words,
        })
    }

    /// Return the current internal state.
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Configuration the decoder was built with.
    pub fn config(&self) -> &CoderConfig {
        &self.config
    }

    /// Words not yet consumed.
    pub fn remaining_words(&self) -> usize {
        self.words.len()
    }

    /// Whether the decoder is back at the encoder's initial state with no
    /// words left, i.e. every encoded symbol has been decoded.
    pub fn is_finished(&self) -> bool {
        self.words.is_empty() && self.state == self.config.lower_bound()
    }

    /// Current slot, `state mod total`.
    pub fn peek_slot(&self) -> u64 {
        self.state & (self.config.total() - 1)
    }

    /// Remove the symbol with interval `[start, start + freq)` from the state.
    ///
    /// # Errors
    /// - `Error::SymbolOutOfRange` if the current slot is not in the interval.
    /// - `Error::StreamExhausted` if renormalization runs out of words.
    /// - The interval errors of [`RansEncoder::encode`].
    pub fn advance(&mut self, start: u64, freq: u64, total: u64) -> Result<()> {
        check_interval(&self.config, start, freq, total)?;
        let slot = self.peek_slot();
        if !Interval::new(start, start + freq, total).contains(slot) {
            return Err(Error::SymbolOutOfRange(SymbolFault::Slot(slot)));
        }

        // state = freq * (state / total) + (state % total) - start
        let mut x = freq * (self.state >> self.config.precision_bits) + slot - start;

        // Renormalize
        let word_bits = self.config.word_width.bits();
        let lower = self.config.lower_bound();
        while x < lower {
            match self.words.pop() {
                Some(word) => {
                    trace!("rans decode: read word {word:#x}");
                    x = (x << word_bits) | u64::from(word);
                }
                None => {
                    self.state = x;
                    return Err(Error::StreamExhausted {
                        needed: 1,
                        available: 0,
                    });
                }
            }
        }
        self.state = x;
        Ok(())
    }

    /// Decode one symbol under `model`.
    ///
    /// # Errors
    /// `Error::PrecisionOverflow` or `Error::InvalidDistribution` if the
    /// model's total differs from the coder's, plus the errors of
    /// [`EntropyModel::find_symbol`] and [`RansDecoder::advance`].
    pub fn decode_symbol<M: EntropyModel + ?Sized>(&mut self, model: &M) -> Result<i32> {
        check_total(&self.config, model.total())?;
        let (symbol, interval) = model.find_symbol(self.peek_slot())?;
        self.advance(interval.low, interval.freq(), interval.total)?;
        Ok(symbol)
    }
}
