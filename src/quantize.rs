//! Discretization of continuous distributions into integer CDFs.
//!
//! A [`Quantizer`] fixes the symbol alphabet, the symbol-to-continuous mapping
//! and the fixed-point precision. Applied to a [`ContinuousCdf`] it yields a
//! [`QuantizedCdf`]: an exact, strictly increasing integer CDF over the
//! alphabet whose last value is the total mass `M`.
//!
//! ## Flooring policy
//!
//! With `N` symbols, `N` units of mass are reserved so that every symbol keeps
//! a frequency of at least one. The remaining `free = M - N` units follow the
//! continuous distribution:
//!
//! ```text
//! F(min - 1) = 0
//! F(s)       = round(free * P(X <= edge(s))) + (s - min + 1)    min <= s < max
//! F(max)     = M
//! ```
//!
//! where `edge(s)` is the upper bin edge `s + 0.5` mapped through [`Decimal`]
//! and `round` is the configured [`Rounding`]. Mass the continuous distribution
//! places outside the alphabet is absorbed by the end symbols.

use std::ops::RangeInclusive;

use crate::config::{CoderConfig, Rounding};
use crate::error::{Error, Result, SymbolFault};
use crate::logistic::ContinuousCdf;
use crate::rans::Interval;

/// A model the coder can query in both directions.
pub trait EntropyModel {
    /// Total mass of the model.
    fn total(&self) -> u64;

    /// Cumulative interval `[low, high)` of `symbol`.
    ///
    /// # Errors
    /// `Error::SymbolOutOfRange` if the symbol is not in the model's alphabet.
    fn interval(&self, symbol: i32) -> Result<Interval>;

    /// The symbol whose interval contains `slot`, with that interval.
    ///
    /// # Errors
    /// `Error::SymbolOutOfRange` if no interval contains `slot`.
    fn find_symbol(&self, slot: u64) -> Result<(i32, Interval)>;

    /// Rounding the model's CDF was quantized with, if it was quantized
    /// under a [`CoderConfig`] at all. Sessions reject a model whose rounding
    /// differs from the one recorded in the stream header.
    fn rounding(&self) -> Option<Rounding> {
        None
    }
}

impl<M: EntropyModel + ?Sized> EntropyModel for &M {
    fn total(&self) -> u64 {
        (**self).total()
    }

    fn interval(&self, symbol: i32) -> Result<Interval> {
        (**self).interval(symbol)
    }

    fn find_symbol(&self, slot: u64) -> Result<(i32, Interval)> {
        (**self).find_symbol(slot)
    }

    fn rounding(&self) -> Option<Rounding> {
        (**self).rounding()
    }
}

/// Inclusive range of integer symbols.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Alphabet {
    min: i32,
    max: i32,
}

impl Alphabet {
    /// Alphabet `min..=max`.
    pub fn new(min: i32, max: i32) -> Result<Self> {
        if min > max {
            return Err(Error::InvalidConfig(format!(
                "empty alphabet {min}..={max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// `[0, 2^bits)` or, if `signed`, `[-2^(bits-1), 2^(bits-1))`.
    pub fn from_bit_depth(bits: u32, signed: bool) -> Result<Self> {
        if bits == 0 || bits > 31 {
            return Err(Error::InvalidConfig(format!(
                "bit depth must be in 1..=31, got {bits}"
            )));
        }
        let size = 1i64 << bits;
        let min = if signed { -(size / 2) } else { 0 };
        Self::new(min as i32, (min + size - 1) as i32)
    }

    /// Smallest symbol.
    pub fn min(&self) -> i32 {
        self.min
    }

    /// Largest symbol.
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Number of symbols.
    pub fn len(&self) -> u64 {
        (i64::from(self.max) - i64::from(self.min) + 1) as u64
    }

    /// Always false; an alphabet holds at least one symbol.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `symbol` is in the alphabet.
    pub fn contains(&self, symbol: i64) -> bool {
        (i64::from(self.min)..=i64::from(self.max)).contains(&symbol)
    }

    /// The alphabet as a range.
    pub fn range(&self) -> RangeInclusive<i32> {
        self.min..=self.max
    }
}

/// Affine map between integer symbols and the distribution's continuous domain.
///
/// `to_continuous(v) = (v - shifting) / scaling`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decimal {
    scaling: f64,
    shifting: f64,
}

impl Default for Decimal {
    fn default() -> Self {
        Self {
            scaling: 1.0,
            shifting: 0.0,
        }
    }
}

impl Decimal {
    /// Create a mapping. `scaling` must be positive and finite.
    pub fn new(scaling: f64, shifting: f64) -> Result<Self> {
        if !(scaling.is_finite() && scaling > 0.0) || !shifting.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "invalid decimal mapping: scaling {scaling}, shifting {shifting}"
            )));
        }
        Ok(Self { scaling, shifting })
    }

    /// Symbol units to distribution units.
    #[inline]
    pub fn to_continuous(&self, v: f64) -> f64 {
        (v - self.shifting) / self.scaling
    }

    /// Distribution units to symbol units.
    #[inline]
    pub fn from_continuous(&self, c: f64) -> f64 {
        c * self.scaling + self.shifting
    }
}

/// Turns continuous distributions into [`EntropyModel`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantizer {
    alphabet: Alphabet,
    decimal: Decimal,
    total: u64,
    free_weight: f64,
    rounding: Rounding,
}

impl Quantizer {
    /// Create a quantizer over `alphabet` with the precision and rounding of `config`.
    ///
    /// # Errors
    /// `Error::InvalidDistribution` if the alphabet has more symbols than the
    /// total mass, leaving no room for a frequency of one per symbol.
    pub fn new(alphabet: Alphabet, decimal: Decimal, config: &CoderConfig) -> Result<Self> {
        config.validate()?;
        let total = config.total();
        let free = total.checked_sub(alphabet.len()).ok_or_else(|| {
            Error::distribution(format!(
                "alphabet of {} symbols does not fit total mass {total}",
                alphabet.len()
            ))
        })?;
        Ok(Self {
            alphabet,
            decimal,
            total,
            free_weight: free as f64,
            rounding: config.rounding,
        })
    }

    /// Alphabet covered by quantized distributions.
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Total mass `M`.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Rounding applied to the scaled CDF.
    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    /// Wrap `distribution` as an entropy model. Cheap; nothing is tabulated.
    pub fn quantize<D: ContinuousCdf>(&self, distribution: D) -> QuantizedCdf<'_, D> {
        QuantizedCdf {
            inner: distribution,
            quantizer: self,
        }
    }

    /// Tabulate `distribution` for repeated lookups.
    pub fn table<D: ContinuousCdf>(&self, distribution: D) -> Result<CumulativeTable> {
        CumulativeTable::from_model(&self.quantize(distribution), self.alphabet)
    }
}

/// A continuous distribution quantized by a [`Quantizer`].
#[derive(Debug)]
pub struct QuantizedCdf<'q, D> {
    inner: D,
    quantizer: &'q Quantizer,
}

impl<'q, D: ContinuousCdf> QuantizedCdf<'q, D> {
    /// The integer CDF `F(s)`: 0 below the alphabet, `M` at or above its maximum.
    ///
    /// # Errors
    /// `Error::InvalidDistribution` if the continuous CDF returns NaN.
    pub fn cumulative(&self, symbol: i64) -> Result<u64> {
        let q = self.quantizer;
        let min = i64::from(q.alphabet.min);
        if symbol < min {
            return Ok(0);
        }
        if symbol >= i64::from(q.alphabet.max) {
            return Ok(q.total);
        }

        let edge = q.decimal.to_continuous(symbol as f64 + 0.5);
        let p = self.inner.cdf(edge);
        if p.is_nan() {
            return Err(Error::distribution(format!(
                "cdf is NaN at symbol {symbol}"
            )));
        }
        let scaled = q.rounding.apply(q.free_weight * p.clamp(0.0, 1.0));
        let leaky = (scaled as u64).min(q.free_weight as u64);
        Ok(leaky + (symbol - min + 1) as u64)
    }

    fn interval_at(&self, symbol: i64) -> Result<Interval> {
        let low = self.cumulative(symbol - 1)?;
        let high = self.cumulative(symbol)?;
        let interval = Interval::new(low, high, self.quantizer.total);
        interval.validate()?;
        Ok(interval)
    }

    /// The underlying continuous distribution.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<'q, D: ContinuousCdf> EntropyModel for QuantizedCdf<'q, D> {
    fn total(&self) -> u64 {
        self.quantizer.total
    }

    fn interval(&self, symbol: i32) -> Result<Interval> {
        if !self.quantizer.alphabet.contains(i64::from(symbol)) {
            return Err(Error::SymbolOutOfRange(SymbolFault::Symbol(i64::from(
                symbol,
            ))));
        }
        self.interval_at(i64::from(symbol))
    }

    fn find_symbol(&self, slot: u64) -> Result<(i32, Interval)> {
        if slot >= self.quantizer.total {
            return Err(Error::SymbolOutOfRange(SymbolFault::Slot(slot)));
        }

        // Smallest symbol with F(s) > slot; F(max) = M guarantees one exists.
        let mut lo = i64::from(self.quantizer.alphabet.min);
        let mut hi = i64::from(self.quantizer.alphabet.max);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.cumulative(mid)? > slot {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        let interval = self.interval_at(lo)?;
        if !interval.contains(slot) {
            return Err(Error::SymbolOutOfRange(SymbolFault::Slot(slot)));
        }
        Ok((lo as i32, interval))
    }

    fn rounding(&self) -> Option<Rounding> {
        Some(self.quantizer.rounding)
    }
}

/// An explicit cumulative frequency table.
///
/// `cumulative[i]` is the mass of all symbols below `min + i`, so the table
/// has one more entry than the alphabet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CumulativeTable {
    min: i32,
    cumulative: Vec<u64>,
}

impl CumulativeTable {
    /// Build from cumulative values starting at symbol `min`.
    ///
    /// # Errors
    /// `Error::InvalidDistribution` unless the table starts at 0 and strictly
    /// increases (every symbol has nonzero frequency).
    pub fn from_cdf(min: i32, cumulative: Vec<u64>) -> Result<Self> {
        if cumulative.len() < 2 {
            return Err(Error::distribution("table needs at least one symbol"));
        }
        if cumulative[0] != 0 {
            return Err(Error::distribution(format!(
                "table starts at {}, expected 0",
                cumulative[0]
            )));
        }
        let symbols = (cumulative.len() - 1) as i64;
        if i64::from(min) + symbols - 1 > i64::from(i32::MAX) {
            return Err(Error::distribution("table extends past i32::MAX"));
        }
        if let Some(i) = cumulative.windows(2).position(|w| w[1] <= w[0]) {
            return Err(Error::distribution(format!(
                "symbol {} has zero or negative frequency",
                i64::from(min) + i as i64
            )));
        }
        Ok(Self { min, cumulative })
    }

    /// Tabulate `model` over `alphabet`.
    ///
    /// # Errors
    /// `Error::InvalidDistribution` if the model's intervals do not tile
    /// `[0, total)` in order.
    pub fn from_model<M: EntropyModel>(model: &M, alphabet: Alphabet) -> Result<Self> {
        let mut cumulative = Vec::with_capacity(alphabet.len() as usize + 1);
        cumulative.push(0);
        for symbol in alphabet.range() {
            let interval = model.interval(symbol)?;
            if Some(&interval.low) != cumulative.last() {
                return Err(Error::distribution(format!(
                    "interval of symbol {symbol} starts at {}, expected {:?}",
                    interval.low,
                    cumulative.last()
                )));
            }
            cumulative.push(interval.high);
        }
        if cumulative.last() != Some(&model.total()) {
            return Err(Error::distribution(format!(
                "table sums to {:?}, expected {}",
                cumulative.last(),
                model.total()
            )));
        }
        Self::from_cdf(alphabet.min, cumulative)
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.cumulative.len() - 1
    }

    /// Always false; a table holds at least one symbol.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Symbols covered by the table.
    pub fn alphabet(&self) -> Alphabet {
        Alphabet {
            min: self.min,
            max: self.min + (self.len() as i32 - 1),
        }
    }

    /// Cumulative values, including the leading 0 and trailing total.
    pub fn cumulative(&self) -> &[u64] {
        &self.cumulative
    }
}

impl EntropyModel for CumulativeTable {
    fn total(&self) -> u64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    fn interval(&self, symbol: i32) -> Result<Interval> {
        let index = i64::from(symbol) - i64::from(self.min);
        if index < 0 || index as usize >= self.len() {
            return Err(Error::SymbolOutOfRange(SymbolFault::Symbol(i64::from(
                symbol,
            ))));
        }
        let i = index as usize;
        Ok(Interval::new(
            self.cumulative[i],
            self.cumulative[i + 1],
            self.total(),
        ))
    }

    fn find_symbol(&self, slot: u64) -> Result<(i32, Interval)> {
        if slot >= self.total() {
            return Err(Error::SymbolOutOfRange(SymbolFault::Slot(slot)));
        }
        // cumulative[0] = 0 <= slot, so the partition point is at least 1.
        let i = self.cumulative.partition_point(|&c| c <= slot) - 1;
        let symbol = self.min + i as i32;
        Ok((
            symbol,
            Interval::new(self.cumulative[i], self.cumulative[i + 1], self.total()),
        ))
    }
}
