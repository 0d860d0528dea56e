//! Coder configuration.
//!
//! Word width, probability precision and the CDF rounding rule form a contract
//! shared by encoder and decoder. They travel in the stream header and are
//! checked again when a stream is opened.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest supported precision, in bits.
pub const MAX_PRECISION_BITS: u32 = 32;

/// Width of a renormalization word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordWidth {
    /// One byte per word.
    U8,
    /// Two bytes per word.
    U16,
    /// Four bytes per word.
    #[default]
    U32,
}

impl WordWidth {
    /// Word width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            WordWidth::U8 => 8,
            WordWidth::U16 => 16,
            WordWidth::U32 => 32,
        }
    }

    /// Word width in bytes.
    pub const fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// Mask selecting the low-order word of the state.
    pub const fn mask(self) -> u64 {
        (1u64 << self.bits()) - 1
    }

    /// Inverse of [`WordWidth::bytes`].
    pub fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(WordWidth::U8),
            2 => Some(WordWidth::U16),
            4 => Some(WordWidth::U32),
            _ => None,
        }
    }
}

/// Rounding rule applied when scaling continuous CDF values to integer mass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    /// Round half up: `floor(v + 0.5)`.
    #[default]
    Nearest,
    /// Round toward negative infinity.
    Floor,
}

impl Rounding {
    /// Apply the rule to a non-negative value.
    #[inline]
    pub fn apply(self, v: f64) -> f64 {
        match self {
            Rounding::Nearest => (v + 0.5).floor(),
            Rounding::Floor => v.floor(),
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Rounding::Nearest => 0,
            Rounding::Floor => 1,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Rounding::Nearest),
            1 => Some(Rounding::Floor),
            _ => None,
        }
    }
}

/// Configuration shared by an encoder and its decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CoderConfig {
    /// Renormalization word width.
    pub word_width: WordWidth,
    /// Total probability mass is `1 << precision_bits`.
    pub precision_bits: u32,
    /// Rounding used by the quantizer.
    pub rounding: Rounding,
}

impl Default for CoderConfig {
    fn default() -> Self {
        Self {
            word_width: WordWidth::U32,
            precision_bits: 16,
            rounding: Rounding::Nearest,
        }
    }
}

impl CoderConfig {
    /// Build and validate a configuration.
    pub fn new(word_width: WordWidth, precision_bits: u32, rounding: Rounding) -> Result<Self> {
        let config = Self {
            word_width,
            precision_bits,
            rounding,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the precision fits both the probability type and the state register.
    pub fn validate(&self) -> Result<()> {
        if self.precision_bits == 0 || self.precision_bits > MAX_PRECISION_BITS {
            return Err(Error::InvalidConfig(format!(
                "precision_bits must be in 1..={MAX_PRECISION_BITS}, got {}",
                self.precision_bits
            )));
        }
        if self.precision_bits > self.lower_bound_bits() {
            return Err(Error::InvalidConfig(format!(
                "precision_bits {} exceeds state lower bound of 2^{}",
                self.precision_bits,
                self.lower_bound_bits()
            )));
        }
        Ok(())
    }

    /// Total probability mass `M`.
    pub const fn total(&self) -> u64 {
        1u64 << self.precision_bits
    }

    /// `log2(L)`. The upper bound `H = L << word_bits` is `2^64`.
    pub const fn lower_bound_bits(&self) -> u32 {
        64 - self.word_width.bits()
    }

    /// Lower bound `L` of the canonical state range.
    pub const fn lower_bound(&self) -> u64 {
        1u64 << self.lower_bound_bits()
    }

    /// Read a JSON configuration file and validate it.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }
}

impl fmt::Display for CoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-bit words, {}-bit precision, {:?} rounding",
            self.word_width.bits(),
            self.precision_bits,
            self.rounding
        )
    }
}
