//! # rANS Coding with Discretized Logistic Models
//!
//! *Lossless coding of integer symbols under per-symbol mixture-of-logistics priors.*
//!
//! ## Intuition First
//!
//! A generative model does not hand you a symbol table. It hands you, for every
//! symbol it wants to store, a continuous bell curve: "this pixel is probably
//! around 12, give or take 3". To entropy-code that symbol you chop the curve
//! into unit-wide bins, one per integer symbol, and measure how much area each
//! bin holds. Likely symbols get wide bins and cost few bits; unlikely ones get
//! narrow bins and cost more.
//!
//! rANS then stacks these bins into a single integer. Each symbol grows the
//! integer by roughly `1 / p(symbol)`; when it gets too large, its low-order
//! word is flushed to the output. Decoding runs the same machine backwards.
//!
//! ## The Problem
//!
//! Two things have to be exactly right for this to be lossless:
//! - **The integer CDF** must be bit-identical on both sides, strictly
//!   increasing (every symbol needs nonzero mass) and sum exactly to `M`.
//!   Floating-point logistic CDFs give none of that for free.
//! - **The coder** is a stack. Symbols come back in the reverse order they went
//!   in, and a single misplaced renormalization word corrupts everything after it.
//!
//! ## Mathematical Formulation
//!
//! A mixture of `K` logistics with means `μ_k`, scales `σ_k = e^{log σ_k}` and
//! logits `w_k` has CDF
//!
//! ```text
//! P(X <= x) = Σ_k softmax(w)_k · sigmoid((x - μ_k) / σ_k)
//! ```
//!
//! Symbol `s` owns the bin `(s - 0.5, s + 0.5]`. Over an alphabet of `N`
//! symbols with total mass `M = 2^precision`, the integer CDF is
//!
//! ```text
//! F(s) = round((M - N) · P(X <= s + 0.5)) + (s - min + 1)
//! ```
//!
//! pinned to `F(min - 1) = 0` and `F(max) = M`. The coder maps state `x` and
//! interval `[F(s-1), F(s))` to
//!
//! ```text
//! C(x, s) = (x / f_s) · M + (x mod f_s) + F(s - 1),    f_s = F(s) - F(s - 1)
//! ```
//!
//! ## Failure Modes
//!
//! 1. **Model drift**: the decoder must query the same distribution, with the same
//!    configuration, in the same order. A mismatch decodes garbage or fails with
//!    [`Error::SymbolOutOfRange`].
//! 2. **Truncation**: a stream missing words fails with [`Error::StreamExhausted`].
//!
//! ## Implementation Notes
//!
//! This crate provides:
//! - [`logistic`]: numerically stable logistic and mixture CDFs.
//! - [`quantize`]: the integer CDF, closed-form and tabulated.
//! - [`rans`]: the coder state machine over a `u64` register.
//! - [`stream`]: the byte format.
//! - [`session`]: order-preserving encode/decode sessions.
//!
//! Every type is owned by one stream; independent streams can run on separate
//! threads without synchronization.
//!
//! ## References
//!
//! - Duda, J. (2013). "Asymmetric numeral systems: entropy coding combining speed of Huffman coding with compression rate of arithmetic coding."
//! - Salimans, T., et al. (2017). "PixelCNN++: Improving the PixelCNN with Discretized Logistic Mixture Likelihood."
//! - Hoogeboom, E., et al. (2019). "Integer Discrete Flows and Lossless Compression."

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logistic;
pub mod quantize;
pub mod rans;
pub mod session;
pub mod stream;

pub use config::{CoderConfig, Rounding, WordWidth};
pub use error::{Error, Result, SymbolFault};
pub use logistic::{ContinuousCdf, Logistic, MixtureLogistic};
pub use quantize::{Alphabet, CumulativeTable, Decimal, EntropyModel, QuantizedCdf, Quantizer};
pub use rans::{Interval, RansDecoder, RansEncoder};
pub use session::{decode_all, encode_all, DecodeSession, EncodeSession};
pub use stream::EncodedStream;
