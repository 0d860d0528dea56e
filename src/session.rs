//! Encode and decode sessions.
//!
//! rANS pops symbols in the reverse order they were pushed. A session takes
//! symbols in their natural order on both sides and handles the reversal
//! itself: [`EncodeSession`] buffers intervals and feeds them to the coder
//! backwards on [`EncodeSession::finish`], so [`DecodeSession::decode`]
//! returns symbols in the order they were pushed.
//!
//! ```
//! use rans_logistic::{Alphabet, CoderConfig, Decimal, Logistic, Quantizer};
//! use rans_logistic::{DecodeSession, EncodeSession};
//!
//! let config = CoderConfig::default();
//! let alphabet = Alphabet::from_bit_depth(8, true)?;
//! let quantizer = Quantizer::new(alphabet, Decimal::default(), &config)?;
//! let model = quantizer.quantize(Logistic::new(0.0, 0.0)?);
//!
//! let mut encoder = EncodeSession::new(&config)?;
//! for s in [0, 0, 127, -128, 5] {
//!     encoder.push(s, &model)?;
//! }
//! let bytes = encoder.finish_bytes()?;
//!
//! let mut decoder = DecodeSession::from_bytes(&bytes, &config)?;
//! let decoded: Vec<i32> = (0..5).map(|_| decoder.decode(&model)).collect::<Result<_, _>>()?;
//! decoder.finish()?;
//! assert_eq!(decoded, [0, 0, 127, -128, 5]);
//! # Ok::<(), rans_logistic::Error>(())
//! ```

use log::{debug, warn};

use crate::config::CoderConfig;
use crate::error::{Error, Result};
use crate::quantize::EntropyModel;
use crate::rans::{check_interval, Interval, RansDecoder, RansEncoder};
use crate::stream::EncodedStream;

/// Reject a model quantized with a different rounding than `config` records.
fn check_rounding<M: EntropyModel + ?Sized>(config: &CoderConfig, model: &M) -> Result<()> {
    match model.rounding() {
        Some(rounding) if rounding != config.rounding => {
            warn!("model quantized with {rounding:?} rounding under a {config} stream");
            Err(Error::ConfigMismatch {
                expected: config.to_string(),
                found: format!("model rounding {rounding:?}"),
            })
        }
        _ => Ok(()),
    }
}

/// Collects symbols in logical order and encodes them on finish.
#[derive(Debug)]
pub struct EncodeSession {
    config: CoderConfig,
    intervals: Vec<Interval>,
}

impl EncodeSession {
    /// Start an empty session.
    pub fn new(config: &CoderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: *config,
            intervals: Vec::new(),
        })
    }

    /// Append `symbol`, distributed according to `model`.
    ///
    /// The interval is computed and checked immediately, so a bad symbol or
    /// model fails here rather than at [`EncodeSession::finish`].
    ///
    /// # Errors
    /// `Error::ConfigMismatch` if `model` was quantized with another rounding
    /// than the session's, plus the errors of [`EntropyModel::interval`] and
    /// [`EncodeSession::push_interval`].
    pub fn push<M: EntropyModel + ?Sized>(&mut self, symbol: i32, model: &M) -> Result<()> {
        check_rounding(&self.config, model)?;
        let interval = model.interval(symbol)?;
        self.push_interval(interval)
    }

    /// Append a symbol by its interval directly.
    pub fn push_interval(&mut self, interval: Interval) -> Result<()> {
        check_interval(&self.config, interval.low, interval.freq(), interval.total)?;
        self.intervals.push(interval);
        Ok(())
    }

    /// Number of symbols pushed.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether no symbols were pushed.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Encode every pushed symbol.
    pub fn finish(self) -> Result<EncodedStream> {
        let mut encoder = RansEncoder::new(&self.config)?;
        for &interval in self.intervals.iter().rev() {
            encoder.encode_interval(interval)?;
        }
        let stream = encoder.finish();
        debug!(
            "encode session: {} symbols into {} words ({} bytes)",
            self.intervals.len(),
            stream.words().len(),
            stream.byte_len()
        );
        Ok(stream)
    }

    /// Encode every pushed symbol and serialize the stream.
    pub fn finish_bytes(self) -> Result<Vec<u8>> {
        Ok(self.finish()?.to_bytes())
    }
}

/// Decodes symbols in the order they were pushed to the [`EncodeSession`].
#[derive(Debug)]
pub struct DecodeSession {
    decoder: RansDecoder,
    decoded: usize,
}

impl DecodeSession {
    /// Open `stream`, checking it was encoded with `expected`.
    ///
    /// # Errors
    /// `Error::ConfigMismatch` if the stream's configuration differs.
    pub fn new(stream: EncodedStream, expected: &CoderConfig) -> Result<Self> {
        if stream.config() != expected {
            warn!("rejecting stream encoded with {}", stream.config());
            return Err(Error::ConfigMismatch {
                expected: expected.to_string(),
                found: stream.config().to_string(),
            });
        }
        debug!(
            "decode session: {} words, state {:#x}",
            stream.words().len(),
            stream.state()
        );
        Ok(Self {
            decoder: stream.into_decoder()?,
            decoded: 0,
        })
    }

    /// Parse `bytes` and open the stream.
    ///
    /// # Errors
    /// Framing errors of [`EncodedStream::from_bytes`], including
    /// `Error::StreamExhausted` for a truncated body, and
    /// `Error::ConfigMismatch`.
    pub fn from_bytes(bytes: &[u8], expected: &CoderConfig) -> Result<Self> {
        Self::new(EncodedStream::from_bytes(bytes)?, expected)
    }

    /// Decode the next symbol under `model`, which must be the model the
    /// symbol was pushed with.
    ///
    /// # Errors
    /// `Error::ConfigMismatch` if `model` was quantized with another rounding
    /// than the stream header records, plus the errors of
    /// [`RansDecoder::decode_symbol`].
    pub fn decode<M: EntropyModel + ?Sized>(&mut self, model: &M) -> Result<i32> {
        check_rounding(self.decoder.config(), model)?;
        let symbol = self.decoder.decode_symbol(model)?;
        self.decoded += 1;
        Ok(symbol)
    }

    /// Symbols decoded so far.
    pub fn decoded(&self) -> usize {
        self.decoded
    }

    /// Whether every encoded symbol has been decoded.
    pub fn is_finished(&self) -> bool {
        self.decoder.is_finished()
    }

    /// Close the session, checking that the stream was consumed exactly.
    ///
    /// # Errors
    /// `Error::UnconsumedStream` if words remain or the state has not
    /// returned to the encoder's initial value.
    pub fn finish(self) -> Result<usize> {
        if !self.decoder.is_finished() {
            return Err(Error::UnconsumedStream {
                remaining_words: self.decoder.remaining_words(),
                state: self.decoder.state(),
            });
        }
        debug!("decode session: finished after {} symbols", self.decoded);
        Ok(self.decoded)
    }
}

/// Encode `symbols[i]` under `models[i]` into a byte stream.
///
/// # Errors
/// `Error::InvalidDistribution` if the slices differ in length, plus the
/// errors of [`EncodeSession::push`] and [`EncodeSession::finish`].
pub fn encode_all<M: EntropyModel>(
    config: &CoderConfig,
    symbols: &[i32],
    models: &[M],
) -> Result<Vec<u8>> {
    if symbols.len() != models.len() {
        return Err(Error::distribution(format!(
            "{} symbols but {} models",
            symbols.len(),
            models.len()
        )));
    }
    let mut session = EncodeSession::new(config)?;
    for (&symbol, model) in symbols.iter().zip(models) {
        session.push(symbol, model)?;
    }
    session.finish_bytes()
}

/// Decode one symbol per model from `bytes` and check the stream is fully consumed.
pub fn decode_all<M: EntropyModel>(
    bytes: &[u8],
    config: &CoderConfig,
    models: &[M],
) -> Result<Vec<i32>> {
    let mut session = DecodeSession::from_bytes(bytes, config)?;
    let symbols = models
        .iter()
        .map(|model| session.decode(model))
        .collect::<Result<Vec<_>>>()?;
    session.finish()?;
    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Rounding, WordWidth};
    use crate::logistic::{Logistic, MixtureLogistic};
    use crate::quantize::{Alphabet, Decimal, Quantizer};
    use proptest::prelude::*;

    fn quantizer(config: &CoderConfig) -> Quantizer {
        let alphabet = Alphabet::from_bit_depth(8, true).unwrap();
        Quantizer::new(alphabet, Decimal::default(), config).unwrap()
    }

    #[test]
    fn test_empty_session() {
        let config = CoderConfig::default();
        let session = EncodeSession::new(&config).unwrap();
        assert!(session.is_empty());
        let bytes = session.finish_bytes().unwrap();
        assert_eq!(bytes.len(), crate::stream::HEADER_LEN);

        let decoder = DecodeSession::from_bytes(&bytes, &config).unwrap();
        assert!(decoder.is_finished());
        assert_eq!(decoder.finish().unwrap(), 0);
    }

    #[test]
    fn test_per_symbol_models() {
        let config = CoderConfig::default();
        let q = quantizer(&config);
        let symbols = [3, -7, 100, 0, -128, 127, 55];
        let models: Vec<_> = symbols
            .iter()
            .enumerate()
            .map(|(i, _)| q.quantize(Logistic::new(i as f64 * 10.0 - 20.0, 1.5).unwrap()))
            .collect();
        let bytes = encode_all(&config, &symbols, &models).unwrap();
        assert_eq!(decode_all(&bytes, &config, &models).unwrap(), symbols);
    }

    #[test]
    fn test_config_mismatch() {
        let config = CoderConfig::default();
        let q = quantizer(&config);
        let model = q.quantize(Logistic::new(0.0, 0.0).unwrap());
        let mut session = EncodeSession::new(&config).unwrap();
        session.push(1, &model).unwrap();
        let bytes = session.finish_bytes().unwrap();

        let other = CoderConfig {
            rounding: Rounding::Floor,
            ..config
        };
        assert!(matches!(
            DecodeSession::from_bytes(&bytes, &other),
            Err(Error::ConfigMismatch { .. })
        ));
    }

    #[test]
    fn test_push_rejects_model_rounding_mismatch() {
        let floor = CoderConfig::new(WordWidth::U32, 16, Rounding::Floor).unwrap();
        let nearest = CoderConfig::default();
        let q = quantizer(&nearest);
        let model = q.quantize(Logistic::new(0.3, 1.1).unwrap());
        let mut session = EncodeSession::new(&floor).unwrap();
        assert!(matches!(
            session.push(0, &model),
            Err(Error::ConfigMismatch { .. })
        ));
        assert!(session.is_empty());

        // A bare table carries no rounding and is accepted under either.
        let table = q.table(Logistic::new(0.3, 1.1).unwrap()).unwrap();
        session.push(0, &table).unwrap();
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_decode_rejects_model_rounding_mismatch() {
        let floor = CoderConfig::new(WordWidth::U32, 16, Rounding::Floor).unwrap();
        let nearest = CoderConfig::default();
        let floor_q = quantizer(&floor);
        let nearest_q = quantizer(&nearest);
        let symbols: Vec<i32> = (0..300).map(|i| (i * 7) % 41 - 20).collect();

        let encoding = floor_q.quantize(Logistic::new(0.3, 1.1).unwrap());
        let bytes = encode_all(&floor, &symbols, &vec![&encoding; symbols.len()]).unwrap();

        let mut decoder = DecodeSession::from_bytes(&bytes, &floor).unwrap();
        let foreign = nearest_q.quantize(Logistic::new(0.3, 1.1).unwrap());
        assert!(matches!(
            decoder.decode(&foreign),
            Err(Error::ConfigMismatch { .. })
        ));
        assert_eq!(decoder.decoded(), 0);

        let decoded: Vec<i32> = symbols.iter().map(|_| decoder.decode(&encoding).unwrap()).collect();
        assert_eq!(decoded, symbols);
        assert_eq!(decoder.finish().unwrap(), symbols.len());
    }

    #[test]
    fn test_push_interval_shares_coder_checks() {
        let config = CoderConfig::default();
        let mut session = EncodeSession::new(&config).unwrap();
        assert!(matches!(
            session.push_interval(Interval::new(0, 1, 1 << 17)),
            Err(Error::PrecisionOverflow { .. })
        ));
        assert!(matches!(
            session.push_interval(Interval::new(0, 1, 1 << 15)),
            Err(Error::InvalidDistribution(_))
        ));
        assert!(matches!(
            session.push_interval(Interval::new(5, 5, 1 << 16)),
            Err(Error::InvalidDistribution(_))
        ));
        session.push_interval(Interval::new(5, 6, 1 << 16)).unwrap();
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_finish_early_reports_unconsumed() {
        let config = CoderConfig::default();
        let q = quantizer(&config);
        let model = q.quantize(Logistic::new(0.0, 2.0).unwrap());
        let mut session = EncodeSession::new(&config).unwrap();
        for s in [10, -10, 20, -20] {
            session.push(s, &model).unwrap();
        }
        let bytes = session.finish_bytes().unwrap();
        let mut decoder = DecodeSession::from_bytes(&bytes, &config).unwrap();
        assert_eq!(decoder.decode(&model).unwrap(), 10);
        assert_eq!(decoder.decoded(), 1);
        assert!(matches!(
            decoder.finish(),
            Err(Error::UnconsumedStream { .. })
        ));
    }

    #[test]
    fn test_push_rejects_out_of_alphabet() {
        let config = CoderConfig::default();
        let q = quantizer(&config);
        let model = q.quantize(Logistic::new(0.0, 0.0).unwrap());
        let mut session = EncodeSession::new(&config).unwrap();
        assert!(matches!(
            session.push(128, &model),
            Err(Error::SymbolOutOfRange(_))
        ));
        assert!(session.is_empty());
    }

    #[test]
    fn test_push_rejects_foreign_precision() {
        let config = CoderConfig::default();
        let wide = CoderConfig::new(WordWidth::U32, 20, Rounding::Nearest).unwrap();
        let q = quantizer(&wide);
        let model = q.quantize(Logistic::new(0.0, 0.0).unwrap());
        let mut session = EncodeSession::new(&config).unwrap();
        assert!(matches!(
            session.push(0, &model),
            Err(Error::PrecisionOverflow { .. })
        ));
    }

    #[test]
    fn test_sessions_on_separate_threads() {
        let config = CoderConfig::default();
        let q = quantizer(&config);
        let streams: Vec<Vec<i32>> = (0..4)
            .map(|t| (0..500).map(|i| ((i * 37 + t * 11) % 256) - 128).collect())
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = streams
                .iter()
                .map(|symbols| {
                    let q = &q;
                    scope.spawn(move || {
                        let model = q.quantize(Logistic::new(0.0, 4.0).unwrap());
                        let mut session = EncodeSession::new(&config).unwrap();
                        for &s in symbols {
                            session.push(s, &model).unwrap();
                        }
                        let bytes = session.finish_bytes().unwrap();
                        let mut decoder = DecodeSession::from_bytes(&bytes, &config).unwrap();
                        let out: Vec<i32> = symbols.iter().map(|_| decoder.decode(&model).unwrap()).collect();
                        decoder.finish().unwrap();
                        out
                    })
                })
                .collect();
            for (handle, symbols) in handles.into_iter().zip(&streams) {
                assert_eq!(&handle.join().unwrap(), symbols);
            }
        });
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_mixture_session_roundtrip(
            params in prop::collection::vec(
                (
                    prop::collection::vec(-150.0f64..150.0, 1..4),
                    -3.0f64..5.0,
                    -128i32..=127,
                ),
                0..80,
            ),
            width in prop::sample::select(vec![WordWidth::U8, WordWidth::U16, WordWidth::U32]),
            precision_bits in 9u32..=24,
        ) {
            let config = CoderConfig::new(width, precision_bits, Rounding::Nearest).unwrap();
            let q = quantizer(&config);
            let models: Vec<_> = params
                .iter()
                .map(|(means, log_scale, _)| {
                    let k = means.len();
                    let logits = (0..k).map(|i| i as f64).collect();
                    q.quantize(MixtureLogistic::new(means.clone(), vec![*log_scale; k], logits).unwrap())
                })
                .collect();
            let symbols: Vec<i32> = params.iter().map(|(_, _, s)| *s).collect();

            let bytes = encode_all(&config, &symbols, &models).unwrap();
            prop_assert_eq!(&decode_all(&bytes, &config, &models).unwrap(), &symbols);
            prop_assert_eq!(encode_all(&config, &symbols, &models).unwrap(), bytes);
        }
    }
}
