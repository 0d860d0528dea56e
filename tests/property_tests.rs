use proptest::prelude::*;
use rans_logistic::stream::HEADER_LEN;
use rans_logistic::{
    decode_all, encode_all, Alphabet, CoderConfig, CumulativeTable, Decimal, DecodeSession,
    EncodeSession, EncodedStream, EntropyModel, Error, Logistic, MixtureLogistic, Quantizer,
    RansDecoder, Rounding, WordWidth,
};

fn signed_8bit(config: &CoderConfig) -> Quantizer {
    let alphabet = Alphabet::from_bit_depth(8, true).unwrap();
    Quantizer::new(alphabet, Decimal::default(), config).unwrap()
}

fn encode_scenario() -> Vec<u8> {
    let config = CoderConfig::default();
    let q = signed_8bit(&config);
    let model = q.quantize(Logistic::new(0.0, 0.0).unwrap());
    let mut session = EncodeSession::new(&config).unwrap();
    for s in [0, 0, 127, -128, 5] {
        session.push(s, &model).unwrap();
    }
    session.finish_bytes().unwrap()
}

#[test]
fn test_standard_logistic_scenario() {
    let config = CoderConfig::default();
    assert_eq!(config.total(), 65536);
    let q = signed_8bit(&config);
    let model = q.quantize(Logistic::new(0.0, 0.0).unwrap());

    let bytes = encode_scenario();
    // The two tail symbols cost 16 bits each and push one word out of the register.
    assert_eq!(bytes.len(), HEADER_LEN + 4);
    for _ in 0..5 {
        assert_eq!(encode_scenario(), bytes);
    }

    let mut decoder = DecodeSession::from_bytes(&bytes, &config).unwrap();
    let decoded: Vec<i32> = (0..5).map(|_| decoder.decode(&model).unwrap()).collect();
    assert_eq!(decoded, vec![0, 0, 127, -128, 5]);
    assert_eq!(decoder.finish().unwrap(), 5);
}

#[test]
fn test_truncated_stream_is_detected() {
    let config = CoderConfig::default();
    let q = signed_8bit(&config);
    let model = q.quantize(Logistic::new(0.0, 0.0).unwrap());
    let bytes = encode_scenario();

    // Drop the last word from the serialized form.
    let cut = &bytes[..bytes.len() - 4];
    assert!(matches!(
        DecodeSession::from_bytes(cut, &config),
        Err(Error::StreamExhausted { .. })
    ));

    // Drop it from the word vector and decode directly.
    let stream = EncodedStream::from_bytes(&bytes).unwrap();
    let mut words = stream.words().to_vec();
    words.pop();
    let mut decoder = RansDecoder::new(&config, stream.state(), words).unwrap();
    let err = (0..5)
        .map(|_| decoder.decode_symbol(&model))
        .find_map(|r| r.err())
        .unwrap();
    assert!(matches!(err, Error::StreamExhausted { .. }));
}

#[test]
fn test_empty_sequence_roundtrip() {
    let config = CoderConfig::default();
    let models: Vec<CumulativeTable> = Vec::new();
    let bytes = encode_all(&config, &[], &models).unwrap();
    assert_eq!(decode_all(&bytes, &config, &models).unwrap(), Vec::<i32>::new());
}

#[test]
fn test_degenerate_distribution_roundtrip() {
    let config = CoderConfig::default();
    let q = Quantizer::new(Alphabet::new(42, 42).unwrap(), Decimal::default(), &config).unwrap();
    let model = q.quantize(Logistic::new(0.0, 0.0).unwrap());
    assert_eq!(model.interval(42).unwrap().freq(), config.total());

    let symbols = vec![42; 1000];
    let models = vec![&model; 1000];
    let bytes = encode_all(&config, &symbols, &models).unwrap();
    assert_eq!(bytes.len(), HEADER_LEN);
    assert_eq!(decode_all(&bytes, &config, &models).unwrap(), symbols);
}

#[test]
fn test_alphabet_extremes_roundtrip() {
    let config = CoderConfig::new(WordWidth::U8, 16, Rounding::Floor).unwrap();
    let q = signed_8bit(&config);
    // Sharp distribution far from both extremes.
    let model = q.quantize(Logistic::new(3.0, -2.0).unwrap());
    let symbols: Vec<i32> = (0..200).map(|i| if i % 2 == 0 { -128 } else { 127 }).collect();
    let models = vec![&model; symbols.len()];
    let bytes = encode_all(&config, &symbols, &models).unwrap();
    assert_eq!(decode_all(&bytes, &config, &models).unwrap(), symbols);
}

#[test]
fn test_model_mismatch_does_not_roundtrip_silently() {
    let config = CoderConfig::default();
    let q = signed_8bit(&config);
    let narrow = q.quantize(Logistic::new(0.0, -1.0).unwrap());
    let shifted = q.quantize(Logistic::new(40.0, 2.0).unwrap());
    let symbols: Vec<i32> = (0..64).map(|i| i % 5 - 2).collect();
    let bytes = encode_all(&config, &symbols, &vec![&narrow; 64]).unwrap();
    if let Ok(decoded) = decode_all(&bytes, &config, &vec![&shifted; 64]) {
        assert_ne!(decoded, symbols);
    }
}

#[test]
fn test_model_rounding_must_match_stream() {
    let floor = CoderConfig::new(WordWidth::U32, 16, Rounding::Floor).unwrap();
    let nearest = CoderConfig::default();
    let nearest_q = signed_8bit(&nearest);
    let floor_q = signed_8bit(&floor);
    let nearest_model = nearest_q.quantize(Logistic::new(0.3, 1.1).unwrap());
    let floor_model = floor_q.quantize(Logistic::new(0.3, 1.1).unwrap());
    let symbols: Vec<i32> = (0..300).map(|i| (i * 13) % 61 - 30).collect();

    // A Floor stream cannot be written with a Nearest model.
    assert!(matches!(
        encode_all(&floor, &symbols, &vec![&nearest_model; symbols.len()]),
        Err(Error::ConfigMismatch { .. })
    ));

    // Nor read back with one.
    let bytes = encode_all(&floor, &symbols, &vec![&floor_model; symbols.len()]).unwrap();
    assert_eq!(bytes[7], 1);
    assert!(matches!(
        decode_all(&bytes, &floor, &vec![&nearest_model; symbols.len()]),
        Err(Error::ConfigMismatch { .. })
    ));
    assert_eq!(
        decode_all(&bytes, &floor, &vec![&floor_model; symbols.len()]).unwrap(),
        symbols
    );
}

proptest! {
    #[test]
    fn test_rans_roundtrip(
        input in prop::collection::vec(-128i32..=127, 0..200),
        mean in -40.0f64..40.0,
        log_scale in -2.0f64..4.0,
        precision_bits in 8u32..=32,
    ) {
        let config = CoderConfig::new(WordWidth::U32, precision_bits, Rounding::Nearest).unwrap();
        let q = signed_8bit(&config);
        let model = q.quantize(Logistic::new(mean, log_scale).unwrap());

        // Encode in logical order; the session reverses internally.
        let mut session = EncodeSession::new(&config).unwrap();
        for &s in &input {
            session.push(s, &model).unwrap();
        }
        let bytes = session.finish_bytes().unwrap();

        // Decode
        let mut decoder = DecodeSession::from_bytes(&bytes, &config).unwrap();
        let mut output = Vec::new();
        for _ in 0..input.len() {
            output.push(decoder.decode(&model).unwrap());
        }
        decoder.finish().unwrap();

        prop_assert_eq!(input, output);
    }

    #[test]
    fn test_mixture_cdf_is_exact_and_monotone(
        means in prop::collection::vec(-300.0f64..300.0, 1..6),
        log_scales in prop::collection::vec(-6.0f64..6.0, 6),
        logits in prop::collection::vec(-10.0f64..10.0, 6),
        precision_bits in 8u32..=32,
    ) {
        let k = means.len();
        let mixture = MixtureLogistic::new(
            means,
            log_scales[..k].to_vec(),
            logits[..k].to_vec(),
        ).unwrap();
        let config = CoderConfig::new(WordWidth::U16, precision_bits, Rounding::Nearest).unwrap();
        let q = signed_8bit(&config);
        let model = q.quantize(mixture);

        prop_assert_eq!(model.cumulative(-129).unwrap(), 0);
        prop_assert_eq!(model.cumulative(127).unwrap(), config.total());
        for s in -129i64..127 {
            prop_assert!(model.cumulative(s).unwrap() < model.cumulative(s + 1).unwrap());
        }
        let table = CumulativeTable::from_model(&model, q.alphabet()).unwrap();
        prop_assert_eq!(table.total(), config.total());
    }

    #[test]
    fn test_encoding_is_deterministic(
        input in prop::collection::vec(0i32..=255, 1..100),
        mean in 0.0f64..255.0,
    ) {
        let config = CoderConfig::new(WordWidth::U16, 20, Rounding::Nearest).unwrap();
        let alphabet = Alphabet::from_bit_depth(8, false).unwrap();
        let q = Quantizer::new(alphabet, Decimal::new(256.0, 0.0).unwrap(), &config).unwrap();
        let model = q.quantize(Logistic::new(mean / 256.0, -3.0).unwrap());
        let table = q.table(Logistic::new(mean / 256.0, -3.0).unwrap()).unwrap();
        let closed = vec![&model; input.len()];
        let tabulated = vec![&table; input.len()];

        let a = encode_all(&config, &input, &closed).unwrap();
        let b = encode_all(&config, &input, &closed).unwrap();
        let c = encode_all(&config, &input, &tabulated).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &c);
        prop_assert_eq!(decode_all(&a, &config, &tabulated).unwrap(), input);
    }
}
