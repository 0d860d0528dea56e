#![no_main]
use libfuzzer_sys::fuzz_target;
use rans_logistic::{
    Alphabet, CoderConfig, Decimal, DecodeSession, EncodeSession, Logistic, Quantizer, Rounding,
    WordWidth,
};

fuzz_target!(|data: (Vec<u8>, u8, i8, i8)| {
    let (input_bytes, knobs, mean, log_scale) = data;
    let width = match knobs % 3 {
        0 => WordWidth::U8,
        1 => WordWidth::U16,
        _ => WordWidth::U32,
    };
    let rounding = if knobs & 0x80 == 0 { Rounding::Nearest } else { Rounding::Floor };
    let precision_bits = u32::from((knobs >> 2) & 0x1f) % 25 + 8; // 8 to 32 bits
    let config = match CoderConfig::new(width, precision_bits, rounding) {
        Ok(config) => config,
        Err(_) => return,
    };

    let alphabet = Alphabet::from_bit_depth(8, false).unwrap();
    let quantizer = Quantizer::new(alphabet, Decimal::default(), &config).unwrap();
    let model = quantizer.quantize(
        Logistic::new(f64::from(mean) + 128.0, f64::from(log_scale) / 16.0).unwrap(),
    );

    let mut session = EncodeSession::new(&config).unwrap();
    for &b in &input_bytes {
        session.push(i32::from(b), &model).unwrap();
    }
    let bytes = session.finish_bytes().unwrap();

    let mut decoder = DecodeSession::from_bytes(&bytes, &config).unwrap();
    for &b in &input_bytes {
        assert_eq!(decoder.decode(&model).unwrap(), i32::from(b));
    }
    decoder.finish().unwrap();

    // Arbitrary bytes must never panic the parser or decoder.
    if let Ok(mut decoder) = DecodeSession::from_bytes(&input_bytes, &config) {
        for _ in 0..input_bytes.len() {
            if decoder.decode(&model).is_err() {
                break;
            }
        }
    }
});
