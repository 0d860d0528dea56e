//! Flamegraph driver: repeated encode/decode sessions under a mixture model.

use rans_logistic::{
    Alphabet, CoderConfig, Decimal, DecodeSession, EncodeSession, MixtureLogistic, Quantizer,
};

fn main() -> rans_logistic::Result<()> {
    let input = (0..10000).map(|i| ((i * 31) % 61) - 30).collect::<Vec<i32>>();
    let config = CoderConfig::default();
    let alphabet = Alphabet::from_bit_depth(8, true)?;
    let quantizer = Quantizer::new(alphabet, Decimal::default(), &config)?;
    let model = quantizer.quantize(MixtureLogistic::new(
        vec![-12.0, 0.0, 12.0],
        vec![2.0, 1.0, 2.0],
        vec![0.0, 0.5, 0.0],
    )?);

    for _ in 0..100 {
        let mut session = EncodeSession::new(&config)?;
        for &s in &input {
            session.push(s, &model)?;
        }
        let bytes = session.finish_bytes()?;

        let mut decoder = DecodeSession::from_bytes(&bytes, &config)?;
        for &expected in &input {
            assert_eq!(decoder.decode(&model)?, expected);
        }
        decoder.finish()?;
    }
    Ok(())
}
