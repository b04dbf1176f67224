//! Integration smoke tests for the embedding crate.

use candle_core::{DType, Device, Result, Tensor};
use embedding::{
    AbsolutePositionEmbedding, PositionEmbeddingConfig, TokenEmbedding, TokenEmbeddingConfig,
};

#[test]
fn token_and_position_embeddings_broadcast_together() -> Result<()> {
    let device = Device::Cpu;
    let tokens = TokenEmbedding::new(TokenEmbeddingConfig {
        num_tokens: 10,
        dim: 6,
        dtype: DType::F32,
        device: device.clone(),
    })?;
    let positions = AbsolutePositionEmbedding::new(PositionEmbeddingConfig {
        max_seq_len: 12,
        dim: 6,
        dtype: DType::F32,
        device: device.clone(),
    })?;

    let ids = Tensor::from_slice(&[1u32, 2, 3, 4, 5, 6, 7, 8], (2, 4), &device)?;
    let hidden = tokens.forward(&ids)?.broadcast_add(&positions.forward(4)?)?;
    assert_eq!(hidden.dims(), &[2, 4, 6]);

    let logits = tokens.linear_out(&hidden)?;
    assert_eq!(logits.dims(), &[2, 4, 10]);
    Ok(())
}
