//! Learned absolute position embeddings.

use candle_core::{bail, DType, Device, Result, Tensor, Var};

/// Shape and placement of a position table.
#[derive(Debug, Clone)]
pub struct PositionEmbeddingConfig {
    /// Longest sequence the table can describe.
    pub max_seq_len: usize,
    pub dim: usize,
    pub dtype: DType,
    pub device: Device,
}

/// One learned `dim`-vector per position, sampled from `N(0, 1)`.
#[derive(Debug, Clone)]
pub struct AbsolutePositionEmbedding {
    config: PositionEmbeddingConfig,
    weight: Var,
}

impl AbsolutePositionEmbedding {
    pub fn new(config: PositionEmbeddingConfig) -> Result<Self> {
        if config.max_seq_len == 0 {
            bail!("position embedding requires max_seq_len > 0");
        }
        if config.dim == 0 {
            bail!("position embedding requires dim > 0");
        }
        let initial = Tensor::randn(0f32, 1f32, (config.max_seq_len, config.dim), &config.device)?;
        let weight = Var::from_tensor(&initial.to_dtype(config.dtype)?)?;
        Ok(Self { config, weight })
    }

    pub fn config(&self) -> &PositionEmbeddingConfig {
        &self.config
    }

    pub fn weight(&self) -> &Var {
        &self.weight
    }

    /// Rows for positions `0..seq_len`, shaped `(seq_len, dim)`.
    ///
    /// The result broadcasts against `(batch, seq_len, dim)` token embeddings.
    pub fn forward(&self, seq_len: usize) -> Result<Tensor> {
        if seq_len == 0 {
            bail!("position embedding requires seq_len > 0");
        }
        if seq_len > self.config.max_seq_len {
            bail!(
                "sequence length {seq_len} exceeds max_seq_len {}",
                self.config.max_seq_len
            );
        }
        let positions = Tensor::arange(0u32, seq_len as u32, self.weight.device())?;
        self.weight.as_tensor().index_select(&positions, 0)
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let prefix = if scope.is_empty() { "pos_emb" } else { scope };
        vec![(format!("{prefix}.weight"), self.weight.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(max_seq_len: usize, dim: usize) -> Result<AbsolutePositionEmbedding> {
        AbsolutePositionEmbedding::new(PositionEmbeddingConfig {
            max_seq_len,
            dim,
            dtype: DType::F32,
            device: Device::Cpu,
        })
    }

    #[test]
    fn lookup_returns_leading_rows() -> Result<()> {
        let pos = table(16, 4)?;
        let rows = pos.forward(5)?;
        assert_eq!(rows.dims(), &[5, 4]);
        let expected = pos.weight().narrow(0, 0, 5)?;
        let diff = rows.sub(&expected)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }

    #[test]
    fn full_table_is_addressable() -> Result<()> {
        let pos = table(8, 3)?;
        assert_eq!(pos.forward(8)?.dims(), &[8, 3]);
        Ok(())
    }

    #[test]
    fn sequences_past_the_table_are_rejected() -> Result<()> {
        let pos = table(8, 3)?;
        let err = pos.forward(9).unwrap_err();
        assert!(err.to_string().contains("exceeds max_seq_len 8"));
        assert!(pos.forward(0).is_err());
        Ok(())
    }

    #[test]
    fn gradients_reach_only_used_rows() -> Result<()> {
        let pos = table(6, 2)?;
        let grads = pos.forward(3)?.sum_all()?.backward()?;
        let grad = grads
            .get(pos.weight())
            .expect("gradient for position table")
            .sum(1)?
            .to_vec1::<f32>()?;
        assert_eq!(grad, vec![2.0, 2.0, 2.0, 0.0, 0.0, 0.0]);
        Ok(())
    }
}
