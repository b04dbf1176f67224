//! Token embedding layer and its tied readout head.

use candle_core::{bail, DType, Device, Error, Result, Tensor, Var};
use layers::{
    linear::{Linear, LinearLayer},
    PrecisionPolicy,
};

/// Configuration for building a token embedding table.
#[derive(Debug, Clone)]
pub struct TokenEmbeddingConfig {
    /// Number of distinct tokens.
    pub num_tokens: usize,
    /// Dimensionality of each embedding vector.
    pub dim: usize,
    /// Storage dtype used for the underlying parameters and outputs.
    pub dtype: DType,
    /// Device hosting the parameters.
    pub device: Device,
}

impl TokenEmbeddingConfig {
    fn policy(&self) -> PrecisionPolicy {
        PrecisionPolicy::from_parameter_dtype(self.dtype)
    }
}

/// Learnable token embedding table.
///
/// The same `(num_tokens, dim)` variable backs both the lookup and the
/// readout projection returned by [`TokenEmbedding::linear_out`], so an
/// update through either role is visible in the other.
#[derive(Debug, Clone)]
pub struct TokenEmbedding {
    config: TokenEmbeddingConfig,
    weight: Var,
    readout: Linear,
    policy: PrecisionPolicy,
}

impl TokenEmbedding {
    /// Builds a new token embedding table and samples the parameters from `N(0, 1)`.
    pub fn new(config: TokenEmbeddingConfig) -> Result<Self> {
        if config.num_tokens == 0 {
            bail!("token embedding requires num_tokens > 0");
        }
        if config.dim == 0 {
            bail!("token embedding requires dim > 0");
        }

        let policy = config.policy();
        let shape = (config.num_tokens, config.dim);
        let initial = Tensor::randn(0f32, 1f32, shape, &config.device)?;
        let weight = Var::from_tensor(&initial.to_dtype(config.dtype)?)?;
        let readout = Linear::from_var(weight.clone())?;
        log::debug!(
            "token embedding {}x{} ({:?}) tied to readout",
            config.num_tokens,
            config.dim,
            config.dtype
        );

        Ok(Self {
            config,
            weight,
            readout,
            policy,
        })
    }

    pub fn config(&self) -> &TokenEmbeddingConfig {
        &self.config
    }

    /// Handle to the shared embedding variable.
    pub fn weight(&self) -> &Var {
        &self.weight
    }

    /// Looks up embeddings for the provided token ids.
    ///
    /// Inputs must be shaped `(batch, seq)` with an integer dtype. Outputs follow the
    /// `(batch, seq, dim)` layout using the configured storage dtype.
    pub fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        self.validate_token_ids(token_ids)?;
        let dims = token_ids.dims();

        let flat = token_ids.to_dtype(DType::I64)?.flatten_all()?;
        self.ensure_id_range(&flat)?;

        let gathered = self.weight.as_tensor().index_select(&flat, 0)?;
        let mut output_dims = dims.to_vec();
        output_dims.push(self.config.dim);
        gathered.reshape(output_dims)
    }

    /// Projects hidden states onto token logits with the tied weight, `x @ Wᵀ`.
    ///
    /// Accepts any rank whose last axis is `dim`; the last axis of the result
    /// is `num_tokens`.
    pub fn linear_out(&self, hidden: &Tensor) -> Result<Tensor> {
        self.readout.forward(hidden, &self.policy)
    }

    /// The readout as a bias-free [`Linear`] sharing the embedding storage.
    pub fn readout(&self) -> &Linear {
        &self.readout
    }

    /// Returns the trainable parameters for this embedding with an optional scope prefix.
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let prefix = if scope.is_empty() { "token_emb" } else { scope };
        vec![(format!("{prefix}.weight"), self.weight.clone())]
    }

    fn validate_token_ids(&self, token_ids: &Tensor) -> Result<()> {
        match token_ids.dims() {
            [batch, seq] => {
                if *batch == 0 || *seq == 0 {
                    return Err(Error::Msg(
                        "token_ids must have non-zero batch and seq dimensions".into(),
                    ));
                }
            }
            _ => return Err(Error::Msg("token_ids must be shaped [batch, seq]".into())),
        }

        if token_ids.dtype().is_int() {
            Ok(())
        } else {
            Err(Error::Msg(format!(
                "token_ids expected integer dtype but received {:?}",
                token_ids.dtype()
            )))
        }
    }

    fn ensure_id_range(&self, flat_ids: &Tensor) -> Result<()> {
        let min_id = flat_ids.min_all()?.to_scalar::<i64>()?;
        if min_id < 0 {
            return Err(Error::Msg(format!(
                "encountered negative token id {min_id}"
            )));
        }

        let max_id = flat_ids.max_all()?.to_scalar::<i64>()?;
        let num_tokens = self.config.num_tokens as i64;
        if max_id >= num_tokens {
            return Err(Error::Msg(format!(
                "token id {max_id} exceeds vocab size {num_tokens}"
            )));
        }
        Ok(())
    }
}
