use std::fmt;
use std::sync::Arc;

use attention::{Attention, Config as AttentionConfig, CosineSimAttention};
use candle_core::{bail, Error, Result, Tensor, Var};
use layers::{
    checks,
    dtypes::PrecisionPolicy,
    linear::{Linear, LinearConfig, LinearInit, LinearLayer},
};

use crate::config::ModelConfig;

/// Multi-head causal attention around a pluggable cosine-similarity kernel.
///
/// Maps `(batch, seq, dim)` to `(batch, seq, dim)`. Queries, keys and values
/// are projected to `heads * dim_head` without bias, split into heads, handed
/// to the kernel with `causal = true`, merged and projected back to `dim`.
pub struct AttentionBlock {
    dim: usize,
    heads: usize,
    dim_head: usize,
    policy: PrecisionPolicy,
    to_q: Linear,
    to_k: Linear,
    to_v: Linear,
    to_out: Linear,
    kernel: Arc<dyn Attention>,
    kernel_config: AttentionConfig,
}

impl fmt::Debug for AttentionBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttentionBlock")
            .field("dim", &self.dim)
            .field("heads", &self.heads)
            .field("dim_head", &self.dim_head)
            .field("kernel_config", &self.kernel_config)
            .finish()
    }
}

impl AttentionBlock {
    /// Builds the block with the reference [`CosineSimAttention`] kernel.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Self::with_kernel(config, Arc::new(CosineSimAttention::new()))
    }

    pub fn with_kernel(config: &ModelConfig, kernel: Arc<dyn Attention>) -> Result<Self> {
        let policy = PrecisionPolicy::from_parameter_dtype(config.dtype);
        let init = LinearInit::from_std(config.init_std);
        let inner = config.inner_dim();
        let project = |input: usize, output: usize| {
            Linear::with_init(
                LinearConfig::new(input, output),
                &init,
                &config.device,
                config.dtype,
            )
        };

        let mut kernel_config =
            AttentionConfig::causal(config.scale, config.attention_options.clone());
        kernel_config.apply_env_overrides();

        Ok(Self {
            dim: config.dim,
            heads: config.heads,
            dim_head: config.dim_head,
            policy,
            to_q: project(config.dim, inner)?,
            to_k: project(config.dim, inner)?,
            to_v: project(config.dim, inner)?,
            to_out: project(inner, config.dim)?,
            kernel,
            kernel_config,
        })
    }

    pub fn kernel_config(&self) -> &AttentionConfig {
        &self.kernel_config
    }

    pub fn to_out(&self) -> &Linear {
        &self.to_out
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.to_q.named_parameters(&format!("{scope}.to_q"));
        params.extend(self.to_k.named_parameters(&format!("{scope}.to_k")));
        params.extend(self.to_v.named_parameters(&format!("{scope}.to_v")));
        params.extend(self.to_out.named_parameters(&format!("{scope}.to_out")));
        params
    }

    /// `(b, n, h * d)` to `(b, h, n, d)`.
    fn expand_to_heads(&self, tensor: &Tensor) -> Result<Tensor> {
        let (batch, seq, _) = tensor.dims3()?;
        tensor
            .reshape((batch, seq, self.heads, self.dim_head))?
            .permute((0, 2, 1, 3))
    }

    /// `(b, h, n, d)` back to `(b, n, h * d)`.
    fn merge_from_heads(&self, tensor: &Tensor) -> Result<Tensor> {
        let dims = tensor.dims();
        if dims.len() != 4 {
            bail!(
                "attention output expected [batch, heads, seq, dim_head] got {:?}",
                dims
            );
        }
        let (batch, seq) = (dims[0], dims[2]);
        tensor
            .permute((0, 2, 1, 3))?
            .reshape((batch, seq, self.heads * self.dim_head))
    }

    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("attention.input", hidden, self.dim)?;

        let q = self.expand_to_heads(&self.to_q.forward(hidden, &self.policy)?)?;
        let k = self.expand_to_heads(&self.to_k.forward(hidden, &self.policy)?)?;
        let v = self.expand_to_heads(&self.to_v.forward(hidden, &self.policy)?)?;

        let attended = self
            .kernel
            .attend(&q, &k, &v, &self.kernel_config)
            .map_err(|e| Error::Msg(e.to_string()))?;
        let merged = self.merge_from_heads(&attended)?;
        self.to_out.forward(&merged, &self.policy)
    }
}
