use std::fmt;
use std::sync::Arc;

use attention::{Attention, CosineSimAttention};
use candle_core::{Result, Tensor, Var};
use layers::{
    checks,
    dtypes::PrecisionPolicy,
    norm::{build_norm, NormConfig, NormalizationLayer},
    residual::residual_add,
};

use crate::{block::ParallelBlock, config::ModelConfig};

/// One stage of the stack: a parallel block followed by its norm.
pub struct Layer {
    block: ParallelBlock,
    norm: Arc<dyn NormalizationLayer>,
}

impl Layer {
    pub fn block(&self) -> &ParallelBlock {
        &self.block
    }

    pub fn norm(&self) -> &dyn NormalizationLayer {
        self.norm.as_ref()
    }
}

/// `depth` layers applied in order, each computing
/// `x = norm(block(x) + x)`.
///
/// Maps `(batch, seq, dim)` to `(batch, seq, dim)` and can be used on its own
/// over pre-embedded inputs.
pub struct Transformer {
    dim: usize,
    layers: Vec<Layer>,
    policy: PrecisionPolicy,
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("dim", &self.dim)
            .field("depth", &self.layers.len())
            .finish()
    }
}

impl Transformer {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Self::with_kernel(config, Arc::new(CosineSimAttention::new()))
    }

    /// Builds the stack with every layer sharing `kernel`.
    pub fn with_kernel(config: &ModelConfig, kernel: Arc<dyn Attention>) -> Result<Self> {
        config.validate()?;
        let norm_config = NormConfig::new(config.dim, config.norm_kind).with_epsilon(config.norm_eps);

        let mut layers = Vec::with_capacity(config.depth);
        for index in 0..config.depth {
            layers.push(Layer {
                block: ParallelBlock::new(index, config, kernel.clone())?,
                norm: build_norm(norm_config.clone(), config.dtype, &config.device)?,
            });
        }

        Ok(Self {
            dim: config.dim,
            layers,
            policy: PrecisionPolicy::from_parameter_dtype(config.dtype),
        })
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn set_training(&self, training: bool) {
        for layer in &self.layers {
            layer.block.set_training(training);
        }
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = Vec::new();
        for (index, layer) in self.layers.iter().enumerate() {
            let prefix = format!("{scope}.{index}");
            params.extend(layer.block.named_parameters(&format!("{prefix}.block")));
            params.extend(layer.norm.named_parameters(&format!("{prefix}.norm")));
        }
        params
    }

    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        checks::expect_batch_seq_hidden("transformer.input", hidden, self.dim)?;
        let mut x = hidden.clone();
        for layer in &self.layers {
            let branch = layer.block.forward(&x)?;
            x = residual_add(&branch, &x, &self.policy)?;
            x = layer.norm.forward(&x, &self.policy)?;
        }
        Ok(x)
    }
}
