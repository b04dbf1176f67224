use std::fmt;
use std::sync::Arc;

use attention::Attention;
use candle_core::{Result, Tensor, Var};
use layers::{
    dtypes::PrecisionPolicy,
    linear::LinearInit,
    mlp::{FeedForward, FeedForwardConfig, FeedForwardLayer},
};

use crate::{attention::AttentionBlock, config::ModelConfig};

/// Attention and feed-forward evaluated side by side on the same input.
///
/// `forward(x) = attn(x) + ff(x)`; neither branch sees the other's output.
pub struct ParallelBlock {
    attn: AttentionBlock,
    ff: FeedForward,
    policy: PrecisionPolicy,
}

impl fmt::Debug for ParallelBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelBlock")
            .field("attn", &self.attn)
            .field("ff", &self.ff)
            .finish()
    }
}

impl ParallelBlock {
    /// `index` decorrelates the dropout stream of each layer.
    pub fn new(index: usize, config: &ModelConfig, kernel: Arc<dyn Attention>) -> Result<Self> {
        let attn = AttentionBlock::with_kernel(config, kernel)?;
        let ff_config = FeedForwardConfig {
            hidden_size: config.dim,
            intermediate_size: config.dim * config.ff_mult,
            activation: config.ff_activation,
            dropout_p: config.dropout,
            dropout_seed: config.dropout_seed.wrapping_add(index as u64),
        };
        let ff = FeedForward::with_init(
            ff_config,
            &LinearInit::from_std(config.init_std),
            &config.device,
            config.dtype,
        )?;
        Ok(Self {
            attn,
            ff,
            policy: PrecisionPolicy::from_parameter_dtype(config.dtype),
        })
    }

    pub fn attn(&self) -> &AttentionBlock {
        &self.attn
    }

    pub fn ff(&self) -> &FeedForward {
        &self.ff
    }

    pub fn set_training(&self, training: bool) {
        self.ff.set_training(training);
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.attn.named_parameters(&format!("{scope}.attn"));
        params.extend(self.ff.named_parameters(&format!("{scope}.ff")));
        params
    }

    pub fn forward(&self, hidden: &Tensor) -> Result<Tensor> {
        let attended = self.attn.forward(hidden)?;
        let fed = self.ff.forward(hidden, &self.policy)?;
        attended.add(&fed)
    }
}
