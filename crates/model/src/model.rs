use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use attention::{Attention, CosineSimAttention};
use candle_core::{Result, Tensor, Var};
use embedding::{
    positional::{AbsolutePositionEmbedding, PositionEmbeddingConfig},
    token::{TokenEmbedding, TokenEmbeddingConfig},
};
use layers::gradient::scale_gradient;

use crate::{config::ModelConfig, transformer::Transformer};

/// Decoder-only language model: token and position embeddings, the
/// transformer stack, and a readout tied to the token table.
pub struct BaoBao {
    config: ModelConfig,
    token_emb: TokenEmbedding,
    pos_emb: AbsolutePositionEmbedding,
    transformer: Transformer,
}

impl fmt::Debug for BaoBao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaoBao")
            .field("num_tokens", &self.config.num_tokens)
            .field("max_seq_len", &self.config.max_seq_len)
            .field("dim", &self.config.dim)
            .field("depth", &self.config.depth)
            .finish()
    }
}

impl BaoBao {
    pub fn new(config: ModelConfig) -> Result<Self> {
        Self::with_kernel(config, Arc::new(CosineSimAttention::new()))
    }

    pub fn with_kernel(config: ModelConfig, kernel: Arc<dyn Attention>) -> Result<Self> {
        config.validate_language_model()?;

        let token_emb = TokenEmbedding::new(TokenEmbeddingConfig {
            num_tokens: config.num_tokens,
            dim: config.dim,
            dtype: config.dtype,
            device: config.device.clone(),
        })?;
        let pos_emb = AbsolutePositionEmbedding::new(PositionEmbeddingConfig {
            max_seq_len: config.max_seq_len,
            dim: config.dim,
            dtype: config.dtype,
            device: config.device.clone(),
        })?;
        let transformer = Transformer::with_kernel(&config, kernel)?;

        let model = Self {
            config,
            token_emb,
            pos_emb,
            transformer,
        };
        log::debug!(
            "built {:?} with {} parameters",
            model,
            model.parameter_count()
        );
        Ok(model)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn token_emb(&self) -> &TokenEmbedding {
        &self.token_emb
    }

    pub fn pos_emb(&self) -> &AbsolutePositionEmbedding {
        &self.pos_emb
    }

    pub fn transformer(&self) -> &Transformer {
        &self.transformer
    }

    /// Weight read by the output projection; the same variable as the token table.
    pub fn output_weight(&self) -> &Var {
        self.token_emb.readout().weight()
    }

    /// Toggles dropout for every layer. Models start in training mode.
    pub fn set_training(&self, training: bool) {
        self.transformer.set_training(training);
    }

    /// Every parameter under a dotted name. The tied matrix is listed once,
    /// as `token_emb.weight`.
    pub fn named_parameters(&self) -> Vec<(String, Var)> {
        let mut params = self.token_emb.named_parameters("token_emb");
        params.extend(self.pos_emb.named_parameters("pos_emb"));
        params.extend(self.transformer.named_parameters("layers"));
        params
    }

    /// Distinct variables for an optimizer, deduplicated by storage identity.
    pub fn trainable_parameters(&self) -> Vec<Var> {
        let mut seen = HashSet::new();
        self.named_parameters()
            .into_iter()
            .filter_map(|(_, var)| seen.insert(var.id()).then_some(var))
            .collect()
    }

    /// Scalar count over [`BaoBao::trainable_parameters`].
    pub fn parameter_count(&self) -> usize {
        self.trainable_parameters()
            .iter()
            .map(|var| var.elem_count())
            .sum()
    }

    /// Maps `(batch, seq)` integer token ids to `(batch, seq, num_tokens)` logits.
    ///
    /// Ids must lie in `[0, num_tokens)` and `seq` must not exceed `max_seq_len`.
    pub fn forward(&self, token_ids: &Tensor) -> Result<Tensor> {
        let hidden = self.embed(token_ids)?;
        let hidden = self.transformer.forward(&hidden)?;
        self.token_emb.linear_out(&hidden)
    }

    /// Token plus position embeddings, `(batch, seq)` to `(batch, seq, dim)`.
    ///
    /// The token lookup passes through [`scale_gradient`], so the table
    /// receives `alpha` times the gradient while positions receive all of it.
    pub fn embed(&self, token_ids: &Tensor) -> Result<Tensor> {
        let embedded = self.token_emb.forward(token_ids)?;
        let (_, seq, _) = embedded.dims3()?;
        let embedded = scale_gradient(&embedded, self.config.alpha)?;

        let positions = self.pos_emb.forward(seq)?;
        embedded.broadcast_add(&positions)
    }
}
