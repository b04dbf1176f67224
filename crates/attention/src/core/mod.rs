//! Core traits and types shared across attention kernels.
//!
//! Kernels operate on tensors with layout `[batch, heads, seq_len, head_dim]`.
//! The output mirrors the layout and dtype of `v`.

pub mod config;
pub mod errors;
pub mod options;

use candle_core::Tensor;

pub use config::{AccumulationPrecision, Config, DEFAULT_SCALE, PRECISION_ENV};
pub use errors::AttentionError;
pub use options::{KernelOption, KernelOptions};

/// Contract of a fused cosine-similarity attention kernel.
///
/// * `q`, `k`, `v` share the layout `[batch, heads, seq_len, head_dim]`.
/// * Logits are the cosine similarity of query and key rows multiplied by
///   [`Config::scale`], followed by a softmax over keys.
/// * When [`Config::causal`] is set, query `i` only sees keys `<= i`
///   (aligned to the most recent keys when `k_len > q_len`).
/// * [`Config::options`] is forwarded as-is; kernels ignore unknown keys.
pub trait Attention: Send + Sync {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        config: &Config,
    ) -> Result<Tensor, AttentionError>;
}
