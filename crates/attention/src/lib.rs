//! Causal cosine-similarity attention for the BaoBao transformer.
//!
//! The crate defines the boundary to the fused attention kernel: the
//! [`Attention`] trait, its per-call [`Config`] (causal flag, similarity
//! scale, opaque [`KernelOptions`]) and the [`AttentionError`] taxonomy.
//! Tensors use the layout `[batch, heads, seq_len, head_dim]`.
//!
//! [`reference::CosineSimAttention`] is a portable implementation of the
//! contract: queries and keys are unit-normalised along the head dimension,
//! their dot products are multiplied by the fixed scale, a causal mask is
//! applied and the softmax-weighted values are returned.

pub mod core;
pub mod masks;
pub mod reference;

pub use self::core::{Attention, AttentionError, Config, KernelOption, KernelOptions};
pub use reference::CosineSimAttention;
