//! The BaoBao decoder-only transformer.
//!
//! [`Transformer`] stacks [`ParallelBlock`]s (attention and feed-forward on
//! the same input, summed) with a residual add and a norm after each.
//! [`BaoBao`] wraps the stack with token and position embeddings and a
//! readout that shares the token table.

pub mod attention;
pub mod block;
pub mod config;
pub mod model;
pub mod transformer;

pub use self::attention::AttentionBlock;
pub use block::ParallelBlock;
pub use config::{ConfigError, ModelConfig};
pub use model::BaoBao;
pub use transformer::{Layer, Transformer};
