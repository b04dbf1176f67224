//! Position embeddings.

pub mod absolute;

pub use absolute::{AbsolutePositionEmbedding, PositionEmbeddingConfig};
