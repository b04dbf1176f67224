//! Embedding tables for the BaoBao language model.
//!
//! [`token::TokenEmbedding`] maps token ids to vectors and doubles as the
//! tied output projection. [`positional::AbsolutePositionEmbedding`] adds a
//! learned vector per position.

pub mod positional;
pub mod token;

pub use positional::*;
pub use token::*;
