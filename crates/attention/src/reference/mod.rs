//! Portable reference kernels.
//!
//! These paths favour clarity over throughput and define the numerics any
//! optimised kernel behind [`Attention`](crate::core::Attention) must match.

pub mod cosine;

pub use cosine::CosineSimAttention;
