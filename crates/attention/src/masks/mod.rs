//! Additive attention masks.
//!
//! Masks are `f32` and contain `0.0` where attention is
//! permitted and `f32::NEG_INFINITY` where it is not, so they can be added to
//! the score tensor before the softmax.

pub mod causal;

pub use causal::{build_causal_mask, is_visible};

#[cfg(test)]
mod tests;
