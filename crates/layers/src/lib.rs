//! Building blocks for the BaoBao transformer layers.
//!
//! Projections, normalisation, the gated activation unit, the gated
//! feed-forward block, dropout and residual helpers, all assembled from
//! candle primitives. Learned parameters are [`candle_core::Var`]s so they
//! participate in autodiff and can be shared between roles.

pub mod activations;
pub mod checks;
pub mod dropout;
pub mod dtypes;
pub mod gradient;
pub mod linear;
pub mod mlp;
pub mod norm;
pub mod residual;

pub use dtypes::PrecisionPolicy;
