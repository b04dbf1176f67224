//! Normalisation layers with unified shape and dtype handling.
//!
//! Normalisation happens along the last axis of a `(..., hidden)` tensor and
//! preserves the layout. Statistics are computed in
//! [`PrecisionPolicy::reduction`] before casting the output back.
//!
//! Two variants are provided:
//!
//! * [`LayerNorm`]: `(x - mean) / sqrt(var + eps) * weight + bias`.
//! * [`RmsNorm`]: `x / max(||x||_2 * hidden^-0.5, eps) * gain`. There is no
//!   mean-centering, and the floor is a clamp on the scaled norm rather than
//!   an epsilon inside the square root, so the output is exactly invariant to
//!   positive rescaling of the input until the floor engages.

use std::sync::Arc;

use candle_core::{DType, Device, Error, Result, Tensor, Var, D};
use serde::{Deserialize, Serialize};

use crate::{checks, dtypes::PrecisionPolicy};

/// Available normalisation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum NormKind {
    /// Standard LayerNorm with learnable scale and shift.
    LayerNorm,
    /// Scale-invariant RMS normalisation with a learnable gain.
    RmsNorm,
}

impl NormKind {
    /// Default numeric floor for the variant.
    pub fn default_epsilon(self) -> f64 {
        match self {
            NormKind::LayerNorm => 1e-5,
            NormKind::RmsNorm => 1e-8,
        }
    }
}

/// Configuration shared by all normalisation layers.
#[derive(Debug, Clone, PartialEq)]
pub struct NormConfig {
    /// Size of the hidden dimension being normalised.
    pub hidden_size: usize,
    /// Variance stabiliser (LayerNorm) or clamp floor (RmsNorm).
    pub epsilon: f64,
    pub kind: NormKind,
}

impl NormConfig {
    pub fn new(hidden_size: usize, kind: NormKind) -> Self {
        Self {
            hidden_size,
            epsilon: kind.default_epsilon(),
            kind,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

/// Shared interface for normalisation layers.
pub trait NormalizationLayer: Send + Sync {
    /// Applies the normalisation to a hidden state tensor.
    fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor>;

    /// Learned parameters under `scope`.
    fn named_parameters(&self, scope: &str) -> Vec<(String, Var)>;
}

fn validate_param(context: &str, param: &Tensor, hidden: usize) -> Result<()> {
    checks::expect_shape(context, param, &[hidden])?;
    checks::expect_dtype_in(context, param, &checks::PARAMETER_DTYPES)
}

/// Standard LayerNorm with learnable affine parameters.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    config: NormConfig,
    weight: Var,
    bias: Var,
}

impl LayerNorm {
    pub fn new(weight: Tensor, bias: Tensor, mut config: NormConfig) -> Result<Self> {
        config.kind = NormKind::LayerNorm;
        validate_param("norm.weight", &weight, config.hidden_size)?;
        validate_param("norm.bias", &bias, config.hidden_size)?;
        Ok(Self {
            config,
            weight: Var::from_tensor(&weight)?,
            bias: Var::from_tensor(&bias)?,
        })
    }

    /// Unit scale and zero shift.
    pub fn identity_init(config: NormConfig, dtype: DType, device: &Device) -> Result<Self> {
        let weight = Tensor::ones(config.hidden_size, dtype, device)?;
        let bias = Tensor::zeros(config.hidden_size, dtype, device)?;
        Self::new(weight, bias, config)
    }
}

impl NormalizationLayer for LayerNorm {
    fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        checks::expect_last_dim("norm.input", hidden, self.config.hidden_size)?;
        let hidden_size = self.config.hidden_size as f64;
        let compute = policy.cast_for_reduction(hidden)?;

        let mean = (compute.sum_keepdim(D::Minus1)? / hidden_size)?;
        let centered = compute.broadcast_sub(&mean)?;
        let variance = (centered.sqr()?.sum_keepdim(D::Minus1)? / hidden_size)?;
        let denom = (variance + self.config.epsilon)?.sqrt()?;
        let normalized = centered.broadcast_div(&denom)?;

        let weight = self.weight.to_dtype(normalized.dtype())?;
        let bias = self.bias.to_dtype(normalized.dtype())?;
        let out = normalized.broadcast_mul(&weight)?.broadcast_add(&bias)?;
        policy.cast_to_storage(&out)
    }

    fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        vec![
            (format!("{scope}.weight"), self.weight.clone()),
            (format!("{scope}.bias"), self.bias.clone()),
        ]
    }
}

/// Scale-invariant RMS normalisation with a learned per-feature gain.
#[derive(Debug, Clone)]
pub struct RmsNorm {
    config: NormConfig,
    gain: Var,
}

impl RmsNorm {
    pub fn new(gain: Tensor, mut config: NormConfig) -> Result<Self> {
        config.kind = NormKind::RmsNorm;
        validate_param("norm.gain", &gain, config.hidden_size)?;
        if config.epsilon <= 0.0 {
            return Err(Error::Msg("rms norm requires a positive clamp floor".into()));
        }
        Ok(Self {
            config,
            gain: Var::from_tensor(&gain)?,
        })
    }

    /// Gain initialised to ones.
    pub fn identity_init(config: NormConfig, dtype: DType, device: &Device) -> Result<Self> {
        let gain = Tensor::ones(config.hidden_size, dtype, device)?;
        Self::new(gain, config)
    }

    pub fn gain(&self) -> &Var {
        &self.gain
    }
}

impl NormalizationLayer for RmsNorm {
    fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        checks::expect_last_dim("norm.input", hidden, self.config.hidden_size)?;
        let scale = (self.config.hidden_size as f64).powf(-0.5);
        let compute = policy.cast_for_reduction(hidden)?;

        let norm = compute.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?;
        let floor = Tensor::new(self.config.epsilon, norm.device())?.to_dtype(norm.dtype())?;
        let norm = norm.affine(scale, 0.0)?.broadcast_maximum(&floor)?;
        let normalized = compute.broadcast_div(&norm)?;

        let gain = self.gain.to_dtype(normalized.dtype())?;
        policy.cast_to_storage(&normalized.broadcast_mul(&gain)?)
    }

    fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        vec![(format!("{scope}.gain"), self.gain.clone())]
    }
}

/// Builds a norm of `kind` with identity initialisation.
pub fn build_norm(
    config: NormConfig,
    dtype: DType,
    device: &Device,
) -> Result<Arc<dyn NormalizationLayer>> {
    match config.kind {
        NormKind::LayerNorm => Ok(Arc::new(LayerNorm::identity_init(config, dtype, device)?)),
        NormKind::RmsNorm => Ok(Arc::new(RmsNorm::identity_init(config, dtype, device)?)),
    }
}
