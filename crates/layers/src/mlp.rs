//! Position-wise gated feed-forward block.
//!
//! The block maps `(..., hidden)` to `(..., hidden)`:
//! project to `2 * inner` without bias, apply the gated activation (halving
//! to `inner`), dropout, then project back to `hidden` without bias. With
//! the default GELU gate this is the GEGLU feed-forward.

use candle_core::{DType, Device, Error, Result, Tensor, Var};

use crate::{
    activations::{ActivationKind, GatedActivation},
    dropout::Dropout,
    dtypes::PrecisionPolicy,
    linear::{Linear, LinearConfig, LinearInit, LinearLayer},
};

/// Configuration for the gated feed-forward block.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedForwardConfig {
    /// Model hidden size.
    pub hidden_size: usize,
    /// Width after gating; the up-projection produces twice this.
    pub intermediate_size: usize,
    /// Activation applied to the gate half.
    pub activation: ActivationKind,
    /// Dropout applied after gating, training mode only.
    pub dropout_p: f32,
    pub dropout_seed: u64,
}

impl FeedForwardConfig {
    /// `intermediate_size = hidden_size * mult`, GELU gate, no dropout.
    pub fn with_multiplier(hidden_size: usize, mult: usize) -> Self {
        Self {
            hidden_size,
            intermediate_size: hidden_size * mult,
            activation: ActivationKind::Gelu,
            dropout_p: 0.0,
            dropout_seed: 0,
        }
    }
}

/// Shared interface for feed-forward stacks.
pub trait FeedForwardLayer: Send + Sync {
    fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor>;
}

/// Gated feed-forward block with two bias-free projections.
#[derive(Debug)]
pub struct FeedForward {
    proj_in: Linear,
    gate: GatedActivation,
    dropout: Dropout,
    proj_out: Linear,
}

impl FeedForward {
    pub fn with_init(
        config: FeedForwardConfig,
        init: &LinearInit,
        device: &Device,
        dtype: DType,
    ) -> Result<Self> {
        if config.hidden_size == 0 || config.intermediate_size == 0 {
            return Err(Error::Msg(
                "feed-forward requires non-zero hidden and intermediate sizes".into(),
            ));
        }
        let proj_in = Linear::with_init(
            LinearConfig::new(config.hidden_size, 2 * config.intermediate_size),
            init,
            device,
            dtype,
        )?;
        let proj_out = Linear::with_init(
            LinearConfig::new(config.intermediate_size, config.hidden_size),
            init,
            device,
            dtype,
        )?;
        let gate = GatedActivation::new(config.activation);
        let dropout = Dropout::new(config.dropout_p, config.dropout_seed)?;
        Ok(Self {
            proj_in,
            gate,
            dropout,
            proj_out,
        })
    }

    pub fn proj_in(&self) -> &Linear {
        &self.proj_in
    }

    pub fn proj_out(&self) -> &Linear {
        &self.proj_out
    }

    pub fn set_training(&self, training: bool) {
        self.dropout.set_training(training);
    }

    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        let mut params = self.proj_in.named_parameters(&format!("{scope}.proj_in"));
        params.extend(self.proj_out.named_parameters(&format!("{scope}.proj_out")));
        params
    }
}

impl FeedForwardLayer for FeedForward {
    fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        let projected = self.proj_in.forward(hidden, policy)?;
        let gated = self.gate.forward(&projected, policy)?;
        let dropped = self.dropout.forward(&gated, policy)?;
        self.proj_out.forward(&dropped, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(dropout_p: f32) -> Result<FeedForward> {
        let mut config = FeedForwardConfig::with_multiplier(8, 4);
        config.dropout_p = dropout_p;
        FeedForward::with_init(config, &LinearInit::default(), &Device::Cpu, DType::F32)
    }

    #[test]
    fn projection_widths_follow_multiplier() -> Result<()> {
        let ff = build(0.0)?;
        assert_eq!(ff.proj_in().weight().dims(), &[64, 8]);
        assert_eq!(ff.proj_out().weight().dims(), &[8, 32]);
        assert_eq!(ff.named_parameters("ff").len(), 2);
        Ok(())
    }

    #[test]
    fn forward_preserves_hidden_width() -> Result<()> {
        let ff = build(0.0)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let input = Tensor::randn(0f32, 1.0, (2, 5, 8), &Device::Cpu)?;
        assert_eq!(ff.forward(&input, &policy)?.dims(), &[2, 5, 8]);
        Ok(())
    }

    #[test]
    fn forward_matches_manual_composition() -> Result<()> {
        let ff = build(0.0)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let input = Tensor::randn(0f32, 1.0, (1, 3, 8), &Device::Cpu)?;

        let up = input.broadcast_matmul(&ff.proj_in().weight().t()?)?;
        let value = up.narrow(2, 0, 32)?;
        let gate = up.narrow(2, 32, 32)?.gelu_erf()?;
        let expected = value
            .mul(&gate)?
            .broadcast_matmul(&ff.proj_out().weight().t()?)?;

        let diff = ff
            .forward(&input, &policy)?
            .sub(&expected)?
            .abs()?
            .max_all()?
            .to_vec0::<f32>()?;
        assert!(diff < 1e-4);
        Ok(())
    }

    #[test]
    fn eval_mode_makes_dropout_deterministic() -> Result<()> {
        let ff = build(0.5)?;
        ff.set_training(false);
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let input = Tensor::randn(0f32, 1.0, (1, 4, 8), &Device::Cpu)?;
        let a = ff.forward(&input, &policy)?;
        let b = ff.forward(&input, &policy)?;
        assert_eq!(a.sub(&b)?.abs()?.max_all()?.to_vec0::<f32>()?, 0.0);
        Ok(())
    }
}
