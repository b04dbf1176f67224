//! Activation kinds and the gated activation unit.
//!
//! Activations promote inputs to the compute dtype requested by
//! [`PrecisionPolicy`] before evaluating the non-linearity, then cast back to
//! the storage dtype.
//!
//! # Formulas
//!
//! * **GELU** uses the exact erf form `0.5 * x * (1 + erf(x / sqrt(2)))`.
//! * **GELU (tanh)** uses the tanh approximation from GPT-2.
//!
//! [`GatedActivation`] splits the feature axis into a value half and a gate
//! half and returns `value * act(gate)`; with GELU this is GEGLU.

use candle_core::{Error, Result, Tensor, D};
use serde::{Deserialize, Serialize};

use crate::dtypes::PrecisionPolicy;

/// Non-linearity applied to the gate half of a [`GatedActivation`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    /// Exact (erf) GeLU.
    #[default]
    Gelu,
    /// GeLU with the tanh approximation.
    GeluTanh,
}

impl ActivationKind {
    /// Applies the activation to `input` using the precision rules in `policy`.
    pub fn forward(self, input: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        let compute = policy.cast_for_matmul(input)?;
        let activated = match self {
            ActivationKind::Gelu => compute.gelu_erf()?,
            ActivationKind::GeluTanh => compute.gelu()?,
        };
        policy.cast_to_storage(&activated)
    }
}

/// Gated activation unit: `value * act(gate)` over the two halves of the last axis.
///
/// Input `(..., 2F)` produces output `(..., F)`. The first half is the value
/// path, the second half feeds the activation.
#[derive(Debug, Clone, Copy)]
pub struct GatedActivation {
    kind: ActivationKind,
}

impl GatedActivation {
    pub fn new(kind: ActivationKind) -> Self {
        Self { kind }
    }

    /// GEGLU, the erf-GELU gated unit.
    pub fn geglu() -> Self {
        Self::new(ActivationKind::Gelu)
    }

    pub fn kind(&self) -> ActivationKind {
        self.kind
    }

    pub fn forward(&self, input: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        let width = match input.dims().last() {
            Some(&width) => width,
            None => return Err(Error::Msg("gated activation expects a feature axis".into())),
        };
        if width == 0 || width % 2 != 0 {
            return Err(Error::Msg(format!(
                "gated activation expects an even, non-zero feature width, got {width}"
            )));
        }
        let half = width / 2;
        let compute = policy.cast_for_matmul(input)?;
        let value = compute.narrow(D::Minus1, 0, half)?;
        let gate = compute.narrow(D::Minus1, half, half)?;
        // Halves are already in compute dtype; keep them there until the product.
        let compute_policy = PrecisionPolicy::from_parameter_dtype(policy.compute());
        let gate = self.kind.forward(&gate, &compute_policy)?;
        policy.cast_to_storage(&value.mul(&gate)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::f64::consts::SQRT_2;

    fn max_abs_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
        a.to_dtype(DType::F32)?
            .sub(&b.to_dtype(DType::F32)?)?
            .abs()?
            .max_all()?
            .to_vec0::<f32>()
    }

    #[test]
    fn gelu_matches_reference_formula() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::from_slice(&[-2.5f32, -0.5, 0.0, 1.0, 3.0], (5,), &device)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let output = ActivationKind::Gelu.forward(&input, &policy)?;

        let reference = {
            let inner = (input.affine(1.0 / SQRT_2, 0.0)?.erf()? + 1.0)?;
            input.affine(0.5, 0.0)?.mul(&inner)?
        };

        assert!(max_abs_diff(&output, &reference)? < 5e-6);
        Ok(())
    }

    #[test]
    fn geglu_halves_feature_axis() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1.0, (2, 3, 8), &device)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let output = GatedActivation::geglu().forward(&input, &policy)?;
        assert_eq!(output.dims(), &[2, 3, 4]);

        let value = input.narrow(2, 0, 4)?;
        let gate = input.narrow(2, 4, 4)?.gelu_erf()?;
        assert!(max_abs_diff(&output, &value.mul(&gate)?)? < 1e-6);
        Ok(())
    }

    #[test]
    fn tanh_gate_uses_the_approximate_gelu() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1.0, (3, 10), &device)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let unit = GatedActivation::new(ActivationKind::GeluTanh);
        assert_eq!(unit.kind(), ActivationKind::GeluTanh);

        let output = unit.forward(&input, &policy)?;
        let value = input.narrow(1, 0, 5)?;
        let gate = input.narrow(1, 5, 5)?.gelu()?;
        assert!(max_abs_diff(&output, &value.mul(&gate)?)? < 1e-6);
        Ok(())
    }

    #[test]
    fn activation_kind_reads_snake_case() {
        assert_eq!(ActivationKind::default(), ActivationKind::Gelu);
        let kind: ActivationKind = serde_json::from_str("\"gelu_tanh\"").unwrap();
        assert_eq!(kind, ActivationKind::GeluTanh);
    }

    #[test]
    fn zero_gate_zeroes_output() -> Result<()> {
        let device = Device::Cpu;
        let value = Tensor::randn(0f32, 10.0, (4, 6), &device)?;
        let gate = Tensor::zeros((4, 6), DType::F32, &device)?;
        let input = Tensor::cat(&[&value, &gate], 1)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let output = GatedActivation::geglu().forward(&input, &policy)?;
        let max = output.abs()?.max_all()?.to_vec0::<f32>()?;
        assert_eq!(max, 0.0);
        Ok(())
    }

    #[test]
    fn odd_or_empty_width_is_rejected() -> Result<()> {
        let device = Device::Cpu;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let unit = GatedActivation::geglu();

        let odd = Tensor::zeros((2, 5), DType::F32, &device)?;
        assert!(unit.forward(&odd, &policy).is_err());

        let empty = Tensor::zeros((2, 0), DType::F32, &device)?;
        assert!(unit.forward(&empty, &policy).is_err());
        Ok(())
    }

    #[test]
    fn reduced_precision_output_keeps_storage_dtype() -> Result<()> {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1.0, (1, 2, 6), &device)?.to_dtype(DType::BF16)?;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::BF16);
        let output = GatedActivation::geglu().forward(&input, &policy)?;
        assert_eq!(output.dtype(), DType::BF16);
        assert_eq!(output.dims(), &[1, 2, 3]);
        Ok(())
    }
}
