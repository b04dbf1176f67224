//! Gradient-shaping helpers built on candle's stop-gradient (`detach`).

use candle_core::{Error, Result, Tensor};

/// Returns `alpha * x + (1 - alpha) * detach(x)`.
///
/// The forward value is `x`; gradients flowing back through the result are
/// multiplied by `alpha`. `alpha` above 1 amplifies them; negative or
/// non-finite values are rejected.
pub fn scale_gradient(x: &Tensor, alpha: f64) -> Result<Tensor> {
    if !(alpha.is_finite() && alpha >= 0.0) {
        return Err(Error::Msg(format!(
            "gradient scale must be finite and non-negative, got {alpha}"
        )));
    }
    let live = x.affine(alpha, 0.0)?;
    let frozen = x.detach().affine(1.0 - alpha, 0.0)?;
    live.add(&frozen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Var};

    #[test]
    fn forward_value_is_unchanged() -> Result<()> {
        let x = Tensor::randn(0f32, 1.0, (2, 3, 4), &Device::Cpu)?;
        let y = scale_gradient(&x, 0.1)?;
        let diff = x.sub(&y)?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert!(diff < 1e-6);
        Ok(())
    }

    #[test]
    fn gradient_is_scaled_by_alpha() -> Result<()> {
        let x = Var::ones((3, 2), DType::F32, &Device::Cpu)?;
        let grads = scale_gradient(&x, 0.1)?.sum_all()?.backward()?;
        let grad = grads
            .get(&x)
            .expect("gradient for x")
            .flatten_all()?
            .to_vec1::<f32>()?;
        assert!(grad.iter().all(|g| (g - 0.1).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn alpha_above_one_amplifies_gradient() -> Result<()> {
        let x = Var::from_slice(&[0.5f32, -1.0, 3.0], 3, &Device::Cpu)?;
        let y = scale_gradient(&x, 2.0)?;
        let diff = y.sub(x.as_tensor())?.abs()?.max_all()?.to_vec0::<f32>()?;
        assert!(diff < 1e-6);

        let grads = y.sum_all()?.backward()?;
        let grad = grads.get(&x).expect("gradient for x").to_vec1::<f32>()?;
        assert!(grad.iter().all(|g| (g - 2.0).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn negative_or_non_finite_alpha_is_rejected() -> Result<()> {
        let x = Tensor::zeros(2, DType::F32, &Device::Cpu)?;
        assert!(scale_gradient(&x, -0.5).is_err());
        assert!(scale_gradient(&x, f64::INFINITY).is_err());
        assert!(scale_gradient(&x, f64::NAN).is_err());
        Ok(())
    }
}
