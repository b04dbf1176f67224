//! Residual stream addition.
//!
//! Both operands must share shape and dtype; the sum is taken in
//! [`PrecisionPolicy::compute`] and returned in the storage dtype.

use candle_core::{Result, Tensor};

use crate::{checks, dtypes::PrecisionPolicy};

/// Adds a transformed `branch` back onto the `residual` stream.
pub fn residual_add(branch: &Tensor, residual: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
    checks::expect_shape("residual.branch", branch, residual.dims())?;
    checks::expect_same_dtype("residual.branch", branch, "residual.input", residual)?;

    let branch = policy.cast_for_matmul(branch)?;
    let residual = policy.cast_for_matmul(residual)?;
    policy.cast_to_storage(&branch.add(&residual)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn residual_add_preserves_shape_and_dtype() -> Result<()> {
        let device = Device::Cpu;
        let dtype = DType::F16;
        let policy = PrecisionPolicy::from_parameter_dtype(dtype);
        let left = Tensor::randn(0f32, 1.0, (2, 4, 8), &device)?.to_dtype(dtype)?;
        let right = Tensor::randn(0f32, 1.0, (2, 4, 8), &device)?.to_dtype(dtype)?;
        let out = residual_add(&left, &right, &policy)?;
        assert_eq!(out.dims(), &[2, 4, 8]);
        assert_eq!(out.dtype(), dtype);
        Ok(())
    }

    #[test]
    fn residual_add_sums_values() -> Result<()> {
        let device = Device::Cpu;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let branch = Tensor::full(0.2f32, (1, 1, 3), &device)?;
        let parent = Tensor::full(1.0f32, (1, 1, 3), &device)?;
        let values = residual_add(&branch, &parent, &policy)?
            .flatten_all()?
            .to_vec1::<f32>()?;
        assert!(values.iter().all(|v| (*v - 1.2).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn residual_add_rejects_shape_mismatch() -> Result<()> {
        let device = Device::Cpu;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let branch = Tensor::zeros((1, 2, 3), DType::F32, &device)?;
        let parent = Tensor::zeros((1, 3, 3), DType::F32, &device)?;
        assert!(residual_add(&branch, &parent, &policy).is_err());
        Ok(())
    }
}
