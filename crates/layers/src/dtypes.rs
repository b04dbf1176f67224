//! Precision policy shared by every layer in the stack.
//!
//! Parameters may live in `f16`/`bf16` while matmuls and activations run in
//! at least `f32`. Statistics such as norms are always reduced in `f32`.
//! Outputs are cast back to the storage dtype so blocks can be chained.

use candle_core::{DType, Result, Tensor};

/// Describes how tensors are cast during the phases of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecisionPolicy {
    storage: DType,
    compute: DType,
    reduction: DType,
}

impl PrecisionPolicy {
    /// Builds a policy from the parameter storage dtype.
    pub fn from_parameter_dtype(storage: DType) -> Self {
        let compute = match storage {
            DType::F16 | DType::BF16 => DType::F32,
            other => other,
        };
        let reduction = match storage {
            DType::F64 => DType::F64,
            _ => DType::F32,
        };
        Self {
            storage,
            compute,
            reduction,
        }
    }

    /// Dtype used to store parameters and block outputs.
    pub fn storage(&self) -> DType {
        self.storage
    }

    /// Dtype used for matmuls and activation evaluation.
    pub fn compute(&self) -> DType {
        self.compute
    }

    /// Dtype used for reductions such as norm statistics.
    pub fn reduction(&self) -> DType {
        self.reduction
    }

    /// Casts a tensor to the compute dtype for matmul readiness.
    pub fn cast_for_matmul(&self, tensor: &Tensor) -> Result<Tensor> {
        cast_tensor(tensor, self.compute)
    }

    /// Casts a tensor to the reduction dtype for statistics.
    pub fn cast_for_reduction(&self, tensor: &Tensor) -> Result<Tensor> {
        cast_tensor(tensor, self.reduction)
    }

    /// Casts a tensor back to the storage dtype (or leaves it unchanged).
    pub fn cast_to_storage(&self, tensor: &Tensor) -> Result<Tensor> {
        cast_tensor(tensor, self.storage)
    }
}

// A same-dtype cast must hand back the identical tensor so variables keep
// their autodiff identity.
fn cast_tensor(tensor: &Tensor, dtype: DType) -> Result<Tensor> {
    if tensor.dtype() == dtype {
        Ok(tensor.clone())
    } else {
        tensor.to_dtype(dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn policy_promotes_reduced_precision_parameters() {
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F16);
        assert_eq!(policy.storage(), DType::F16);
        assert_eq!(policy.compute(), DType::F32);
        assert_eq!(policy.reduction(), DType::F32);
    }

    #[test]
    fn f32_policy_keeps_a_single_dtype() {
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        assert_eq!(policy.storage(), DType::F32);
        assert_eq!(policy.compute(), DType::F32);
        assert_eq!(policy.reduction(), DType::F32);
    }

    #[test]
    fn cast_round_trip_stays_within_bf16_precision() -> Result<()> {
        let device = Device::Cpu;
        let policy = PrecisionPolicy::from_parameter_dtype(DType::BF16);
        let base = Tensor::from_vec(vec![0.125f32, -0.75, 3.5], (3,), &device)?;
        let storage = base.to_dtype(policy.storage())?;

        let compute = policy.cast_for_matmul(&storage)?;
        assert_eq!(compute.dtype(), DType::F32);

        let restored = policy
            .cast_to_storage(&compute)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()?;
        for (orig, rest) in base.to_vec1::<f32>()?.iter().zip(restored.iter()) {
            assert!((orig - rest).abs() <= 2e-2);
        }
        Ok(())
    }

    #[test]
    fn same_dtype_cast_preserves_identity() -> Result<()> {
        let policy = PrecisionPolicy::from_parameter_dtype(DType::F32);
        let tensor = Tensor::ones(4, DType::F32, &Device::Cpu)?;
        let cast = policy.cast_for_matmul(&tensor)?;
        assert_eq!(cast.id(), tensor.id());
        Ok(())
    }
}
