//! Lightweight validation helpers shared across layer components.
//!
//! Every helper takes a `context` label naming the tensor being checked so the
//! resulting `candle_core::Error` points at the offending projection or
//! parameter. Call sites propagate with `?`; nothing here panics.

use candle_core::{DType, Error, Result, Tensor};

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(context: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected shape {:?}, got {:?}",
            expected, actual
        )))
    }
}

/// Ensures a tensor has exactly `rank` dimensions.
pub fn expect_rank(context: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    let actual = tensor.rank();
    if actual == rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected rank {rank}, got {actual} ({:?})",
            tensor.dims()
        )))
    }
}

/// Validates that the trailing (feature) axis has width `features`.
pub fn expect_last_dim(context: &str, tensor: &Tensor, features: usize) -> Result<()> {
    match tensor.dims().last() {
        Some(&actual) if actual == features => Ok(()),
        Some(&actual) => Err(Error::Msg(format!(
            "{context}: expected trailing dim {features}, got {actual} ({:?})",
            tensor.dims()
        ))),
        None => Err(Error::Msg(format!(
            "{context}: expected a feature axis of width {features}, got a scalar"
        ))),
    }
}

/// Validates the `(batch, seq, hidden)` convention with a known hidden size.
pub fn expect_batch_seq_hidden(context: &str, tensor: &Tensor, hidden: usize) -> Result<()> {
    match tensor.dims() {
        [_, _, actual_hidden] if *actual_hidden == hidden => Ok(()),
        dims => Err(Error::Msg(format!(
            "{context}: expected (batch, seq, {hidden}) layout, got {:?}",
            dims
        ))),
    }
}

/// Checks the tensor dtype is one of the allowed values.
pub fn expect_dtype_in(context: &str, tensor: &Tensor, allowed: &[DType]) -> Result<()> {
    let dtype = tensor.dtype();
    if allowed.contains(&dtype) {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected dtype in {:?}, got {:?}",
            allowed, dtype
        )))
    }
}

/// Checks two tensors share a dtype.
pub fn expect_same_dtype(
    context: &str,
    tensor: &Tensor,
    other_context: &str,
    other: &Tensor,
) -> Result<()> {
    if tensor.dtype() == other.dtype() {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context} ({:?}) must share dtype with {other_context} ({:?})",
            tensor.dtype(),
            other.dtype()
        )))
    }
}

/// Float dtypes accepted for learned parameters.
pub const PARAMETER_DTYPES: [DType; 3] = [DType::F16, DType::BF16, DType::F32];

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn last_dim_mismatch_names_context() -> Result<()> {
        let tensor = Tensor::zeros((2, 3, 5), DType::F32, &Device::Cpu)?;
        let err = expect_last_dim("linear.input", &tensor, 4).unwrap_err();
        assert!(err.to_string().contains("linear.input"));
        assert!(expect_last_dim("linear.input", &tensor, 5).is_ok());
        Ok(())
    }

    #[test]
    fn batch_seq_hidden_rejects_rank_two() -> Result<()> {
        let tensor = Tensor::zeros((3, 4), DType::F32, &Device::Cpu)?;
        assert!(expect_batch_seq_hidden("x", &tensor, 4).is_err());
        Ok(())
    }
}
