//! Reference cosine-similarity attention kernel.

use std::sync::OnceLock;

use candle_core::{DType, Tensor, D};
use candle_nn::ops::softmax;

use crate::core::{
    AccumulationPrecision, Attention, AttentionError, Config, KernelOption, KernelOptions,
};
use crate::masks::build_causal_mask;

/// Option key: set to `false` when queries and keys arrive already unit-normalised.
pub const L2NORM_QK: &str = "l2norm_qk";

/// Floor applied to row norms before dividing.
const NORM_FLOOR: f64 = 1e-12;

/// Numerically exact, portable cosine-similarity attention.
#[derive(Debug, Default)]
pub struct CosineSimAttention {
    first_call: OnceLock<()>,
}

impl CosineSimAttention {
    pub fn new() -> Self {
        Self::default()
    }
}

fn l2norm_qk(options: &KernelOptions) -> Result<bool, AttentionError> {
    match options.get(L2NORM_QK) {
        None => Ok(true),
        Some(KernelOption::Bool(flag)) => Ok(*flag),
        Some(other) => Err(AttentionError::InvalidOption {
            key: L2NORM_QK.to_string(),
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn l2_normalize(x: &Tensor) -> candle_core::Result<Tensor> {
    let norm = x.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?;
    let floor = Tensor::new(NORM_FLOOR, x.device())?.to_dtype(x.dtype())?;
    x.broadcast_div(&norm.broadcast_maximum(&floor)?)
}

fn invalid_shape(context: impl Into<String>) -> AttentionError {
    AttentionError::InvalidShape {
        context: context.into(),
    }
}

impl Attention for CosineSimAttention {
    fn attend(
        &self,
        q: &Tensor,
        k: &Tensor,
        v: &Tensor,
        config: &Config,
    ) -> Result<Tensor, AttentionError> {
        let normalize = l2norm_qk(&config.options)?;

        if self.first_call.set(()).is_ok() {
            log::info!(
                "attention::reference init causal={} scale={} precision={:?} l2norm_qk={} options={}",
                config.causal,
                config.scale,
                config.precision,
                normalize,
                config.options.len()
            );
            for key in config.options.keys().filter(|key| *key != L2NORM_QK) {
                log::debug!("attention::reference ignoring kernel option `{key}`");
            }
        }

        let device = q.device();
        if !device.same_device(k.device()) || !device.same_device(v.device()) {
            return Err(invalid_shape("q, k, v must reside on the same device"));
        }

        let dtype = v.dtype();
        if q.dtype() != dtype || k.dtype() != dtype {
            return Err(invalid_shape("q, k, v must share the same dtype"));
        }
        if !matches!(dtype, DType::F32 | DType::F16 | DType::BF16 | DType::F64) {
            return Err(AttentionError::UnsupportedDType {
                requested: format!("{dtype:?}"),
            });
        }

        let (batch, heads, q_len, head_dim) = q
            .dims4()
            .map_err(|_| invalid_shape("q must have shape [batch, heads, seq_len, head_dim]"))?;
        let (kb, kh, k_len, kd) = k
            .dims4()
            .map_err(|_| invalid_shape("k must have shape [batch, heads, seq_len, head_dim]"))?;
        let (vb, vh, vk, _) = v
            .dims4()
            .map_err(|_| invalid_shape("v must have shape [batch, heads, seq_len, head_dim]"))?;

        if kb != batch || kh != heads || kd != head_dim {
            return Err(invalid_shape(format!(
                "k shape mismatch: expected [{batch}, {heads}, ?, {head_dim}] got [{kb}, {kh}, {k_len}, {kd}]"
            )));
        }
        if vb != batch || vh != heads || vk != k_len {
            return Err(invalid_shape(format!(
                "v shape mismatch: expected [{batch}, {heads}, {k_len}, ?] got {:?}",
                v.dims()
            )));
        }

        let work_dtype = match config.precision {
            AccumulationPrecision::ForceF32 if dtype != DType::F64 => DType::F32,
            _ => dtype,
        };
        let q = q.to_dtype(work_dtype)?.contiguous()?;
        let k = k.to_dtype(work_dtype)?.contiguous()?;
        let v = v.to_dtype(work_dtype)?.contiguous()?;

        let (q, k) = if normalize {
            (l2_normalize(&q)?, l2_normalize(&k)?)
        } else {
            (q, k)
        };

        let k_t = k.t()?.contiguous()?;
        let mut scores = q.matmul(&k_t)?.affine(config.scale, 0.0)?;
        if config.causal {
            let mask = build_causal_mask(device, q_len, k_len)?.to_dtype(work_dtype)?;
            scores = scores.broadcast_add(&mask)?;
        }

        let probs = softmax(&scores, D::Minus1)?;
        let output = probs.matmul(&v)?;
        Ok(output.to_dtype(dtype)?)
    }
}
