//! Builders for causal attention masks.

use candle_core::{Device, Result, Tensor};

/// Whether query `q` may attend to key `k`.
///
/// When `k_len > q_len` the queries are aligned with the most recent `q_len`
/// keys, so every query also sees the extra prefix.
pub fn is_visible(q: usize, k: usize, q_len: usize, k_len: usize) -> bool {
    k <= q + k_len.saturating_sub(q_len)
}

/// Construct a `[q_len, k_len]` causal mask that broadcasts over batch and heads.
pub fn build_causal_mask(device: &Device, q_len: usize, k_len: usize) -> Result<Tensor> {
    let data = (0..q_len)
        .flat_map(|q| {
            (0..k_len).map(move |k| {
                if is_visible(q, k, q_len, k_len) {
                    0f32
                } else {
                    f32::NEG_INFINITY
                }
            })
        })
        .collect::<Vec<_>>();
    Tensor::from_vec(data, (q_len, k_len), device)
}
