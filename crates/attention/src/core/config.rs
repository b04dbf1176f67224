//! Per-call configuration handed to attention kernels.
//!
//! [`Config`] carries the causal flag and similarity scale of the kernel
//! contract plus the opaque [`KernelOptions`] map.

use super::options::KernelOptions;

/// Environment variable overriding [`Config::precision`] (`f32` or `inherit`).
pub const PRECISION_ENV: &str = "BAOBAO_ATTENTION_PRECISION";

/// Default similarity scale applied to cosine-similarity logits.
pub const DEFAULT_SCALE: f64 = 8.0;

/// Dtype used while accumulating attention scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccumulationPrecision {
    /// Promote inputs to `f32` before computing scores.
    #[default]
    ForceF32,
    /// Compute in the dtype of the incoming tensors.
    Inherit,
}

/// Configuration driving a single attention invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Restrict query `i` to keys at positions `<= i`.
    pub causal: bool,
    /// Multiplier applied to the cosine similarity before softmax.
    pub scale: f64,
    pub precision: AccumulationPrecision,
    /// Kernel-specific knobs, passed through unvalidated.
    pub options: KernelOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            causal: true,
            scale: DEFAULT_SCALE,
            precision: AccumulationPrecision::default(),
            options: KernelOptions::default(),
        }
    }
}

impl Config {
    pub fn causal(scale: f64, options: KernelOptions) -> Self {
        Self {
            causal: true,
            scale,
            options,
            ..Self::default()
        }
    }

    /// Applies [`PRECISION_ENV`] when set to a recognised value.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(PRECISION_ENV) {
            match value.trim().to_ascii_lowercase().as_str() {
                "f32" | "force_f32" => self.precision = AccumulationPrecision::ForceF32,
                "inherit" => self.precision = AccumulationPrecision::Inherit,
                other => log::warn!("ignoring unrecognised {PRECISION_ENV}={other}"),
            }
        }
    }
}
