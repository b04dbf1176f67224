//! Error types emitted by attention kernels.

use thiserror::Error;

/// Attention-specific error category.
#[derive(Debug, Error)]
pub enum AttentionError {
    /// The supplied tensor shapes do not align with the kernel contract.
    #[error("invalid tensor shape: {context}")]
    InvalidShape { context: String },
    /// The kernel does not support the requested data type.
    #[error("unsupported dtype {requested}")]
    UnsupportedDType { requested: String },
    /// A kernel option the kernel understands carried an unusable value.
    #[error("invalid kernel option `{key}`: {reason}")]
    InvalidOption { key: String, reason: String },
    /// Failure propagated from the tensor backend (including allocation failures).
    #[error("attention backend failure: {0}")]
    Backend(#[from] candle_core::Error),
}
