use std::path::{Path, PathBuf};

use attention::KernelOptions;
use candle_core::{DType, Device, Error, Result};
use layers::{activations::ActivationKind, norm::NormKind};
use serde::{Deserialize, Serialize};

/// Failures while loading a [`ModelConfig`] from disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config extension for {0} (expected .json or .toml)")]
    UnsupportedFormat(PathBuf),
    #[error("config rejected: {0}")]
    Invalid(#[from] Error),
}

/// Construction-time hyperparameters for the transformer stack and the
/// language-model wrapper around it.
///
/// `dim` need not equal `heads * dim_head`; attention projects to
/// [`ModelConfig::inner_dim`] and back to `dim`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub dim: usize,
    pub depth: usize,
    #[serde(default = "default_dim_head")]
    pub dim_head: usize,
    #[serde(default = "default_heads")]
    pub heads: usize,
    /// Multiplier on cosine-similarity logits.
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_ff_mult")]
    pub ff_mult: usize,
    /// Gate non-linearity of the feed-forward block.
    #[serde(default)]
    pub ff_activation: ActivationKind,
    #[serde(default)]
    pub dropout: f32,
    #[serde(default)]
    pub dropout_seed: u64,
    /// Vocabulary size; only the language model reads it.
    #[serde(default)]
    pub num_tokens: usize,
    #[serde(default)]
    pub max_seq_len: usize,
    /// Multiplier on the embedding gradient that reaches the token table.
    /// Usually in `[0, 1]`; larger values amplify it.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_norm_kind")]
    pub norm_kind: NormKind,
    #[serde(default = "default_norm_eps")]
    pub norm_eps: f64,
    /// Standard deviation for normal projection init; fan-in uniform when unset.
    #[serde(default)]
    pub init_std: Option<f64>,
    /// Forwarded untouched to the attention kernel.
    #[serde(default)]
    pub attention_options: KernelOptions,
    #[serde(skip, default = "default_dtype")]
    pub dtype: DType,
    #[serde(skip, default = "default_device")]
    pub device: Device,
}

fn default_dim_head() -> usize {
    64
}

fn default_heads() -> usize {
    8
}

fn default_scale() -> f64 {
    attention::core::DEFAULT_SCALE
}

fn default_ff_mult() -> usize {
    4
}

fn default_alpha() -> f64 {
    0.1
}

fn default_norm_kind() -> NormKind {
    NormKind::RmsNorm
}

fn default_norm_eps() -> f64 {
    NormKind::RmsNorm.default_epsilon()
}

fn default_dtype() -> DType {
    DType::F32
}

fn default_device() -> Device {
    Device::Cpu
}

impl ModelConfig {
    /// A stack of `depth` layers of width `dim` with every other field defaulted.
    pub fn new(dim: usize, depth: usize) -> Self {
        Self {
            dim,
            depth,
            dim_head: default_dim_head(),
            heads: default_heads(),
            scale: default_scale(),
            ff_mult: default_ff_mult(),
            ff_activation: ActivationKind::default(),
            dropout: 0.0,
            dropout_seed: 0,
            num_tokens: 0,
            max_seq_len: 0,
            alpha: default_alpha(),
            norm_kind: default_norm_kind(),
            norm_eps: default_norm_eps(),
            init_std: None,
            attention_options: KernelOptions::default(),
            dtype: default_dtype(),
            device: default_device(),
        }
    }

    /// Same as [`ModelConfig::new`] with the vocabulary and context length set.
    pub fn language_model(num_tokens: usize, max_seq_len: usize, dim: usize, depth: usize) -> Self {
        Self {
            num_tokens,
            max_seq_len,
            ..Self::new(dim, depth)
        }
    }

    /// Width of the concatenated attention heads.
    pub fn inner_dim(&self) -> usize {
        self.heads * self.dim_head
    }

    /// Checks the fields the transformer stack depends on.
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(Error::Msg("dim must be greater than zero".into()));
        }
        if self.depth == 0 {
            return Err(Error::Msg("depth must be greater than zero".into()));
        }
        if self.heads == 0 {
            return Err(Error::Msg("heads must be greater than zero".into()));
        }
        if self.dim_head == 0 {
            return Err(Error::Msg("dim_head must be greater than zero".into()));
        }
        if self.ff_mult == 0 {
            return Err(Error::Msg("ff_mult must be greater than zero".into()));
        }
        if !(self.scale > 0.0) {
            return Err(Error::Msg(format!("scale must be positive, got {}", self.scale)));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Msg("dropout must be in [0, 1)".into()));
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(Error::Msg(format!(
                "alpha must be finite and non-negative, got {}",
                self.alpha
            )));
        }
        if !(self.norm_eps > 0.0) {
            return Err(Error::Msg("norm_eps must be positive".into()));
        }
        if let Some(std) = self.init_std {
            if !(std > 0.0) {
                return Err(Error::Msg("init_std must be positive".into()));
            }
        }
        Ok(())
    }

    /// [`ModelConfig::validate`] plus the embedding table sizes.
    pub fn validate_language_model(&self) -> Result<()> {
        self.validate()?;
        if self.num_tokens == 0 {
            return Err(Error::Msg("num_tokens must be greater than zero".into()));
        }
        if self.max_seq_len == 0 {
            return Err(Error::Msg("max_seq_len must be greater than zero".into()));
        }
        Ok(())
    }

    /// Loads a `.json` file, or TOML for `.toml`/`.tml`/no extension, and
    /// validates the stack fields.
    ///
    /// `dtype` and `device` are not serialised; they start as `F32` on CPU.
    pub fn from_path(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&text)?,
            Some("toml") | Some("tml") | None => toml::from_str(&text)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };
        config.validate()?;
        Ok(config)
    }
}
