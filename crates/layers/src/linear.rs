//! Linear projections backed by trainable [`Var`] parameters.
//!
//! Linear layers accept inputs shaped `(..., in_dim)` and return
//! `(..., out_dim)`; leading axes are flattened for the matmul and restored
//! afterwards. Weights are stored `(out_dim, in_dim)` like the usual
//! `x @ W^T` convention. Activations and weights are cast to
//! [`PrecisionPolicy::compute`] for the matmul and the result is returned in
//! the storage dtype.
//!
//! Every projection in the stack is bias-free. A [`Var`] clone aliases the
//! same storage, so [`Linear::from_var`] can wrap a variable owned elsewhere
//! and observe every update made through it.

use candle_core::{DType, Device, Result, Tensor, Var};

use crate::{checks, dtypes::PrecisionPolicy};

/// Configuration shared by dense projection layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    /// Incoming feature dimension.
    pub input_dim: usize,
    /// Outgoing feature dimension.
    pub output_dim: usize,
}

impl LinearConfig {
    pub fn new(input_dim: usize, output_dim: usize) -> Self {
        Self {
            input_dim,
            output_dim,
        }
    }
}

/// Shared interface for projections.
pub trait LinearLayer: Send + Sync {
    /// Applies the linear projection, promoting to the compute dtype when needed.
    fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor>;
}

/// Supported weight initialisation policies.
#[derive(Debug, Clone, PartialEq)]
pub enum LinearInit {
    /// `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`, the conventional framework default
    /// (Kaiming uniform with `a = sqrt(5)`).
    FanInUniform,
    /// Zero-mean normal with a fixed standard deviation.
    Normal { std: f64 },
}

impl Default for LinearInit {
    fn default() -> Self {
        Self::FanInUniform
    }
}

impl LinearInit {
    /// Picks [`LinearInit::Normal`] when a standard deviation is configured.
    pub fn from_std(std: Option<f64>) -> Self {
        match std {
            Some(std) => Self::Normal { std },
            None => Self::FanInUniform,
        }
    }

    fn sample(&self, shape: (usize, usize), device: &Device, dtype: DType) -> Result<Tensor> {
        let (_, in_dim) = shape;
        let weight = match self {
            LinearInit::FanInUniform => {
                let bound = 1.0 / (in_dim as f64).max(1.0).sqrt();
                Tensor::rand(-bound as f32, bound as f32, shape, device)?
            }
            LinearInit::Normal { std } => Tensor::randn(0f32, *std as f32, shape, device)?,
        };
        weight.to_dtype(dtype)
    }
}

/// Dense bias-free projection with a mixed-precision aware forward pass.
#[derive(Debug, Clone)]
pub struct Linear {
    config: LinearConfig,
    weight: Var,
}

impl Linear {
    /// Constructs a linear layer from a pre-existing weight.
    pub fn new(config: LinearConfig, weight: Tensor) -> Result<Self> {
        Self::validate_weight(&config, &weight)?;
        Ok(Self {
            config,
            weight: Var::from_tensor(&weight)?,
        })
    }

    /// Builds a linear layer with randomly initialised weights following `init`.
    pub fn with_init(
        config: LinearConfig,
        init: &LinearInit,
        device: &Device,
        dtype: DType,
    ) -> Result<Self> {
        let weight = init.sample((config.output_dim, config.input_dim), device, dtype)?;
        Self::new(config, weight)
    }

    /// Wraps an existing `(output_dim, input_dim)` variable, sharing its storage.
    pub fn from_var(weight: Var) -> Result<Self> {
        let (output_dim, input_dim) = weight.dims2()?;
        let config = LinearConfig::new(input_dim, output_dim);
        Self::validate_weight(&config, weight.as_tensor())?;
        Ok(Self { config, weight })
    }

    /// Handle to the weight variable; clones alias the same storage.
    pub fn weight(&self) -> &Var {
        &self.weight
    }

    /// Trainable parameters under `scope` (e.g. `"layers.0.attn.to_q"`).
    pub fn named_parameters(&self, scope: &str) -> Vec<(String, Var)> {
        vec![(format!("{scope}.weight"), self.weight.clone())]
    }

    fn validate_weight(config: &LinearConfig, weight: &Tensor) -> Result<()> {
        checks::expect_rank("linear.weight", weight, 2)?;
        checks::expect_shape(
            "linear.weight",
            weight,
            &[config.output_dim, config.input_dim],
        )?;
        checks::expect_dtype_in("linear.weight", weight, &checks::PARAMETER_DTYPES)
    }
}

impl LinearLayer for Linear {
    fn forward(&self, hidden: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        checks::expect_last_dim("linear.input", hidden, self.config.input_dim)?;
        let dims = hidden.dims();
        let rows = dims[..dims.len() - 1].iter().product::<usize>();
        let mut out_dims = dims[..dims.len() - 1].to_vec();
        out_dims.push(self.config.output_dim);

        let input = policy.cast_for_matmul(hidden)?;
        let weight = policy.cast_for_matmul(&self.weight)?;
        let flat = input.reshape((rows, self.config.input_dim))?;
        let output = flat.matmul(&weight.t()?)?;
        policy.cast_to_storage(&output.reshape(out_dims)?)
    }
}
