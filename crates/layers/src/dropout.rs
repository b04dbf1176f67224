//! Seeded dropout with an explicit train/eval switch.
//!
//! Masks are drawn from a deterministic 64-bit LCG so a fixed seed reproduces
//! the same sequence of masks. Seeds pass through SplitMix64 first, so
//! neighbouring seeds (one per layer) start unrelated streams. In evaluation mode, or with probability zero,
//! dropout is the identity.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use candle_core::{Error, Result, Tensor};

use crate::dtypes::PrecisionPolicy;

/// Dropout probability and RNG state.
#[derive(Debug)]
pub enum DropoutMode {
    /// Dropout never fires (probability zero).
    Disabled,
    /// Dropout zeroes activations with `probability` during training.
    Enabled { probability: f32, rng: Mutex<Lcg64> },
}

impl DropoutMode {
    /// Builds a mode from a probability in `[0, 1)`; `0.0` disables dropout.
    pub fn from_probability(probability: f32, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&probability) {
            return Err(Error::Msg(format!(
                "dropout probability must be in [0, 1), got {probability}"
            )));
        }
        if probability == 0.0 {
            Ok(DropoutMode::Disabled)
        } else {
            Ok(DropoutMode::Enabled {
                probability,
                rng: Mutex::new(Lcg64::new(seed)),
            })
        }
    }
}

/// Inverted dropout: survivors are scaled by `1 / (1 - p)`.
pub struct Dropout {
    mode: DropoutMode,
    training: AtomicBool,
}

impl fmt::Debug for Dropout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dropout")
            .field("mode", &self.mode)
            .field("training", &self.is_training())
            .finish()
    }
}

impl Dropout {
    /// Creates dropout in training mode.
    pub fn new(probability: f32, seed: u64) -> Result<Self> {
        Ok(Self {
            mode: DropoutMode::from_probability(probability, seed)?,
            training: AtomicBool::new(true),
        })
    }

    pub fn probability(&self) -> f32 {
        match &self.mode {
            DropoutMode::Disabled => 0.0,
            DropoutMode::Enabled { probability, .. } => *probability,
        }
    }

    /// Enables or disables dropout based on training mode.
    pub fn set_training(&self, training: bool) {
        self.training.store(training, Ordering::Relaxed);
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Relaxed)
    }

    pub fn forward(&self, tensor: &Tensor, policy: &PrecisionPolicy) -> Result<Tensor> {
        if !self.is_training() {
            return Ok(tensor.clone());
        }
        match &self.mode {
            DropoutMode::Disabled => Ok(tensor.clone()),
            DropoutMode::Enabled { probability, rng } => {
                let keep_prob = 1.0 - probability;
                let total = tensor.elem_count();
                let mask_data = {
                    let mut rng = rng
                        .lock()
                        .map_err(|_| Error::Msg("dropout RNG mutex poisoned".into()))?;
                    (0..total)
                        .map(|_| {
                            if rng.next_f32() < keep_prob {
                                1.0 / keep_prob
                            } else {
                                0.0
                            }
                        })
                        .collect::<Vec<f32>>()
                };
                let compute = policy.cast_for_matmul(tensor)?;
                let mask = Tensor::from_vec(mask_data, tensor.dims(), tensor.device())?
                    .to_dtype(compute.dtype())?;
                policy.cast_to_storage(&compute.mul(&mask)?)
            }
        }
    }
}

/// Simple 64-bit linear congruential generator for deterministic masks.
#[derive(Debug, Clone)]
pub struct Lcg64 {
    state: u64,
}

impl Lcg64 {
    fn new(seed: u64) -> Self {
        Self {
            state: splitmix64(seed),
        }
    }

    fn next_u64(&mut self) -> u64 {
        // Knuth's MMIX multiplier.
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn next_f32(&mut self) -> f32 {
        const SCALE: f64 = 1.0 / ((1u64 << 53) as f64);
        let bits = self.next_u64() >> 11;
        (bits as f64 * SCALE) as f32
    }
}

/// SplitMix64 finaliser.
fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
