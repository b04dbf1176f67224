//! BaoBao: a decoder-only transformer built on candle.
//!
//! The facade re-exports the member crates and provides [`setup_device`]
//! for picking a compute backend.

pub use attention;
pub use embedding;
pub use layers;
pub use model;

pub use model::{BaoBao, ModelConfig, Transformer};

use anyhow::Result;
use candle_core::Device;

/// Set to any value to skip accelerator probing.
pub const FORCE_CPU_ENV: &str = "BAOBAO_FORCE_CPU";

/// Picks Metal (with the `metal` feature) or CUDA when usable, CPU otherwise.
pub fn setup_device() -> Result<Device> {
    if std::env::var_os(FORCE_CPU_ENV).is_some() {
        log::info!("{FORCE_CPU_ENV} set, using CPU backend");
        return Ok(Device::Cpu);
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => match metal_preflight(&device) {
                Ok(()) => {
                    log::info!("Metal device selected: {device:?}");
                    return Ok(device);
                }
                Err(err) => log::warn!("Metal preflight failed ({err}), falling back"),
            },
            Err(err) => log::warn!("Metal unavailable ({err}), falling back"),
        }
    }

    match Device::cuda_if_available(0) {
        Ok(device) if device.is_cuda() => {
            log::info!("CUDA device selected: {device:?}");
            Ok(device)
        }
        Ok(_) => {
            log::warn!("no accelerator available, using CPU backend");
            Ok(Device::Cpu)
        }
        Err(err) => {
            log::warn!("CUDA probe failed ({err}), using CPU backend");
            Ok(Device::Cpu)
        }
    }
}

/// Runs the ops a forward pass needs so a half-working backend is caught early.
#[cfg(feature = "metal")]
fn metal_preflight(device: &Device) -> Result<()> {
    use candle_core::{DType, Tensor};

    let x = Tensor::randn(0f32, 1f32, (2, 4, 8), device)?;
    let _ = x.matmul(&x.transpose(1, 2)?)?;
    let ids = Tensor::arange(0u32, 4, device)?;
    let table = Tensor::randn(0f32, 1f32, (4, 8), device)?;
    let _ = table.index_select(&ids, 0)?.to_dtype(DType::F32)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_cpu_is_honoured() -> Result<()> {
        std::env::set_var(FORCE_CPU_ENV, "1");
        let device = setup_device()?;
        std::env::remove_var(FORCE_CPU_ENV);
        assert!(device.is_cpu());
        Ok(())
    }
}
