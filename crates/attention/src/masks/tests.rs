use super::*;
use candle_core::{Device, Result};

#[test]
fn causal_mask_blocks_future_keys() -> Result<()> {
    let mask = build_causal_mask(&Device::Cpu, 3, 3)?;
    assert_eq!(mask.dims(), &[3, 3]);
    let rows = mask.to_vec2::<f32>()?;
    let ninf = f32::NEG_INFINITY;
    assert_eq!(rows[0], vec![0.0, ninf, ninf]);
    assert_eq!(rows[1], vec![0.0, 0.0, ninf]);
    assert_eq!(rows[2], vec![0.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn causal_mask_respects_prefix_offset() -> Result<()> {
    let mask = build_causal_mask(&Device::Cpu, 3, 5)?;
    let rows = mask.to_vec2::<f32>()?;

    // Earliest query sees the two-key prefix plus its own position.
    assert_eq!(rows[0][2], 0.0);
    assert_eq!(rows[0][3], f32::NEG_INFINITY);
    // Last query sees everything.
    assert!(rows[2].iter().all(|v| *v == 0.0));
    Ok(())
}

#[test]
fn causal_mask_handles_single_token_cases() -> Result<()> {
    let device = Device::Cpu;
    assert_eq!(build_causal_mask(&device, 1, 1)?.to_vec2::<f32>()?, vec![vec![0.0]]);
    assert_eq!(
        build_causal_mask(&device, 1, 4)?.to_vec2::<f32>()?,
        vec![vec![0.0; 4]]
    );
    assert!(!is_visible(0, 1, 4, 2));
    assert!(is_visible(3, 1, 4, 2));
    Ok(())
}
