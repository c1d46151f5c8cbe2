//! Mono resampling using rubato

use anyhow::{Context, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Resample mono PCM from `input_rate` to `output_rate`
///
/// Sinc interpolation with a Blackman-Harris window, processed as one chunk so arbitrary input
/// lengths work without padding bookkeeping. Returns a copy when the rates already match.
pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }
    if input_rate == 0 || output_rate == 0 {
        anyhow::bail!("Invalid sample rate: {} -> {}", input_rate, output_rate);
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        params,
        input.len(),
        1,
    )
    .context("Failed to create rubato resampler")?;

    let planar_input = vec![input.to_vec()];
    let mut planar_output = resampler
        .process(&planar_input, None)
        .context("Rubato resampling failed")?;

    let output = planar_output.pop().unwrap_or_default();
    debug!(
        input_frames = input.len(),
        output_frames = output.len(),
        input_rate,
        output_rate,
        "Resampled mono audio"
    );
    Ok(output)
}
