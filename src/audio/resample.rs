use rubato::{FftFixedIn, Resampler};

use crate::error::{AudioError, Result};

/// Input chunk size for the FFT resampler. One chunk per `process` call;
/// the trailing partial chunk goes through `process_partial`.
const CHUNK_SIZE: usize = 1024;

/// Resample a mono signal from `from_rate` to `to_rate`.
///
/// Analysis compares MFCC windows across files sample-for-sample, so
/// every file is brought to the same rate before feature extraction.
/// The conversion is deterministic: the same input always produces the
/// same output samples.
pub fn resample_mono(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(AudioError::InvalidInput(format!(
            "sample rates must be non-zero (got {} -> {})",
            from_rate, to_rate
        )));
    }
    if from_rate == to_rate {
        return Ok(input.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 2, 1)
            .map_err(|e| AudioError::Resample(e.to_string()))?;

    let ratio = to_rate as f64 / from_rate as f64;
    let mut output: Vec<f32> = Vec::with_capacity((input.len() as f64 * ratio) as usize + CHUNK_SIZE);

    let mut pos = 0;
    while pos < input.len() {
        let need = resampler.input_frames_next();
        let remaining = input.len() - pos;
        if remaining >= need {
            let chunk = &input[pos..pos + need];
            let frames = resampler
                .process(&[chunk], None)
                .map_err(|e| AudioError::Resample(e.to_string()))?;
            output.extend_from_slice(&frames[0]);
            pos += need;
        } else {
            let chunk = &input[pos..];
            let frames = resampler
                .process_partial(Some(&[chunk]), None)
                .map_err(|e| AudioError::Resample(e.to_string()))?;
            output.extend_from_slice(&frames[0]);
            pos = input.len();
        }
    }

    // Flush whatever is still buffered inside the resampler
    let tail = resampler
        .process_partial::<&[f32]>(None, None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;
    output.extend_from_slice(&tail[0]);

    Ok(output)
}
