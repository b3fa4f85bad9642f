use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::analysis::mel::MelFilterBank;
use crate::analysis::{AnalysisConfig, Side};
use crate::audio::decoder::decode_mono;
use crate::audio::types::AudioClipRef;
use crate::error::{AudioError, Result};

/// Capability interface for the per-window feature computation.
///
/// The matcher only depends on this trait, so alternate backends
/// (different coefficient counts, spectral-flux features) can be
/// swapped in without touching it.
pub trait FeatureExtractor: Send + Sync {
    /// Length of every vector produced by [`FeatureExtractor::compute`]
    fn dimension(&self) -> usize;

    /// Reduce one window of mono samples to a fixed-length vector
    fn compute(&self, window: &[f32]) -> Vec<f32>;
}

/// MFCC backend: Hann window, zero-padded FFT, mel filterbank,
/// log energies, DCT-II, first `n_mfcc` coefficients.
pub struct MfccExtractor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    filterbank: MelFilterBank,
    dct_basis: Vec<Vec<f32>>,
    n_mfcc: usize,
}

impl MfccExtractor {
    pub fn new(sample_rate: u32, fft_size: usize, n_mels: usize, n_mfcc: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let filterbank = MelFilterBank::new(n_mels, sample_rate, fft_size);

        // DCT-II basis, one row per kept coefficient
        let mut dct_basis = vec![vec![0.0_f32; n_mels]; n_mfcc];
        for (k, row) in dct_basis.iter_mut().enumerate() {
            for (n, b) in row.iter_mut().enumerate() {
                *b = (std::f32::consts::PI * k as f32 * (n as f32 + 0.5) / n_mels as f32).cos();
            }
        }

        Self {
            fft,
            fft_size,
            filterbank,
            dct_basis,
            n_mfcc,
        }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self::new(cfg.sample_rate, cfg.fft_size, cfg.n_mels, cfg.n_mfcc)
    }
}

impl FeatureExtractor for MfccExtractor {
    fn dimension(&self) -> usize {
        self.n_mfcc
    }

    fn compute(&self, window: &[f32]) -> Vec<f32> {
        let n = window.len().min(self.fft_size);

        let mut buf = vec![Complex::new(0.0_f32, 0.0); self.fft_size];
        if n > 1 {
            let denom = (n - 1) as f32;
            for (i, slot) in buf.iter_mut().take(n).enumerate() {
                let hann =
                    0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos());
                slot.re = window[i] * hann;
            }
        } else if n == 1 {
            buf[0].re = window[0];
        }

        self.fft.process(&mut buf);

        let n_bins = self.fft_size / 2 + 1;
        let power: Vec<f32> = buf[..n_bins].iter().map(|c| c.norm_sqr()).collect();

        let log_energies: Vec<f32> = self
            .filterbank
            .apply(&power)
            .iter()
            .map(|&e| (e + 1e-10).ln())
            .collect();

        self.dct_basis
            .iter()
            .map(|row| {
                row.iter()
                    .zip(log_energies.iter())
                    .map(|(&b, &e)| b * e)
                    .sum()
            })
            .collect()
    }
}

/// One short time window of a boundary region, reduced to a feature vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowFeature {
    /// Position within the sequence, chronological within the region
    pub index: usize,

    /// Start offset of the window in seconds, measured from the
    /// analyzed boundary: from the start of the file for intros, from
    /// the end of the file for outros
    pub offset_seconds: f64,

    /// Window RMS; feeds the matcher's silence gate
    pub energy: f32,

    /// The feature vector (MFCC coefficients)
    pub vector: Vec<f32>,
}

/// Ordered windows for one file's boundary region.
///
/// Never mutated after creation. Length is deterministic:
/// `floor(region_seconds / step_seconds)`, where the region is the
/// requested `seconds` clamped to the clip duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSequence {
    pub path: PathBuf,
    pub side: Side,
    pub window_seconds: f64,
    pub step_seconds: f64,
    pub windows: Vec<WindowFeature>,
}

impl FeatureSequence {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Seconds of audio represented by the sequence
    pub fn seconds_covered(&self) -> f64 {
        self.len() as f64 * self.step_seconds
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|x| x * x).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Compute the windowed feature vectors for one boundary region of an
/// in-memory mono signal.
///
/// Windows are assembled chronologically for both sides: for outros
/// the earliest window within the region comes first (NOT reversed),
/// so window indices align directly across files once sequences are
/// anchored to the boundary.
pub fn extract_sequence(
    samples: &[f32],
    sample_rate: u32,
    side: Side,
    seconds: f64,
    window_ms: f64,
    step_ms: f64,
    extractor: &dyn FeatureExtractor,
) -> Result<Vec<WindowFeature>> {
    if seconds <= 0.0 {
        return Err(AudioError::InvalidInput(format!(
            "seconds must be positive (got {})",
            seconds
        )));
    }
    if window_ms <= 0.0 || step_ms <= 0.0 {
        return Err(AudioError::InvalidInput(format!(
            "window_ms and step_ms must be positive (got {} / {})",
            window_ms, step_ms
        )));
    }
    if step_ms > window_ms {
        return Err(AudioError::InvalidInput(format!(
            "step_ms ({}) must not exceed window_ms ({})",
            step_ms, window_ms
        )));
    }

    let window_len = ((window_ms / 1000.0) * sample_rate as f64).round() as usize;
    let step_len = ((step_ms / 1000.0) * sample_rate as f64).round() as usize;
    if window_len == 0 || step_len == 0 {
        return Err(AudioError::InvalidInput(
            "window shorter than one sample at the analysis rate".to_string(),
        ));
    }

    // Clamp the region to the clip: a short file produces a shorter
    // sequence, not an error
    let region_len = ((seconds * sample_rate as f64).round() as usize).min(samples.len());
    let region = match side {
        Side::Intro => &samples[..region_len],
        Side::Outro => &samples[samples.len() - region_len..],
    };

    let n_windows = region_len / step_len;
    let mut windows = Vec::with_capacity(n_windows);
    for w in 0..n_windows {
        let start = w * step_len;
        let end = (start + window_len).min(region_len);
        let slice = &region[start..end];

        let offset_seconds = match side {
            Side::Intro => start as f64 / sample_rate as f64,
            // Distance between the window start and the end of the file
            Side::Outro => (region_len - start) as f64 / sample_rate as f64,
        };

        windows.push(WindowFeature {
            index: w,
            offset_seconds,
            energy: rms(slice),
            vector: extractor.compute(slice),
        });
    }

    Ok(windows)
}

/// Extract the boundary fingerprint of a single file.
///
/// Decodes to mono at the configured analysis rate, then reduces the
/// boundary region to per-window MFCC vectors. Re-running with the
/// same file and config yields bit-identical features.
pub fn extract(clip: &AudioClipRef, side: Side, cfg: &AnalysisConfig) -> Result<FeatureSequence> {
    let extractor = MfccExtractor::from_config(cfg);
    extract_path(&clip.path, side, cfg, &extractor)
}

/// Extraction entry point used by the matcher so one extractor (FFT
/// plan, filterbank) is shared across the whole batch.
pub(crate) fn extract_path(
    path: &Path,
    side: Side,
    cfg: &AnalysisConfig,
    extractor: &dyn FeatureExtractor,
) -> Result<FeatureSequence> {
    let (mono, rate) = decode_mono(path, cfg.sample_rate)?;
    let windows = extract_sequence(
        &mono,
        rate,
        side,
        cfg.seconds,
        cfg.window_ms,
        cfg.step_ms,
        extractor,
    )?;
    Ok(FeatureSequence {
        path: path.to_path_buf(),
        side,
        window_seconds: cfg.window_seconds(),
        step_seconds: cfg.step_seconds(),
        windows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 22050;

    fn tone(freq: f32, seconds: f64) -> Vec<f32> {
        let n = (seconds * RATE as f64) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / RATE as f32).sin() * 0.5)
            .collect()
    }

    fn extractor() -> MfccExtractor {
        MfccExtractor::new(RATE, 2048, 40, 13)
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let samples = tone(440.0, 2.0);
        let ex = extractor();
        let a = extract_sequence(&samples, RATE, Side::Intro, 2.0, 250.0, 250.0, &ex).unwrap();
        let b = extract_sequence(&samples, RATE, Side::Intro, 2.0, 250.0, 250.0, &ex).unwrap();

        assert_eq!(a.len(), b.len());
        for (wa, wb) in a.iter().zip(b.iter()) {
            assert_eq!(wa.vector, wb.vector);
            assert_eq!(wa.energy, wb.energy);
        }
    }

    #[test]
    fn test_window_count_is_floor_of_region_over_step() {
        let samples = tone(440.0, 1.0);
        let ex = extractor();

        // Region clamped to the 1s clip; 1.0 / 0.25 = 4 windows
        let windows =
            extract_sequence(&samples, RATE, Side::Intro, 10.0, 250.0, 250.0, &ex).unwrap();
        assert_eq!(windows.len(), 4);

        // Non-integer ratio floors: 1.0 / 0.3 -> 3 windows
        let windows =
            extract_sequence(&samples, RATE, Side::Intro, 10.0, 300.0, 300.0, &ex).unwrap();
        assert_eq!(windows.len(), 3);
    }

    #[test]
    fn test_silent_audio_still_produces_vectors() {
        let samples = vec![0.0_f32; RATE as usize];
        let ex = extractor();
        let windows =
            extract_sequence(&samples, RATE, Side::Intro, 1.0, 250.0, 250.0, &ex).unwrap();

        assert_eq!(windows.len(), 4);
        for w in &windows {
            assert_eq!(w.energy, 0.0);
            assert_eq!(w.vector.len(), 13);
            assert!(w.vector.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_intro_offsets_increase_outro_offsets_decrease() {
        let samples = tone(440.0, 4.0);
        let ex = extractor();

        let intro = extract_sequence(&samples, RATE, Side::Intro, 2.0, 500.0, 500.0, &ex).unwrap();
        for pair in intro.windows(2) {
            assert!(pair[0].offset_seconds < pair[1].offset_seconds);
        }
        assert_eq!(intro[0].offset_seconds, 0.0);

        let outro = extract_sequence(&samples, RATE, Side::Outro, 2.0, 500.0, 500.0, &ex).unwrap();
        for pair in outro.windows(2) {
            assert!(pair[0].offset_seconds > pair[1].offset_seconds);
        }
        // Earliest window within the region starts 2s before the end
        assert!((outro[0].offset_seconds - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_outro_windows_are_chronological() {
        // Tone for 3s then silence for 1s; the region covers the last 2s
        let mut samples = tone(440.0, 3.0);
        samples.extend(vec![0.0_f32; RATE as usize]);
        let ex = extractor();

        let outro = extract_sequence(&samples, RATE, Side::Outro, 2.0, 500.0, 500.0, &ex).unwrap();
        assert_eq!(outro.len(), 4);
        // First two windows (earlier in time) carry the tone, last two
        // the trailing silence
        assert!(outro[0].energy > 0.1);
        assert!(outro[1].energy > 0.1);
        assert!(outro[3].energy < 1e-6);
    }

    #[test]
    fn test_mfcc_separates_different_tones() {
        let ex = extractor();
        let low = ex.compute(&tone(440.0, 0.25));
        let low_again = ex.compute(&tone(440.0, 0.25));
        let high = ex.compute(&tone(3520.0, 0.25));

        assert_eq!(low, low_again);
        assert!(low
            .iter()
            .zip(high.iter())
            .any(|(a, b)| (a - b).abs() > 1.0));
    }

    #[test]
    fn test_probe_and_extract_from_file() {
        use hound::{SampleFormat, WavSpec, WavWriter};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in tone(440.0, 2.0) {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let clip = AudioClipRef::probe(&path).unwrap();
        assert_eq!(clip.sample_rate, RATE);
        assert_eq!(clip.channels, 1);
        assert!((clip.duration_seconds - 2.0).abs() < 0.01);

        let cfg = AnalysisConfig {
            seconds: 1.0,
            ..AnalysisConfig::default()
        };
        let seq = extract(&clip, Side::Intro, &cfg).unwrap();
        assert_eq!(seq.path, clip.path);
        assert_eq!(seq.len(), 4);
        assert!(seq.windows.iter().all(|w| w.vector.len() == 13));
    }

    #[test]
    fn test_invalid_window_params_rejected() {
        let samples = tone(440.0, 1.0);
        let ex = extractor();

        for (seconds, window_ms, step_ms) in [
            (0.0, 250.0, 250.0),
            (1.0, 0.0, 250.0),
            (1.0, 250.0, 0.0),
            (1.0, 250.0, 500.0), // step > window
        ] {
            let err = extract_sequence(
                &samples, RATE, Side::Intro, seconds, window_ms, step_ms, &ex,
            )
            .unwrap_err();
            assert!(matches!(err, AudioError::InvalidInput(_)));
        }
    }
}
