use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, Result};

/// Represents decoded audio data in memory as PCM samples
///
/// Samples are stored interleaved: [L, R, L, R, ...] for stereo
/// or [M, M, M, ...] for mono, where each sample is a 32-bit float
/// in the range [-1.0, 1.0]
#[derive(Debug, Clone)]
pub struct AudioData {
    /// PCM audio samples as 32-bit floats, interleaved by channel
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl AudioData {
    /// Total duration of the audio in seconds
    pub fn duration_seconds(&self) -> f64 {
        let total_frames = self.samples.len() as f64 / self.channels as f64;
        total_frames / self.sample_rate as f64
    }

    /// Number of audio frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Downmix interleaved samples to a single mono channel by
    /// averaging across channels
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

/// Metadata about an audio file without loading all samples
///
/// Use this for quick info queries without decoding the entire file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Total duration in seconds (0.0 when the container does not report it)
    pub duration_seconds: f64,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels
    pub channels: u16,

    /// Audio format/codec name (e.g., "MP3", "FLAC", "Vorbis")
    pub format: String,

    /// Bit depth if available (e.g., 16, 24)
    pub bit_depth: Option<u16>,
}

/// Identifies a source audio file for an analysis run
///
/// Immutable once probed; owned by the caller for the duration of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioClipRef {
    /// Path to the source file
    pub path: PathBuf,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Total duration in seconds
    pub duration_seconds: f64,

    /// Number of channels
    pub channels: u16,
}

impl AudioClipRef {
    /// Probe a file's header and build a clip reference without decoding
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<Self> {
        let info = crate::audio::decoder::get_audio_info(&path)?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            sample_rate: info.sample_rate,
            duration_seconds: info.duration_seconds,
            channels: info.channels,
        })
    }
}

/// Per-file trim request, consumed exactly once by [`crate::audio::trim::trim`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimSpec {
    /// Source audio file; never mutated or deleted
    pub src_path: PathBuf,

    /// Destination for the trimmed copy (WAV); must differ from the source
    pub dest_path: PathBuf,

    /// Seconds removed from the start of the file
    pub remove_intro_seconds: f64,

    /// Seconds removed from the end of the file
    pub remove_outro_seconds: f64,

    /// Silence buffer retained at each cut edge, in milliseconds
    pub keep_silence_ms: u32,
}

impl TrimSpec {
    pub fn new(src_path: impl AsRef<Path>, dest_path: impl AsRef<Path>) -> Self {
        Self {
            src_path: src_path.as_ref().to_path_buf(),
            dest_path: dest_path.as_ref().to_path_buf(),
            remove_intro_seconds: 0.0,
            remove_outro_seconds: 0.0,
            keep_silence_ms: 0,
        }
    }

    pub fn remove_intro(mut self, seconds: f64) -> Self {
        self.remove_intro_seconds = seconds;
        self
    }

    pub fn remove_outro(mut self, seconds: f64) -> Self {
        self.remove_outro_seconds = seconds;
        self
    }

    pub fn keep_silence_ms(mut self, ms: u32) -> Self {
        self.keep_silence_ms = ms;
        self
    }

    /// Validate the request against the source duration.
    ///
    /// Called before any byte is written so a rejected trim leaves no
    /// destination file behind.
    pub(crate) fn validate(&self, duration_seconds: f64) -> Result<()> {
        if self.remove_intro_seconds < 0.0 || self.remove_outro_seconds < 0.0 {
            return Err(AudioError::InvalidTrim(format!(
                "negative trim amounts (intro {}, outro {})",
                self.remove_intro_seconds, self.remove_outro_seconds
            )));
        }
        if self.dest_path == self.src_path {
            return Err(AudioError::InvalidTrim(format!(
                "destination must differ from source: '{}'",
                self.src_path.display()
            )));
        }
        if self.remove_intro_seconds + self.remove_outro_seconds >= duration_seconds {
            return Err(AudioError::InvalidTrim(format!(
                "removing {:.3}s + {:.3}s from a {:.3}s file would leave nothing",
                self.remove_intro_seconds, self.remove_outro_seconds, duration_seconds
            )));
        }
        Ok(())
    }

    /// Absolute cut window in seconds, after applying the silence buffer
    pub(crate) fn cut_window(&self, duration_seconds: f64) -> (f64, f64) {
        let keep = self.keep_silence_ms as f64 / 1000.0;
        let start = (self.remove_intro_seconds - keep).max(0.0);
        let end = (duration_seconds - self.remove_outro_seconds + keep).min(duration_seconds);
        (start, end)
    }
}

/// Result of a completed trim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimOutcome {
    pub src_path: PathBuf,
    pub dest_path: PathBuf,

    /// Effective cut window in the source, in seconds
    pub start_seconds: f64,
    pub end_seconds: f64,

    /// Duration of the written output, in seconds
    pub output_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_and_frames() {
        let stereo = AudioData {
            samples: vec![0.0; 88200],
            sample_rate: 44100,
            channels: 2,
        };
        assert_eq!(stereo.duration_seconds(), 1.0);
        assert_eq!(stereo.frame_count(), 44100);
    }

    #[test]
    fn test_to_mono_averages_channels() {
        let audio = AudioData {
            samples: vec![1.0, 0.0, 0.5, 0.5],
            sample_rate: 44100,
            channels: 2,
        };
        assert_eq!(audio.to_mono(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_trim_spec_rejects_oversized_removal() {
        let spec = TrimSpec::new("a.wav", "b.wav")
            .remove_intro(6.0)
            .remove_outro(5.0);
        assert!(matches!(
            spec.validate(10.0),
            Err(crate::error::AudioError::InvalidTrim(_))
        ));
    }

    #[test]
    fn test_trim_spec_rejects_same_path() {
        let spec = TrimSpec::new("a.wav", "a.wav").remove_intro(1.0);
        assert!(matches!(
            spec.validate(10.0),
            Err(crate::error::AudioError::InvalidTrim(_))
        ));
    }

    #[test]
    fn test_cut_window_keeps_silence_buffer() {
        let spec = TrimSpec::new("a.wav", "b.wav")
            .remove_intro(5.0)
            .keep_silence_ms(200);
        let (start, end) = spec.cut_window(30.0);
        assert!((start - 4.8).abs() < 1e-9);
        assert!((end - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_cut_window_clamps_at_boundaries() {
        let spec = TrimSpec::new("a.wav", "b.wav").keep_silence_ms(500);
        let (start, end) = spec.cut_window(10.0);
        assert_eq!(start, 0.0);
        assert_eq!(end, 10.0);
    }
}
