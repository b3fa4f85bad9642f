pub mod features;
pub mod matcher;
pub mod mel;

pub use features::{extract, extract_sequence, FeatureExtractor, FeatureSequence, MfccExtractor, WindowFeature};
pub use matcher::{
    analyze_files, per_second_common_prefix, per_window_common_prefix, FileScore, MatchResult,
    PrefixReport, SimilarityMatrix, SkipReason, SkippedFile,
};

use serde::{Deserialize, Serialize};

/// Which boundary of the file is being analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The first `seconds` of each file
    Intro,
    /// The last `seconds` of each file
    Outro,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Intro => write!(f, "intro"),
            Side::Outro => write!(f, "outro"),
        }
    }
}

/// Tunables for one analysis run.
///
/// Every call takes its own config; there are no module-level defaults
/// that concurrent analyses could trample. The `Default` values are the
/// documented starting points, all overridable per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Rate all files are resampled to before feature extraction.
    /// Comparisons are only meaningful when every file uses the same rate.
    pub sample_rate: u32,

    /// FFT size for the short-time spectrum (windows are zero-padded up
    /// to this length)
    pub fft_size: usize,

    /// Number of triangular mel filters
    pub n_mels: usize,

    /// Number of cepstral coefficients kept per window
    pub n_mfcc: usize,

    /// Length of the boundary region to analyze, in seconds
    pub seconds: f64,

    /// Feature window length in milliseconds
    pub window_ms: f64,

    /// Step between window starts in milliseconds; must not exceed
    /// `window_ms`
    pub step_ms: f64,

    /// Per-window similarity threshold in [0, 1]
    pub similarity_threshold: f32,

    /// Fraction of files that must share a duration for it to be
    /// recommended, in [0, 1]
    pub min_files_fraction: f64,

    /// Minimum window RMS below which a pair of windows is treated as
    /// non-matching. Two near-silent windows would otherwise score as
    /// highly similar and inflate the detected segment. Set to 0.0 to
    /// disable the gate.
    pub min_window_rms: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            fft_size: 2048,
            n_mels: 40,
            n_mfcc: 13,
            seconds: 10.0,
            window_ms: 250.0,
            step_ms: 250.0,
            similarity_threshold: 0.75,
            min_files_fraction: 0.6,
            min_window_rms: 1e-4,
        }
    }
}

impl AnalysisConfig {
    pub(crate) fn step_seconds(&self) -> f64 {
        self.step_ms / 1000.0
    }

    pub(crate) fn window_seconds(&self) -> f64 {
        self.window_ms / 1000.0
    }
}
