//! Shared intro/outro detection and trimming for batches of audio files.
//!
//! Albums ripped from physical media often carry the same branded
//! jingle at the start or end of every track. This crate locates that
//! shared segment by comparing spectral fingerprints of the files'
//! boundary regions, recommends how many seconds to remove, and
//! performs source-preserving trims to new WAV files.

pub mod analysis;
pub mod audio;
pub mod error;

pub use analysis::{
    analyze_files, per_second_common_prefix, per_window_common_prefix, AnalysisConfig, MatchResult,
    Side,
};
pub use audio::{trim, trim_batch, TrimOutcome, TrimSpec};
pub use error::{AudioError, Result};
