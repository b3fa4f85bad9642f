use std::collections::BTreeMap;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::features::{extract_path, FeatureSequence, MfccExtractor, WindowFeature};
use crate::analysis::{AnalysisConfig, Side};
use crate::error::{AudioError, Result};

/// Why a file was excluded from a batch analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The file could not be read or decoded
    Decode,
    /// The container/extension is not recognized
    UnsupportedFormat,
    /// The file could not be opened
    Io,
    /// The file is shorter than a single analysis window
    TooShort,
}

/// A file excluded from a batch analysis, with the error that caused it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub detail: String,
}

impl SkippedFile {
    fn from_error(path: PathBuf, error: &AudioError) -> Self {
        let reason = match error {
            AudioError::UnsupportedFormat(_) => SkipReason::UnsupportedFormat,
            AudioError::FileOpen { .. } | AudioError::Io(_) => SkipReason::Io,
            _ => SkipReason::Decode,
        };
        Self {
            path,
            reason,
            detail: error.to_string(),
        }
    }
}

/// Per-file outcome of a batch analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileScore {
    pub path: PathBuf,

    /// Fraction of the analyzed window that matches the template,
    /// in [0, 1]: matched_seconds / analyzed_seconds
    pub score: f64,

    /// Contiguous boundary-anchored run that stayed at or above the
    /// similarity threshold, in seconds
    pub matched_seconds: f64,

    /// Mean pairwise similarity of this file to every other included file
    pub mean_similarity: f32,
}

/// Result of one [`analyze_files`] run. Immutable; consumed by the
/// caller to decide which files to trim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// The real file chosen as most representative of the group
    pub template: PathBuf,

    /// One score per included file, in input order
    pub matches: Vec<FileScore>,

    /// Largest duration shared by at least `min_files_fraction` of the
    /// included files; 0.0 when no common segment was found
    pub recommended_seconds: f64,

    /// False when no duration met the fraction requirement. Absence of
    /// a shared intro/outro is a valid outcome, not an error.
    pub common_segment_found: bool,

    pub side: Side,

    /// Seconds actually compared after truncating to the shortest
    /// included sequence
    pub analyzed_seconds: f64,

    /// Files excluded from scoring, with their errors
    pub skipped: Vec<SkippedFile>,

    /// Echo of the configuration used
    pub config: AnalysisConfig,
}

/// Mean pairwise window similarity for a set of aligned sequences.
/// Derived during template selection and discarded with the run.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f32>,
}

impl SimilarityMatrix {
    fn build(aligned: &[&[WindowFeature]], min_rms: f32) -> Self {
        let n = aligned.len();
        let mut values = vec![1.0_f32; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let mean = mean_window_similarity(aligned[i], aligned[j], min_rms);
                values[i * n + j] = mean;
                values[j * n + i] = mean;
            }
        }
        Self { n, values }
    }

    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.values[i * self.n + j]
    }

    /// Mean similarity of file `i` to every other file
    pub fn mean_to_others(&self, i: usize) -> f32 {
        let sum: f32 = (0..self.n).filter(|&j| j != i).map(|j| self.get(i, j)).sum();
        sum / (self.n - 1).max(1) as f32
    }
}

/// Mean-center and L2-normalize a vector. Returns `None` for
/// zero-variance input (flat or empty vectors carry no shape to compare).
fn centered_unit(v: &[f32]) -> Option<Vec<f32>> {
    if v.is_empty() {
        return None;
    }
    let mean = v.iter().sum::<f32>() / v.len() as f32;
    let centered: Vec<f32> = v.iter().map(|x| x - mean).collect();
    let norm = centered.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < 1e-8 {
        return None;
    }
    Some(centered.iter().map(|x| x / norm).collect())
}

/// Cosine similarity of mean-centered vectors, mapped from [-1, 1]
/// into [0, 1] via (cos + 1) / 2. Degenerate vectors score 0.0.
fn cosine01(a: &[f32], b: &[f32]) -> f32 {
    match (centered_unit(a), centered_unit(b)) {
        (Some(ua), Some(ub)) => {
            let cos: f32 = ua.iter().zip(ub.iter()).map(|(x, y)| x * y).sum();
            ((cos + 1.0) / 2.0).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// Similarity of two aligned windows, with the silence gate applied:
/// two windows both below the minimum RMS score 0.0 rather than the
/// high similarity their near-identical (empty) spectra would produce.
fn window_similarity(a: &WindowFeature, b: &WindowFeature, min_rms: f32) -> f32 {
    if a.energy < min_rms && b.energy < min_rms {
        return 0.0;
    }
    cosine01(&a.vector, &b.vector)
}

fn mean_window_similarity(a: &[WindowFeature], b: &[WindowFeature], min_rms: f32) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let sum: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(wa, wb)| window_similarity(wa, wb, min_rms))
        .sum();
    sum / a.len() as f32
}

/// Sequences are compared only on indices present in every included
/// file: the head of the region for intros, the tail for outros (the
/// tail is what stays anchored to the end-of-file boundary).
fn aligned_windows(seq: &FeatureSequence, side: Side, common_len: usize) -> &[WindowFeature] {
    match side {
        Side::Intro => &seq.windows[..common_len],
        Side::Outro => &seq.windows[seq.len() - common_len..],
    }
}

fn validate_config(cfg: &AnalysisConfig) -> Result<()> {
    if cfg.seconds <= 0.0 {
        return Err(AudioError::InvalidInput(format!(
            "seconds must be positive (got {})",
            cfg.seconds
        )));
    }
    if cfg.window_ms <= 0.0 || cfg.step_ms <= 0.0 || cfg.step_ms > cfg.window_ms {
        return Err(AudioError::InvalidInput(format!(
            "invalid window configuration: window_ms {} / step_ms {}",
            cfg.window_ms, cfg.step_ms
        )));
    }
    if !(0.0..=1.0).contains(&cfg.similarity_threshold) {
        return Err(AudioError::InvalidInput(format!(
            "similarity_threshold must be in [0, 1] (got {})",
            cfg.similarity_threshold
        )));
    }
    if !(0.0..=1.0).contains(&cfg.min_files_fraction) {
        return Err(AudioError::InvalidInput(format!(
            "min_files_fraction must be in [0, 1] (got {})",
            cfg.min_files_fraction
        )));
    }
    Ok(())
}

/// Extract every file in parallel, splitting the batch into usable
/// sequences and skipped files. Configuration-level errors abort.
fn extract_batch(
    paths: &[PathBuf],
    side: Side,
    cfg: &AnalysisConfig,
) -> Result<(Vec<FeatureSequence>, Vec<SkippedFile>)> {
    let extractor = MfccExtractor::from_config(cfg);

    let extracted: Vec<(PathBuf, Result<FeatureSequence>)> = paths
        .par_iter()
        .map(|p| (p.clone(), extract_path(p, side, cfg, &extractor)))
        .collect();

    let mut included = Vec::new();
    let mut skipped = Vec::new();
    for (path, res) in extracted {
        match res {
            Ok(seq) if !seq.is_empty() => included.push(seq),
            Ok(_) => {
                warn!(path = %path.display(), "file shorter than one analysis window, skipping");
                skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::TooShort,
                    detail: "file is shorter than a single analysis window".to_string(),
                });
            }
            // A bad argument is bad for every file; surface it instead
            // of skipping the whole batch one file at a time
            Err(e @ AudioError::InvalidInput(_)) => return Err(e),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file");
                skipped.push(SkippedFile::from_error(path, &e));
            }
        }
    }
    Ok((included, skipped))
}

/// Analyze a batch of files for a shared intro or outro segment.
///
/// Per-file decode failures are recovered locally: the file lands in
/// `skipped` and the batch continues. Fewer than two usable files is
/// `InsufficientData`; an empty path list is `InvalidInput`.
///
/// The template is the real file whose sequence has the highest mean
/// pairwise similarity to all others (ties go to the earliest file in
/// input order). Every file is then scored against the template by the
/// length of its boundary-anchored contiguous run at or above
/// `similarity_threshold`.
pub fn analyze_files(paths: &[PathBuf], side: Side, cfg: &AnalysisConfig) -> Result<MatchResult> {
    if paths.is_empty() {
        return Err(AudioError::InvalidInput("no input files".to_string()));
    }
    validate_config(cfg)?;

    info!(files = paths.len(), %side, seconds = cfg.seconds, "analyzing batch");

    let (included, skipped) = extract_batch(paths, side, cfg)?;
    if included.len() < 2 {
        return Err(AudioError::InsufficientData(format!(
            "need at least 2 usable files to establish a shared segment, got {} ({} skipped)",
            included.len(),
            skipped.len()
        )));
    }

    let common_len = included.iter().map(FeatureSequence::len).min().unwrap_or(0);
    let aligned: Vec<&[WindowFeature]> = included
        .iter()
        .map(|seq| aligned_windows(seq, side, common_len))
        .collect();

    let matrix = SimilarityMatrix::build(&aligned, cfg.min_window_rms);

    // Strictly-greater comparison keeps the earliest file on ties
    let mut template_idx = 0;
    for i in 1..aligned.len() {
        if matrix.mean_to_others(i) > matrix.mean_to_others(template_idx) {
            template_idx = i;
        }
    }
    let template_windows = aligned[template_idx];
    debug!(
        template = %included[template_idx].path.display(),
        mean_similarity = matrix.mean_to_others(template_idx),
        "template selected"
    );

    let step = cfg.step_seconds();
    let analyzed_seconds = common_len as f64 * step;

    let mut matched_windows = Vec::with_capacity(included.len());
    let matches: Vec<FileScore> = included
        .iter()
        .enumerate()
        .map(|(i, seq)| {
            let sims: Vec<f32> = (0..common_len)
                .map(|w| window_similarity(&aligned[i][w], &template_windows[w], cfg.min_window_rms))
                .collect();
            // The shared segment hugs the analyzed boundary: a leading
            // run for intros, a trailing run for outros
            let run = match side {
                Side::Intro => sims
                    .iter()
                    .take_while(|&&s| s >= cfg.similarity_threshold)
                    .count(),
                Side::Outro => sims
                    .iter()
                    .rev()
                    .take_while(|&&s| s >= cfg.similarity_threshold)
                    .count(),
            };
            matched_windows.push(run);
            FileScore {
                path: seq.path.clone(),
                score: if common_len > 0 {
                    run as f64 / common_len as f64
                } else {
                    0.0
                },
                matched_seconds: run as f64 * step,
                mean_similarity: matrix.mean_to_others(i),
            }
        })
        .collect();

    // Largest duration matched in full by enough of the batch
    let mut recommended_windows = 0;
    for t in (1..=common_len).rev() {
        let passing = matched_windows.iter().filter(|&&m| m >= t).count();
        if passing as f64 / included.len() as f64 >= cfg.min_files_fraction {
            recommended_windows = t;
            break;
        }
    }

    let recommended_seconds = recommended_windows as f64 * step;
    let common_segment_found = recommended_windows > 0;
    info!(
        recommended_seconds,
        common_segment_found,
        skipped = skipped.len(),
        "analysis complete"
    );

    Ok(MatchResult {
        template: included[template_idx].path.clone(),
        matches,
        recommended_seconds,
        common_segment_found,
        side,
        analyzed_seconds,
        skipped,
        config: cfg.clone(),
    })
}

/// Outcome of the lower-level per-window prefix analyzers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixReport {
    /// Contiguous boundary-anchored seconds over which enough files
    /// agreed with the per-window average template
    pub seconds_matched: f64,
    pub windows_matched: usize,

    /// Fraction of files at or above the similarity threshold, one
    /// entry per evaluated window (boundary-most window first)
    pub per_window_frac: Vec<f64>,

    /// Per-file similarity to the per-window template, in evaluation
    /// order (boundary-most window first)
    pub per_file: BTreeMap<PathBuf, Vec<f32>>,

    pub window_seconds: f64,
    pub max_seconds: f64,

    pub skipped: Vec<SkippedFile>,
}

/// Per-window common-prefix analyzer with a configurable window size.
///
/// Unlike [`analyze_files`], the template here is the synthesized
/// per-window average of all files rather than a single real file, and
/// evaluation walks window by window away from the boundary, stopping
/// at the first window where agreement drops below
/// `min_files_fraction`. Finer-grained control for callers that want
/// the raw per-window picture instead of the high-level wrapper.
pub fn per_window_common_prefix(
    paths: &[PathBuf],
    side: Side,
    max_seconds: f64,
    window_seconds: f64,
    cfg: &AnalysisConfig,
) -> Result<PrefixReport> {
    if paths.is_empty() {
        return Err(AudioError::InvalidInput("no input files".to_string()));
    }
    if window_seconds <= 0.0 {
        return Err(AudioError::InvalidInput(format!(
            "window_seconds must be positive (got {})",
            window_seconds
        )));
    }

    // Contiguous windows at the requested granularity
    let mut run_cfg = cfg.clone();
    run_cfg.seconds = max_seconds;
    run_cfg.window_ms = window_seconds * 1000.0;
    run_cfg.step_ms = window_seconds * 1000.0;
    validate_config(&run_cfg)?;

    let (included, skipped) = extract_batch(paths, side, &run_cfg)?;
    if included.is_empty() {
        return Err(AudioError::InsufficientData(format!(
            "no usable files ({} skipped)",
            skipped.len()
        )));
    }

    let common_len = included.iter().map(FeatureSequence::len).min().unwrap_or(0);
    let aligned: Vec<&[WindowFeature]> = included
        .iter()
        .map(|seq| aligned_windows(seq, side, common_len))
        .collect();

    let mut report = PrefixReport {
        seconds_matched: 0.0,
        windows_matched: 0,
        per_window_frac: Vec::new(),
        per_file: BTreeMap::new(),
        window_seconds,
        max_seconds,
        skipped,
    };

    for eval in 0..common_len {
        // Walk away from the analyzed boundary: forward for intros,
        // backward through the aligned range for outros
        let w = match side {
            Side::Intro => eval,
            Side::Outro => common_len - 1 - eval,
        };

        let dim = aligned[0][w].vector.len();
        let mut mean_vec = vec![0.0_f32; dim];
        let mut mean_energy = 0.0_f32;
        for windows in &aligned {
            for (acc, &x) in mean_vec.iter_mut().zip(windows[w].vector.iter()) {
                *acc += x;
            }
            mean_energy += windows[w].energy;
        }
        let n = aligned.len() as f32;
        for acc in mean_vec.iter_mut() {
            *acc /= n;
        }
        mean_energy /= n;

        let template = centered_unit(&mean_vec);

        let mut passing = 0usize;
        for (windows, seq) in aligned.iter().zip(included.iter()) {
            let window = &windows[w];
            let sim = if window.energy < run_cfg.min_window_rms
                && mean_energy < run_cfg.min_window_rms
            {
                0.0
            } else {
                match (&template, centered_unit(&window.vector)) {
                    (Some(t), Some(u)) => {
                        let cos: f32 = t.iter().zip(u.iter()).map(|(x, y)| x * y).sum();
                        ((cos + 1.0) / 2.0).clamp(0.0, 1.0)
                    }
                    _ => 0.0,
                }
            };
            if sim >= run_cfg.similarity_threshold {
                passing += 1;
            }
            report
                .per_file
                .entry(seq.path.clone())
                .or_default()
                .push(sim);
        }

        let frac = passing as f64 / aligned.len() as f64;
        report.per_window_frac.push(frac);
        if frac >= run_cfg.min_files_fraction {
            report.windows_matched += 1;
            report.seconds_matched = report.windows_matched as f64 * window_seconds;
        } else {
            break;
        }
    }

    Ok(report)
}

/// [`per_window_common_prefix`] at one-second granularity
pub fn per_second_common_prefix(
    paths: &[PathBuf],
    side: Side,
    max_seconds: f64,
    cfg: &AnalysisConfig,
) -> Result<PrefixReport> {
    per_window_common_prefix(paths, side, max_seconds, 1.0, cfg)
}
