use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use introcut::audio::{get_audio_info, trim_batch, TrimSpec};
use introcut::{analyze_files, AnalysisConfig, Side};

/// Command-line tool for finding and removing shared intros/outros
/// across a batch of audio files
#[derive(Parser, Debug)]
#[command(name = "introcut")]
#[command(about = "Detect and trim shared intro/outro segments", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SideArg {
    Intro,
    Outro,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Intro => Side::Intro,
            SideArg::Outro => Side::Outro,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a batch of files for a shared intro or outro
    Analyze {
        /// Input audio files (MP3, FLAC, WAV, OGG, etc.)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Which boundary of the files to analyze
        #[arg(long, value_enum, default_value = "intro")]
        side: SideArg,

        /// Seconds of each file to analyze
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,

        /// Feature window length in milliseconds
        #[arg(long, default_value_t = 250.0)]
        window_ms: f64,

        /// Step between window starts in milliseconds
        #[arg(long, default_value_t = 250.0)]
        step_ms: f64,

        /// Per-window similarity threshold in [0, 1]
        #[arg(long, default_value_t = 0.75)]
        threshold: f32,

        /// Fraction of files that must share a duration
        #[arg(long, default_value_t = 0.6)]
        min_files_fraction: f64,

        /// Print the full result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Trim seconds off the start and/or end of files into new WAVs
    Trim {
        /// Input audio files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory the trimmed WAV files are written to
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Seconds to remove from the start of each file
        #[arg(long, default_value_t = 0.0)]
        intro: f64,

        /// Seconds to remove from the end of each file
        #[arg(long, default_value_t = 0.0)]
        outro: f64,

        /// Silence retained on each cut edge, in milliseconds
        #[arg(long, default_value_t = 250)]
        keep_silence_ms: u32,
    },

    /// Show format, duration, and channel layout of files
    Info {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the probed metadata as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Analyze {
            files,
            side,
            seconds,
            window_ms,
            step_ms,
            threshold,
            min_files_fraction,
            json,
        } => {
            let cfg = AnalysisConfig {
                seconds,
                window_ms,
                step_ms,
                similarity_threshold: threshold,
                min_files_fraction,
                ..AnalysisConfig::default()
            };
            analyze(files, side.into(), &cfg, json)
        }
        Command::Trim {
            files,
            out_dir,
            intro,
            outro,
            keep_silence_ms,
        } => run_trim(files, out_dir, intro, outro, keep_silence_ms),
        Command::Info { files, json } => info(files, json),
    }
}

fn analyze(files: Vec<PathBuf>, side: Side, cfg: &AnalysisConfig, json: bool) -> anyhow::Result<()> {
    let result = analyze_files(&files, side, cfg)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Analyzed {} of the first/last {:.1}s", result.side, result.analyzed_seconds);
    println!("Template: {}", result.template.display());
    println!();
    for score in &result.matches {
        println!(
            "  {:>6.1}% ({:.2}s matched)  {}",
            score.score * 100.0,
            score.matched_seconds,
            score.path.display()
        );
    }
    for skip in &result.skipped {
        println!("  skipped: {} ({})", skip.path.display(), skip.detail);
    }
    println!();
    if result.common_segment_found {
        println!(
            "Shared {} segment: {:.2}s recommended for removal",
            result.side, result.recommended_seconds
        );
    } else {
        println!("No shared {} segment found", result.side);
    }
    Ok(())
}

fn run_trim(
    files: Vec<PathBuf>,
    out_dir: PathBuf,
    intro: f64,
    outro: f64,
    keep_silence_ms: u32,
) -> anyhow::Result<()> {
    let specs: Vec<TrimSpec> = files
        .iter()
        .map(|src| {
            let name = src
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "trimmed".to_string());
            TrimSpec::new(src, out_dir.join(format!("{}.wav", name)))
                .remove_intro(intro)
                .remove_outro(outro)
                .keep_silence_ms(keep_silence_ms)
        })
        .collect();

    let mut failures = 0;
    for outcome in trim_batch(&specs) {
        match outcome {
            Ok(done) => println!(
                "{} -> {} ({:.2}s)",
                done.src_path.display(),
                done.dest_path.display(),
                done.output_seconds
            ),
            Err(e) => {
                eprintln!("error: {}", e);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{} of {} files failed", failures, files.len());
    }
    Ok(())
}

fn info(files: Vec<PathBuf>, json: bool) -> anyhow::Result<()> {
    for path in &files {
        match get_audio_info(path) {
            Ok(info) if json => println!("{}", serde_json::to_string(&info)?),
            Ok(info) => println!(
                "{}: {} | {:.2}s | {} Hz | {} ch",
                path.display(),
                info.format,
                info.duration_seconds,
                info.sample_rate,
                info.channels
            ),
            Err(e) => eprintln!("{}: {}", path.display(), e),
        }
    }
    Ok(())
}
