use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use std::fs::File;
use std::path::Path;

use crate::audio::resample::resample_mono;
use crate::audio::types::{AudioData, AudioInfo};
use crate::error::{AudioError, Result};

/// Container extensions we accept. Anything else is reported as
/// `UnsupportedFormat` before symphonia ever touches the file.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "wav", "mp3", "flac", "ogg", "oga", "opus", "m4a", "m4b", "mp4", "aac", "aiff", "aif", "caf",
    "mkv", "mka", "webm",
];

/// Check whether a path carries a recognized audio container extension
pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| ext.eq_ignore_ascii_case(s))
        })
        .unwrap_or(false)
}

fn decode_error<P: AsRef<Path>>(path: P, detail: impl Into<String>) -> AudioError {
    AudioError::Decode {
        path: path.as_ref().to_string_lossy().to_string(),
        detail: detail.into(),
    }
}

/// Decodes an audio file to PCM samples in memory
///
/// Supports: MP3, FLAC, WAV, OGG Vorbis, AAC, and more via symphonia
///
/// # Example
/// ```no_run
/// use introcut::audio::decode_audio_file;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let audio = decode_audio_file("chapter_01.mp3")?;
/// println!("Loaded {} seconds of audio", audio.duration_seconds());
/// # Ok(())
/// # }
/// ```
pub fn decode_audio_file<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().to_string();

    if !is_supported_format(path) {
        return Err(AudioError::UnsupportedFormat(path_str));
    }

    let file = File::open(path).map_err(|e| AudioError::FileOpen {
        path: path_str.clone(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_error(path, format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    // Find the default audio track (skip video/subtitle tracks)
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_error(path, "No audio track found"))?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| decode_error(path, "Sample rate not found"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, format!("Failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels: Option<u16> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(_) => break, // End of stream
        };

        // Skip packets from other tracks (e.g., video, album art)
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| decode_error(path, format!("Decode error: {}", e)))?;

        // Channel layout comes from the first decoded buffer; some MP3s
        // do not carry it in the container metadata
        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = Some(spec.channels.count() as u16);
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    let channels =
        channels.ok_or_else(|| decode_error(path, "No decodable audio packets in file"))?;

    if samples.is_empty() {
        return Err(decode_error(path, "File decoded to zero samples"));
    }

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

/// Decode a file to mono at `target_sample_rate`, the form the feature
/// extractor consumes.
///
/// Channels are averaged, then the signal is resampled when the source
/// rate differs from the requested analysis rate. Returns the samples
/// together with the rate they are at (always `target_sample_rate`).
pub fn decode_mono<P: AsRef<Path>>(path: P, target_sample_rate: u32) -> Result<(Vec<f32>, u32)> {
    let audio = decode_audio_file(&path)?;
    let mono = audio.to_mono();
    if audio.sample_rate == target_sample_rate {
        return Ok((mono, target_sample_rate));
    }
    let resampled = resample_mono(&mono, audio.sample_rate, target_sample_rate)?;
    Ok((resampled, target_sample_rate))
}

/// Get audio file metadata without decoding all samples
///
/// Much faster than decode_audio_file() for just getting duration/info
pub fn get_audio_info<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().to_string();

    if !is_supported_format(path) {
        return Err(AudioError::UnsupportedFormat(path_str));
    }

    let file = File::open(path).map_err(|e| AudioError::FileOpen {
        path: path_str.clone(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_error(path, format!("Failed to probe: {}", e)))?;

    let format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_error(path, "No audio track"))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    // Duration from the reported frame count; 0.0 when the container
    // does not carry it (callers fall back to a full decode)
    let duration_seconds = if let (Some(n_frames), Some(sr)) =
        (track.codec_params.n_frames, track.codec_params.sample_rate)
    {
        n_frames as f64 / sr as f64
    } else {
        0.0
    };

    Ok(AudioInfo {
        duration_seconds,
        sample_rate,
        channels,
        format: format!("{:?}", track.codec_params.codec),
        bit_depth: track.codec_params.bits_per_sample.map(|b| b as u16),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_test_wav(path: &Path, seconds: f64, sample_rate: u32, channels: u16) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let frames = (seconds * sample_rate as f64) as usize;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            for _ in 0..channels {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_supported_format_detection() {
        assert!(is_supported_format("a.wav"));
        assert!(is_supported_format("a.MP3"));
        assert!(is_supported_format("dir/a.flac"));
        assert!(!is_supported_format("a.txt"));
        assert!(!is_supported_format("noextension"));
    }

    #[test]
    fn test_unknown_extension_rejected_before_io() {
        let err = decode_audio_file("does_not_exist.xyz").unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file_reports_open_error() {
        let err = decode_audio_file("does_not_exist.wav").unwrap_err();
        assert!(matches!(err, AudioError::FileOpen { .. }));
    }

    #[test]
    fn test_zero_byte_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"").unwrap();
        let err = decode_audio_file(&path).unwrap_err();
        assert!(matches!(err, AudioError::Decode { .. }));
    }

    #[test]
    fn test_decode_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 2.0, 22050, 2);

        let audio = decode_audio_file(&path).unwrap();
        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.channels, 2);
        assert!((audio.duration_seconds() - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_decode_mono_keeps_native_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 1.0, 22050, 2);

        let (mono, rate) = decode_mono(&path, 22050).unwrap();
        assert_eq!(rate, 22050);
        assert_eq!(mono.len(), 22050);
    }

    #[test]
    fn test_decode_mono_resamples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone44k.wav");
        write_test_wav(&path, 1.0, 44100, 1);

        let (mono, rate) = decode_mono(&path, 22050).unwrap();
        assert_eq!(rate, 22050);
        // FFT resampler output length lands within a chunk of the ideal
        let ideal = 22050.0;
        assert!((mono.len() as f64 - ideal).abs() < 2048.0);
    }

    #[test]
    fn test_get_audio_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.wav");
        write_test_wav(&path, 3.0, 44100, 1);

        let info = get_audio_info(&path).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 1);
        assert!((info.duration_seconds - 3.0).abs() < 0.01);
    }
}
