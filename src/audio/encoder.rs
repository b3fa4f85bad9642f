use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

use crate::audio::types::AudioData;
use crate::error::Result;

/// Encode PCM audio data to a WAV file
///
/// Outputs 32-bit float WAV with fixed settings so that encoding the
/// same samples twice produces byte-identical files.
///
/// # Example
/// ```
/// use introcut::audio::{encode_wav, AudioData};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let audio = AudioData {
///     samples: vec![0.0, 0.5, -0.5, 1.0, -1.0],
///     sample_rate: 44100,
///     channels: 1,
/// };
/// # let temp_dir = std::env::temp_dir();
/// # let output_path = temp_dir.join("introcut_doc_encode.wav");
/// encode_wav(&audio, &output_path)?;
/// # std::fs::remove_file(&output_path).ok();
/// # Ok(())
/// # }
/// ```
pub fn encode_wav<P: AsRef<Path>>(audio: &AudioData, output_path: P) -> Result<()> {
    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(output_path, spec)?;

    for &sample in &audio.samples {
        writer.write_sample(sample)?;
    }

    writer.finalize()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_encode_and_decode_wav() {
        let test_audio = AudioData {
            samples: vec![0.0, 0.5, -0.5, 1.0, -1.0],
            sample_rate: 44100,
            channels: 1,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encoded.wav");
        encode_wav(&test_audio, &path).unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();

        assert_eq!(samples, test_audio.samples);
    }

    #[test]
    fn test_encode_is_byte_deterministic() {
        let audio = AudioData {
            samples: (0..4410).map(|i| (i as f32 / 100.0).sin()).collect(),
            sample_rate: 44100,
            channels: 1,
        };

        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        encode_wav(&audio, &a).unwrap();
        encode_wav(&audio, &b).unwrap();

        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }
}
