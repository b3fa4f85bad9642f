pub mod decoder;
pub mod encoder;
pub mod resample;
pub mod trim;
pub mod types;

// Re-export commonly used items
pub use decoder::{decode_audio_file, decode_mono, get_audio_info, is_supported_format};
pub use encoder::encode_wav;
pub use trim::{trim, trim_batch};
pub use types::{AudioClipRef, AudioData, AudioInfo, TrimOutcome, TrimSpec};
