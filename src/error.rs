use thiserror::Error;

/// All possible errors that can occur during analysis or trimming
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to open or read the audio file from disk
    #[error("Failed to open audio file '{path}': {source}")]
    FileOpen {
        path: String,
        source: std::io::Error,
    },

    /// The container/extension is not one we recognize
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The file was recognized but could not be decoded
    #[error("Audio decoding failed for '{path}': {detail}")]
    Decode { path: String, detail: String },

    /// Error occurred while encoding to WAV
    #[error("WAV encoding failed: {0}")]
    Encode(String),

    /// Error from the resampler while converting to the analysis rate
    #[error("Resampling failed: {0}")]
    Resample(String),

    /// Empty or malformed argument (empty path list, zero-length window, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Fewer than two usable files; a shared segment cannot be established
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Trim would produce an empty or negative-length result
    #[error("Invalid trim: {0}")]
    InvalidTrim(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from hound WAV reader/writer
    #[error("Hound WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Convenient Result type that uses our AudioError
pub type Result<T> = std::result::Result<T, AudioError>;
