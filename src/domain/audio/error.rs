#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio chunks to assemble")]
    Empty,
    #[error("chunk {index} could not be decoded: {message}")]
    Decode { index: usize, message: String },
    #[error("chunk {index} has sample rate {found} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        index: usize,
        expected: u32,
        found: u32,
    },
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("transcoding failed: {0}")]
    Transcode(String),
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::Encode(err.to_string())
    }
}
