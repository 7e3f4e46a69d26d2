pub mod assembler;
pub mod buffer;
pub mod error;
pub mod transcode;
pub mod wav;

pub use assembler::{concatenate, normalize_loudness, AudioAssembler};
pub use buffer::AudioBuffer;
pub use error::AudioError;
pub use transcode::{AudioTranscoder, Mp3Transcoder, OutputFormat};
pub use wav::{decode_wav, encode_wav, pcm16_to_wav, WAV_CONTENT_TYPE};
