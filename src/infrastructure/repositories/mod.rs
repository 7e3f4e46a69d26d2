pub mod gemini_tts_repository;
pub mod key_repository;
pub mod synthesizer;

pub use gemini_tts_repository::GeminiTtsRepository;
pub use key_repository::{InMemoryKeyRepository, JsonFileKeyRepository, KeyRepository};
pub use synthesizer::{ChunkRequest, ChunkSynthesizer};
