pub mod cleanup;
pub mod language;
pub mod splitter;

pub use cleanup::TextCleaner;
pub use language::{LanguageCode, LanguageResolver};
pub use splitter::{count_words, max_words_for_model, ChunkSplitter};
