use crate::domain::jobs::{JobId, SynthesisError};
use crate::domain::keys::KeyLease;
use async_trait::async_trait;

/// One chunk of narration to synthesize.
#[derive(Debug, Clone)]
pub struct ChunkRequest<'a> {
    pub job_id: JobId,
    pub chunk_index: usize,
    pub text: &'a str,
    pub model: &'a str,
    pub voice: &'a str,
    /// BCP-47 tag, when known
    pub language: Option<&'a str>,
}

/// Provider call that turns one chunk into audio.
/// Abstracts the speech API and its transport; the scheduler owns retries and key choice.
///
/// Implementations are responsible for:
/// - Authenticating with the leased key's secret
/// - Returning a complete WAV container per chunk
/// - Mapping provider failures onto [`SynthesisError`] so the retry policy can act on them
#[async_trait]
pub trait ChunkSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        key: &KeyLease,
        request: &ChunkRequest<'_>,
    ) -> Result<Vec<u8>, SynthesisError>;

    /// Cheap authenticated call used to check a key without generating audio.
    async fn validate_key(&self, key: &KeyLease) -> Result<(), SynthesisError>;
}
