use async_trait::async_trait;
use narration_backend::domain::audio::{encode_wav, AudioBuffer};
use narration_backend::domain::jobs::SynthesisError;
use narration_backend::domain::keys::{ApiKey, KeyLease, KeyStatus};
use narration_backend::infrastructure::repositories::{ChunkRequest, ChunkSynthesizer};
use parking_lot::Mutex;
use std::time::Duration;

pub const SAMPLE_RATE: u32 = 24000;
/// Samples in every scripted chunk (0.1 s).
pub const CHUNK_SAMPLES: usize = 2400;
/// Secrets with this prefix are rejected by the scripted provider.
pub const INVALID_SECRET_PREFIX: &str = "invalid-";
/// Chunk text containing this marker is rejected as a bad request.
pub const REJECT_MARKER: &str = "REJECT";
/// Chunk text containing this marker takes a while to synthesize.
pub const SLOW_MARKER: &str = "SLOW";

/// Constant-level mono tone, louder for later chunks so order is observable.
pub fn tone(index: usize) -> Vec<u8> {
    let level = 0.05 * (index as f32 + 1.0);
    encode_wav(&AudioBuffer::mono(SAMPLE_RATE, vec![level; CHUNK_SAMPLES])).unwrap()
}

pub fn valid_key(secret: &str, label: &str) -> ApiKey {
    let mut key = ApiKey::new(
        secret.to_string(),
        label.to_string(),
        "gemini-2.0-flash-lite".to_string(),
        chrono::Utc::now(),
    );
    key.status = KeyStatus::Valid;
    key
}

/// Stand-in for the speech provider.
#[derive(Default)]
pub struct ScriptedSynthesizer {
    pub calls: Mutex<Vec<(usize, String)>>,
}

impl ScriptedSynthesizer {
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ChunkSynthesizer for ScriptedSynthesizer {
    async fn synthesize(
        &self,
        key: &KeyLease,
        request: &ChunkRequest<'_>,
    ) -> Result<Vec<u8>, SynthesisError> {
        self.calls
            .lock()
            .push((request.chunk_index, key.label.clone()));

        if key.secret.starts_with(INVALID_SECRET_PREFIX) {
            return Err(SynthesisError::KeyInvalid("API key not valid".to_string()));
        }
        if request.text.contains(REJECT_MARKER) {
            return Err(SynthesisError::InvalidRequest(
                "text rejected by provider".to_string(),
            ));
        }
        if request.text.contains(SLOW_MARKER) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        Ok(tone(request.chunk_index))
    }

    async fn validate_key(&self, key: &KeyLease) -> Result<(), SynthesisError> {
        if key.secret.starts_with(INVALID_SECRET_PREFIX) {
            Err(SynthesisError::KeyInvalid("API key not valid".to_string()))
        } else {
            Ok(())
        }
    }
}
