use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::dto::{JobView, SubmitJobRequest};
use super::error::JobServiceError;
use super::model::{Artifact, JobEvent, JobId, JobProgress, SynthesisSettings};
use super::scheduler::JobScheduler;
use crate::domain::text::splitter::validate_chunks;
use crate::domain::text::{count_words, max_words_for_model, ChunkSplitter, LanguageResolver, TextCleaner};

/// Upper bound on submitted text, in characters.
const MAX_TEXT_CHARS: usize = 500_000;

/// Defaults applied to submissions that leave fields unset.
#[derive(Debug, Clone)]
pub struct NarrationDefaults {
    pub model: String,
    pub voice: String,
}

pub struct NarrationService {
    scheduler: Arc<JobScheduler>,
    cleaner: TextCleaner,
    resolver: LanguageResolver,
    defaults: NarrationDefaults,
}

impl NarrationService {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        cleaner: TextCleaner,
        resolver: LanguageResolver,
        defaults: NarrationDefaults,
    ) -> Self {
        Self {
            scheduler,
            cleaner,
            resolver,
            defaults,
        }
    }
}

#[async_trait]
pub trait NarrationServiceApi: Send + Sync {
    /// Prepare text and queue it as a narration job
    ///
    /// This operation:
    /// - Optionally strips HTML and script formatting
    /// - Resolves the speech language (request, voice, then detection)
    /// - Splits the text under the model's word ceiling
    /// - Hands the chunks to the scheduler
    async fn submit(&self, request: SubmitJobRequest) -> Result<JobProgress, JobServiceError>;

    async fn get(&self, job_id: JobId) -> Result<JobView, JobServiceError>;

    async fn list(&self) -> Vec<JobProgress>;

    async fn cancel(&self, job_id: JobId) -> Result<JobProgress, JobServiceError>;

    async fn resume(&self, job_id: JobId) -> Result<JobProgress, JobServiceError>;

    async fn remove(&self, job_id: JobId) -> Result<(), JobServiceError>;

    async fn clear_finished(&self) -> usize;

    async fn artifact(&self, job_id: JobId) -> Result<Artifact, JobServiceError>;

    async fn chunk_audio(&self, job_id: JobId, index: usize) -> Result<Vec<u8>, JobServiceError>;

    fn subscribe(&self) -> broadcast::Receiver<JobEvent>;
}

#[async_trait]
impl NarrationServiceApi for NarrationService {
    async fn submit(&self, request: SubmitJobRequest) -> Result<JobProgress, JobServiceError> {
        if request.text.len() > MAX_TEXT_CHARS {
            return Err(JobServiceError::TooLarge(format!(
                "text has {} characters, limit is {}",
                request.text.len(),
                MAX_TEXT_CHARS
            )));
        }

        let model = non_empty(request.model).unwrap_or_else(|| self.defaults.model.clone());
        let voice = non_empty(request.voice).unwrap_or_else(|| self.defaults.voice.clone());

        let text = self.prepare_text(&request.text, request.strip_markup, request.clean_script);
        if text.is_empty() {
            return Err(JobServiceError::Invalid("text is empty".to_string()));
        }

        let max_words = match request.max_words {
            Some(0) => {
                return Err(JobServiceError::Invalid(
                    "max_words must be greater than zero".to_string(),
                ))
            }
            Some(n) => n,
            None => max_words_for_model(&model),
        };

        let language = self
            .resolver
            .resolve(request.language.as_deref(), &voice, &text);

        let chunks = ChunkSplitter::new(max_words).split(&text);
        validate_chunks(&chunks, max_words).map_err(|e| anyhow::anyhow!(e))?;

        tracing::info!(
            original_length = request.text.len(),
            words = count_words(&text),
            chunks = chunks.len(),
            max_words,
            language = language.as_deref().unwrap_or("auto"),
            "Narration text prepared"
        );

        let settings = SynthesisSettings {
            model,
            voice,
            language,
            output_format: request.output_format.unwrap_or_default(),
        };
        self.scheduler.submit(settings, chunks)
    }

    async fn get(&self, job_id: JobId) -> Result<JobView, JobServiceError> {
        self.scheduler.view(job_id)
    }

    async fn list(&self) -> Vec<JobProgress> {
        self.scheduler.list()
    }

    async fn cancel(&self, job_id: JobId) -> Result<JobProgress, JobServiceError> {
        self.scheduler.cancel(job_id)
    }

    async fn resume(&self, job_id: JobId) -> Result<JobProgress, JobServiceError> {
        self.scheduler.resume(job_id)
    }

    async fn remove(&self, job_id: JobId) -> Result<(), JobServiceError> {
        self.scheduler.remove(job_id)
    }

    async fn clear_finished(&self) -> usize {
        let removed = self.scheduler.clear_finished();
        tracing::info!(removed, "Finished jobs cleared");
        removed
    }

    async fn artifact(&self, job_id: JobId) -> Result<Artifact, JobServiceError> {
        self.scheduler.artifact(job_id)
    }

    async fn chunk_audio(&self, job_id: JobId, index: usize) -> Result<Vec<u8>, JobServiceError> {
        self.scheduler.chunk_audio(job_id, index)
    }

    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.scheduler.subscribe()
    }
}

impl NarrationService {
    fn prepare_text(&self, text: &str, strip_markup: bool, clean_script: bool) -> String {
        let mut prepared = if strip_markup {
            self.cleaner.strip_markup(text)
        } else {
            text.to_string()
        };
        if clean_script {
            prepared = self.cleaner.clean_script(&prepared);
        }
        prepared.trim().to_string()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
