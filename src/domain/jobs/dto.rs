use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{ChunkStatus, Job, JobFailure, JobId, JobStage, JobStatus, SynthesisSettings};
use crate::domain::audio::OutputFormat;
use crate::domain::text::count_words;

/// Request for POST /api/jobs
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    /// Overrides the model's default chunk size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_words: Option<usize>,
    /// Strip markdown and stage directions from generated scripts
    #[serde(default)]
    pub clean_script: bool,
    /// Convert HTML input to plain text first
    #[serde(default)]
    pub strip_markup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkView {
    pub index: usize,
    pub status: ChunkStatus,
    pub words: usize,
    pub retries: u32,
    pub has_audio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub format: OutputFormat,
    pub size_bytes: usize,
    pub duration_secs: f64,
}

/// Response for GET /api/jobs/:id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub stage: JobStage,
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub percentage: u8,
    pub settings: SynthesisSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub chunks: Vec<ChunkView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            stage: job.stage,
            current_chunk: job.current_chunk,
            total_chunks: job.chunks.len(),
            percentage: job.percentage,
            settings: job.settings.clone(),
            error: job.error.clone(),
            chunks: job
                .chunks
                .iter()
                .enumerate()
                .map(|(index, chunk)| ChunkView {
                    index,
                    status: chunk.status,
                    words: count_words(&chunk.text),
                    retries: chunk.retries,
                    has_audio: chunk.output.is_some(),
                    last_error: chunk.last_error.clone(),
                })
                .collect(),
            artifact: job.artifact.as_ref().map(|artifact| ArtifactInfo {
                format: artifact.format,
                size_bytes: artifact.bytes.len(),
                duration_secs: artifact.duration_secs,
            }),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Response for DELETE /api/jobs
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearedJobsResponse {
    pub removed: usize,
}
