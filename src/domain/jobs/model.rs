use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::error::SynthesisError;
use crate::domain::audio::OutputFormat;
use crate::domain::keys::{KeyId, KeyStatus};

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Queued,
    Processing,
    Done,
    Error,
}

/// Coarse phase of a job, reported in progress snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    Generating,
    Concatenating,
    Encoding,
    Converting,
    Finished,
}

/// Voice/model parameters shared by every chunk of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisSettings {
    pub model: String,
    pub voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone)]
pub struct ChunkState {
    pub text: String,
    pub status: ChunkStatus,
    /// Budget-consuming failures so far.
    pub retries: u32,
    /// Keys that failed this chunk and must not be picked again for it.
    pub excluded_keys: HashSet<KeyId>,
    pub output: Option<Vec<u8>>,
    pub last_error: Option<String>,
    pub key_used: Option<KeyId>,
}

impl ChunkState {
    pub fn new(text: String) -> Self {
        Self {
            text,
            status: ChunkStatus::Queued,
            retries: 0,
            excluded_keys: HashSet::new(),
            output: None,
            last_error: None,
            key_used: None,
        }
    }
}

/// Terminal failure attached to a job in `error` status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

impl JobFailure {
    pub fn from_synthesis(error: &SynthesisError, chunk_index: usize) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            chunk_index: Some(chunk_index),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: usize,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub settings: SynthesisSettings,
    pub chunks: Vec<ChunkState>,
    pub status: JobStatus,
    pub stage: JobStage,
    pub current_chunk: usize,
    pub percentage: u8,
    pub error: Option<JobFailure>,
    pub artifact: Option<Artifact>,
    /// Keys demoted while this job ran; never selected again for it.
    pub demoted_keys: HashSet<KeyId>,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(settings: SynthesisSettings, chunks: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            settings,
            chunks: chunks.into_iter().map(ChunkState::new).collect(),
            status: JobStatus::Queued,
            stage: JobStage::Queued,
            current_chunk: 0,
            percentage: 0,
            error: None,
            artifact: None,
            demoted_keys: HashSet::new(),
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn completed_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| chunk.status == ChunkStatus::Done)
            .count()
    }

    /// Completed share of the chunk list, 0..=100.
    pub fn chunk_percentage(&self) -> u8 {
        if self.chunks.is_empty() {
            return 0;
        }
        ((self.completed_chunks() * 100) / self.chunks.len()) as u8
    }

    pub fn progress(&self) -> JobProgress {
        JobProgress {
            job_id: self.id,
            status: self.status,
            stage: self.stage,
            current_chunk: self.current_chunk,
            total_chunks: self.chunks.len(),
            percentage: self.percentage,
        }
    }
}

/// Progress snapshot published to callers and the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: JobId,
    pub status: JobStatus,
    pub stage: JobStage,
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventKind {
    Queued,
    Started,
    ChunkStarted {
        index: usize,
        attempt: u32,
        key_label: String,
    },
    ChunkCompleted {
        index: usize,
        cached: bool,
    },
    ChunkRetrying {
        index: usize,
        code: String,
        message: String,
    },
    KeyDemoted {
        key_id: KeyId,
        status: KeyStatus,
    },
    WaitingForKey {
        index: usize,
        wait_secs: f64,
    },
    Assembling,
    Done,
    Failed {
        code: String,
        message: String,
    },
    Cancelled,
    Removed,
}

/// Published on every state transition of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub at: DateTime<Utc>,
    pub progress: JobProgress,
    #[serde(flatten)]
    pub kind: JobEventKind,
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            JobEventKind::Done | JobEventKind::Failed { .. } | JobEventKind::Cancelled
        )
    }
}
