pub mod dto;
pub mod error;
pub mod model;
pub mod retry;
pub mod scheduler;
pub mod service;

pub use dto::{ArtifactInfo, ChunkView, ClearedJobsResponse, JobView, SubmitJobRequest};
pub use error::{JobServiceError, SynthesisError};
pub use model::{
    Artifact, ChunkStatus, Job, JobEvent, JobEventKind, JobFailure, JobId, JobProgress,
    JobStage, JobStatus, SynthesisSettings,
};
pub use retry::{RetryController, RetryDecision};
pub use scheduler::{JobScheduler, SchedulerSettings};
pub use service::{NarrationDefaults, NarrationService, NarrationServiceApi};
