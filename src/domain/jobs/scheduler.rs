use moka::future::Cache;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};

use super::dto::JobView;
use super::error::{JobServiceError, SynthesisError};
use super::model::{
    Artifact, ChunkStatus, Job, JobEvent, JobEventKind, JobFailure, JobId, JobProgress,
    JobStage, JobStatus, SynthesisSettings,
};
use super::retry::{RetryController, RetryDecision};
use crate::domain::audio::{
    encode_wav, AudioAssembler, AudioBuffer, AudioError, AudioTranscoder, OutputFormat,
};
use crate::domain::keys::{CallOutcome, KeyAvailability, KeyId, KeyLease, KeyPool};
use crate::domain::shared::Clock;
use crate::infrastructure::repositories::{ChunkRequest, ChunkSynthesizer};

/// How often a job re-checks the pool while every usable key is held by other jobs.
const CONTENTION_POLL: Duration = Duration::from_millis(250);
const EVENT_CAPACITY: usize = 512;
const AUDIO_ASSEMBLY_FAILED: &str = "AUDIO_ASSEMBLY_FAILED";

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub max_concurrent_jobs: usize,
    pub max_chunk_attempts: u32,
    /// Longest a single chunk waits for a key before the job fails with NO_KEY_AVAILABLE.
    pub key_wait_timeout: Duration,
    pub chunk_cache_enabled: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_chunk_attempts: 5,
            key_wait_timeout: Duration::from_secs(120),
            chunk_cache_enabled: false,
        }
    }
}

enum ChunkOutcome {
    Done,
    Cancelled,
    Failed(SynthesisError),
}

enum Acquired {
    Lease(KeyLease),
    Cancelled,
    Exhausted(String),
}

/// Owns every job, admits them up to the concurrency ceiling and drives each one
/// chunk by chunk against the shared key pool.
pub struct JobScheduler {
    pool: Arc<KeyPool>,
    synthesizer: Arc<dyn ChunkSynthesizer>,
    assembler: AudioAssembler,
    transcoder: Option<Arc<dyn AudioTranscoder>>,
    retry: RetryController,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
    jobs: RwLock<Vec<Job>>,
    admission: Arc<Semaphore>,
    events: broadcast::Sender<JobEvent>,
    cache: Option<Cache<String, Vec<u8>>>,
}

impl JobScheduler {
    pub fn new(
        pool: Arc<KeyPool>,
        synthesizer: Arc<dyn ChunkSynthesizer>,
        assembler: AudioAssembler,
        transcoder: Option<Arc<dyn AudioTranscoder>>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let cache = if settings.chunk_cache_enabled {
            Some(
                Cache::builder()
                    .max_capacity(500)
                    .time_to_idle(Duration::from_secs(30 * 60))
                    .build(),
            )
        } else {
            None
        };

        Self {
            pool,
            synthesizer,
            assembler,
            transcoder,
            retry: RetryController::new(settings.max_chunk_attempts),
            clock,
            admission: Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1))),
            settings,
            jobs: RwLock::new(Vec::new()),
            events,
            cache,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    /// Registers a job over pre-split chunks and queues it for execution.
    pub fn submit(
        self: &Arc<Self>,
        settings: SynthesisSettings,
        chunks: Vec<String>,
    ) -> Result<JobProgress, JobServiceError> {
        if chunks.is_empty() {
            return Err(JobServiceError::Invalid("text has no words to narrate".to_string()));
        }
        if settings.output_format != OutputFormat::Wav && !self.can_transcode(settings.output_format)
        {
            return Err(JobServiceError::Invalid(format!(
                "output format {} is not supported",
                settings.output_format
            )));
        }

        let job = Job::new(settings, chunks, self.clock.now());
        let job_id = job.id;
        let progress = job.progress();
        tracing::info!(
            job_id = %job_id,
            total_chunks = job.chunks.len(),
            model = %job.settings.model,
            voice = %job.settings.voice,
            "Job submitted"
        );
        self.jobs.write().push(job);
        self.emit(job_id, JobEventKind::Queued);

        tokio::spawn(self.clone().run(job_id));
        Ok(progress)
    }

    pub fn view(&self, job_id: JobId) -> Result<JobView, JobServiceError> {
        self.read(job_id, |job| JobView::from(job))
            .ok_or(JobServiceError::NotFound(job_id))
    }

    pub fn progress(&self, job_id: JobId) -> Result<JobProgress, JobServiceError> {
        self.read(job_id, Job::progress)
            .ok_or(JobServiceError::NotFound(job_id))
    }

    pub fn list(&self) -> Vec<JobProgress> {
        self.jobs.read().iter().map(Job::progress).collect()
    }

    /// Queued jobs stop at once; running jobs stop before their next chunk attempt.
    pub fn cancel(&self, job_id: JobId) -> Result<JobProgress, JobServiceError> {
        let was_queued = self
            .update(job_id, |job| {
                if job.status.is_terminal() {
                    return Err(JobServiceError::Conflict(format!(
                        "job {} already finished",
                        job_id
                    )));
                }
                job.cancel_requested = true;
                if job.status == JobStatus::Queued {
                    job.status = JobStatus::Cancelled;
                    job.stage = JobStage::Finished;
                    return Ok(true);
                }
                Ok(false)
            })
            .ok_or(JobServiceError::NotFound(job_id))??;

        tracing::info!(job_id = %job_id, was_queued, "Job cancellation requested");
        if was_queued {
            self.emit(job_id, JobEventKind::Cancelled);
        }
        self.progress(job_id)
    }

    /// Restarts a failed or cancelled job from its first unfinished chunk, keeping produced audio.
    pub fn resume(self: &Arc<Self>, job_id: JobId) -> Result<JobProgress, JobServiceError> {
        self.update(job_id, |job| {
            if !matches!(job.status, JobStatus::Error | JobStatus::Cancelled) {
                return Err(JobServiceError::Conflict(format!(
                    "job {} is {:?} and cannot be resumed",
                    job_id, job.status
                )));
            }
            job.status = JobStatus::Queued;
            job.stage = JobStage::Queued;
            job.error = None;
            job.cancel_requested = false;
            job.demoted_keys.clear();
            for chunk in job.chunks.iter_mut().filter(|c| c.status != ChunkStatus::Done) {
                chunk.status = ChunkStatus::Queued;
                chunk.retries = 0;
                chunk.excluded_keys.clear();
            }
            job.current_chunk = job
                .chunks
                .iter()
                .position(|c| c.status != ChunkStatus::Done)
                .unwrap_or(job.chunks.len());
            Ok(())
        })
        .ok_or(JobServiceError::NotFound(job_id))??;

        tracing::info!(job_id = %job_id, "Job resumed");
        self.emit(job_id, JobEventKind::Queued);
        tokio::spawn(self.clone().run(job_id));
        self.progress(job_id)
    }

    /// Drops a terminal job from the visible list.
    pub fn remove(&self, job_id: JobId) -> Result<(), JobServiceError> {
        let progress = {
            let mut jobs = self.jobs.write();
            let index = jobs
                .iter()
                .position(|job| job.id == job_id)
                .ok_or(JobServiceError::NotFound(job_id))?;
            if !jobs[index].status.is_terminal() {
                return Err(JobServiceError::Conflict(format!(
                    "job {} is still running",
                    job_id
                )));
            }
            jobs.remove(index).progress()
        };
        self.publish(progress, JobEventKind::Removed);
        Ok(())
    }

    pub fn clear_finished(&self) -> usize {
        let removed: Vec<JobProgress> = {
            let mut jobs = self.jobs.write();
            let (finished, running): (Vec<Job>, Vec<Job>) =
                jobs.drain(..).partition(|job| job.status.is_terminal());
            *jobs = running;
            finished.iter().map(Job::progress).collect()
        };
        let count = removed.len();
        for progress in removed {
            self.publish(progress, JobEventKind::Removed);
        }
        count
    }

    pub fn artifact(&self, job_id: JobId) -> Result<Artifact, JobServiceError> {
        self.read(job_id, |job| job.artifact.clone())
            .ok_or(JobServiceError::NotFound(job_id))?
            .ok_or_else(|| JobServiceError::NotReady(format!("job {} has no audio yet", job_id)))
    }

    pub fn chunk_audio(&self, job_id: JobId, index: usize) -> Result<Vec<u8>, JobServiceError> {
        self.read(job_id, |job| {
            job.chunks
                .get(index)
                .map(|chunk| chunk.output.clone())
                .ok_or_else(|| {
                    JobServiceError::Invalid(format!(
                        "job {} has {} chunks",
                        job_id,
                        job.chunks.len()
                    ))
                })
        })
        .ok_or(JobServiceError::NotFound(job_id))??
        .ok_or_else(|| JobServiceError::NotReady(format!("chunk {} has no audio yet", index)))
    }

    async fn run(self: Arc<Self>, job_id: JobId) {
        let _permit = match self.admission.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let started = self
            .update(job_id, |job| {
                if job.status != JobStatus::Queued || job.cancel_requested {
                    return false;
                }
                job.status = JobStatus::Processing;
                job.stage = JobStage::Generating;
                true
            })
            .unwrap_or(false);
        if !started {
            return;
        }
        self.emit(job_id, JobEventKind::Started);
        tracing::info!(job_id = %job_id, "Job started");

        let total = self.read(job_id, |job| job.chunks.len()).unwrap_or(0);
        for index in 0..total {
            let done = self
                .read(job_id, |job| job.chunks[index].status == ChunkStatus::Done)
                .unwrap_or(true);
            if done {
                continue;
            }
            if self.is_cancelled(job_id) {
                self.finish_cancelled(job_id);
                return;
            }

            match self.process_chunk(job_id, index).await {
                ChunkOutcome::Done => {}
                ChunkOutcome::Cancelled => {
                    self.finish_cancelled(job_id);
                    return;
                }
                ChunkOutcome::Failed(error) => {
                    self.fail(job_id, JobFailure::from_synthesis(&error, index));
                    return;
                }
            }
        }

        if self.is_cancelled(job_id) {
            self.finish_cancelled(job_id);
            return;
        }
        self.assemble(job_id).await;
    }

    async fn process_chunk(&self, job_id: JobId, index: usize) -> ChunkOutcome {
        let Some((text, settings)) = self.update(job_id, |job| {
            job.current_chunk = index;
            job.chunks[index].status = ChunkStatus::Processing;
            (job.chunks[index].text.clone(), job.settings.clone())
        }) else {
            return ChunkOutcome::Cancelled;
        };

        let cache_key = format!(
            "{}|{}|{}|{}",
            settings.model,
            settings.voice,
            settings.language.as_deref().unwrap_or(""),
            text
        );
        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(&cache_key).await {
                tracing::info!(job_id = %job_id, chunk_index = index, "Chunk cache hit");
                self.complete_chunk(job_id, index, bytes, true);
                return ChunkOutcome::Done;
            }
        }

        let mut preferred: Option<KeyId> = None;
        let mut last_error: Option<String> = None;

        loop {
            if self.is_cancelled(job_id) {
                return ChunkOutcome::Cancelled;
            }

            let exclude = self
                .read(job_id, |job| {
                    job.chunks[index]
                        .excluded_keys
                        .union(&job.demoted_keys)
                        .copied()
                        .collect::<HashSet<KeyId>>()
                })
                .unwrap_or_default();

            let lease = match self
                .acquire_key(job_id, index, &settings.model, &exclude, preferred)
                .await
            {
                Acquired::Lease(lease) => lease,
                Acquired::Cancelled => return ChunkOutcome::Cancelled,
                Acquired::Exhausted(detail) => {
                    let message = match &last_error {
                        Some(last) => format!("{}; last error: {}", detail, last),
                        None => detail,
                    };
                    self.update(job_id, |job| {
                        job.chunks[index].status = ChunkStatus::Error;
                        job.chunks[index].last_error = Some(message.clone());
                    });
                    return ChunkOutcome::Failed(SynthesisError::NoKeyAvailable(message));
                }
            };

            let attempt = self
                .update(job_id, |job| {
                    let chunk = &mut job.chunks[index];
                    chunk.key_used = Some(lease.key_id);
                    chunk.retries + 1
                })
                .unwrap_or(1);
            self.emit(
                job_id,
                JobEventKind::ChunkStarted {
                    index,
                    attempt,
                    key_label: lease.label.clone(),
                },
            );
            tracing::info!(
                job_id = %job_id,
                chunk_index = index,
                key_id = %lease.key_id,
                attempt,
                "Synthesizing chunk"
            );

            let request = ChunkRequest {
                job_id,
                chunk_index: index,
                text: &text,
                model: &settings.model,
                voice: &settings.voice,
                language: settings.language.as_deref(),
            };
            let result = match self.synthesizer.synthesize(&lease, &request).await {
                Ok(bytes) if bytes.is_empty() => {
                    Err(SynthesisError::NoContent("provider returned no audio".to_string()))
                }
                other => other,
            };
            let failed_attempts = self
                .read(job_id, |job| job.chunks[index].retries)
                .unwrap_or(0);
            let settled = result.map_err(|error| {
                let decision = self.retry.decide(&error, failed_attempts);
                (error, decision)
            });

            // The provider answered, so the call is counted even if the job was cancelled meanwhile
            let outcome = match &settled {
                Ok(_) => CallOutcome::Served,
                Err((error, RetryDecision::Failover { demote_to })) => CallOutcome::Demoted {
                    status: *demote_to,
                    message: error.to_string(),
                },
                Err((error, RetryDecision::RetryOtherKey { cooldown })) => {
                    CallOutcome::RateLimited {
                        cooldown: *cooldown,
                        message: error.to_string(),
                    }
                }
                Err(_) => CallOutcome::Failed,
            };
            if let Err(e) = self.pool.complete(lease.key_id, job_id, outcome) {
                tracing::warn!(key_id = %lease.key_id, error = %e, "Could not settle key lease");
            }

            if self.is_cancelled(job_id) {
                tracing::info!(job_id = %job_id, chunk_index = index, "Discarding chunk result of cancelled job");
                return ChunkOutcome::Cancelled;
            }

            let (error, decision) = match settled {
                Ok(bytes) => {
                    if let Some(cache) = &self.cache {
                        cache.insert(cache_key.clone(), bytes.clone()).await;
                    }
                    self.complete_chunk(job_id, index, bytes, false);
                    return ChunkOutcome::Done;
                }
                Err(failure) => failure,
            };

            let message = error.to_string();
            last_error = Some(message.clone());
            tracing::warn!(
                job_id = %job_id,
                chunk_index = index,
                key_id = %lease.key_id,
                code = error.code(),
                error = %message,
                decision = ?decision,
                "Chunk attempt failed"
            );

            match decision {
                RetryDecision::Failover { demote_to } => {
                    self.update(job_id, |job| {
                        job.demoted_keys.insert(lease.key_id);
                        job.chunks[index].excluded_keys.insert(lease.key_id);
                        job.chunks[index].last_error = Some(message.clone());
                    });
                    self.emit(
                        job_id,
                        JobEventKind::KeyDemoted {
                            key_id: lease.key_id,
                            status: demote_to,
                        },
                    );
                    preferred = None;
                }
                RetryDecision::RetryOtherKey { .. } => {
                    self.record_retry(job_id, index, &error, &message);
                    preferred = None;
                }
                RetryDecision::RetrySameKey { delay } => {
                    self.record_retry(job_id, index, &error, &message);
                    preferred = Some(lease.key_id);
                    if let Some(delay) = delay {
                        self.clock.sleep(delay).await;
                    }
                }
                RetryDecision::Fail(terminal) => {
                    self.update(job_id, |job| {
                        job.chunks[index].status = ChunkStatus::Error;
                        job.chunks[index].last_error = Some(terminal.to_string());
                    });
                    return ChunkOutcome::Failed(terminal);
                }
            }
        }
    }

    /// Waits for a usable key: immediately when one is free, until a cooldown lapses,
    /// or until another job releases one. Gives up after the configured wait timeout.
    async fn acquire_key(
        &self,
        job_id: JobId,
        index: usize,
        model: &str,
        exclude: &HashSet<KeyId>,
        preferred: Option<KeyId>,
    ) -> Acquired {
        let started = self.clock.now();
        loop {
            if self.is_cancelled(job_id) {
                return Acquired::Cancelled;
            }

            // Registered before probing the pool so a release in between still wakes us
            let released = self.pool.released();
            tokio::pin!(released);
            released.as_mut().enable();

            if let Some(lease) =
                preferred.and_then(|key_id| self.pool.try_acquire(key_id, job_id, model))
            {
                return Acquired::Lease(lease);
            }
            if let Some(lease) = self.pool.acquire(exclude, job_id, model) {
                return Acquired::Lease(lease);
            }

            let now = self.clock.now();
            let waited = (now - started).to_std().unwrap_or_default();
            let remaining = self.settings.key_wait_timeout.saturating_sub(waited);

            match self.pool.availability(exclude, job_id, model) {
                KeyAvailability::Ready => tokio::task::yield_now().await,
                KeyAvailability::Contended => {
                    if remaining.is_zero() {
                        return Acquired::Exhausted(
                            "every usable key stayed reserved by other jobs".to_string(),
                        );
                    }
                    tokio::select! {
                        _ = released => {}
                        _ = self.clock.sleep(CONTENTION_POLL.min(remaining)) => {}
                    }
                }
                KeyAvailability::CoolingDown { until } => {
                    let wait = (until - now).to_std().unwrap_or_default();
                    if wait > remaining {
                        return Acquired::Exhausted(format!(
                            "every usable key is cooling down or exhausted until {}",
                            until.to_rfc3339()
                        ));
                    }
                    tracing::info!(
                        job_id = %job_id,
                        chunk_index = index,
                        wait_secs = wait.as_secs_f64(),
                        "Waiting for key cooldown"
                    );
                    self.emit(
                        job_id,
                        JobEventKind::WaitingForKey {
                            index,
                            wait_secs: wait.as_secs_f64(),
                        },
                    );
                    self.clock.sleep(wait).await;
                }
                KeyAvailability::Unavailable => {
                    return Acquired::Exhausted("no active key can serve this chunk".to_string());
                }
            }
        }
    }

    async fn assemble(&self, job_id: JobId) {
        let Some((outputs, format)) = self.update(job_id, |job| {
            job.stage = JobStage::Concatenating;
            let outputs: Vec<Vec<u8>> = job
                .chunks
                .iter()
                .filter_map(|chunk| chunk.output.clone())
                .collect();
            (outputs, job.settings.output_format)
        }) else {
            return;
        };
        self.emit(job_id, JobEventKind::Assembling);

        let assembler = self.assembler;
        let buffer = match tokio::task::spawn_blocking(move || assembler.assemble(&outputs)).await {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(e)) => return self.fail_assembly(job_id, e.to_string()),
            Err(e) => return self.fail_assembly(job_id, e.to_string()),
        };

        self.update(job_id, |job| {
            job.stage = match format {
                OutputFormat::Wav => JobStage::Encoding,
                _ => JobStage::Converting,
            };
        });
        let transcoder = self.transcoder.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            encode_artifact(&buffer, format, transcoder.as_deref())
        })
        .await;

        match encoded {
            Ok(Ok(artifact)) => {
                let size = artifact.bytes.len();
                let duration = artifact.duration_secs;
                self.update(job_id, |job| {
                    job.status = JobStatus::Done;
                    job.stage = JobStage::Finished;
                    job.percentage = 100;
                    job.artifact = Some(artifact);
                });
                tracing::info!(
                    job_id = %job_id,
                    size_bytes = size,
                    duration_secs = duration,
                    format = %format,
                    "Job completed"
                );
                self.emit(job_id, JobEventKind::Done);
            }
            Ok(Err(e)) => self.fail_assembly(job_id, e.to_string()),
            Err(e) => self.fail_assembly(job_id, e.to_string()),
        }
    }

    fn can_transcode(&self, format: OutputFormat) -> bool {
        self.transcoder
            .as_ref()
            .map_or(false, |transcoder| transcoder.format() == format)
    }

    fn complete_chunk(&self, job_id: JobId, index: usize, bytes: Vec<u8>, cached: bool) {
        self.update(job_id, |job| {
            let chunk = &mut job.chunks[index];
            chunk.status = ChunkStatus::Done;
            chunk.output = Some(bytes);
            chunk.excluded_keys.clear();
            chunk.last_error = None;
            job.percentage = job.chunk_percentage();
        });
        self.emit(job_id, JobEventKind::ChunkCompleted { index, cached });
    }

    fn record_retry(&self, job_id: JobId, index: usize, error: &SynthesisError, message: &str) {
        self.update(job_id, |job| {
            let chunk = &mut job.chunks[index];
            chunk.retries += 1;
            chunk.last_error = Some(message.to_string());
        });
        self.emit(
            job_id,
            JobEventKind::ChunkRetrying {
                index,
                code: error.code().to_string(),
                message: message.to_string(),
            },
        );
    }

    fn finish_cancelled(&self, job_id: JobId) {
        self.update(job_id, |job| {
            job.status = JobStatus::Cancelled;
            job.stage = JobStage::Finished;
            for chunk in job
                .chunks
                .iter_mut()
                .filter(|c| c.status == ChunkStatus::Processing)
            {
                chunk.status = ChunkStatus::Queued;
            }
        });
        tracing::info!(job_id = %job_id, "Job cancelled");
        self.emit(job_id, JobEventKind::Cancelled);
    }

    fn fail(&self, job_id: JobId, failure: JobFailure) {
        tracing::error!(
            job_id = %job_id,
            code = %failure.code,
            chunk_index = ?failure.chunk_index,
            error = %failure.message,
            "Job failed"
        );
        let kind = JobEventKind::Failed {
            code: failure.code.clone(),
            message: failure.message.clone(),
        };
        self.update(job_id, |job| {
            job.status = JobStatus::Error;
            job.stage = JobStage::Finished;
            job.error = Some(failure);
        });
        self.emit(job_id, kind);
    }

    fn fail_assembly(&self, job_id: JobId, message: String) {
        self.fail(
            job_id,
            JobFailure {
                code: AUDIO_ASSEMBLY_FAILED.to_string(),
                message,
                chunk_index: None,
            },
        );
    }

    fn is_cancelled(&self, job_id: JobId) -> bool {
        self.read(job_id, |job| job.cancel_requested).unwrap_or(true)
    }

    fn read<R>(&self, job_id: JobId, f: impl FnOnce(&Job) -> R) -> Option<R> {
        self.jobs.read().iter().find(|job| job.id == job_id).map(f)
    }

    fn update<R>(&self, job_id: JobId, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let now = self.clock.now();
        let mut jobs = self.jobs.write();
        let job = jobs.iter_mut().find(|job| job.id == job_id)?;
        let result = f(job);
        job.updated_at = now;
        Some(result)
    }

    fn emit(&self, job_id: JobId, kind: JobEventKind) {
        if let Some(progress) = self.read(job_id, Job::progress) {
            self.publish(progress, kind);
        }
    }

    fn publish(&self, progress: JobProgress, kind: JobEventKind) {
        // No subscribers is fine
        let _ = self.events.send(JobEvent {
            job_id: progress.job_id,
            at: self.clock.now(),
            progress,
            kind,
        });
    }
}

fn encode_artifact(
    buffer: &AudioBuffer,
    format: OutputFormat,
    transcoder: Option<&dyn AudioTranscoder>,
) -> Result<Artifact, AudioError> {
    let bytes = match (format, transcoder) {
        (OutputFormat::Wav, _) => encode_wav(buffer)?,
        (_, Some(transcoder)) if transcoder.format() == format => transcoder.transcode(buffer)?,
        _ => {
            return Err(AudioError::Transcode(format!(
                "no transcoder for {}",
                format
            )))
        }
    };
    Ok(Artifact {
        bytes,
        format,
        duration_secs: buffer.duration_secs(),
        sample_rate: buffer.sample_rate,
        channels: buffer.channel_count(),
    })
}
