use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use uuid::Uuid;

use crate::{
    domain::audio::WAV_CONTENT_TYPE,
    domain::jobs::{
        ClearedJobsResponse, JobProgress, JobView, NarrationService, NarrationServiceApi,
        SubmitJobRequest,
    },
    error::AppResult,
};

pub struct JobController {
    narration_service: Arc<NarrationService>,
}

impl JobController {
    pub fn new(narration_service: Arc<NarrationService>) -> Self {
        Self { narration_service }
    }

    /// POST /api/jobs - Submit text for narration
    pub async fn submit(
        State(controller): State<Arc<JobController>>,
        Json(request): Json<SubmitJobRequest>,
    ) -> AppResult<(StatusCode, Json<JobProgress>)> {
        let progress = controller.narration_service.submit(request).await?;
        Ok((StatusCode::ACCEPTED, Json(progress)))
    }

    /// GET /api/jobs - Progress of every visible job
    pub async fn list(State(controller): State<Arc<JobController>>) -> Json<Vec<JobProgress>> {
        Json(controller.narration_service.list().await)
    }

    /// DELETE /api/jobs - Drop finished jobs
    pub async fn clear_finished(
        State(controller): State<Arc<JobController>>,
    ) -> Json<ClearedJobsResponse> {
        let removed = controller.narration_service.clear_finished().await;
        Json(ClearedJobsResponse { removed })
    }

    /// GET /api/jobs/{id}
    pub async fn get(
        State(controller): State<Arc<JobController>>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<Json<JobView>> {
        Ok(Json(controller.narration_service.get(job_id).await?))
    }

    /// DELETE /api/jobs/{id} - Acknowledge a finished job
    pub async fn remove(
        State(controller): State<Arc<JobController>>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<StatusCode> {
        controller.narration_service.remove(job_id).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    /// POST /api/jobs/{id}/cancel
    pub async fn cancel(
        State(controller): State<Arc<JobController>>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<Json<JobProgress>> {
        Ok(Json(controller.narration_service.cancel(job_id).await?))
    }

    /// POST /api/jobs/{id}/resume
    pub async fn resume(
        State(controller): State<Arc<JobController>>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<(StatusCode, Json<JobProgress>)> {
        let progress = controller.narration_service.resume(job_id).await?;
        Ok((StatusCode::ACCEPTED, Json(progress)))
    }

    /// GET /api/jobs/{id}/audio - Download the assembled narration
    pub async fn audio(
        State(controller): State<Arc<JobController>>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        let artifact = controller.narration_service.artifact(job_id).await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(artifact.format.content_type()),
        );
        if let Ok(disposition) = HeaderValue::from_str(&format!(
            "attachment; filename=\"narration-{}.{}\"",
            job_id,
            artifact.format.extension()
        )) {
            headers.insert(header::CONTENT_DISPOSITION, disposition);
        }
        if let Ok(duration) = HeaderValue::from_str(&format!("{:.2}", artifact.duration_secs)) {
            headers.insert("X-Duration-Seconds", duration);
        }

        Ok((StatusCode::OK, headers, Body::from(artifact.bytes)))
    }

    /// GET /api/jobs/{id}/chunks/{index}/audio - Download one produced chunk
    pub async fn chunk_audio(
        State(controller): State<Arc<JobController>>,
        Path((job_id, index)): Path<(Uuid, usize)>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        let bytes = controller.narration_service.chunk_audio(job_id, index).await?;

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(WAV_CONTENT_TYPE));
        Ok((StatusCode::OK, headers, Body::from(bytes)))
    }

    /// GET /api/jobs/events - Server-sent job events
    pub async fn events(
        State(controller): State<Arc<JobController>>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let stream = BroadcastStream::new(controller.narration_service.subscribe()).filter_map(
            |message| match message {
                Ok(event) => match Event::default().event("job").json_data(&event) {
                    Ok(sse) => Some(Ok(sse)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to encode job event");
                        None
                    }
                },
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream subscriber lagged");
                    None
                }
            },
        );

        Sse::new(stream).keep_alive(KeepAlive::default())
    }
}
