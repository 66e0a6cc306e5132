use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::jobs::{Artifact, CreateJobRequest, Job, JobService, JobServiceApi},
    error::{AppError, AppResult},
    infrastructure::auth::SessionContext,
};

/// Response for GET /api/jobs
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub limit: usize,
}

pub struct JobController {
    job_service: Arc<JobService>,
    max_jobs_per_session: usize,
}

impl JobController {
    pub fn new(job_service: Arc<JobService>, max_jobs_per_session: usize) -> Self {
        Self {
            job_service,
            max_jobs_per_session,
        }
    }

    /// POST /api/jobs - Start a synthesis job
    pub async fn create_job(
        State(controller): State<Arc<JobController>>,
        Extension(session): Extension<SessionContext>,
        Json(request): Json<CreateJobRequest>,
    ) -> AppResult<(StatusCode, Json<Job>)> {
        let job = controller
            .job_service
            .create(session.session_id, session.expires_at, request)
            .await?;
        Ok((StatusCode::ACCEPTED, Json(job)))
    }

    /// GET /api/jobs - List the session's jobs
    pub async fn list_jobs(
        State(controller): State<Arc<JobController>>,
        Extension(session): Extension<SessionContext>,
    ) -> AppResult<Json<JobListResponse>> {
        let jobs = controller.job_service.list_active(session.session_id).await;
        Ok(Json(JobListResponse {
            jobs,
            limit: controller.max_jobs_per_session,
        }))
    }

    /// GET /api/jobs/:jobId - Job status
    pub async fn get_job(
        State(controller): State<Arc<JobController>>,
        Extension(session): Extension<SessionContext>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<Json<Job>> {
        controller
            .job_service
            .get(session.session_id, job_id)
            .await
            .map(Json)
            .ok_or_else(|| AppError::NotFound("Job not found".to_string()))
    }

    /// DELETE /api/jobs/:jobId - Delete a job and its audio
    pub async fn delete_job(
        State(controller): State<Arc<JobController>>,
        Extension(session): Extension<SessionContext>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<StatusCode> {
        controller
            .job_service
            .delete(session.session_id, job_id)
            .await?;
        Ok(StatusCode::NO_CONTENT)
    }

    /// POST /api/jobs/:jobId/cancel - Stop a running job
    pub async fn cancel_job(
        State(controller): State<Arc<JobController>>,
        Extension(session): Extension<SessionContext>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<Json<Job>> {
        let job = controller
            .job_service
            .cancel(session.session_id, job_id)
            .await?;
        Ok(Json(job))
    }

    /// GET /api/jobs/:jobId/audio - Download the finished MP3
    pub async fn get_audio(
        State(controller): State<Arc<JobController>>,
        Extension(session): Extension<SessionContext>,
        Path(job_id): Path<Uuid>,
    ) -> AppResult<(StatusCode, HeaderMap, Body)> {
        let artifact = controller
            .job_service
            .artifact(session.session_id, job_id)
            .await?;

        let headers = audio_headers(&artifact)?;
        Ok((StatusCode::OK, headers, Body::from(artifact.audio)))
    }
}

fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::Internal(format!("Invalid header value: {}", e)))
}

/// `attachment` with an ASCII filename plus the RFC 5987 UTF-8 form
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(file_name)
    )
}

fn audio_headers(artifact: &Artifact) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, header_value(artifact.content_type)?);
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&content_disposition(&artifact.file_name))?,
    );
    headers.insert(
        HeaderName::from_static("x-duration-seconds"),
        header_value(&format!("{:.2}", artifact.duration_seconds))?,
    );
    headers.insert(
        HeaderName::from_static("x-segment-count"),
        header_value(&artifact.segment_count.to_string())?,
    );
    headers.insert(
        HeaderName::from_static("x-fell-back"),
        header_value(&artifact.fell_back.to_string())?,
    );
    Ok(headers)
}
