use super::dto::{Artifact, CreateJobRequest};
use super::error::JobServiceError;
use super::language::LanguageNotice;
use super::model::{
    download_file_name, FailureReason, Job, JobResult, JobState, FALLBACK_NOTICE,
};
use crate::domain::synthesis::{
    AudioFormat, FallbackVoice, ProviderError, ProviderRole, SynthesisObserver, SynthesisPhase,
    SynthesisRequest, SynthesisServiceApi, VoiceConfig,
};
use crate::infrastructure::repositories::{ArtifactRepository, JobStorage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

const DEFAULT_TITLE: &str = "Untitled article";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub max_jobs_per_session: usize,
    pub max_text_chars: usize,
    pub default_voice: VoiceConfig,
}

fn artifact_file(format: AudioFormat) -> String {
    format!("audio.{}", format.extension())
}

/// Everything the manager holds for one job. The record mutex is only held
/// to apply a single change, never across an `.await`.
struct JobHandle {
    id: Uuid,
    session_id: Uuid,
    /// Once the session's token expires nobody can reach the job again
    session_expires_at: DateTime<Utc>,
    job: Mutex<Job>,
    cancel: CancellationToken,
    storage: JobStorage,
}

impl JobHandle {
    fn snapshot(&self) -> Job {
        self.job.lock().clone()
    }

    async fn release_storage(&self) {
        if let Err(e) = self.storage.release().await {
            tracing::error!(job_id = %self.id, error = %e, "Failed to release job storage");
        }
    }
}

impl SynthesisObserver for JobHandle {
    fn on_phase(&self, phase: SynthesisPhase) {
        let state = JobState::from(phase);
        if self.job.lock().advance(state) {
            tracing::debug!(job_id = %self.id, state = state.as_str(), "Job state changed");
        }
    }

    fn on_progress(&self, completed_segments: usize, planned_segments: usize, active: ProviderRole) {
        self.job
            .lock()
            .set_progress(completed_segments, planned_segments, active);
    }

    fn on_fallback(&self, reason: &ProviderError) {
        tracing::warn!(
            job_id = %self.id,
            provider = %reason.provider,
            kind = %reason.kind,
            "Job fell back to secondary voice"
        );
        self.job.lock().add_notice(FALLBACK_NOTICE);
    }
}

pub struct JobService {
    synthesis: Arc<dyn SynthesisServiceApi>,
    artifacts: Arc<ArtifactRepository>,
    language: LanguageNotice,
    settings: JobSettings,
    jobs: Mutex<HashMap<Uuid, Arc<JobHandle>>>,
    tasks: TaskTracker,
    stopping: CancellationToken,
}

impl JobService {
    pub fn new(
        synthesis: Arc<dyn SynthesisServiceApi>,
        artifacts: Arc<ArtifactRepository>,
        settings: JobSettings,
    ) -> Self {
        Self {
            synthesis,
            artifacts,
            language: LanguageNotice::new(),
            settings,
            jobs: Mutex::new(HashMap::new()),
            tasks: TaskTracker::new(),
            stopping: CancellationToken::new(),
        }
    }

    /// Periodically delete the jobs of sessions whose token has expired.
    /// Runs on the job tracker and stops at `shutdown`.
    pub fn start_reaper(self: &Arc<Self>, every: Duration) {
        let service: Weak<Self> = Arc::downgrade(self);
        let stopping = self.stopping.clone();

        self.tasks.spawn(
            async move {
                let mut ticks = tokio::time::interval(every);
                ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // the first tick completes immediately
                ticks.tick().await;

                loop {
                    tokio::select! {
                        _ = stopping.cancelled() => break,
                        _ = ticks.tick() => {}
                    }
                    let Some(service) = service.upgrade() else {
                        break;
                    };
                    service.reap_expired(Utc::now()).await;
                }
                tracing::debug!("Session reaper stopped");
            }
            .instrument(tracing::info_span!("session_reaper")),
        );
    }

    /// Delete every job whose session expired at or before `now`.
    /// Returns the number of jobs removed.
    pub async fn reap_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<(Uuid, Uuid)> = self
            .jobs
            .lock()
            .values()
            .filter(|handle| handle.session_expires_at <= now)
            .map(|handle| (handle.session_id, handle.id))
            .collect();

        for (session_id, job_id) in &expired {
            if let Err(e) = self.delete(*session_id, *job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "Failed to delete expired job");
            }
        }

        if !expired.is_empty() {
            tracing::info!(removed = expired.len(), "Deleted jobs of expired sessions");
        }
        expired.len()
    }
}

#[async_trait]
pub trait JobServiceApi: Send + Sync {
    /// Validate the request, reserve a slot in the session and start
    /// synthesis in the background. Fails with `CapacityExceeded` when the
    /// session already holds the maximum number of jobs.
    async fn create(
        &self,
        session_id: Uuid,
        session_expires_at: DateTime<Utc>,
        request: CreateJobRequest,
    ) -> Result<Job, JobServiceError>;

    /// Snapshot of a job; jobs of other sessions are invisible
    async fn get(&self, session_id: Uuid, job_id: Uuid) -> Option<Job>;

    /// All jobs held by the session, oldest first
    async fn list_active(&self, session_id: Uuid) -> Vec<Job>;

    /// Cancel the job if running and release its storage. Idempotent.
    async fn delete(&self, session_id: Uuid, job_id: Uuid) -> Result<(), JobServiceError>;

    async fn cancel(&self, session_id: Uuid, job_id: Uuid) -> Result<Job, JobServiceError>;

    /// Audio of a `Ready` job
    async fn artifact(&self, session_id: Uuid, job_id: Uuid) -> Result<Artifact, JobServiceError>;

    /// Cancel every job and release all storage
    async fn shutdown(&self);
}

#[async_trait]
impl JobServiceApi for JobService {
    async fn create(
        &self,
        session_id: Uuid,
        session_expires_at: DateTime<Utc>,
        request: CreateJobRequest,
    ) -> Result<Job, JobServiceError> {
        let request = self.build_request(request)?;
        let job_id = Uuid::new_v4();

        let mut job = Job::new(job_id, session_id, &request);
        if let Some(notice) = self.language.notice_for(&request.text) {
            job.add_notice(notice);
        }

        let handle = Arc::new(JobHandle {
            id: job_id,
            session_id,
            session_expires_at,
            job: Mutex::new(job),
            cancel: CancellationToken::new(),
            storage: self.artifacts.allocate(job_id).await?,
        });

        let admitted = {
            let mut jobs = self.jobs.lock();
            let held = jobs
                .values()
                .filter(|handle| handle.session_id == session_id)
                .count();
            if held >= self.settings.max_jobs_per_session {
                tracing::warn!(
                    session_id = %session_id,
                    held = held,
                    limit = self.settings.max_jobs_per_session,
                    "Job rejected: session at capacity"
                );
                false
            } else {
                jobs.insert(job_id, handle.clone());
                true
            }
        };

        if !admitted {
            handle.release_storage().await;
            return Err(JobServiceError::CapacityExceeded {
                limit: self.settings.max_jobs_per_session,
            });
        }

        let snapshot = handle.snapshot();
        tracing::info!(
            job_id = %job_id,
            session_id = %session_id,
            title = %request.title,
            source = ?request.source,
            text_length = snapshot.text_length,
            voice = %request.voice.voice,
            speed = request.voice.speed,
            "Synthesis job created"
        );

        let span = tracing::info_span!("job", job_id = %job_id, session_id = %session_id);
        self.tasks
            .spawn(run_job(self.synthesis.clone(), handle, request).instrument(span));

        Ok(snapshot)
    }

    async fn get(&self, session_id: Uuid, job_id: Uuid) -> Option<Job> {
        self.find(session_id, job_id).map(|handle| handle.snapshot())
    }

    async fn list_active(&self, session_id: Uuid) -> Vec<Job> {
        let handles: Vec<Arc<JobHandle>> = self
            .jobs
            .lock()
            .values()
            .filter(|handle| handle.session_id == session_id)
            .cloned()
            .collect();

        let mut jobs: Vec<Job> = handles.iter().map(|handle| handle.snapshot()).collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    async fn delete(&self, session_id: Uuid, job_id: Uuid) -> Result<(), JobServiceError> {
        let removed = {
            let mut jobs = self.jobs.lock();
            match jobs.get(&job_id) {
                Some(handle) if handle.session_id == session_id => jobs.remove(&job_id),
                _ => None,
            }
        };

        let Some(handle) = removed else {
            tracing::debug!(job_id = %job_id, "Delete of unknown job ignored");
            return Ok(());
        };

        handle.cancel.cancel();
        handle.job.lock().fail(FailureReason::cancelled());
        handle.release_storage().await;

        tracing::info!(job_id = %job_id, session_id = %session_id, "Job deleted");
        Ok(())
    }

    async fn cancel(&self, session_id: Uuid, job_id: Uuid) -> Result<Job, JobServiceError> {
        let handle = self
            .find(session_id, job_id)
            .ok_or(JobServiceError::NotFound)?;

        if !handle.job.lock().fail(FailureReason::cancelled()) {
            return Err(JobServiceError::AlreadyFinished);
        }
        handle.cancel.cancel();

        tracing::info!(job_id = %job_id, session_id = %session_id, "Job cancelled");
        Ok(handle.snapshot())
    }

    async fn artifact(&self, session_id: Uuid, job_id: Uuid) -> Result<Artifact, JobServiceError> {
        let handle = self
            .find(session_id, job_id)
            .ok_or(JobServiceError::NotFound)?;

        let (result, format) = {
            let job = handle.job.lock();
            match (job.state, &job.result) {
                (JobState::Ready, Some(result)) => (result.clone(), job.format),
                (JobState::Failed, _) => {
                    return Err(JobServiceError::NotReady(
                        "Job failed; no audio is available".to_string(),
                    ))
                }
                (state, _) => {
                    return Err(JobServiceError::NotReady(format!(
                        "Job is still {}",
                        state.as_str()
                    )))
                }
            }
        };

        let audio = handle.storage.read_artifact(&artifact_file(format)).await?;

        Ok(Artifact {
            file_name: result.file_name,
            content_type: format.content_type(),
            audio,
            duration_seconds: result.duration_seconds,
            segment_count: result.segment_count,
            fell_back: result.providers.fell_back,
        })
    }

    async fn shutdown(&self) {
        self.stopping.cancel();

        let handles: Vec<Arc<JobHandle>> =
            self.jobs.lock().drain().map(|(_, handle)| handle).collect();

        for handle in &handles {
            handle.cancel.cancel();
            handle.job.lock().fail(FailureReason::cancelled());
        }

        self.tasks.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.tasks.wait())
            .await
            .is_err()
        {
            tracing::warn!("Synthesis tasks still running at shutdown");
        }

        for handle in &handles {
            handle.release_storage().await;
        }

        tracing::info!(released = handles.len(), "Job manager shut down");
    }
}

impl JobService {
    fn find(&self, session_id: Uuid, job_id: Uuid) -> Option<Arc<JobHandle>> {
        self.jobs
            .lock()
            .get(&job_id)
            .filter(|handle| handle.session_id == session_id)
            .cloned()
    }

    fn build_request(&self, request: CreateJobRequest) -> Result<SynthesisRequest, JobServiceError> {
        if request.text.trim().is_empty() {
            return Err(JobServiceError::Invalid("Text cannot be empty".to_string()));
        }

        let text_length = request.text.chars().count();
        if text_length > self.settings.max_text_chars {
            return Err(JobServiceError::TooLarge(format!(
                "Text must be {} characters or less, got {}",
                self.settings.max_text_chars, text_length
            )));
        }

        let voice = match request.voice.as_deref() {
            Some(voice) => voice
                .parse::<FallbackVoice>()
                .map_err(JobServiceError::Invalid)?,
            None => self.settings.default_voice.voice,
        };
        let speed = request.speed.unwrap_or(self.settings.default_voice.speed);
        let voice = VoiceConfig::new(voice, speed).map_err(JobServiceError::Invalid)?;

        let title = request
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        Ok(SynthesisRequest {
            text: request.text,
            title,
            source: request.source.unwrap_or_default(),
            voice,
            format: request.format.unwrap_or_default(),
        })
    }
}

async fn run_job(
    synthesis: Arc<dyn SynthesisServiceApi>,
    handle: Arc<JobHandle>,
    request: SynthesisRequest,
) {
    let start_time = std::time::Instant::now();

    let result = match synthesis
        .synthesize(&request, &handle.cancel, handle.as_ref())
        .await
    {
        Ok(result) => result,
        Err(err) => {
            let reason = FailureReason::from(err);
            if handle.job.lock().fail(reason.clone()) {
                tracing::error!(
                    kind = ?reason.kind,
                    provider = reason.provider.as_deref().unwrap_or("-"),
                    error = %reason.message,
                    "Synthesis job failed"
                );
            }
            return;
        }
    };

    if let Err(e) = handle
        .storage
        .write_artifact(&artifact_file(request.format), &result.audio)
        .await
    {
        if handle.job.lock().fail(FailureReason::storage(e.to_string())) {
            tracing::error!(error = %e, "Failed to store job artifact");
        }
        return;
    }

    let job_result = JobResult {
        file_name: download_file_name(&request.title, handle.id, request.format),
        size_bytes: result.audio.len(),
        duration_seconds: result.duration.as_secs_f64(),
        segment_count: result.segment_count,
        providers: result.providers,
    };

    if handle.job.lock().complete(job_result) {
        tracing::info!(
            latency_ms = start_time.elapsed().as_millis() as u64,
            audio_size_bytes = result.audio.len(),
            duration_secs = result.duration.as_secs_f64(),
            segment_count = result.segment_count,
            "Synthesis job ready"
        );
    } else {
        tracing::debug!("Job ended before its result was stored");
    }
}
