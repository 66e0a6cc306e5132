use crate::domain::synthesis::{
    AudioFormat, ProviderErrorKind, ProviderRole, ProviderSummary, SynthesisError,
    SynthesisPhase, SynthesisRequest, TextSource, VoiceConfig,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FALLBACK_NOTICE: &str = "fell back to secondary voice";

/// Characters a download file name may not contain
const UNSAFE_FILENAME_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];
const MAX_FILENAME_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Chunking,
    Synthesizing,
    Concatenating,
    Ready,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Chunking => "chunking",
            JobState::Synthesizing => "synthesizing",
            JobState::Concatenating => "concatenating",
            JobState::Ready => "ready",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Ready | JobState::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Chunking => 1,
            JobState::Synthesizing => 2,
            JobState::Concatenating => 3,
            JobState::Ready | JobState::Failed => 4,
        }
    }

    /// States only move forward; `Failed` is reachable from any
    /// non-terminal state and nothing leaves a terminal state.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        !self.is_terminal() && (next == JobState::Failed || next.rank() > self.rank())
    }
}

impl From<SynthesisPhase> for JobState {
    fn from(phase: SynthesisPhase) -> Self {
        match phase {
            SynthesisPhase::Chunking => JobState::Chunking,
            SynthesisPhase::Synthesizing => JobState::Synthesizing,
            SynthesisPhase::Concatenating => JobState::Concatenating,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Chunking,
    Authentication,
    RateLimited,
    QuotaExceeded,
    Transient,
    InvalidInput,
    Concatenation,
    Cancelled,
    Storage,
}

impl From<ProviderErrorKind> for FailureKind {
    fn from(kind: ProviderErrorKind) -> Self {
        match kind {
            ProviderErrorKind::Authentication => FailureKind::Authentication,
            ProviderErrorKind::RateLimited => FailureKind::RateLimited,
            ProviderErrorKind::QuotaExceeded => FailureKind::QuotaExceeded,
            ProviderErrorKind::Transient => FailureKind::Transient,
            ProviderErrorKind::InvalidInput => FailureKind::InvalidInput,
        }
    }
}

/// Why a job failed, as exposed to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub message: String,
}

impl FailureReason {
    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            provider: None,
            message: "job was cancelled".to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Storage,
            provider: None,
            message: message.into(),
        }
    }
}

impl From<SynthesisError> for FailureReason {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::Chunking(e) => Self {
                kind: FailureKind::Chunking,
                provider: None,
                message: e.to_string(),
            },
            SynthesisError::Provider(e) => Self {
                kind: e.kind.into(),
                provider: Some(e.provider),
                message: e.message,
            },
            SynthesisError::Concatenation(e) => Self {
                kind: FailureKind::Concatenation,
                provider: None,
                message: e.to_string(),
            },
            SynthesisError::Cancelled => Self::cancelled(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub completed_segments: usize,
    pub planned_segments: usize,
}

/// Metadata of a finished artifact. The bytes live in the job's storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub file_name: String,
    pub size_bytes: usize,
    pub duration_seconds: f64,
    pub segment_count: usize,
    pub providers: ProviderSummary,
}

/// A synthesis job as seen by its session
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub session_id: Uuid,
    pub title: String,
    pub source: TextSource,
    pub voice: VoiceConfig,
    pub format: AudioFormat,
    pub text_length: usize,
    pub state: JobState,
    pub progress: JobProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_provider: Option<ProviderRole>,
    pub notices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: Uuid, session_id: Uuid, request: &SynthesisRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            session_id,
            title: request.title.clone(),
            source: request.source,
            voice: request.voice,
            format: request.format,
            text_length: request.text.chars().count(),
            state: JobState::Pending,
            progress: JobProgress::default(),
            active_provider: None,
            notices: Vec::new(),
            result: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a non-terminal phase. Returns false if the move is not allowed.
    pub fn advance(&mut self, next: JobState) -> bool {
        if next.is_terminal() || !self.state.can_advance_to(next) {
            return false;
        }
        self.state = next;
        self.updated_at = Utc::now();
        true
    }

    pub fn set_progress(&mut self, completed: usize, planned: usize, active: ProviderRole) {
        if self.state.is_terminal() {
            return;
        }
        self.progress = JobProgress {
            completed_segments: completed,
            planned_segments: planned,
        };
        self.active_provider = Some(active);
        self.updated_at = Utc::now();
    }

    pub fn add_notice(&mut self, notice: impl Into<String>) {
        let notice = notice.into();
        if !self.state.is_terminal() && !self.notices.contains(&notice) {
            self.notices.push(notice);
            self.updated_at = Utc::now();
        }
    }

    pub fn complete(&mut self, result: JobResult) -> bool {
        if !self.state.can_advance_to(JobState::Ready) {
            return false;
        }
        self.progress.completed_segments = result.segment_count;
        self.progress.planned_segments = result.segment_count;
        self.result = Some(result);
        self.state = JobState::Ready;
        self.updated_at = Utc::now();
        true
    }

    pub fn fail(&mut self, reason: FailureReason) -> bool {
        if !self.state.can_advance_to(JobState::Failed) {
            return false;
        }
        self.failure = Some(reason);
        self.state = JobState::Failed;
        self.updated_at = Utc::now();
        true
    }
}

/// Safe attachment name derived from the job title
pub fn download_file_name(title: &str, job_id: Uuid, format: AudioFormat) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !UNSAFE_FILENAME_CHARS.contains(c) && !c.is_control())
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .take(MAX_FILENAME_CHARS)
        .collect();
    let base = cleaned.trim_matches(|c| c == '_' || c == '.' || c == '/');
    let base = if base.is_empty() { "article" } else { base };

    let short_id = job_id.simple().to_string();
    format!("{}_{}.{}", base, &short_id[..8], format.extension())
}
