pub mod dto;
pub mod error;
pub mod language;
pub mod model;
pub mod service;

pub use dto::{Artifact, CreateJobRequest};
pub use error::JobServiceError;
pub use language::{LanguageCode, LanguageNotice};
pub use model::{
    download_file_name, FailureKind, FailureReason, Job, JobProgress, JobResult, JobState,
    FALLBACK_NOTICE,
};
pub use service::{JobService, JobServiceApi, JobSettings};
