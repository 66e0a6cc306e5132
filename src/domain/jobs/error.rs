use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum JobServiceError {
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("text too large: {0}")]
    TooLarge(String),
    #[error("job not found")]
    NotFound,
    #[error("session already holds {limit} jobs; delete one before creating another")]
    CapacityExceeded { limit: usize },
    #[error("job is not ready: {0}")]
    NotReady(String),
    #[error("job already finished")]
    AlreadyFinished,
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for JobServiceError {
    fn from(err: std::io::Error) -> Self {
        JobServiceError::Storage(err.to_string())
    }
}

impl From<JobServiceError> for AppError {
    fn from(err: JobServiceError) -> Self {
        match err {
            JobServiceError::Invalid(msg) => AppError::BadRequest(msg),
            JobServiceError::TooLarge(msg) => AppError::PayloadTooLarge(msg),
            JobServiceError::NotFound => AppError::NotFound("Job not found".to_string()),
            JobServiceError::CapacityExceeded { limit } => AppError::CapacityExceeded(limit),
            JobServiceError::NotReady(msg) => AppError::Conflict(msg),
            JobServiceError::AlreadyFinished => {
                AppError::Conflict("Job already finished".to_string())
            }
            JobServiceError::Storage(msg) => AppError::Internal(msg),
            JobServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
