use crate::domain::synthesis::{ProviderError, ProviderErrorKind, ProviderProfile, VoiceConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Body fragments providers use to report an exhausted account quota
const QUOTA_MARKERS: [&str; 3] = ["quota_exceeded", "insufficient_quota", "exceeds your quota"];

/// Longest provider error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Repository for TTS synthesis of a single chunk.
/// Abstracts the underlying TTS provider (ElevenLabs, OpenAI)
///
/// Implementations send exactly one request per call and never retry:
/// retries, fallback and chunking belong to the synthesis orchestrator.
#[async_trait]
pub trait TtsRepository: Send + Sync {
    /// Static description of the provider: id, role, chunk limit, retry policy
    fn profile(&self) -> &ProviderProfile;

    /// Synthesize one chunk of text to MP3 bytes
    ///
    /// # Errors
    /// Returns a classified `ProviderError`; the kind decides whether the
    /// orchestrator retries, falls back or fails the job
    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, ProviderError>;
}

/// HTTP client shared by the provider repositories
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Map a non-success HTTP status and its body to an error kind
pub fn classify_status(status: StatusCode, body: &str) -> ProviderErrorKind {
    let lowered = body.to_lowercase();
    let names_quota = QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker));

    match status.as_u16() {
        401 | 403 if names_quota => ProviderErrorKind::QuotaExceeded,
        401 | 403 => ProviderErrorKind::Authentication,
        402 => ProviderErrorKind::QuotaExceeded,
        429 if names_quota || lowered.contains("quota") => ProviderErrorKind::QuotaExceeded,
        429 => ProviderErrorKind::RateLimited,
        400 | 404 | 413 | 422 => ProviderErrorKind::InvalidInput,
        408 => ProviderErrorKind::Transient,
        _ if status.is_server_error() => ProviderErrorKind::Transient,
        _ => ProviderErrorKind::InvalidInput,
    }
}

/// Build the error for a rejected request
pub fn status_error(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let kind = classify_status(status, body);
    let excerpt: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    ProviderError::new(provider, kind, format!("HTTP {}: {}", status, excerpt))
}

/// Connection failures, timeouts and broken bodies are worth retrying
pub fn transport_error(provider: &str, err: reqwest::Error) -> ProviderError {
    let message = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        format!("request failed: {}", err)
    };
    ProviderError::new(provider, ProviderErrorKind::Transient, message)
}

/// Read a provider response into audio bytes, classifying failures
pub async fn read_audio(
    provider: &str,
    response: reqwest::Response,
) -> Result<Vec<u8>, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let error = status_error(provider, status, &body);
        tracing::warn!(
            provider = provider,
            status = status.as_u16(),
            kind = %error.kind,
            "TTS provider rejected request"
        );
        return Err(error);
    }

    let audio = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, e))?;

    if audio.is_empty() {
        return Err(ProviderError::new(
            provider,
            ProviderErrorKind::Transient,
            "provider returned an empty audio body",
        ));
    }

    Ok(audio.to_vec())
}
