use super::chunker::{chunk_tail, chunk_text};
use super::concatenator::Concatenator;
use super::error::{ProviderError, ProviderErrorKind, SynthesisError};
use super::model::{
    AudioSegment, ProviderRole, SynthesisRequest, SynthesisResult, TextChunk, VoiceConfig,
};
use crate::infrastructure::repositories::TtsRepository;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Phases a synthesis run moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisPhase {
    Chunking,
    Synthesizing,
    Concatenating,
}

/// Receives progress from a running synthesis. Calls are synchronous and
/// must not block.
pub trait SynthesisObserver: Send + Sync {
    fn on_phase(&self, phase: SynthesisPhase);
    fn on_progress(&self, completed_segments: usize, planned_segments: usize, active: ProviderRole);
    fn on_fallback(&self, reason: &ProviderError);
}

/// What to do after a chunk finally failed on the active provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escalation {
    SwitchToFallback,
    Fail,
}

fn escalate(active: ProviderRole, kind: ProviderErrorKind) -> Escalation {
    match (active, kind) {
        (
            ProviderRole::Primary,
            ProviderErrorKind::Authentication
            | ProviderErrorKind::QuotaExceeded
            | ProviderErrorKind::RateLimited,
        ) => Escalation::SwitchToFallback,
        _ => Escalation::Fail,
    }
}

fn is_retryable(kind: ProviderErrorKind) -> bool {
    matches!(
        kind,
        ProviderErrorKind::RateLimited | ProviderErrorKind::Transient
    )
}

enum CallError {
    Provider(ProviderError),
    /// The chunk was superseded by a fallback switch
    Aborted,
}

type ChunkOutcome = (usize, Result<AudioSegment, CallError>);

pub struct SynthesisService {
    primary: Arc<dyn TtsRepository>,
    fallback: Arc<dyn TtsRepository>,
    concatenator: Concatenator,
    concurrency: usize,
}

impl SynthesisService {
    pub fn new(
        primary: Arc<dyn TtsRepository>,
        fallback: Arc<dyn TtsRepository>,
        concatenator: Concatenator,
        concurrency: usize,
    ) -> Self {
        Self {
            primary,
            fallback,
            concatenator,
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
pub trait SynthesisServiceApi: Send + Sync {
    /// Turn the request text into one MP3 stream.
    ///
    /// This operation:
    /// - Chunks the text for the primary provider
    /// - Synthesizes chunks with bounded concurrency, retrying rate limits
    ///   and transient failures with backoff
    /// - Switches to the fallback provider for the rest of the text on
    ///   authentication, quota or exhausted rate-limit failures
    /// - Concatenates the segments in index order
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
        observer: &dyn SynthesisObserver,
    ) -> Result<SynthesisResult, SynthesisError>;
}

#[async_trait]
impl SynthesisServiceApi for SynthesisService {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        cancel: &CancellationToken,
        observer: &dyn SynthesisObserver,
    ) -> Result<SynthesisResult, SynthesisError> {
        observer.on_phase(SynthesisPhase::Chunking);
        let chunks = chunk_text(&request.text, self.primary.profile().max_chunk_chars)?;
        tracing::info!(
            chunk_count = chunks.len(),
            text_length = request.text.chars().count(),
            max_chunk_chars = self.primary.profile().max_chunk_chars,
            "Text chunked"
        );

        observer.on_phase(SynthesisPhase::Synthesizing);
        let segments = self
            .synthesize_chunks(&request.text, chunks, &request.voice, cancel, observer)
            .await?;

        observer.on_phase(SynthesisPhase::Concatenating);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SynthesisError::Cancelled),
            result = self.concatenator.concatenate(segments) => Ok(result?),
        }
    }
}

impl SynthesisService {
    /// Sliding window over the chunk plan. Results are committed strictly by
    /// index through a reorder buffer; a fallback switch replaces the plan
    /// from the failed index onwards.
    async fn synthesize_chunks(
        &self,
        text: &str,
        mut plan: Vec<TextChunk>,
        voice: &VoiceConfig,
        cancel: &CancellationToken,
        observer: &dyn SynthesisObserver,
    ) -> Result<Vec<AudioSegment>, SynthesisError> {
        let mut active = self.primary.clone();
        let mut committed: Vec<AudioSegment> = Vec::with_capacity(plan.len());
        let mut buffer: BTreeMap<usize, AudioSegment> = BTreeMap::new();
        let mut chunk_tokens: BTreeMap<usize, CancellationToken> = BTreeMap::new();
        let mut in_flight = FuturesUnordered::new();
        let mut next_dispatch = 0;
        let mut pending_switch: Option<(usize, ProviderError)> = None;

        observer.on_progress(0, plan.len(), ProviderRole::Primary);

        loop {
            while pending_switch.is_none()
                && in_flight.len() < self.concurrency
                && next_dispatch < plan.len()
            {
                let chunk = plan[next_dispatch].clone();
                let token = cancel.child_token();
                chunk_tokens.insert(chunk.index, token.clone());
                in_flight.push(call_with_retry(active.clone(), chunk, *voice, token));
                next_dispatch += 1;
            }

            if in_flight.is_empty() {
                let Some((failed_index, reason)) = pending_switch.take() else {
                    break;
                };

                let tail_start = plan[failed_index].span.start;
                let tail = chunk_tail(
                    text,
                    tail_start,
                    self.fallback.profile().max_chunk_chars,
                    failed_index,
                )?;
                plan.truncate(failed_index);
                plan.extend(tail);
                next_dispatch = failed_index;
                active = self.fallback.clone();

                tracing::warn!(
                    failed_index = failed_index,
                    from = %reason.provider,
                    to = %active.profile().id,
                    kind = %reason.kind,
                    planned_segments = plan.len(),
                    "Switched to fallback provider for remaining text"
                );
                observer.on_fallback(&reason);
                observer.on_progress(committed.len(), plan.len(), ProviderRole::Fallback);
                continue;
            }

            let (index, outcome) = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SynthesisError::Cancelled),
                Some(outcome) = in_flight.next() => outcome,
            };
            chunk_tokens.remove(&index);

            let superseded = pending_switch
                .as_ref()
                .is_some_and(|(failed_index, _)| index >= *failed_index);

            match outcome {
                Err(CallError::Aborted) => continue,
                _ if superseded => continue,
                Ok(segment) => {
                    buffer.insert(index, segment);
                    while let Some(segment) = buffer.remove(&committed.len()) {
                        committed.push(segment);
                    }
                    observer.on_progress(committed.len(), plan.len(), active.profile().role);
                }
                Err(CallError::Provider(error)) => {
                    if escalate(active.profile().role, error.kind) == Escalation::Fail {
                        tracing::error!(
                            chunk_index = index,
                            provider = %error.provider,
                            kind = %error.kind,
                            error = %error.message,
                            "Chunk synthesis failed"
                        );
                        return Err(error.into());
                    }

                    tracing::warn!(
                        chunk_index = index,
                        provider = %error.provider,
                        kind = %error.kind,
                        "Primary provider unavailable, falling back"
                    );

                    // discard everything at or after the failed index
                    drop(buffer.split_off(&index));
                    for token in chunk_tokens.range(index + 1..).map(|(_, token)| token) {
                        token.cancel();
                    }
                    pending_switch = Some((index, error));
                }
            }
        }

        debug_assert_eq!(committed.len(), plan.len());
        Ok(committed)
    }
}

/// Synthesize one chunk on one provider, retrying rate limits and transient
/// failures with bounded exponential backoff. Sleeps are cancellable.
async fn call_with_retry(
    provider: Arc<dyn TtsRepository>,
    chunk: TextChunk,
    voice: VoiceConfig,
    cancel: CancellationToken,
) -> ChunkOutcome {
    let profile = provider.profile();
    let mut attempt = 1;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (chunk.index, Err(CallError::Aborted)),
            result = provider.synthesize(&chunk.content, &voice) => result,
        };

        match result {
            Ok(audio) => {
                tracing::debug!(
                    chunk_index = chunk.index,
                    provider = %profile.id,
                    attempt = attempt,
                    audio_size_bytes = audio.len(),
                    "Chunk synthesized"
                );
                let segment = AudioSegment {
                    index: chunk.index,
                    audio,
                    provider: profile.id.clone(),
                    role: profile.role,
                };
                return (chunk.index, Ok(segment));
            }
            Err(error) if is_retryable(error.kind) && attempt < profile.retry.max_attempts => {
                let delay = profile.retry.delay_for(attempt);
                tracing::warn!(
                    chunk_index = chunk.index,
                    provider = %profile.id,
                    kind = %error.kind,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying chunk after backoff"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (chunk.index, Err(CallError::Aborted)),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(error) => return (chunk.index, Err(CallError::Provider(error))),
        }
    }
}
