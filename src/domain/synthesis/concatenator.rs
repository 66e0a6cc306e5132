use super::error::ConcatenationError;
use super::model::{AudioSegment, ProviderRole, ProviderSummary, SynthesisResult};
use super::mp3::Mp3Stream;
use crate::infrastructure::audio::AudioNormalizer;
use std::sync::Arc;
use std::time::Duration;

/// Joins ordered MP3 segments into one stream.
///
/// The stream format of segment 0 is the target; segments in another format
/// are re-encoded through the normalizer before their frames are appended.
pub struct Concatenator {
    normalizer: Arc<dyn AudioNormalizer>,
}

impl Concatenator {
    pub fn new(normalizer: Arc<dyn AudioNormalizer>) -> Self {
        Self { normalizer }
    }

    pub async fn concatenate(
        &self,
        segments: Vec<AudioSegment>,
    ) -> Result<SynthesisResult, ConcatenationError> {
        check_contiguous(&segments)?;

        let mut streams = Vec::with_capacity(segments.len());
        for segment in &segments {
            let stream = Mp3Stream::parse(&segment.audio).map_err(|reason| {
                ConcatenationError::Corrupt {
                    index: segment.index,
                    reason,
                }
            })?;
            streams.push(stream);
        }

        let target = streams[0].format;
        for (segment, stream) in segments.iter().zip(streams.iter_mut()) {
            if stream.format == target {
                continue;
            }

            tracing::info!(
                segment_index = segment.index,
                provider = %segment.provider,
                from = %stream.format,
                to = %target,
                "Normalizing segment to stream format"
            );

            let converted = self
                .normalizer
                .normalize(&segment.audio, target)
                .await
                .map_err(|e| ConcatenationError::Normalization {
                    index: segment.index,
                    reason: e.to_string(),
                })?;
            let normalized = Mp3Stream::parse(&converted).map_err(|reason| {
                ConcatenationError::Normalization {
                    index: segment.index,
                    reason,
                }
            })?;
            if normalized.format != target {
                return Err(ConcatenationError::FormatMismatch {
                    index: segment.index,
                    expected: target.to_string(),
                    found: normalized.format.to_string(),
                });
            }
            *stream = normalized;
        }

        let total_len = streams.iter().map(|s| s.frames.len()).sum();
        let mut audio = Vec::with_capacity(total_len);
        let mut total_samples = 0u64;
        for stream in &streams {
            audio.extend_from_slice(&stream.frames);
            total_samples += stream.total_samples;
        }

        let fallback_segments = segments
            .iter()
            .filter(|s| s.role == ProviderRole::Fallback)
            .count();
        let providers = ProviderSummary {
            primary_segments: segments.len() - fallback_segments,
            fallback_segments,
            fell_back: fallback_segments > 0,
        };

        let duration =
            Duration::from_secs_f64(total_samples as f64 / f64::from(target.sample_rate));

        tracing::info!(
            segment_count = segments.len(),
            audio_size_bytes = audio.len(),
            duration_secs = duration.as_secs_f64(),
            fell_back = providers.fell_back,
            "Audio segments concatenated"
        );

        Ok(SynthesisResult {
            audio,
            duration,
            segment_count: segments.len(),
            providers,
        })
    }
}

fn check_contiguous(segments: &[AudioSegment]) -> Result<(), ConcatenationError> {
    if segments.is_empty() {
        return Err(ConcatenationError::Empty);
    }
    for (expected, segment) in segments.iter().enumerate() {
        if segment.index != expected {
            return Err(ConcatenationError::Gap {
                expected,
                found: segment.index,
            });
        }
    }
    Ok(())
}
