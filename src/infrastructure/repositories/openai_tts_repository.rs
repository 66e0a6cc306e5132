use super::tts_repository::{read_audio, transport_error, TtsRepository};
use crate::domain::synthesis::{
    ProviderError, ProviderErrorKind, ProviderProfile, ProviderRole, RetryPolicy, VoiceConfig,
};
use async_trait::async_trait;
use serde::Serialize;

pub const PROVIDER_ID: &str = "openai";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
    response_format: &'a str,
}

/// OpenAI TTS implementation of the fallback provider
pub struct OpenAiTtsRepository {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    profile: ProviderProfile,
}

impl OpenAiTtsRepository {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        base_url: String,
        model: String,
        max_chunk_chars: usize,
        retry: RetryPolicy,
    ) -> Self {
        let profile = ProviderProfile {
            id: PROVIDER_ID.to_string(),
            role: ProviderRole::Fallback,
            max_chunk_chars,
            retry,
        };

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            profile,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn speech_url(&self) -> String {
        format!("{}/v1/audio/speech", self.base_url)
    }
}

#[async_trait]
impl TtsRepository for OpenAiTtsRepository {
    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn synthesize(&self, text: &str, voice: &VoiceConfig) -> Result<Vec<u8>, ProviderError> {
        if !self.is_configured() {
            return Err(ProviderError::new(
                PROVIDER_ID,
                ProviderErrorKind::Authentication,
                "OpenAI API key is not configured",
            ));
        }

        let start_time = std::time::Instant::now();
        tracing::debug!(
            model = %self.model,
            voice = %voice.voice,
            speed = voice.speed,
            text_length = text.chars().count(),
            "Calling OpenAI TTS API"
        );

        let response = self
            .client
            .post(self.speech_url())
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                input: text,
                voice: voice.voice.as_str(),
                speed: voice.speed,
                response_format: "mp3",
            })
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER_ID, e))?;

        let audio = read_audio(PROVIDER_ID, response).await?;

        let duration = start_time.elapsed();
        let characters_count = text.chars().count();
        let throughput_chars_per_sec = if duration.as_secs_f64() > 0.0 {
            characters_count as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        tracing::info!(
            provider = PROVIDER_ID,
            model = %self.model,
            voice = %voice.voice,
            latency_ms = duration.as_millis() as u64,
            characters_count = characters_count,
            audio_size_bytes = audio.len(),
            throughput_chars_per_sec = format!("{:.2}", throughput_chars_per_sec),
            "TTS chunk synthesized"
        );

        Ok(audio)
    }
}
