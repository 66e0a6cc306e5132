use super::tts_repository::{read_audio, transport_error, TtsRepository};
use crate::domain::synthesis::{
    ProviderError, ProviderErrorKind, ProviderProfile, ProviderRole, RetryPolicy, VoiceConfig,
};
use async_trait::async_trait;
use serde::Serialize;

pub const PROVIDER_ID: &str = "elevenlabs";

/// 128 kbps, 44.1 kHz MP3
const OUTPUT_FORMAT: &str = "mp3_44100_128";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// ElevenLabs implementation of the primary TTS provider.
///
/// Voice and model are fixed configuration; the request's `VoiceConfig`
/// only applies to the fallback provider. Without an API key every call
/// fails with `Authentication` and no request is sent.
pub struct ElevenLabsTtsRepository {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    voice_id: String,
    model: String,
    profile: ProviderProfile,
}

impl ElevenLabsTtsRepository {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        base_url: String,
        voice_id: String,
        model: String,
        max_chunk_chars: usize,
        retry: RetryPolicy,
    ) -> Self {
        let profile = ProviderProfile {
            id: PROVIDER_ID.to_string(),
            role: ProviderRole::Primary,
            max_chunk_chars,
            retry,
        };

        Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
            voice_id,
            model,
            profile,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn speech_url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.base_url, self.voice_id, OUTPUT_FORMAT
        )
    }
}

#[async_trait]
impl TtsRepository for ElevenLabsTtsRepository {
    fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    async fn synthesize(&self, text: &str, _voice: &VoiceConfig) -> Result<Vec<u8>, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::new(
                PROVIDER_ID,
                ProviderErrorKind::Authentication,
                "ElevenLabs API key is not configured",
            )
        })?;

        let start_time = std::time::Instant::now();
        tracing::debug!(
            voice_id = %self.voice_id,
            model = %self.model,
            text_length = text.chars().count(),
            "Calling ElevenLabs TTS API"
        );

        let response = self
            .client
            .post(self.speech_url())
            .header("xi-api-key", api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model,
            })
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER_ID, e))?;

        let audio = read_audio(PROVIDER_ID, response).await?;

        tracing::info!(
            provider = PROVIDER_ID,
            latency_ms = start_time.elapsed().as_millis() as u64,
            characters_count = text.chars().count(),
            audio_size_bytes = audio.len(),
            "TTS chunk synthesized"
        );

        Ok(audio)
    }
}
