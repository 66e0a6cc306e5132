use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ELEVENLABS_VOICE_ID: &str = "test-voice-id";
pub const ELEVENLABS_PATH: &str = "/v1/text-to-speech/test-voice-id";
pub const OPENAI_PATH: &str = "/v1/audio/speech";

/// MPEG-1 layer III, 128 kbps, 44.1 kHz frames with a silent payload
pub fn mp3_frames(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|_| {
            let mut frame = vec![0u8; 417];
            frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x40]);
            frame
        })
        .collect()
}

/// One wiremock server answering for both TTS providers
pub struct ProviderMocks {
    server: MockServer,
}

impl ProviderMocks {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub async fn primary_returns_audio(&self, frames: usize) {
        self.mount_audio(ELEVENLABS_PATH, frames, None).await;
    }

    /// Primary answers only after `delay`; keeps jobs running
    pub async fn primary_is_slow(&self, delay: Duration) {
        self.mount_audio(ELEVENLABS_PATH, 2, Some(delay)).await;
    }

    pub async fn primary_fails(&self, status: u16, body: Value) {
        self.mount_error(ELEVENLABS_PATH, status, body).await;
    }

    pub async fn fallback_returns_audio(&self, frames: usize) {
        self.mount_audio(OPENAI_PATH, frames, None).await;
    }

    pub async fn fallback_fails(&self, status: u16, body: Value) {
        self.mount_error(OPENAI_PATH, status, body).await;
    }

    /// Requests received on a provider path
    pub async fn request_count(&self, provider_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == provider_path)
            .count()
    }

    async fn mount_audio(&self, provider_path: &str, frames: usize, delay: Option<Duration>) {
        let mut response = ResponseTemplate::new(200)
            .insert_header("content-type", "audio/mpeg")
            .set_body_bytes(mp3_frames(frames));
        if let Some(delay) = delay {
            response = response.set_delay(delay);
        }

        Mock::given(method("POST"))
            .and(path(provider_path))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    async fn mount_error(&self, provider_path: &str, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(provider_path))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}
