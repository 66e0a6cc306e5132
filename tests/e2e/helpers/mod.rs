use oriana_backend::app::Application;
use oriana_backend::domain::jobs::{JobService, JobServiceApi};
use oriana_backend::domain::synthesis::{FallbackVoice, RetryPolicy, VoiceConfig};
use oriana_backend::infrastructure::config::{Config, Environment, LogFormat};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_context::AsyncTestContext;
use tokio::net::TcpListener;
use uuid::Uuid;

pub mod api_client;
pub mod provider_mocks;

use api_client::ApiClient;
use provider_mocks::{ProviderMocks, ELEVENLABS_VOICE_ID};

pub const TEST_SESSION_SECRET: &str = "test-session-secret-for-testing-only";
pub const MAX_TEXT_CHARS: usize = 20_000;

pub struct TestContext {
    pub client: ApiClient,
    pub config: Config,
    pub providers: ProviderMocks,
    pub job_service: Arc<JobService>,
    _audio_dir: TempDir,
}

impl AsyncTestContext for TestContext {
    fn setup() -> impl std::future::Future<Output = Self> + Send {
        async {
            let providers = ProviderMocks::start().await;
            let audio_dir = tempfile::tempdir().expect("Failed to create audio dir");

            let config = Config {
                host: "127.0.0.1".to_string(),
                port: 0, // Will be assigned by the OS
                environment: Environment::Development,
                log_format: LogFormat::Pretty,
                session_secret: TEST_SESSION_SECRET.to_string(),
                session_expiration_hours: 1,
                // Sweep expired sessions quickly
                session_reap_interval: Duration::from_millis(50),
                elevenlabs_api_key: Some("test-elevenlabs-key".to_string()),
                elevenlabs_base_url: providers.uri(),
                elevenlabs_voice_id: ELEVENLABS_VOICE_ID.to_string(),
                elevenlabs_model: "eleven_multilingual_v2".to_string(),
                elevenlabs_max_chunk_chars: 2500,
                openai_api_key: "test-openai-key".to_string(),
                openai_base_url: providers.uri(),
                openai_tts_model: "tts-1".to_string(),
                openai_max_chunk_chars: 4096,
                fallback_voice: VoiceConfig::new(FallbackVoice::Alloy, 1.0)
                    .expect("Invalid default voice"),
                audio_dir: audio_dir.path().to_path_buf(),
                max_jobs_per_session: 5,
                synthesis_concurrency: 3,
                // Keep retries fast
                retry: RetryPolicy {
                    max_attempts: 3,
                    initial_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(5),
                },
                provider_timeout: Duration::from_secs(10),
                max_text_chars: MAX_TEXT_CHARS,
                ffmpeg_path: "ffmpeg".to_string(),
            };

            let app = Application::build(&config)
                .await
                .expect("Failed to create app");

            // Start server
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("Failed to bind listener");
            let addr = listener.local_addr().expect("Failed to get local addr");
            let base_url = format!("http://{}", addr);

            let router = app.router;
            tokio::spawn(async move {
                axum::serve(listener, router).await.unwrap();
            });

            Self {
                client: ApiClient::new(&base_url),
                config,
                providers,
                job_service: app.job_service,
                _audio_dir: audio_dir,
            }
        }
    }

    fn teardown(self) -> impl std::future::Future<Output = ()> + Send {
        async move {
            self.job_service.shutdown().await;
        }
    }
}

impl TestContext {
    /// Number of job directories currently on disk
    pub fn job_dirs(&self) -> usize {
        std::fs::read_dir(&self.config.audio_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Sign a session token directly, e.g. to craft expired sessions
pub fn generate_test_jwt(session_id: &Uuid, secret: &str, expires_in_hours: i64) -> String {
    sign_session(session_id, secret, chrono::Duration::hours(expires_in_hours))
}

/// Sign a session token expiring `lifetime` from now (negative for the past)
pub fn sign_session(session_id: &Uuid, secret: &str, lifetime: chrono::Duration) -> String {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: i64,
        iat: i64,
    }

    let now = chrono::Utc::now();
    let claims = Claims {
        sub: session_id.to_string(),
        exp: (now + lifetime).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// An article of `sentences` distinct sentences, about 60 chars each
pub fn article(sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("Sentence number {} of the article talks about rivers. ", i))
        .collect::<String>()
        .trim_end()
        .to_string()
}
