use crate::domain::synthesis::{FallbackVoice, RetryPolicy, VoiceConfig};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub log_format: LogFormat,
    // Sessions
    pub session_secret: String,
    pub session_expiration_hours: i64,
    pub session_reap_interval: Duration,
    // ElevenLabs (primary)
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_base_url: String,
    pub elevenlabs_voice_id: String,
    pub elevenlabs_model: String,
    pub elevenlabs_max_chunk_chars: usize,
    // OpenAI (fallback)
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_tts_model: String,
    pub openai_max_chunk_chars: usize,
    pub fallback_voice: VoiceConfig,
    // Synthesis
    pub audio_dir: PathBuf,
    pub max_jobs_per_session: usize,
    pub synthesis_concurrency: usize,
    pub retry: RetryPolicy,
    pub provider_timeout: Duration,
    pub max_text_chars: usize,
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Read an optional variable, parsing it when present
fn parse_or<T>(name: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value for {}: {}", name, e).into()),
        Err(_) => Ok(default),
    }
}

fn string_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("Missing required environment variable {}", name).into())
}

fn positive(name: &str, value: usize) -> Result<usize, Box<dyn std::error::Error>> {
    if value == 0 {
        return Err(format!("{} must be greater than zero", name).into());
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let fallback_voice = string_or("FALLBACK_VOICE", "alloy")
            .parse::<FallbackVoice>()
            .map_err(|e| format!("Invalid value for FALLBACK_VOICE: {}", e))?;
        let fallback_voice = VoiceConfig::new(fallback_voice, parse_or("FALLBACK_SPEED", 1.0)?)
            .map_err(|e| format!("Invalid value for FALLBACK_SPEED: {}", e))?;

        let retry = RetryPolicy {
            max_attempts: parse_or("RETRY_MAX_ATTEMPTS", 3u32)?.max(1),
            initial_delay: Duration::from_millis(parse_or("RETRY_INITIAL_DELAY_MS", 500u64)?),
            max_delay: Duration::from_millis(parse_or("RETRY_MAX_DELAY_MS", 8000u64)?),
        };

        let config = Config {
            host: string_or("HOST", "0.0.0.0"),
            port: parse_or("PORT", 8080)?,
            environment: match string_or("ENVIRONMENT", "development").as_str() {
                "production" => Environment::Production,
                _ => Environment::Development,
            },
            log_format: match string_or("LOG_FORMAT", "pretty").as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            session_secret: required("SESSION_SECRET")?,
            session_expiration_hours: parse_or("SESSION_EXPIRATION_HOURS", 24)?,
            session_reap_interval: Duration::from_secs(positive(
                "SESSION_REAP_INTERVAL_SECS",
                parse_or("SESSION_REAP_INTERVAL_SECS", 60)?,
            )? as u64),
            elevenlabs_api_key: env::var("ELEVENLABS_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            elevenlabs_base_url: string_or("ELEVENLABS_BASE_URL", "https://api.elevenlabs.io"),
            elevenlabs_voice_id: string_or("ELEVENLABS_VOICE_ID", "21m00Tcm4TlvDq8ikWAM"),
            elevenlabs_model: string_or("ELEVENLABS_MODEL", "eleven_multilingual_v2"),
            elevenlabs_max_chunk_chars: positive(
                "ELEVENLABS_MAX_CHUNK_CHARS",
                parse_or("ELEVENLABS_MAX_CHUNK_CHARS", 2500)?,
            )?,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_base_url: string_or("OPENAI_BASE_URL", "https://api.openai.com"),
            openai_tts_model: string_or("OPENAI_TTS_MODEL", "tts-1"),
            openai_max_chunk_chars: positive(
                "OPENAI_MAX_CHUNK_CHARS",
                parse_or("OPENAI_MAX_CHUNK_CHARS", 4096)?,
            )?,
            fallback_voice,
            audio_dir: PathBuf::from(string_or("AUDIO_DIR", "temp_audio")),
            max_jobs_per_session: positive(
                "MAX_JOBS_PER_SESSION",
                parse_or("MAX_JOBS_PER_SESSION", 5)?,
            )?,
            synthesis_concurrency: positive(
                "SYNTHESIS_CONCURRENCY",
                parse_or("SYNTHESIS_CONCURRENCY", 3)?,
            )?,
            retry,
            provider_timeout: Duration::from_secs(parse_or("PROVIDER_TIMEOUT_SECS", 60u64)?),
            max_text_chars: positive("MAX_TEXT_CHARS", parse_or("MAX_TEXT_CHARS", 100_000)?)?,
            ffmpeg_path: string_or("FFMPEG_PATH", "ffmpeg"),
        };

        Ok(config)
    }
}
