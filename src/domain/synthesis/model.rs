use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

pub const MIN_SPEED: f32 = 0.25;
pub const MAX_SPEED: f32 = 4.0;

/// Voices accepted by the fallback provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackVoice {
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl FallbackVoice {
    pub const ALL: [FallbackVoice; 6] = [
        FallbackVoice::Alloy,
        FallbackVoice::Echo,
        FallbackVoice::Fable,
        FallbackVoice::Onyx,
        FallbackVoice::Nova,
        FallbackVoice::Shimmer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackVoice::Alloy => "alloy",
            FallbackVoice::Echo => "echo",
            FallbackVoice::Fable => "fable",
            FallbackVoice::Onyx => "onyx",
            FallbackVoice::Nova => "nova",
            FallbackVoice::Shimmer => "shimmer",
        }
    }
}

impl std::fmt::Display for FallbackVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FallbackVoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FallbackVoice::ALL
            .into_iter()
            .find(|voice| voice.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown voice '{}'", s))
    }
}

/// Named speed presets offered to clients
pub const SPEED_PRESETS: [(&str, f32); 4] = [
    ("Normal", 1.0),
    ("Slightly Faster", 1.15),
    ("Faster", 1.25),
    ("Fastest", 1.5),
];

/// Voice settings of a request. Only the fallback provider honours them,
/// the primary voice is fixed configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub voice: FallbackVoice,
    pub speed: f32,
}

impl VoiceConfig {
    pub fn new(voice: FallbackVoice, speed: f32) -> Result<Self, String> {
        if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(format!(
                "Speed must be between {} and {}, got {}",
                MIN_SPEED, MAX_SPEED, speed
            ));
        }
        Ok(Self { voice, speed })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
}

impl AudioFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
        }
    }
}

/// Where the text came from: the extracted article or its summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    #[default]
    Full,
    Summary,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    #[serde(skip_serializing)]
    pub text: String,
    pub title: String,
    pub source: TextSource,
    pub voice: VoiceConfig,
    pub format: AudioFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub content: String,
    /// Byte range of `content` inside the source text
    pub span: Range<usize>,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub index: usize,
    pub audio: Vec<u8>,
    pub provider: String,
    pub role: ProviderRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    Primary,
    Fallback,
}

impl std::fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderRole::Primary => write!(f, "primary"),
            ProviderRole::Fallback => write!(f, "fallback"),
        }
    }
}

/// Bounded exponential backoff applied by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub id: String,
    pub role: ProviderRole,
    pub max_chunk_chars: usize,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    pub primary_segments: usize,
    pub fallback_segments: usize,
    pub fell_back: bool,
}

#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub audio: Vec<u8>,
    pub duration: Duration,
    pub segment_count: usize,
    pub providers: ProviderSummary,
}
