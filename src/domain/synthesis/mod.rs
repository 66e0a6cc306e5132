pub mod chunker;
pub mod concatenator;
pub mod error;
pub mod model;
pub mod mp3;
pub mod service;

pub use chunker::{chunk_tail, chunk_text, reassemble};
pub use concatenator::Concatenator;
pub use error::{ChunkingError, ConcatenationError, ProviderError, ProviderErrorKind, SynthesisError};
pub use model::{
    AudioFormat, AudioSegment, FallbackVoice, ProviderProfile, ProviderRole, ProviderSummary,
    RetryPolicy, SynthesisRequest, SynthesisResult, TextChunk, TextSource, VoiceConfig,
    MAX_SPEED, MIN_SPEED, SPEED_PRESETS,
};
pub use service::{SynthesisObserver, SynthesisPhase, SynthesisService, SynthesisServiceApi};
