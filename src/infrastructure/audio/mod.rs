pub mod ffmpeg;

pub use ffmpeg::FfmpegNormalizer;

use crate::domain::synthesis::mp3::StreamFormat;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoder I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoder exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },
}

/// Re-encodes an MP3 segment so it can be joined with a stream of another
/// format. Implementations must return a complete MP3 stream in `target`.
#[async_trait]
pub trait AudioNormalizer: Send + Sync {
    async fn normalize(&self, audio: &[u8], target: StreamFormat)
        -> Result<Vec<u8>, NormalizeError>;
}
