pub mod artifact_repository;
pub mod elevenlabs_tts_repository;
pub mod openai_tts_repository;
pub mod tts_repository;

pub use artifact_repository::{ArtifactRepository, JobStorage};
pub use elevenlabs_tts_repository::ElevenLabsTtsRepository;
pub use openai_tts_repository::OpenAiTtsRepository;
pub use tts_repository::{build_http_client, TtsRepository};
