use axum::Router;
use std::sync::Arc;

use crate::{
    controllers::{
        health::HealthController, jobs::JobController, session::SessionController,
        voices::VoiceController,
    },
    domain::{
        jobs::{JobService, JobSettings},
        session::SessionTokens,
        synthesis::{Concatenator, SynthesisService},
    },
    infrastructure::{
        audio::FfmpegNormalizer,
        config::Config,
        http::create_router,
        repositories::{
            build_http_client, ArtifactRepository, ElevenLabsTtsRepository, OpenAiTtsRepository,
        },
    },
};

/// The wired application: the router to serve and the job manager to shut
/// down once serving stops.
pub struct Application {
    pub router: Router,
    pub job_service: Arc<JobService>,
}

impl Application {
    pub async fn build(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        // 1. Storage
        let artifacts = Arc::new(ArtifactRepository::new(config.audio_dir.clone()));
        let swept = artifacts.sweep_stale().await?;
        if swept > 0 {
            tracing::info!(removed = swept, "Removed audio left by a previous run");
        }

        // 2. Providers
        let http_client = build_http_client(config.provider_timeout)?;
        let primary = Arc::new(ElevenLabsTtsRepository::new(
            http_client.clone(),
            config.elevenlabs_api_key.clone(),
            config.elevenlabs_base_url.clone(),
            config.elevenlabs_voice_id.clone(),
            config.elevenlabs_model.clone(),
            config.elevenlabs_max_chunk_chars,
            config.retry.clone(),
        ));
        let fallback = Arc::new(OpenAiTtsRepository::new(
            http_client,
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            config.openai_tts_model.clone(),
            config.openai_max_chunk_chars,
            config.retry.clone(),
        ));
        let primary_configured = primary.is_configured();
        let fallback_configured = fallback.is_configured();
        if !primary_configured {
            tracing::warn!("ELEVENLABS_API_KEY not set; every job will use the fallback voice");
        }

        // 3. Services
        let normalizer = Arc::new(FfmpegNormalizer::new(config.ffmpeg_path.clone()));
        let synthesis = Arc::new(SynthesisService::new(
            primary,
            fallback,
            Concatenator::new(normalizer),
            config.synthesis_concurrency,
        ));
        let job_service = Arc::new(JobService::new(
            synthesis,
            artifacts.clone(),
            JobSettings {
                max_jobs_per_session: config.max_jobs_per_session,
                max_text_chars: config.max_text_chars,
                default_voice: config.fallback_voice,
            },
        ));
        job_service.start_reaper(config.session_reap_interval);
        let session_tokens = Arc::new(SessionTokens::new(
            config.session_secret.clone(),
            config.session_expiration_hours,
        ));

        // 4. Controllers
        let session_controller = Arc::new(SessionController::new(session_tokens.clone()));
        let job_controller = Arc::new(JobController::new(
            job_service.clone(),
            config.max_jobs_per_session,
        ));
        let voice_controller = Arc::new(VoiceController::new(
            config.fallback_voice,
            primary_configured,
        ));
        let health_controller = Arc::new(HealthController::new(
            artifacts,
            primary_configured,
            fallback_configured,
        ));

        let router = create_router(
            session_tokens,
            session_controller,
            job_controller,
            voice_controller,
            health_controller,
        );

        Ok(Self {
            router,
            job_service,
        })
    }
}
