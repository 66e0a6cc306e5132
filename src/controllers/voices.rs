use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    domain::synthesis::{FallbackVoice, VoiceConfig, MAX_SPEED, MIN_SPEED, SPEED_PRESETS},
    error::AppResult,
};

#[derive(Debug, Serialize)]
pub struct SpeedPreset {
    pub label: &'static str,
    pub speed: f32,
}

/// Response for GET /api/voices
#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<&'static str>,
    pub speed_presets: Vec<SpeedPreset>,
    pub min_speed: f32,
    pub max_speed: f32,
    pub default_voice: &'static str,
    pub default_speed: f32,
    pub primary_available: bool,
}

pub struct VoiceController {
    default_voice: VoiceConfig,
    primary_available: bool,
}

impl VoiceController {
    pub fn new(default_voice: VoiceConfig, primary_available: bool) -> Self {
        Self {
            default_voice,
            primary_available,
        }
    }

    /// GET /api/voices - Fallback voice options and defaults
    pub async fn list_voices(
        State(controller): State<Arc<VoiceController>>,
    ) -> AppResult<Json<VoicesResponse>> {
        Ok(Json(VoicesResponse {
            voices: FallbackVoice::ALL.iter().map(|v| v.as_str()).collect(),
            speed_presets: SPEED_PRESETS
                .iter()
                .map(|&(label, speed)| SpeedPreset { label, speed })
                .collect(),
            min_speed: MIN_SPEED,
            max_speed: MAX_SPEED,
            default_voice: controller.default_voice.voice.as_str(),
            default_speed: controller.default_voice.speed,
            primary_available: controller.primary_available,
        }))
    }
}
