use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::infrastructure::repositories::ArtifactRepository;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub struct HealthController {
    artifacts: Arc<ArtifactRepository>,
    primary_configured: bool,
    fallback_configured: bool,
}

impl HealthController {
    pub fn new(
        artifacts: Arc<ArtifactRepository>,
        primary_configured: bool,
        fallback_configured: bool,
    ) -> Self {
        Self {
            artifacts,
            primary_configured,
            fallback_configured,
        }
    }

    /// GET /health/ready - Storage must be writable and the fallback
    /// provider configured. A missing primary only degrades voice quality.
    pub async fn health_ready(State(controller): State<Arc<HealthController>>) -> impl IntoResponse {
        let storage_writable = controller.artifacts.is_writable().await;
        let ready = storage_writable && controller.fallback_configured;

        let status = if ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        let configured = |flag: bool| if flag { "configured" } else { "not_configured" };

        (
            status,
            Json(json!({
                "status": if ready { "ready" } else { "not_ready" },
                "storage": if storage_writable { "writable" } else { "unavailable" },
                "primary": configured(controller.primary_configured),
                "fallback": configured(controller.fallback_configured),
            })),
        )
    }
}
