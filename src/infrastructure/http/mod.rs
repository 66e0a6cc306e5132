use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::infrastructure::config::Config;
use crate::{
    controllers::{
        health::{self, HealthController},
        jobs::JobController,
        session::SessionController,
        voices::VoiceController,
    },
    domain::session::SessionTokens,
    infrastructure::auth::{request_id_middleware, session_middleware},
};

/// Build the application router with all routes configured
pub fn create_router(
    session_tokens: Arc<SessionTokens>,
    session_controller: Arc<SessionController>,
    job_controller: Arc<JobController>,
    voice_controller: Arc<VoiceController>,
    health_controller: Arc<HealthController>,
) -> Router {
    // Session routes (public - this is where tokens come from)
    let session_routes = Router::new()
        .route("/api/sessions", post(SessionController::create_session))
        .with_state(session_controller);

    // Voice routes (require a session)
    let voice_routes = Router::new()
        .route("/api/voices", get(VoiceController::list_voices))
        .with_state(voice_controller)
        .layer(middleware::from_fn_with_state(
            session_tokens.clone(),
            session_middleware,
        ));

    // Job routes (require a session)
    let job_routes = Router::new()
        .route(
            "/api/jobs",
            get(JobController::list_jobs).post(JobController::create_job),
        )
        .route(
            "/api/jobs/:jobId",
            get(JobController::get_job).delete(JobController::delete_job),
        )
        .route("/api/jobs/:jobId/cancel", post(JobController::cancel_job))
        .route("/api/jobs/:jobId/audio", get(JobController::get_audio))
        .with_state(job_controller)
        .layer(middleware::from_fn_with_state(
            session_tokens.clone(),
            session_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(HealthController::health_ready))
        .with_state(health_controller)
        .merge(session_routes)
        .merge(voice_routes)
        .merge(job_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Serve the router until Ctrl-C is received
pub async fn start_http_server(
    config: Arc<Config>,
    app: Router,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}
