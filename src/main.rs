use oriana_backend::app::Application;
use oriana_backend::domain::jobs::JobServiceApi;
use oriana_backend::infrastructure::audio::FfmpegNormalizer;
use oriana_backend::infrastructure::config::{Config, LogFormat};
use oriana_backend::infrastructure::http::start_http_server;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        environment = ?config.environment,
        "Starting Oriana Backend on {}:{}",
        config.host,
        config.port
    );

    if !FfmpegNormalizer::new(config.ffmpeg_path.clone())
        .is_available()
        .await
    {
        tracing::warn!(
            ffmpeg_path = %config.ffmpeg_path,
            "FFmpeg not found; jobs that mix audio formats will fail"
        );
    }

    let config = Arc::new(config);
    let app = Application::build(&config).await?;

    start_http_server(config, app.router).await?;

    app.job_service.shutdown().await;
    tracing::info!("Oriana Backend stopped");

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "oriana_backend=debug,tower_http=debug".into());

    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
