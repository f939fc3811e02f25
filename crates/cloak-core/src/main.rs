use anyhow::Context;
use cloak_core::camera::CameraSession;
use cloak_core::config::{Config, DEFAULT_CONFIG_PATH};
use cloak_core::effect::{EffectState, SharedEffect};
use cloak_core::streamer::{StreamSettings, VideoStreamer};
use cloak_core::streaming::{run_server, AppState};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let (mut config, load_error) = match Config::from_file(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env_overrides();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.system.log_level)),
        )
        .init();

    if let Some(e) = load_error {
        tracing::warn!(error = %e, path = %config_path.display(), "Using default configuration");
    }
    tracing::info!("Invisibility cloak waking up...");

    let session =
        CameraSession::open(config.camera.clone()).context("failed to start camera thread")?;
    let effect = SharedEffect::new(EffectState::from_config(&config.effect));
    let streamer = VideoStreamer::new(session.handle(), effect, StreamSettings::from_config(&config));
    let state = AppState::new(streamer, config);

    // Closing the camera ends every open video feed, which lets the
    // graceful shutdown finish.
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down, releasing camera");
        if let Err(e) = tokio::task::spawn_blocking(move || session.shutdown()).await {
            tracing::error!(error = %e, "camera shutdown failed");
        }
    };

    run_server(state, shutdown).await
}
