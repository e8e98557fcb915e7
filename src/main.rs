//! Face Inference Service
//!
//! Face detection, embedding and attribute analysis over HTTP, with
//! OpenVINO acceleration.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use faceserve::api::{create_rest_router, AppState};
use faceserve::config::Config;
use faceserve::provider::{create_provider, FaceProvider};
use faceserve::service::FaceService;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize logging
    let level = config.server.log_level.parse().unwrap_or(Level::INFO);
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .init();

    info!("Starting Face Inference Service v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded:");
    info!("  Provider: {}", config.face.provider);
    info!("  Model: {} in {}", config.face.model_name, config.face.resolved_model_dir().display());
    info!("  GPU: {} (ctx {})", config.face.use_gpu, config.face.ctx_id);
    info!("  Detection size: {:?}", config.face.det_size);
    info!("  Max batch size: {}", config.face.max_batch_size);

    // A provider that fails to load leaves the service running degraded
    let provider = load_provider(&config);
    if provider.is_none() {
        warn!("No face provider loaded, inference endpoints will return 503");
    }

    let service = Arc::new(FaceService::new(provider, config.face.max_batch_size));
    let app_state = Arc::new(AppState::new(service));
    let router = create_rest_router(app_state, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("REST API listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Goodbye!");
    Ok(())
}

fn load_provider(config: &Config) -> Option<Arc<dyn FaceProvider>> {
    let mut provider = match create_provider(&config.face) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to create face provider: {}", e);
            return None;
        }
    };

    match provider.load_model() {
        Ok(()) => {
            info!("Face provider {} loaded", provider.name());
            Some(Arc::from(provider))
        }
        Err(e) => {
            error!("Failed to load face provider {}: {:#}", provider.name(), e);
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler, keep serving until the process is killed
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, cleaning up...");
}
