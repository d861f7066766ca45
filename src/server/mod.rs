//! Kolosal Vision Server Module
//!
//! HTTP endpoint layer: accepts multipart image uploads on
//! `/predict/image`, hands them to the inference pool and maps every failure
//! to a status code and JSON error body.

mod api;
mod error;
mod handlers;
mod lifecycle;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use handlers::{Phase, StatsResponse, IMAGE_FIELD, POST_PROCESS_FIELD, RESIZE_FIELD};
pub use lifecycle::{prometheus_metrics, InflightGuard, ServingState};
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::inference::InferenceConfig;
use crate::model::InferenceArtifact;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model_dir: PathBuf,
    pub max_upload_size: usize,
    pub request_timeout_ms: u64,
    pub max_concurrent_inferences: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let inference = InferenceConfig::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            model_dir: std::env::var("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./model")),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10 * 1024 * 1024), // 10MB
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(inference.timeout_ms),
            max_concurrent_inferences: std::env::var("MAX_CONCURRENT_INFERENCES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(inference.max_concurrency),
        }
    }
}

impl ServerConfig {
    /// Pool settings derived from this configuration
    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig::new()
            .with_timeout_ms(self.request_timeout_ms)
            .with_max_concurrency(self.max_concurrent_inferences)
    }
}

/// Load the model and start the server with the given configuration.
///
/// Fails before binding the listener if the artifact cannot be loaded.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        model_dir = %config.model_dir.display(),
        started_at = %start_time.to_rfc3339(),
        "Loading model artifact"
    );

    let model_dir = config.model_dir.clone();
    let artifact = tokio::task::spawn_blocking(move || InferenceArtifact::load(&model_dir))
        .await?
        .map_err(|e| {
            error!(error = %e, "Model artifact failed to load");
            e
        })?;
    let summary = artifact.describe();
    info!(
        backend = %summary.backend,
        input_shape = %summary.input_shape,
        labels = summary.num_labels,
        temperature = summary.temperature,
        "Model ready"
    );

    let state = Arc::new(AppState::with_artifact(config.clone(), Arc::new(artifact)));
    let app = create_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        address = %addr,
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        request_timeout_ms = config.request_timeout_ms,
        max_concurrent_inferences = config.max_concurrent_inferences,
        "Kolosal Vision Server starting"
    );
    info!(url = %format!("http://{}/predict/image", addr), "Prediction endpoint available");
    info!(url = %format!("http://{}/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let serving = Arc::clone(&state.serving);
    let shutdown_signal = async move {
        wait_for_shutdown().await;
        serving.begin_drain();
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            inflight = serving.inflight(),
            "Shutdown signal received, draining in-flight requests"
        );
    };

    info!("Server started successfully (press ctrl+c to stop)");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
