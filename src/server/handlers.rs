//! HTTP request handlers

use std::fmt;
use std::sync::Arc;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{debug, info, warn};

use crate::model::ArtifactSummary;
use crate::monitoring::MetricsSummary;
use crate::options::{parse_flag, RequestOptions};
use crate::postprocessing::PredictionResult;
use crate::preprocessing::RawImage;

use super::error::{Result, ServerError};
use super::lifecycle::prometheus_metrics;
use super::state::AppState;

pub const IMAGE_FIELD: &str = "image_file";
pub const RESIZE_FIELD: &str = "with_resize";
pub const POST_PROCESS_FIELD: &str = "with_post_process";

/// Where a prediction request is in its life, attached to log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Receiving,
    Processing,
    Responding,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Receiving => "receiving",
            Phase::Processing => "processing",
            Phase::Responding => "responding",
        })
    }
}

// ============================================================================
// Prediction
// ============================================================================

/// Image plus flags pulled out of a multipart body
#[derive(Debug)]
struct PredictForm {
    image: RawImage,
    options: RequestOptions,
}

async fn read_form(multipart: &mut Multipart) -> Result<PredictForm> {
    let mut image = None;
    let mut options = RequestOptions::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(IMAGE_FIELD) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                image = Some(RawImage::new(bytes.to_vec(), content_type));
            }
            Some(RESIZE_FIELD) => {
                options.with_resize = read_flag(RESIZE_FIELD, field.text().await?)?;
            }
            Some(POST_PROCESS_FIELD) => {
                options.with_post_process = read_flag(POST_PROCESS_FIELD, field.text().await?)?;
            }
            other => debug!(field = ?other, "Ignoring unknown form field"),
        }
    }

    let image = image.ok_or(ServerError::MissingField(IMAGE_FIELD))?;
    Ok(PredictForm { image, options })
}

fn read_flag(field: &'static str, value: String) -> Result<bool> {
    parse_flag(&value).ok_or(ServerError::InvalidOption { field, value })
}

/// `POST /predict/image`
pub async fn predict_image(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>> {
    let request_id = AppState::generate_id();
    let _inflight = state.serving.begin_request();
    debug!(request_id = %request_id, phase = %Phase::Receiving, "Prediction request received");

    let form = match multipart {
        Ok(mut multipart) => read_form(&mut multipart).await,
        Err(rejection) => Err(rejection.into()),
    };
    let form = form.map_err(|e| {
        warn!(request_id = %request_id, phase = %Phase::Receiving, kind = e.kind(), error = %e, "Rejected prediction request");
        e
    })?;

    debug!(
        request_id = %request_id,
        phase = %Phase::Processing,
        bytes = form.image.len(),
        content_type = ?form.image.content_type(),
        with_resize = form.options.with_resize,
        with_post_process = form.options.with_post_process,
        "Running prediction"
    );
    let result = state.pool.predict(form.image, form.options).await;

    match result {
        Ok(prediction) => {
            info!(
                request_id = %request_id,
                phase = %Phase::Responding,
                label = %prediction.label,
                score = prediction.score,
                "Prediction served"
            );
            Ok(Json(prediction))
        }
        Err(e) => {
            if e.is_client_error() {
                warn!(request_id = %request_id, phase = %Phase::Responding, kind = e.kind(), error = %e, "Prediction rejected");
            } else {
                warn!(request_id = %request_id, phase = %Phase::Responding, kind = e.kind(), "Prediction failed");
            }
            Err(e.into())
        }
    }
}

// ============================================================================
// Service Handlers
// ============================================================================

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.serving.is_draining() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "draining" })),
        )
    } else {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "backend": state.artifact().backend_name(),
            })),
        )
    }
}

pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<ArtifactSummary> {
    Json(state.artifact().describe())
}

#[derive(Debug, serde::Serialize)]
pub struct StatsResponse {
    pub metrics: MetricsSummary,
    pub inflight: u64,
    pub busy_workers: usize,
    pub max_concurrency: usize,
    pub timeout_ms: u64,
    pub draining: bool,
}

pub async fn inference_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        metrics: state.pool.metrics().summary(),
        inflight: state.serving.inflight(),
        busy_workers: state.pool.busy(),
        max_concurrency: state.pool.max_concurrency(),
        timeout_ms: state.pool.timeout().as_millis() as u64,
        draining: state.serving.is_draining(),
    })
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = prometheus_metrics(&state.serving, state.pool.busy(), state.pool.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
