//! API route definitions

use std::sync::Arc;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "kind": "not_found",
            "message": "Not found. POST images to /predict/image or GET /health to check service status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "kind": "method_not_allowed",
            "message": "Method not allowed. Predictions are submitted with POST.",
        })),
    )
}

fn cors_layer() -> CorsLayer {
    // CORS_ORIGIN pins a single origin; unset or "*" allows any.
    match std::env::var("CORS_ORIGIN") {
        Ok(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<axum::http::HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparseable CORS_ORIGIN");
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            }
        },
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_upload_size = state.config.max_upload_size;

    Router::new()
        .route("/predict/image", post(handlers::predict_image))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .route("/model", get(handlers::model_info))
        .route("/stats", get(handlers::inference_stats))
        .route("/metrics", get(handlers::metrics))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}
