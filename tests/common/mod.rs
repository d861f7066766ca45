//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use kolosal_vision::inference::{InferenceConfig, InferencePool};
use kolosal_vision::model::InferenceArtifact;
use kolosal_vision::server::{create_router, AppState, ServerConfig};

pub const BOUNDARY: &str = "kolosal-test-boundary";

pub const RED: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

/// Write a 2x2 RGB linear artifact whose class `k` sums channel `k`.
///
/// A solid red image scores `[4, 0, 0]`, so it is labelled `red` with a
/// calibrated score of `e^4 / (e^4 + 2)`.
pub fn write_color_artifact(dir: &Path) {
    let mut weights = vec![vec![0.0f32; 12]; 3];
    for (class, row) in weights.iter_mut().enumerate() {
        for pixel in 0..4 {
            row[pixel * 3 + class] = 1.0;
        }
    }
    let model = serde_json::json!({ "weights": weights, "bias": [0.0, 0.0, 0.0] });
    std::fs::write(dir.join("model.json"), model.to_string()).unwrap();

    let manifest = serde_json::json!({
        "format": "linear",
        "model_file": "model.json",
        "input_shape": [2, 2, 3],
        "labels": ["red", "green", "blue"],
    });
    std::fs::write(dir.join("manifest.json"), manifest.to_string()).unwrap();
}

/// Checked-in artifact directory under `tests/fixtures/`
pub fn fixture_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

pub fn color_artifact() -> Arc<InferenceArtifact> {
    let dir = tempfile::tempdir().unwrap();
    write_color_artifact(dir.path());
    Arc::new(InferenceArtifact::load(dir.path()).unwrap())
}

pub fn expected_red_probability() -> f32 {
    let e4 = 4.0f32.exp();
    e4 / (e4 + 2.0)
}

pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        model_dir: "unused".into(),
        max_upload_size: 1024 * 1024,
        request_timeout_ms: 5_000,
        max_concurrent_inferences: 4,
    }
}

pub fn test_state(artifact: Arc<InferenceArtifact>) -> Arc<AppState> {
    Arc::new(AppState::with_artifact(test_config(), artifact))
}

pub fn state_with_pool(artifact: Arc<InferenceArtifact>, inference: InferenceConfig) -> Arc<AppState> {
    let pool = InferencePool::for_artifact(artifact, &inference);
    Arc::new(AppState::new(test_config(), pool))
}

pub fn test_app() -> axum::Router {
    create_router(test_state(color_artifact()))
}

/// One part of a multipart/form-data body
pub enum Part<'a> {
    File { name: &'a str, content_type: &'a str, bytes: &'a [u8] },
    Text { name: &'a str, value: &'a str },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File { name, content_type, bytes } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\nContent-Type: {}\r\n\r\n",
                        name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value).as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn predict_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict/image")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Request for one image with optional flag values
pub fn image_request(image: &[u8], with_resize: Option<&str>, with_post_process: Option<&str>) -> Request<Body> {
    let mut parts = vec![Part::File { name: "image_file", content_type: "image/png", bytes: image }];
    if let Some(value) = with_resize {
        parts.push(Part::Text { name: "with_resize", value });
    }
    if let Some(value) = with_post_process {
        parts.push(Part::Text { name: "with_post_process", value });
    }
    predict_request(&parts)
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 64).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
