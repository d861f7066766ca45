//! Integration test: prediction service behavior under load, deadlines and
//! fixed model outputs

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::*;
use kolosal_vision::error::InferenceError;
use kolosal_vision::inference::{InferenceConfig, PredictionService};
use kolosal_vision::model::{InferenceArtifact, InputShape, ModelBackend, ModelFormat, ModelManifest};
use kolosal_vision::options::RequestOptions;
use kolosal_vision::preprocessing::{InputTensor, RawImage};
use kolosal_vision::server::create_router;
use tower::ServiceExt;

/// Returns the same scores for every input
struct FixedScores(Vec<f32>);

impl ModelBackend for FixedScores {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn run(&self, _input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        Ok(self.0.clone())
    }
}

/// Sleeps before answering, except during warm-up
struct Slow(Duration);

impl ModelBackend for Slow {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn run(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        if input.view().iter().any(|v| *v != 0.0) {
            std::thread::sleep(self.0);
        }
        Ok(vec![1.0, 0.0])
    }
}

/// Fails at runtime on anything but the warm-up tensor
struct Broken;

impl ModelBackend for Broken {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn run(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        if input.view().iter().all(|v| *v == 0.0) {
            return Ok(vec![0.0, 0.0]);
        }
        Err(InferenceError::Runtime("device lost".to_string()))
    }
}

fn two_class_artifact(labels: [&str; 2], backend: Box<dyn ModelBackend>) -> Arc<InferenceArtifact> {
    let manifest = ModelManifest::new(ModelFormat::Linear, "unused.json", InputShape::new(2, 2, 3))
        .with_labels(labels);
    let labels = labels.iter().map(|l| l.to_string()).collect();
    Arc::new(InferenceArtifact::from_parts(manifest, labels, backend).unwrap())
}

// ============================================================================
// Fixed model outputs
// ============================================================================

#[tokio::test]
async fn test_cat_dog_calibrated_and_raw() {
    let artifact = two_class_artifact(["cat", "dog"], Box::new(FixedScores(vec![2.0, 0.5])));
    let app = create_router(test_state(artifact));
    let png = png_bytes(2, 2, RED);

    let response = app.clone().oneshot(image_request(&png, None, Some("True"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["Label"], "cat");
    assert!((json["Score"].as_f64().unwrap() - 0.8176).abs() < 1e-3);

    let response = app.oneshot(image_request(&png, None, Some("False"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["Label"], "cat");
    assert!((json["Score"].as_f64().unwrap() - 2.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_tiny_temperature_still_reports_a_probability() {
    let manifest = ModelManifest::new(ModelFormat::Linear, "unused.json", InputShape::new(2, 2, 3))
        .with_labels(["cat", "dog"])
        .with_temperature(1e-40);
    let labels = vec!["cat".to_string(), "dog".to_string()];
    let artifact = Arc::new(
        InferenceArtifact::from_parts(manifest, labels, Box::new(FixedScores(vec![2.0, 0.5]))).unwrap(),
    );
    let app = create_router(test_state(artifact));
    let png = png_bytes(2, 2, RED);

    let response = app.oneshot(image_request(&png, None, Some("true"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["Label"], "cat");
    assert_eq!(json["Score"].as_f64(), Some(1.0));
}

#[test]
fn test_service_ranking_preserved_by_calibration() {
    for scores in [vec![-3.0, -2.9], vec![10.0, 9.0], vec![0.25, 0.25]] {
        let artifact = two_class_artifact(["first", "second"], Box::new(FixedScores(scores)));
        let service = PredictionService::new(artifact);
        let png = png_bytes(2, 2, BLUE);

        let calibrated = service
            .predict(RawImage::new(png.clone(), None), RequestOptions::default())
            .unwrap();
        let raw = service
            .predict(
                RawImage::new(png, None),
                RequestOptions::default().with_post_process(false),
            )
            .unwrap();
        assert_eq!(calibrated.label, raw.label);
    }
}

#[tokio::test]
async fn test_runtime_fault_is_500_without_details() {
    let artifact = two_class_artifact(["cat", "dog"], Box::new(Broken));
    let app = create_router(test_state(artifact));
    let png = png_bytes(2, 2, RED);

    let response = app.oneshot(image_request(&png, None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "inference_error");
    assert!(!json["message"].as_str().unwrap().contains("device lost"));
    assert!(json.get("Label").is_none());
}

// ============================================================================
// Idempotence and concurrency
// ============================================================================

#[tokio::test]
async fn test_repeated_request_is_identical() {
    let app = test_app();
    let png = png_bytes(7, 5, [30, 180, 90]);

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let response = app.clone().oneshot(image_request(&png, None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        bodies.push(body_json(response).await);
    }
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_get_their_own_labels() {
    let app = test_app();
    let colors = [(RED, "red"), (GREEN, "green"), (BLUE, "blue")];

    let mut handles = Vec::new();
    for i in 0..30 {
        let (color, expected) = colors[i % colors.len()];
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let png = png_bytes(2 + (i as u32 % 3), 2, color);
            let response = app.oneshot(image_request(&png, None, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            (expected, json["Label"].as_str().unwrap().to_string())
        }));
    }

    for handle in handles {
        let (expected, label) = handle.await.unwrap();
        assert_eq!(label, expected);
    }
}

// ============================================================================
// Deadlines
// ============================================================================

#[tokio::test]
async fn test_slow_prediction_times_out() {
    let artifact = two_class_artifact(["cat", "dog"], Box::new(Slow(Duration::from_millis(500))));
    let state = state_with_pool(
        artifact,
        InferenceConfig::new().with_timeout_ms(50).with_max_concurrency(1),
    );
    let app = create_router(state.clone());
    let png = png_bytes(2, 2, RED);

    let response = app.oneshot(image_request(&png, None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["kind"], "timeout");
    assert!(json.get("Label").is_none());

    // The abandoned worker finishes later without adding to the counts.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(state.pool.metrics().total_requests(), 1);
    assert_eq!(state.pool.metrics().total_errors(), 1);
}

#[tokio::test]
async fn test_fast_prediction_meets_deadline() {
    let artifact = two_class_artifact(["cat", "dog"], Box::new(Slow(Duration::from_millis(5))));
    let state = state_with_pool(
        artifact,
        InferenceConfig::new().with_timeout_ms(5_000).with_max_concurrency(2),
    );
    let app = create_router(state);
    let png = png_bytes(2, 2, RED);

    let response = app.oneshot(image_request(&png, None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["Label"], "cat");
}
