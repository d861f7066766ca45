//! Integration test: loading model artifacts from disk

mod common;

use common::*;
use kolosal_vision::error::LoadError;
use kolosal_vision::inference::PredictionService;
use kolosal_vision::model::{InferenceArtifact, InputShape, TensorLayout, MANIFEST_FILE};
use kolosal_vision::options::RequestOptions;
use kolosal_vision::preprocessing::RawImage;
use std::sync::Arc;

#[test]
fn test_load_from_directory_and_manifest_path() {
    let dir = tempfile::tempdir().unwrap();
    write_color_artifact(dir.path());

    let from_dir = InferenceArtifact::load(dir.path()).unwrap();
    let from_file = InferenceArtifact::load(dir.path().join(MANIFEST_FILE)).unwrap();

    assert_eq!(from_dir.input_shape(), InputShape::new(2, 2, 3));
    assert_eq!(from_dir.labels(), from_file.labels());
    assert_eq!(from_dir.backend_name(), "linear");
}

#[test]
fn test_labels_file() {
    let dir = tempfile::tempdir().unwrap();
    write_color_artifact(dir.path());
    std::fs::write(dir.path().join("labels.txt"), "crimson\nlime\n\nnavy\n").unwrap();
    let manifest = serde_json::json!({
        "format": "linear",
        "model_file": "model.json",
        "input_shape": [2, 2, 3],
        "labels_file": "labels.txt",
    });
    std::fs::write(dir.path().join(MANIFEST_FILE), manifest.to_string()).unwrap();

    let artifact = InferenceArtifact::load(dir.path()).unwrap();
    assert_eq!(artifact.labels(), ["crimson", "lime", "navy"]);
}

#[test]
fn test_vocabulary_mismatch_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_color_artifact(dir.path());
    let manifest = serde_json::json!({
        "format": "linear",
        "model_file": "model.json",
        "input_shape": [2, 2, 3],
        "labels": ["red", "green"],
    });
    std::fs::write(dir.path().join(MANIFEST_FILE), manifest.to_string()).unwrap();

    let err = InferenceArtifact::load(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::VocabularyMismatch { labels: 2, outputs: 3 }));
}

#[test]
fn test_missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let err = InferenceArtifact::load(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn test_missing_model_file() {
    let dir = tempfile::tempdir().unwrap();
    write_color_artifact(dir.path());
    std::fs::remove_file(dir.path().join("model.json")).unwrap();

    let err = InferenceArtifact::load(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn test_corrupt_onnx_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("model.onnx"), b"not a protobuf").unwrap();
    let manifest = serde_json::json!({
        "format": "onnx",
        "model_file": "model.onnx",
        "input_shape": [2, 2, 3],
        "labels": ["a", "b"],
    });
    std::fs::write(dir.path().join(MANIFEST_FILE), manifest.to_string()).unwrap();

    let err = InferenceArtifact::load(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::Model { .. }));
}

#[test]
fn test_temperature_from_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write_color_artifact(dir.path());
    let manifest = serde_json::json!({
        "format": "linear",
        "model_file": "model.json",
        "input_shape": [2, 2, 3],
        "labels": ["red", "green", "blue"],
        "calibration": { "temperature": 2.0 },
    });
    std::fs::write(dir.path().join(MANIFEST_FILE), manifest.to_string()).unwrap();

    let service = PredictionService::new(Arc::new(InferenceArtifact::load(dir.path()).unwrap()));
    let result = service
        .predict(RawImage::new(png_bytes(2, 2, RED), None), RequestOptions::default())
        .unwrap();

    // Scores [4, 0, 0] at T=2 calibrate to e^2 / (e^2 + 2)
    let e2 = 2.0f32.exp();
    assert_eq!(result.label, "red");
    assert!((result.score - e2 / (e2 + 2.0)).abs() < 1e-4);
}

// ============================================================================
// ONNX runtime
// ============================================================================

/// Raw scores of the checked-in ONNX classifier for a solid color
fn onnx_raw_scores(color: [u8; 3]) -> [f32; 3] {
    let bias = [0.0, 0.25, 0.5];
    let mut scores = bias;
    for (class, score) in scores.iter_mut().enumerate() {
        *score += 4.0 * color[class] as f32 / 255.0;
    }
    scores
}

fn assert_onnx_colors(fixture: &str, layout: TensorLayout) {
    let artifact = InferenceArtifact::load(fixture_dir(fixture)).unwrap();
    assert_eq!(artifact.backend_name(), "onnx");
    assert_eq!(artifact.manifest().layout, layout);
    assert_eq!(artifact.input_shape(), InputShape::new(2, 2, 3));

    let service = PredictionService::new(Arc::new(artifact));
    for (color, label, index) in [(RED, "red", 0), (GREEN, "green", 1), (BLUE, "blue", 2)] {
        let expected = onnx_raw_scores(color);

        let raw = service
            .predict(
                RawImage::new(png_bytes(2, 2, color), None),
                RequestOptions::default().with_post_process(false),
            )
            .unwrap();
        assert_eq!(raw.label, label);
        assert!(
            (raw.score - expected[index]).abs() < 1e-4,
            "{} {}: raw score {} != {}",
            fixture,
            label,
            raw.score,
            expected[index]
        );

        let calibrated = service
            .predict(RawImage::new(png_bytes(2, 2, color), None), RequestOptions::default())
            .unwrap();
        let denom: f32 = expected.iter().map(|s| s.exp()).sum();
        assert_eq!(calibrated.label, label);
        assert!((calibrated.score - expected[index].exp() / denom).abs() < 1e-4);
    }
}

#[test]
fn test_onnx_nhwc_fixture() {
    assert_onnx_colors("onnx_color_nhwc", TensorLayout::Nhwc);
}

#[test]
fn test_onnx_nchw_fixture() {
    assert_onnx_colors("onnx_color_nchw", TensorLayout::Nchw);
}

#[test]
fn test_onnx_layouts_agree_on_mixed_image() {
    // Left column red, right column green: the two layouts must see the
    // same pixels, so both models report identical raw scores.
    let mut img = image::RgbImage::from_pixel(2, 2, image::Rgb(RED));
    img.put_pixel(1, 0, image::Rgb(GREEN));
    img.put_pixel(1, 1, image::Rgb(GREEN));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageOutputFormat::Png)
        .unwrap();
    let png = buf.into_inner();

    let raw = RequestOptions::default().with_post_process(false);
    let mut results = Vec::new();
    for fixture in ["onnx_color_nhwc", "onnx_color_nchw"] {
        let artifact = Arc::new(InferenceArtifact::load(fixture_dir(fixture)).unwrap());
        let result = PredictionService::new(artifact)
            .predict(RawImage::new(png.clone(), None), raw)
            .unwrap();
        results.push(result);
    }

    // Scores [2, 2.25, 0.5]
    for result in &results {
        assert_eq!(result.label, "green");
        assert!((result.score - 2.25).abs() < 1e-4);
    }
}

#[test]
fn test_onnx_output_checked_against_vocabulary() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(
        fixture_dir("onnx_color_nchw").join("model.onnx"),
        dir.path().join("net.onnx"),
    )
    .unwrap();
    let manifest = serde_json::json!({
        "format": "onnx",
        "model_file": "net.onnx",
        "input_shape": [2, 2, 3],
        "layout": "nchw",
        "labels": ["red", "green"],
    });
    std::fs::write(dir.path().join(MANIFEST_FILE), manifest.to_string()).unwrap();

    let err = InferenceArtifact::load(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::VocabularyMismatch { labels: 2, outputs: 3 }));
}
