use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
use plantdoc_core::tract_core::ops::nn::{Reduce, Reducer};
use plantdoc_core::tract_core::prelude::*;
use plantdoc_core::*;

const APPLES: &str = r#"{"0": "Apple___healthy", "1": "Apple___Black_rot"}"#;

fn leaf(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 200) as u8, (50 + y % 180) as u8, ((x * y) % 70) as u8])
    }))
}

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Cursor::new(vec![]);
    image.write_to(&mut bytes, ImageOutputFormat::Png).unwrap();
    bytes.into_inner()
}

fn write(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn apples_with(scores: &[f32]) -> Classifier {
    let index = ClassIndex::from_json_str(APPLES).unwrap();
    Classifier::new(FixedScores::new(scores), index, PreprocessOptions::default()).unwrap()
}

#[test]
fn healthy_apple_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let index = ClassIndex::load(write(dir.path(), "class_indices.json", APPLES)).unwrap();
    let classifier =
        Classifier::new(FixedScores::new([0.9, 0.1]), index, PreprocessOptions::default()).unwrap();

    let image_path = dir.path().join("leaf.png");
    leaf(512, 384).save(&image_path).unwrap();
    assert_eq!(classifier.classify_path(&image_path).unwrap(), "Apple___healthy");
}

#[test]
fn tie_picks_the_lowest_index() {
    let classifier = apples_with(&[0.2, 0.2]);
    assert_eq!(classifier.classify_bytes(&png_bytes(&leaf(512, 384))).unwrap(), "Apple___healthy");
}

#[test]
fn extra_class_from_the_model_is_a_resolution_error() {
    let classifier = apples_with(&[0.1, 0.2, 0.7]);
    let err = classifier.classify(&leaf(512, 384)).unwrap_err();
    assert!(matches!(err, ClassifyError::LabelResolution { index: 2, .. }), "{err:?}");
}

#[test]
fn repeated_calls_agree() {
    let classifier = apples_with(&[0.4, 0.6]);
    let image = leaf(97, 311);
    let first = classifier.predict(&image).unwrap();
    for _ in 0..5 {
        assert_eq!(classifier.predict(&image).unwrap(), first);
    }
}

#[test]
fn missing_and_corrupted_class_index() {
    let dir = tempfile::tempdir().unwrap();
    let model = write(dir.path(), "model.onnx", b"unused");
    for index in [
        dir.path().join("nope.json"),
        write(dir.path(), "truncated.json", r#"{"0": "Apple___healthy", "1": "#),
        write(dir.path(), "yaml.json", "0: Apple___healthy\n1: Apple___Black_rot\n"),
    ] {
        let err = Classifier::load(&model, &index).unwrap_err();
        assert!(matches!(err, ClassifyError::LabelMapLoad { .. }), "{index:?}: {err:?}");
        assert!(err.is_fatal());
    }
}

#[test]
fn missing_and_corrupted_model() {
    let dir = tempfile::tempdir().unwrap();
    let index = write(dir.path(), "class_indices.json", APPLES);
    for model in [
        dir.path().join("nope.onnx"),
        write(dir.path(), "garbage.onnx", b"\x08\x07not a protobuf at all\xff\xff\xff"),
        write(dir.path(), "keras.h5", b"\x89HDF\r\n\x1a\n"),
        write(dir.path(), "weights.bin", b"\0\0\0\0"),
    ] {
        let err = Classifier::load(&model, &index).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad { .. }), "{model:?}: {err:?}");
        assert!(err.is_fatal());
    }
}

#[test]
fn config_with_zero_size_is_rejected_before_loading() {
    let config = ClassifierConfig {
        target_size: TargetSize { height: 0, width: 224 },
        ..ClassifierConfig::default()
    };
    assert!(matches!(Classifier::from_config(&config), Err(ClassifyError::Config(_))));
}

/// A real tract plan: the per-channel maximum of the image, so the dominant color wins.
fn dominant_color_model(size: TargetSize) -> TractResult<TractModel> {
    let mut model = TypedModel::default();
    let input = model.add_source("image", f32::fact(size.input_shape()))?;
    let max = model.wire_node("max", Reduce::new(tvec!(1, 2), Reducer::Max), &[input])?;
    model.set_output_outlets(&max)?;
    TractModel::from_typed(model)
}

fn solid(color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(300, 200, Rgb(color)))
}

#[test]
fn tract_backed_classifier() -> TractResult<()> {
    let options = PreprocessOptions::default().with_target_size(TargetSize::square(32));
    let index = ClassIndex::from_labels(["red", "green", "blue"])?;
    let classifier = Classifier::new(dominant_color_model(options.target_size)?, index, options)?;

    assert_eq!(classifier.classify(&solid([250, 10, 10]))?, "red");
    assert_eq!(classifier.classify(&solid([0, 200, 30]))?, "green");
    assert_eq!(classifier.classify(&solid([40, 40, 41]))?, "blue");
    assert_eq!(classifier.classify(&solid([90, 90, 90]))?, "red");

    let prediction = classifier.predict(&solid([0, 0, 255]))?;
    assert_eq!(prediction.index, 2);
    approx::assert_abs_diff_eq!(prediction.score, 1.0);
    Ok(())
}

#[test]
fn tract_backed_classifier_checks_class_count() -> TractResult<()> {
    let options = PreprocessOptions::default().with_target_size(TargetSize::square(8));
    let index = ClassIndex::from_labels(["red", "green"])?;
    let err = Classifier::new(dominant_color_model(options.target_size)?, index, options)
        .unwrap_err();
    assert!(matches!(err, ClassifyError::LabelMapLoad { .. }), "{err:?}");
    Ok(())
}

#[test]
fn tract_backed_classifier_reports_shape_mismatch() -> TractResult<()> {
    let index = ClassIndex::from_labels(["red", "green", "blue"])?;
    let model = dominant_color_model(TargetSize::square(16))?;
    // the plan is pinned to 16x16 but images are resized to 24x24
    let options = PreprocessOptions::default().with_target_size(TargetSize::square(24));
    let classifier = Classifier::new(model, index, options)?;
    let err = classifier.classify(&solid([1, 2, 3])).unwrap_err();
    assert!(matches!(err, ClassifyError::Inference(_)), "{err:?}");
    assert!(!err.is_fatal());
    Ok(())
}
