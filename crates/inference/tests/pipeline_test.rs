use std::fs;

use image::RgbImage;
use tempfile::TempDir;

use common::Environment;
use inference::{
    MockEngine, PipelineConfig, PipelineError, ReductionStrategy, SegmentationPipeline,
    ShapeDescriptor,
};
use preprocess::{IMAGENET_MEAN, IMAGENET_STD};

const NUM_CLASSES: usize = 19;

fn config_in(dir: &TempDir, model_bytes: &[u8]) -> PipelineConfig {
    let model_path = dir.path().join("model.onnx");
    fs::write(&model_path, model_bytes).unwrap();
    PipelineConfig {
        environment: Environment::Development,
        device_index: 0,
        model_path,
        cache_path: dir.path().join("engine.cache"),
        reduced_precision: false,
        max_shape: ShapeDescriptor::new(1, 3, 640, 640).unwrap(),
        num_classes: NUM_CLASSES,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
        stride: 32,
        reduction: ReductionStrategy::Device,
    }
}

fn uniform_image(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, image::Rgb(rgb))
}

#[test]
fn missing_model_fails_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(&dir, b"model");
    config.model_path = dir.path().join("nope.onnx");

    let err = SegmentationPipeline::new(MockEngine::new(0, NUM_CLASSES), config).unwrap_err();
    assert!(matches!(err, PipelineError::ModelMissing { .. }));
    assert!(err.is_startup());
}

#[test]
fn empty_frame_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = SegmentationPipeline::new(
        MockEngine::new(0, NUM_CLASSES),
        config_in(&dir, b"model"),
    )
    .unwrap();

    let mask = pipeline.infer(&RgbImage::new(0, 0)).unwrap();
    assert_eq!((mask.width(), mask.height()), (0, 0));
    assert_eq!(pipeline.engine().execution_count(), 0);
}

#[test]
fn mask_matches_the_padded_input_shape() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = SegmentationPipeline::new(
        MockEngine::new(0, NUM_CLASSES),
        config_in(&dir, b"model"),
    )
    .unwrap();

    // 800x600 letterboxes at scale 0.8 to 640x480, both stride multiples.
    let mask = pipeline
        .infer(&uniform_image(800, 600, [128, 128, 128]))
        .unwrap();
    assert_eq!((mask.width(), mask.height()), (640, 480));
    let max = pipeline.config().max_shape;
    assert!(mask.width() as usize <= max.width());
    assert!(mask.height() as usize <= max.height());

    // Uniform input with no padding rows means a uniform class map.
    let first = mask.as_raw()[0];
    assert!(mask.as_raw().iter().all(|&class| class == first));
    assert!((first as usize) < NUM_CLASSES);
}

#[test]
fn second_startup_reuses_the_cached_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(0, NUM_CLASSES);
    let config = config_in(&dir, b"model");

    drop(SegmentationPipeline::new(engine.clone(), config.clone()).unwrap());
    assert_eq!(engine.build_count(), 1);

    drop(SegmentationPipeline::new(engine.clone(), config).unwrap());
    assert_eq!(engine.build_count(), 1);
}

#[test]
fn changed_model_invalidates_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(0, NUM_CLASSES);

    let config = config_in(&dir, b"model v1");
    drop(SegmentationPipeline::new(engine.clone(), config).unwrap());
    assert_eq!(engine.build_count(), 1);

    // Same cache path, different model bytes on disk.
    let config = config_in(&dir, b"model v2");
    drop(SegmentationPipeline::new(engine.clone(), config).unwrap());
    assert_eq!(engine.build_count(), 2);
}

#[test]
fn corrupt_cache_triggers_a_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(0, NUM_CLASSES);
    let config = config_in(&dir, b"model");

    drop(SegmentationPipeline::new(engine.clone(), config.clone()).unwrap());
    fs::write(&config.cache_path, b"scribbled over").unwrap();

    drop(SegmentationPipeline::new(engine.clone(), config).unwrap());
    assert_eq!(engine.build_count(), 2);
}

#[test]
fn sequential_calls_do_not_bleed_into_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = SegmentationPipeline::new(
        MockEngine::new(0, NUM_CLASSES),
        config_in(&dir, b"model"),
    )
    .unwrap();

    let red = uniform_image(640, 640, [255, 0, 0]);
    let black = uniform_image(640, 640, [0, 0, 0]);

    let first = pipeline.infer(&red).unwrap();
    let second = pipeline.infer(&black).unwrap();
    assert_ne!(first.as_raw()[0], second.as_raw()[0]);

    let third = pipeline.infer(&red).unwrap();
    assert_eq!(first.as_raw(), third.as_raw());
}

#[test]
fn host_and_device_reduction_agree() {
    let dir = tempfile::tempdir().unwrap();
    let engine = MockEngine::new(0, NUM_CLASSES);

    let device_config = config_in(&dir, b"model");
    let mut host_config = device_config.clone();
    host_config.reduction = ReductionStrategy::Host;

    let mut on_device = SegmentationPipeline::new(engine.clone(), device_config).unwrap();
    let mut on_host = SegmentationPipeline::new(engine, host_config).unwrap();

    let frame = uniform_image(800, 600, [40, 180, 220]);
    let device_mask = on_device.infer(&frame).unwrap();
    let host_mask = on_host.infer(&frame).unwrap();
    assert_eq!(device_mask.as_raw(), host_mask.as_raw());
}
