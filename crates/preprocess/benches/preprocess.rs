use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use preprocess::{
    DEFAULT_STRIDE, DEFAULT_TARGET_SIZE, IMAGENET_MEAN, IMAGENET_STD, TransformPipeline,
};

/// Gradient pattern so the resize kernel does real work.
fn create_test_pixels(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            pixels[idx] = (x % 256) as u8;
            pixels[idx + 1] = (y % 256) as u8;
            pixels[idx + 2] = ((x + y) % 256) as u8;
        }
    }
    pixels
}

fn benchmark_transform_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_pipeline");

    let resolutions = [(640, 480), (1280, 720), (1920, 1080), (3840, 2160)];

    let mut pipeline = TransformPipeline::new(
        DEFAULT_TARGET_SIZE,
        DEFAULT_STRIDE,
        IMAGENET_MEAN,
        IMAGENET_STD,
    );
    let mut out = vec![0.0f32; 3 * 640 * 640];

    for (width, height) in resolutions.iter() {
        let pixels = create_test_pixels(*width, *height);

        group.bench_with_input(
            BenchmarkId::new("letterbox_normalize", format!("{}x{}", width, height)),
            &pixels,
            |b, pixels| {
                b.iter(|| {
                    pipeline
                        .apply(
                            black_box(pixels),
                            black_box(*width),
                            black_box(*height),
                            black_box(&mut out),
                        )
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_transform_pipeline);
criterion_main!(benches);
