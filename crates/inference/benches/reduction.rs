use criterion::{Criterion, black_box, criterion_group, criterion_main};

use inference::ShapeDescriptor;
use inference::postprocessing::{argmax, argmax_channels_into, softmax};

/// Deterministic pseudo-random logits so runs are comparable.
fn logits(count: usize) -> Vec<f32> {
    let mut state = 0x243f_6a88u32;
    (0..count)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1 << 24) as f32 * 8.0 - 4.0
        })
        .collect()
}

fn benchmark_channel_argmax(c: &mut Criterion) {
    let shape = ShapeDescriptor::new(1, 19, 640, 640).unwrap();
    let planar = logits(shape.count());
    let mut mask = vec![0u8; 640 * 640];

    c.bench_function("argmax_channels_1x19x640x640", |b| {
        b.iter(|| {
            argmax_channels_into(black_box(&planar), &shape, &mut mask).unwrap();
            black_box(mask[0])
        })
    });
}

fn benchmark_flat_reductions(c: &mut Criterion) {
    let values = logits(19);

    c.bench_function("argmax_19", |b| {
        b.iter(|| argmax(black_box(&values)))
    });

    c.bench_function("softmax_19", |b| {
        b.iter(|| {
            let mut scratch = values.clone();
            softmax(&mut scratch);
            black_box(scratch[0])
        })
    });
}

criterion_group!(benches, benchmark_channel_argmax, benchmark_flat_reductions);
criterion_main!(benches);
