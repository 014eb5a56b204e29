//! Codec benchmarks - compression and batch decoding over a talking-face workload

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use morphcast_codec::*;
use morphcast_core::{MorphFrame, MORPH_NAMES};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn talking_frames(count: usize) -> Vec<MorphFrame> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..count)
        .map(|i| {
            let phase = i as f64 * 0.1;
            let mut frame: MorphFrame = MORPH_NAMES
                .iter()
                .take(52)
                .map(|name| (*name, rng.gen_range(0.0..0.05)))
                .collect();
            frame.insert("V_Open", 0.5 + 0.4 * phase.sin());
            frame.insert("Jaw_Open", 0.3 + 0.3 * phase.sin());
            frame
        })
        .collect()
}

fn bench_compress_stream(c: &mut Criterion) {
    let frames = talking_frames(120);
    c.bench_function("compress_120_frames", |b| {
        b.iter_batched(
            DeltaCompressor::new,
            |mut compressor| {
                for (i, frame) in frames.iter().enumerate() {
                    black_box(compressor.compress_frame(frame, i as f64 / 60.0).ok());
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_decode_batch(c: &mut Criterion) {
    let frames = talking_frames(3);
    let mut compressor = DeltaCompressor::new();
    let mut payload = None;
    for (i, frame) in frames.iter().enumerate() {
        payload = compressor.compress_frame(frame, i as f64 / 60.0).ok().flatten();
    }
    let payload = payload.unwrap_or_default();

    c.bench_function("decode_batch_of_3", |b| {
        b.iter(|| BatchDecoder::decode(black_box(&payload)))
    });
}

fn bench_interpolate(c: &mut Criterion) {
    let frames = talking_frames(2);
    let mut decoder = DeltaDecompressor::new();
    decoder.decompress_frame(&CompressedUnit::keyframe(0, 0.0, frames[0].clone()));
    decoder.decompress_frame(&CompressedUnit::delta(1, 1.0 / 30.0, frames[1].clone()));

    c.bench_function("interpolate_52_morphs", |b| {
        b.iter(|| decoder.interpolate_at(black_box(0.5)))
    });
}

criterion_group!(benches, bench_compress_stream, bench_decode_batch, bench_interpolate);
criterion_main!(benches);
