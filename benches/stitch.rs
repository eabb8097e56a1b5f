use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::imageops;
use scroll_stitch::capture::{synthetic_page, FrameSource, MockScrollSource, ScrollConfig};
use scroll_stitch::features::FeatureExtractor;
use scroll_stitch::{Frame, OverlapEstimator, Stitcher};

fn benchmark_estimation(c: &mut Criterion) {
    let page = synthetic_page(320, 600, 3);
    let canvas = Frame::new(imageops::crop_imm(&page, 0, 0, 320, 300).to_image(), 1).to_rgb();
    let next = Frame::new(imageops::crop_imm(&page, 0, 240, 320, 300).to_image(), 2);
    let estimator = OverlapEstimator::default();

    c.bench_function("estimate_overlap_60", |b| {
        b.iter(|| estimator.estimate(black_box(&canvas), black_box(&next)))
    });

    let gray = next.luma();
    let extractor = FeatureExtractor::new(20, 1000, 1);
    c.bench_function("extract_features_320x300", |b| {
        b.iter(|| extractor.extract(black_box(&gray)))
    });
}

fn benchmark_stitch(c: &mut Criterion) {
    let mut source = MockScrollSource::new(ScrollConfig::default()).unwrap();
    let frames = source.collect_frames();
    let stitcher = Stitcher::default();

    c.bench_function("stitch_mock_page", |b| {
        b.iter(|| stitcher.stitch(black_box(&frames)))
    });
}

criterion_group!(benches, benchmark_estimation, benchmark_stitch);
criterion_main!(benches);
