//! Per-frame detection benchmarks on a synthetic eye frame

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use opencv::core::{Mat, Point, Scalar, CV_8UC3};
use opencv::imgproc;
use pupil_led_tracker::config::DetectorParams;
use pupil_led_tracker::detector::PupilLedDetector;
use pupil_led_tracker::geometry::Ellipse;
use pupil_led_tracker::roi::Roi;
use std::time::Duration;

fn eye_frame() -> Mat {
    let mut frame = Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(128.0)).unwrap();
    imgproc::circle(&mut frame, Point::new(330, 220), 40, Scalar::all(20.0), -1, imgproc::LINE_8, 0).unwrap();
    imgproc::circle(&mut frame, Point::new(365, 240), 7, Scalar::all(255.0), -1, imgproc::LINE_8, 0).unwrap();
    frame
}

fn params() -> DetectorParams {
    DetectorParams {
        led_roi: Some(Roi::new(200, 300, 280, 400).unwrap()),
        pupil_roi: Some(Roi::new(100, 350, 200, 500).unwrap()),
        led_mask_dilation: 21,
        ..DetectorParams::default()
    }
}

/// Full pipeline with and without equalization and history
fn bench_detect_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_frame");
    group.measurement_time(Duration::from_secs(10));

    let frame = eye_frame();
    let last = Ellipse::new((220.0, 330.0), (40.0, 40.0), 0.0).unwrap();

    for equalize in [false, true] {
        let detector = PupilLedDetector::new(DetectorParams {
            is_equalize: equalize,
            ..params()
        })
        .unwrap();

        group.bench_with_input(BenchmarkId::new("no_history", equalize), &frame, |b, frame| {
            b.iter(|| detector.detect_frame(black_box(frame), None).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("with_history", equalize), &frame, |b, frame| {
            b.iter(|| detector.detect_frame(black_box(frame), Some(&last)).unwrap());
        });
    }

    group.finish();
}

/// Diagnostics keep every intermediate image
fn bench_diagnostics_overhead(c: &mut Criterion) {
    let frame = eye_frame();
    let detector = PupilLedDetector::new(params()).unwrap().with_diagnostics(true);

    c.bench_function("detect_frame_with_diagnostics", |b| {
        b.iter(|| detector.detect_frame(black_box(&frame), None).unwrap());
    });
}

/// Rasterising the LED exclusion mask
fn bench_binary_mask(c: &mut Criterion) {
    let ell = Ellipse::new((120.0, 150.0), (7.0, 6.0), 30.0).unwrap();
    c.bench_function("ellipse_binary_mask_250x300", |b| {
        b.iter(|| black_box(&ell).binary_mask(250, 300).unwrap());
    });
}

criterion_group!(benches, bench_detect_frame, bench_diagnostics_overhead, bench_binary_mask);
criterion_main!(benches);
