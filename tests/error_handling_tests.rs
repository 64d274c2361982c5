//! Error handling tests across modules

use opencv::core::{Mat, Point, Scalar, Vector, CV_8UC1, CV_8UC3};
use opencv::prelude::*;
use pupil_led_tracker::config::DetectorParams;
use pupil_led_tracker::detector::PupilLedDetector;
use pupil_led_tracker::geometry::Ellipse;
use pupil_led_tracker::roi::{apply_roi, Roi};
use pupil_led_tracker::video::{FrameSource, InMemorySource};
use pupil_led_tracker::Error;

#[test]
fn test_config_errors_are_eager() {
    let mut params = DetectorParams::default();
    params.led_blur = 0;
    assert!(matches!(PupilLedDetector::new(params), Err(Error::ConfigError(_))));

    let mut params = DetectorParams::default();
    params.pupil_binary_threshold = 300;
    assert!(matches!(PupilLedDetector::new(params), Err(Error::ConfigError(_))));

    assert!(matches!(Roi::new(50, 40, 0, 10), Err(Error::ConfigError(_))));
}

#[test]
fn test_roi_outside_frame() {
    let detector = PupilLedDetector::new(DetectorParams::default()).unwrap();
    let small = Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(0.0)).unwrap();
    assert!(matches!(
        detector.detect_frame(&small, None),
        Err(Error::ConfigError(_))
    ));

    let gray = Mat::new_rows_cols_with_default(120, 160, CV_8UC1, Scalar::all(0.0)).unwrap();
    let roi = Roi::new(100, 130, 0, 10).unwrap();
    assert!(matches!(apply_roi(&gray, Some(&roi)), Err(Error::ConfigError(_))));
}

#[test]
fn test_detector_needs_color_frames() {
    let params = DetectorParams {
        led_roi: None,
        pupil_roi: None,
        ..DetectorParams::default()
    };
    let detector = PupilLedDetector::new(params).unwrap();
    let gray = Mat::new_rows_cols_with_default(50, 50, CV_8UC1, Scalar::all(0.0)).unwrap();
    assert!(matches!(detector.detect_frame(&gray, None), Err(Error::InvalidInput(_))));
}

#[test]
fn test_geometry_errors() {
    assert!(matches!(
        Ellipse::new((1.0, 1.0), (-1.0, 2.0), 0.0),
        Err(Error::GeometryError(_))
    ));

    let short: Vector<Point> = (0..4).map(|i| Point::new(i, i * 2)).collect();
    assert!(matches!(Ellipse::fit_from_contour(&short), Err(Error::GeometryError(_))));

    let ell = Ellipse::new((5.0, 5.0), (2.0, 2.0), 0.0).unwrap();
    let color = Mat::new_rows_cols_with_default(10, 10, CV_8UC3, Scalar::all(0.0)).unwrap();
    assert!(matches!(ell.mean_intensity(&color), Err(Error::InvalidInput(_))));
}

#[test]
fn test_mean_intensity_outside_image_is_nan() {
    let img = Mat::new_rows_cols_with_default(20, 20, CV_8UC1, Scalar::all(7.0)).unwrap();
    let far = Ellipse::new((100.0, 100.0), (3.0, 3.0), 0.0).unwrap();
    assert!(far.mean_intensity(&img).unwrap().is_nan());
}

#[test]
fn test_source_exhausted_reports_position() {
    let mut source = InMemorySource::new(Vec::new()).with_advertised_count(2);
    let err = source.read_frame(0).unwrap_err();
    assert_eq!(err.to_string(), "Frame source exhausted at frame 0 of 2");
}

#[test]
fn test_error_display() {
    let err = Error::AlreadyProcessed("eye_output_data.yml".to_string());
    assert_eq!(err.to_string(), "Results already exist: eye_output_data.yml");
    let err = Error::ConfigError("led_blur must be a positive kernel size, got 0".to_string());
    assert!(err.to_string().starts_with("Configuration error:"));
}
