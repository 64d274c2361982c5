//! Pupil and LED tracking for infrared rodent eye-camera recordings.
//!
//! Each frame goes through two `OpenCV` pipelines:
//! 1. LED stage: the bright corneal reflection of the illumination LED is
//!    found as the largest thresholded blob inside `led_roi`
//! 2. Pupil stage: the dark pupil is found by inverting, adaptive plus global
//!    thresholding inside `pupil_roi`, with contour points under the LED
//!    masked out; among several candidates the one closest to the previous
//!    pupil wins, or the most circular one when there is no previous pupil
//!
//! Results are [`Ellipse`](geometry::Ellipse)s in full-frame `(row, col)`
//! coordinates. The [`Tracker`](tracker::Tracker) runs a whole video and
//! collects per-frame arrays.
//!
//! # Examples
//!
//! ## Single frame
//!
//! ```no_run
//! use pupil_led_tracker::{config::DetectorParams, detector::PupilLedDetector};
//! use opencv::{imgcodecs, prelude::*};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let detector = PupilLedDetector::new(DetectorParams::default())?;
//! let frame = imgcodecs::imread("eye.png", imgcodecs::IMREAD_COLOR)?;
//!
//! let detection = detector.detect_frame(&frame, None)?;
//! println!("{}", detection.result_str());
//! # Ok(())
//! # }
//! ```
//!
//! ## Whole movie
//!
//! ```no_run
//! use pupil_led_tracker::{
//!     config::DetectorParams,
//!     detector::PupilLedDetector,
//!     results::YamlResultsFile,
//!     tracker::{OutputPaths, Tracker, TrackerOptions},
//!     video::{VideoFileSink, VideoFileSource},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let paths = OutputPaths::for_input("eye.avi");
//! let detector = PupilLedDetector::new(DetectorParams::from_file("params.yml")?)?;
//! let mut tracker = Tracker::new(detector, TrackerOptions::default());
//!
//! let mut source = VideoFileSource::open("eye.avi")?;
//! let mut video = VideoFileSink::new(&paths.video);
//! let mut results = YamlResultsFile::new(&paths.results);
//!
//! let summary = tracker.run(&mut source, &mut video, &mut results)?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

/// Detector parameters and their YAML form
pub mod config;

/// Constants used throughout the library
pub mod constants;

/// LED and pupil detection on single frames
pub mod detector;

/// Error types and result handling
pub mod error;

/// Ellipse model
pub mod geometry;

/// Per-frame result arrays and result destinations
pub mod results;

/// Search windows and coordinate transforms
pub mod roi;

/// Batch processing of frame sources
pub mod tracker;

/// Shared image-processing helpers
pub mod utils;

/// Frame sources and sinks
pub mod video;

pub use error::{Error, Result};
