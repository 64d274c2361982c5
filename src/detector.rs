//! Per-frame LED and pupil detection.
//!
//! [`PupilLedDetector::detect_frame`] runs the whole pipeline on one frame
//! without touching detector state. The `load_*` / [`detect`] methods wrap it
//! in the frame lifecycle used by the batch tracker:
//!
//! ```text
//! Cleared --load_first_frame--> FrameLoaded --detect--> Detected
//!                                    ^                     |
//!                                    +--load_next_frame----+
//! ```
//!
//! [`detect`]: PupilLedDetector::detect

mod diagnostics;
mod led;
mod pupil;

pub use diagnostics::{Diagnostics, StageImages};

use crate::config::DetectorParams;
use crate::constants::{ANNOTATION_THICKNESS, LED_COLOR, PUPIL_COLOR};
use crate::geometry::Ellipse;
use crate::{Error, Result};
use log::debug;
use opencv::core::{Mat, Scalar, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use std::fmt::Write as _;

/// Lifecycle state of a [`PupilLedDetector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No frame and no history
    Cleared,
    /// A frame is loaded but not yet processed
    FrameLoaded,
    /// LED and pupil have been computed for the loaded frame
    Detected,
}

/// Outcome of detecting one frame, all positions in full-frame coordinates
#[derive(Debug)]
pub struct Detection {
    /// LED reflection, if found
    pub led: Option<Ellipse>,
    /// Pupil, if found
    pub pupil: Option<Ellipse>,
    /// Copy of the input frame with the found ellipses drawn on it
    pub annotated: Mat,
    /// Intermediate images, only when the detector collects them
    pub diagnostics: Option<Diagnostics>,
}

impl Detection {
    /// Human-readable summary of the LED and pupil
    #[must_use]
    pub fn result_str(&self) -> String {
        let mut s = String::new();
        match &self.led {
            Some(led) => {
                let _ = write!(s, "LED:\n{led}");
            }
            None => s.push_str("No LED\n"),
        }
        match &self.pupil {
            Some(pupil) => {
                let _ = write!(s, "\nPupil:\n{pupil}");
            }
            None => s.push_str("\nNo Pupil\n"),
        }
        s
    }
}

/// Pupil and LED detector for infrared eye-camera frames
#[derive(Debug)]
pub struct PupilLedDetector {
    params: DetectorParams,
    collect_diagnostics: bool,
    state: DetectorState,
    original: Option<Mat>,
    detection: Option<Detection>,
    last_led: Option<Ellipse>,
    last_pupil: Option<Ellipse>,
}

impl PupilLedDetector {
    /// Create a detector in the `Cleared` state
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the parameters are out of range
    pub fn new(params: DetectorParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            collect_diagnostics: false,
            state: DetectorState::Cleared,
            original: None,
            detection: None,
            last_led: None,
            last_pupil: None,
        })
    }

    /// Keep intermediate images of every detection
    #[must_use]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.collect_diagnostics = enabled;
        self
    }

    /// Current parameters
    #[must_use]
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Replace the whole parameter set
    ///
    /// Nothing changes if validation fails. A loaded frame stays loaded, but
    /// its detection result is discarded.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is out of range or an ROI does not fit
    /// the loaded frame
    pub fn load_parameters(&mut self, params: DetectorParams) -> Result<()> {
        match &self.original {
            Some(frame) => params.validate_for_frame(frame.rows(), frame.cols())?,
            None => params.validate()?,
        }
        self.params = params;
        if self.state == DetectorState::Detected {
            self.detection = None;
            self.state = DetectorState::FrameLoaded;
        }
        Ok(())
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Start a new sequence: forget all history, then load `frame`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-BGR frame, `ConfigError` if an ROI
    /// does not fit it
    pub fn load_first_frame(&mut self, frame: Mat) -> Result<()> {
        self.check_frame(&frame)?;
        self.clear_all();
        self.install(frame);
        Ok(())
    }

    /// Continue a sequence: the current LED and pupil become the history,
    /// then `frame` is loaded
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-BGR frame, `ConfigError` if an ROI
    /// does not fit it
    pub fn load_next_frame(&mut self, frame: Mat) -> Result<()> {
        self.check_frame(&frame)?;
        self.last_led = self.led();
        self.last_pupil = self.pupil();
        self.install(frame);
        Ok(())
    }

    /// Load `frame`, starting a new sequence when `clear_history` is set
    ///
    /// # Errors
    ///
    /// See [`load_first_frame`](Self::load_first_frame)
    pub fn load_frame(&mut self, frame: Mat, clear_history: bool) -> Result<()> {
        if clear_history {
            self.load_first_frame(frame)
        } else {
            self.load_next_frame(frame)
        }
    }

    /// Detect LED and pupil in the loaded frame
    ///
    /// `last_pupil` is supplied by the caller; see
    /// [`detect_frame`](Self::detect_frame).
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if no frame is loaded
    pub fn detect(&mut self, last_pupil: Option<&Ellipse>) -> Result<&Detection> {
        let frame = self
            .original
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("detect called without a loaded frame".to_string()))?;
        let detection = self.detect_frame(frame, last_pupil)?;
        self.state = DetectorState::Detected;
        Ok(self.detection.insert(detection))
    }

    /// Run the LED and pupil stages on `frame` without touching detector state
    ///
    /// With `last_pupil` the pupil candidate nearest to it wins; without, the
    /// most circular candidate wins.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-BGR frame, `ConfigError` if an ROI
    /// does not fit it, or an `OpenCV` error
    pub fn detect_frame(&self, frame: &Mat, last_pupil: Option<&Ellipse>) -> Result<Detection> {
        self.check_frame(frame)?;

        let mut gray = Mat::default();
        imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let mut diagnostics = self.collect_diagnostics.then(Diagnostics::default);

        let led = led::find_led(
            &gray,
            &self.params,
            diagnostics.as_mut().map(|d| &mut d.led),
        )?;
        let pupil = pupil::find_pupil(
            &gray,
            &self.params,
            led.as_ref(),
            last_pupil,
            diagnostics.as_mut().map(|d| &mut d.pupil),
        )?;
        debug!("frame detected: led={}, pupil={}", led.is_some(), pupil.is_some());

        let annotated = annotate(frame, led.as_ref(), pupil.as_ref())?;
        if let Some(diagnostics) = diagnostics.as_mut() {
            diagnostics.preprocessed = Some(gray);
        }

        Ok(Detection {
            led,
            pupil,
            annotated,
            diagnostics,
        })
    }

    /// Drop the intermediate images of the current frame, keeping results and history
    pub fn clear(&mut self) {
        if let Some(detection) = self.detection.as_mut() {
            detection.diagnostics = None;
        }
    }

    /// Drop the frame, its results and all history
    pub fn clear_all(&mut self) {
        self.original = None;
        self.detection = None;
        self.last_led = None;
        self.last_pupil = None;
        self.state = DetectorState::Cleared;
    }

    /// The loaded frame
    #[must_use]
    pub fn original(&self) -> Option<&Mat> {
        self.original.as_ref()
    }

    /// Result of the last [`detect`](Self::detect) on the loaded frame
    #[must_use]
    pub fn detection(&self) -> Option<&Detection> {
        self.detection.as_ref()
    }

    /// LED of the loaded frame, once detected
    #[must_use]
    pub fn led(&self) -> Option<Ellipse> {
        self.detection.as_ref().and_then(|d| d.led)
    }

    /// Pupil of the loaded frame, once detected
    #[must_use]
    pub fn pupil(&self) -> Option<Ellipse> {
        self.detection.as_ref().and_then(|d| d.pupil)
    }

    /// LED of the previous frame in the sequence
    #[must_use]
    pub fn last_led(&self) -> Option<Ellipse> {
        self.last_led
    }

    /// Pupil of the previous frame in the sequence
    #[must_use]
    pub fn last_pupil(&self) -> Option<Ellipse> {
        self.last_pupil
    }

    fn check_frame(&self, frame: &Mat) -> Result<()> {
        if frame.empty() || frame.typ() != CV_8UC3 {
            return Err(Error::InvalidInput(format!(
                "frames must be non-empty 8-bit BGR images, got {}x{} of type {}",
                frame.rows(),
                frame.cols(),
                frame.typ()
            )));
        }
        self.params.validate_for_frame(frame.rows(), frame.cols())
    }

    fn install(&mut self, frame: Mat) {
        self.original = Some(frame);
        self.detection = None;
        self.state = DetectorState::FrameLoaded;
    }
}

fn bgr((b, g, r): (f64, f64, f64)) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

fn annotate(frame: &Mat, led: Option<&Ellipse>, pupil: Option<&Ellipse>) -> Result<Mat> {
    let mut annotated = frame.try_clone()?;
    if let Some(led) = led {
        led.draw(&mut annotated, bgr(LED_COLOR), ANNOTATION_THICKNESS)?;
    }
    if let Some(pupil) = pupil {
        pupil.draw(&mut annotated, bgr(PUPIL_COLOR), ANNOTATION_THICKNESS)?;
    }
    Ok(annotated)
}
