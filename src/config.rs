//! Detector parameter set and its YAML representation

use crate::constants::{
    DEFAULT_IS_EQUALIZE, DEFAULT_LED_BINARY_THRESHOLD, DEFAULT_LED_BLUR, DEFAULT_LED_MASK_DILATION,
    DEFAULT_LED_MAX_SIZE, DEFAULT_LED_MIN_SIZE, DEFAULT_LED_OPENCLOSE_ITER, DEFAULT_LED_ROI,
    DEFAULT_PUPIL_BINARY_THRESHOLD, DEFAULT_PUPIL_BLUR, DEFAULT_PUPIL_MIN_SIZE,
    DEFAULT_PUPIL_OPENCLOSE_ITER, DEFAULT_PUPIL_ROI,
};
use crate::roi::Roi;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;

/// Complete set of detector parameters
///
/// Loaded and applied as a whole: every key must be present in a config
/// file and unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorParams {
    /// Equalize the pupil region histogram before thresholding
    #[serde(alias = "pupil_is_equalize")]
    pub is_equalize: bool,

    /// LED search window, `None` for the whole frame
    #[serde(deserialize_with = "required_roi")]
    pub led_roi: Option<Roi>,

    /// Pupil search window, `None` for the whole frame
    #[serde(deserialize_with = "required_roi")]
    pub pupil_roi: Option<Roi>,

    /// LED foreground threshold (0-255, inclusive)
    pub led_binary_threshold: i32,

    /// Pupil global threshold applied after the adaptive threshold (0-255, inclusive)
    pub pupil_binary_threshold: i32,

    /// LED box-blur kernel size
    pub led_blur: i32,

    /// Pupil box-blur kernel size
    pub pupil_blur: i32,

    /// Side of the LED open/close structuring element
    pub led_openclose_iter: i32,

    /// Side of the pupil open/close structuring element
    pub pupil_openclose_iter: i32,

    /// Smallest accepted LED ellipse area
    pub led_min_size: f64,

    /// Largest accepted LED ellipse area
    pub led_max_size: f64,

    /// Smallest accepted pupil ellipse area
    pub pupil_min_size: f64,

    /// Side of the square kernel used to grow the LED exclusion mask
    pub led_mask_dilation: i32,
}

// A plain `Option` field would default to `None` when the key is missing
fn required_roi<'de, D>(deserializer: D) -> std::result::Result<Option<Roi>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Roi>::deserialize(deserializer)
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            is_equalize: DEFAULT_IS_EQUALIZE,
            led_roi: Roi::try_from(DEFAULT_LED_ROI).ok(),
            pupil_roi: Roi::try_from(DEFAULT_PUPIL_ROI).ok(),
            led_binary_threshold: DEFAULT_LED_BINARY_THRESHOLD,
            pupil_binary_threshold: DEFAULT_PUPIL_BINARY_THRESHOLD,
            led_blur: DEFAULT_LED_BLUR,
            pupil_blur: DEFAULT_PUPIL_BLUR,
            led_openclose_iter: DEFAULT_LED_OPENCLOSE_ITER,
            pupil_openclose_iter: DEFAULT_PUPIL_OPENCLOSE_ITER,
            led_min_size: DEFAULT_LED_MIN_SIZE,
            led_max_size: DEFAULT_LED_MAX_SIZE,
            pupil_min_size: DEFAULT_PUPIL_MIN_SIZE,
            led_mask_dilation: DEFAULT_LED_MASK_DILATION,
        }
    }
}

impl DetectorParams {
    /// Load parameters from a YAML file
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be read, `ConfigError` if it does
    /// not parse or fails validation
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse and validate parameters from YAML text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on parse or validation failure
    pub fn from_yaml(content: &str) -> Result<Self> {
        let params: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse parameters: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    /// Save parameters to a YAML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if serialization fails, `IoError` if writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize parameters: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Check value ranges that do not depend on the frame
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` describing the first offending value
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("led_binary_threshold", self.led_binary_threshold),
            ("pupil_binary_threshold", self.pupil_binary_threshold),
        ] {
            if !(0..=255).contains(&value) {
                return Err(Error::ConfigError(format!(
                    "{name} must be between 0 and 255, got {value}"
                )));
            }
        }

        for (name, value) in [
            ("led_blur", self.led_blur),
            ("pupil_blur", self.pupil_blur),
            ("led_openclose_iter", self.led_openclose_iter),
            ("pupil_openclose_iter", self.pupil_openclose_iter),
            ("led_mask_dilation", self.led_mask_dilation),
        ] {
            if value <= 0 {
                return Err(Error::ConfigError(format!(
                    "{name} must be a positive kernel size, got {value}"
                )));
            }
        }

        for (name, value) in [
            ("led_min_size", self.led_min_size),
            ("led_max_size", self.led_max_size),
            ("pupil_min_size", self.pupil_min_size),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::ConfigError(format!(
                    "{name} must be a finite non-negative area, got {value}"
                )));
            }
        }
        if self.led_min_size > self.led_max_size {
            return Err(Error::ConfigError(format!(
                "led_min_size ({}) exceeds led_max_size ({})",
                self.led_min_size, self.led_max_size
            )));
        }

        Ok(())
    }

    /// Full validation against a frame of `rows` x `cols`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is out of range or an ROI leaves the frame
    pub fn validate_for_frame(&self, rows: i32, cols: i32) -> Result<()> {
        self.validate()?;
        if let Some(roi) = &self.led_roi {
            roi.check_within(rows, cols)
                .map_err(|e| Error::ConfigError(format!("led_roi: {e}")))?;
        }
        if let Some(roi) = &self.pupil_roi {
            roi.check_within(rows, cols)
                .map_err(|e| Error::ConfigError(format!("pupil_roi: {e}")))?;
        }
        Ok(())
    }
}

struct RoiDisplay<'a>(Option<&'a Roi>);

impl fmt::Display for RoiDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(roi) => write!(f, "{roi}"),
            None => f.write_str("None"),
        }
    }
}

impl fmt::Display for DetectorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LED:")?;
        writeln!(f, "led_roi: {}", RoiDisplay(self.led_roi.as_ref()))?;
        writeln!(f, "led_blur: {}", self.led_blur)?;
        writeln!(f, "led_binary_threshold: {}", self.led_binary_threshold)?;
        writeln!(f, "led_openclose_iter: {}", self.led_openclose_iter)?;
        writeln!(f, "led_min_size: {}", self.led_min_size)?;
        writeln!(f, "led_max_size: {}", self.led_max_size)?;
        writeln!(f, "led_mask_dilation: {}", self.led_mask_dilation)?;
        writeln!(f)?;
        writeln!(f, "PUPIL:")?;
        writeln!(f, "is_equalize: {}", self.is_equalize)?;
        writeln!(f, "pupil_roi: {}", RoiDisplay(self.pupil_roi.as_ref()))?;
        writeln!(f, "pupil_blur: {}", self.pupil_blur)?;
        writeln!(f, "pupil_binary_threshold: {}", self.pupil_binary_threshold)?;
        writeln!(f, "pupil_openclose_iter: {}", self.pupil_openclose_iter)?;
        writeln!(f, "pupil_min_size: {}", self.pupil_min_size)
    }
}

/// Example parameter file content
pub const EXAMPLE_CONFIG: &str = r"# Pupil/LED detector parameters
# ROIs are [top, bottom, left, right] in frame pixels, or null for the whole frame

# Pupil stage
is_equalize: true
pupil_roi: [100, 350, 200, 500]
pupil_binary_threshold: 240
pupil_blur: 2
pupil_openclose_iter: 10
pupil_min_size: 500.0

# LED stage
led_roi: [200, 300, 280, 400]
led_binary_threshold: 200
led_blur: 2
led_openclose_iter: 1
led_min_size: 1.0
led_max_size: 1000.0
led_mask_dilation: 5
";
