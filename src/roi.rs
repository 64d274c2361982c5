//! Region-of-interest handling.
//!
//! A [`Roi`] is an axis-aligned window `(top, bottom, left, right)` in
//! full-frame pixel coordinates. Positions are `(row, col)` pairs. Moving
//! between ROI-local and full-frame space always goes through
//! [`to_abs_position`] / [`to_rel_position`], which offset by `(top, left)`.

use crate::{Error, Result};
use opencv::core::{Mat, Rect};
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rectangular search window in full-frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct Roi {
    top: i32,
    bottom: i32,
    left: i32,
    right: i32,
}

impl Roi {
    /// Create a new ROI
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a bound is negative or the window is empty
    pub fn new(top: i32, bottom: i32, left: i32, right: i32) -> Result<Self> {
        if top < 0 || left < 0 {
            return Err(Error::ConfigError(format!(
                "ROI origin must be non-negative, got top={top}, left={left}"
            )));
        }
        if top >= bottom || left >= right {
            return Err(Error::ConfigError(format!(
                "ROI must satisfy top < bottom and left < right, got [{top}, {bottom}, {left}, {right}]"
            )));
        }
        Ok(Self { top, bottom, left, right })
    }

    /// First row inside the ROI
    #[must_use]
    pub fn top(&self) -> i32 {
        self.top
    }

    /// Row just past the ROI
    #[must_use]
    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    /// First column inside the ROI
    #[must_use]
    pub fn left(&self) -> i32 {
        self.left
    }

    /// Column just past the ROI
    #[must_use]
    pub fn right(&self) -> i32 {
        self.right
    }

    /// Number of rows covered
    #[must_use]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Number of columns covered
    #[must_use]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    /// `OpenCV` rectangle (x, y, width, height) covering the same pixels
    #[must_use]
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.left, self.top, self.width(), self.height())
    }

    /// Check that the ROI lies inside a frame of `rows` x `cols`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the offending edge
    pub fn check_within(&self, rows: i32, cols: i32) -> Result<()> {
        if self.bottom > rows {
            return Err(Error::ConfigError(format!(
                "ROI bottom {} below frame height {rows}",
                self.bottom
            )));
        }
        if self.right > cols {
            return Err(Error::ConfigError(format!(
                "ROI right {} beyond frame width {cols}",
                self.right
            )));
        }
        Ok(())
    }
}

impl TryFrom<[i32; 4]> for Roi {
    type Error = Error;

    fn try_from(value: [i32; 4]) -> Result<Self> {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<Roi> for [i32; 4] {
    fn from(roi: Roi) -> Self {
        [roi.top, roi.bottom, roi.left, roi.right]
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.top, self.bottom, self.left, self.right)
    }
}

/// Crop an image to the ROI, or copy the whole image when `roi` is `None`
///
/// # Errors
///
/// Returns `ConfigError` if the ROI does not fit inside the image
pub fn apply_roi(img: &Mat, roi: Option<&Roi>) -> Result<Mat> {
    match roi {
        Some(roi) => {
            roi.check_within(img.rows(), img.cols())?;
            let region = Mat::roi(img, roi.to_rect())?;
            Ok(region.try_clone()?)
        }
        None => Ok(img.try_clone()?),
    }
}

/// Convert an ROI-local `(row, col)` position to full-frame coordinates
#[must_use]
pub fn to_abs_position(pos: (f64, f64), roi: Option<&Roi>) -> (f64, f64) {
    match roi {
        Some(roi) => (pos.0 + f64::from(roi.top), pos.1 + f64::from(roi.left)),
        None => pos,
    }
}

/// Convert a full-frame `(row, col)` position to ROI-local coordinates
#[must_use]
pub fn to_rel_position(pos: (f64, f64), roi: Option<&Roi>) -> (f64, f64) {
    match roi {
        Some(roi) => (pos.0 - f64::from(roi.top), pos.1 - f64::from(roi.left)),
        None => pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC1};

    #[test]
    fn test_roi_validation() {
        assert!(Roi::new(0, 10, 0, 10).is_ok());
        assert!(matches!(Roi::new(10, 10, 0, 10), Err(Error::ConfigError(_))));
        assert!(matches!(Roi::new(0, 10, 20, 10), Err(Error::ConfigError(_))));
        assert!(matches!(Roi::new(-1, 10, 0, 10), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_offsets_use_top_and_left() {
        let roi = Roi::new(100, 350, 200, 500).unwrap();
        assert_eq!(to_abs_position((10.0, 20.0), Some(&roi)), (110.0, 220.0));
        assert_eq!(to_rel_position((110.0, 220.0), Some(&roi)), (10.0, 20.0));
        assert_eq!(to_abs_position((10.0, 20.0), None), (10.0, 20.0));
    }

    #[test]
    fn test_apply_roi_crops_expected_window() {
        let mut img = Mat::new_rows_cols_with_default(50, 80, CV_8UC1, Scalar::all(0.0)).unwrap();
        *img.at_2d_mut::<u8>(12, 33).unwrap() = 200;

        let roi = Roi::new(10, 30, 30, 60).unwrap();
        let region = apply_roi(&img, Some(&roi)).unwrap();

        assert_eq!(region.rows(), 20);
        assert_eq!(region.cols(), 30);
        assert_eq!(*region.at_2d::<u8>(2, 3).unwrap(), 200);
    }

    #[test]
    fn test_apply_roi_rejects_out_of_frame() {
        let img = Mat::new_rows_cols_with_default(50, 80, CV_8UC1, Scalar::all(0.0)).unwrap();
        let roi = Roi::new(10, 60, 0, 20).unwrap();
        assert!(matches!(apply_roi(&img, Some(&roi)), Err(Error::ConfigError(_))));

        let whole = apply_roi(&img, None).unwrap();
        assert_eq!((whole.rows(), whole.cols()), (50, 80));
    }

    #[test]
    fn test_roi_sequence_form() {
        let roi: Roi = serde_yaml::from_str("[1, 5, 2, 9]").unwrap();
        assert_eq!(roi, Roi::new(1, 5, 2, 9).unwrap());
        assert!(serde_yaml::from_str::<Roi>("[5, 1, 2, 9]").is_err());
        assert_eq!(serde_yaml::to_string(&roi).unwrap().trim(), "- 1\n- 5\n- 2\n- 9");
    }
}
