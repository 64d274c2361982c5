//! Ellipse model for detected LED reflections and pupils.

use crate::constants::MIN_CONTOUR_POINTS;
use crate::roi::{to_abs_position, to_rel_position, Roi};
use crate::{Error, Result};
use opencv::core::{self, Mat, Point, RotatedRect, Scalar, Size, Vector, CV_8UC1};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Fitted ellipse in image coordinates
///
/// `center` is `(row, col)`, `axes` are the two semi-axis lengths and
/// `angle` is the counter-clockwise rotation of the first axis from the
/// "right" direction, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EllipseFields", into = "EllipseFields")]
pub struct Ellipse {
    center: (f64, f64),
    axes: (f64, f64),
    angle: f64,
}

/// Serialized form; checked through [`Ellipse::new`] on the way in
#[derive(Serialize, Deserialize)]
struct EllipseFields {
    center: (f64, f64),
    axes: (f64, f64),
    angle: f64,
}

impl TryFrom<EllipseFields> for Ellipse {
    type Error = Error;

    fn try_from(fields: EllipseFields) -> Result<Self> {
        Self::new(fields.center, fields.axes, fields.angle)
    }
}

impl From<Ellipse> for EllipseFields {
    fn from(ellipse: Ellipse) -> Self {
        Self {
            center: ellipse.center,
            axes: ellipse.axes,
            angle: ellipse.angle,
        }
    }
}

impl Ellipse {
    /// Create a new ellipse
    ///
    /// # Errors
    ///
    /// Returns `GeometryError` if an axis is not strictly positive or any
    /// value is not finite
    pub fn new(center: (f64, f64), axes: (f64, f64), angle: f64) -> Result<Self> {
        if !(axes.0 > 0.0 && axes.1 > 0.0) || !axes.0.is_finite() || !axes.1.is_finite() {
            return Err(Error::GeometryError(format!(
                "ellipse axes must be positive, got ({}, {})",
                axes.0, axes.1
            )));
        }
        if !center.0.is_finite() || !center.1.is_finite() || !angle.is_finite() {
            return Err(Error::GeometryError(
                "ellipse center and angle must be finite".to_string(),
            ));
        }
        Ok(Self { center, axes, angle })
    }

    /// Convert an `OpenCV` rotated rectangle (as returned by `fitEllipse`)
    ///
    /// # Errors
    ///
    /// Returns `GeometryError` for a degenerate box
    pub fn from_rotated_rect(rect: &RotatedRect) -> Result<Self> {
        Self::new(
            (f64::from(rect.center.y), f64::from(rect.center.x)),
            (f64::from(rect.size.width) / 2.0, f64::from(rect.size.height) / 2.0),
            -f64::from(rect.angle),
        )
    }

    /// Fit an ellipse to contour points
    ///
    /// Callers are expected to drop contours shorter than
    /// [`MIN_CONTOUR_POINTS`] before fitting; shorter input is reported
    /// as a `GeometryError` rather than handed to `OpenCV`.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError` for short or collinear contours
    pub fn fit_from_contour(points: &Vector<Point>) -> Result<Self> {
        if points.len() < MIN_CONTOUR_POINTS {
            return Err(Error::GeometryError(format!(
                "need at least {MIN_CONTOUR_POINTS} points to fit an ellipse, got {}",
                points.len()
            )));
        }
        let rect = imgproc::fit_ellipse(points)?;
        Self::from_rotated_rect(&rect)
    }

    /// Center as `(row, col)`
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    /// Semi-axis lengths
    #[must_use]
    pub fn axes(&self) -> (f64, f64) {
        self.axes
    }

    /// Counter-clockwise rotation of the first axis, degrees
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Area `pi * a1 * a2`
    #[must_use]
    pub fn area(&self) -> f64 {
        PI * self.axes.0 * self.axes.1
    }

    /// Same ellipse expressed in the coordinates of `roi`
    #[must_use]
    pub fn into_roi(&self, roi: Option<&Roi>) -> Self {
        Self {
            center: to_rel_position(self.center, roi),
            ..*self
        }
    }

    /// Same ellipse expressed in full-frame coordinates, from `roi` coordinates
    #[must_use]
    pub fn outof_roi(&self, roi: Option<&Roi>) -> Self {
        Self {
            center: to_abs_position(self.center, roi),
            ..*self
        }
    }

    /// Center, axes and angle in the form `imgproc::ellipse` takes.
    ///
    /// `OpenCV` rotates clockwise in image space, so the angle is negated here
    /// and nowhere else.
    fn cv_params(&self) -> (Point, Size, f64) {
        let center = Point::new(self.center.1.round() as i32, self.center.0.round() as i32);
        let axes = Size::new(self.axes.0.round() as i32, self.axes.1.round() as i32);
        (center, axes, -self.angle)
    }

    /// Filled rasterisation: 1 inside or on the boundary, 0 elsewhere
    ///
    /// # Errors
    ///
    /// Returns an error if `OpenCV` fails to allocate or draw
    pub fn binary_mask(&self, rows: i32, cols: i32) -> Result<Mat> {
        let mut mask = Mat::new_rows_cols_with_default(rows, cols, CV_8UC1, Scalar::all(0.0))?;
        let (center, axes, angle) = self.cv_params();
        imgproc::ellipse(
            &mut mask,
            center,
            axes,
            angle,
            0.0,
            360.0,
            Scalar::all(1.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        Ok(mask)
    }

    /// Mean gray value of the pixels under the ellipse
    ///
    /// Returns `NaN` when the ellipse covers no pixel of the image.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `img` is not a single-channel 2-D image
    pub fn mean_intensity(&self, img: &Mat) -> Result<f64> {
        if img.dims() != 2 || img.channels() != 1 {
            return Err(Error::InvalidInput(format!(
                "mean intensity needs a 2-D single-channel image, got {} dims x {} channels",
                img.dims(),
                img.channels()
            )));
        }
        let mask = self.binary_mask(img.rows(), img.cols())?;
        if core::count_non_zero(&mask)? == 0 {
            return Ok(f64::NAN);
        }
        let mean = core::mean(img, &mask)?;
        Ok(mean[0])
    }

    /// Draw the outline onto a color image
    ///
    /// # Errors
    ///
    /// Returns an error if drawing fails
    pub fn draw(&self, img: &mut Mat, color: Scalar, thickness: i32) -> Result<()> {
        let (center, axes, angle) = self.cv_params();
        imgproc::ellipse(
            img,
            center,
            axes,
            angle,
            0.0,
            360.0,
            color,
            thickness,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }
}

impl fmt::Display for Ellipse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "center: ({:6.2}, {:6.2})", self.center.0, self.center.1)?;
        writeln!(f, "axes:  ({:6.2}, {:6.2})", self.axes.0, self.axes.1)?;
        writeln!(f, "angle: {:8.2} deg", self.angle)?;
        writeln!(f, "area: {:9.2}", self.area())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Point2f, Size2f};
    use proptest::prelude::*;

    fn sample() -> Ellipse {
        Ellipse::new((64.3, 192.2), (22.6, 5.7), 45.0).unwrap()
    }

    #[test]
    fn test_rejects_degenerate_axes() {
        assert!(matches!(
            Ellipse::new((0.0, 0.0), (0.0, 3.0), 0.0),
            Err(Error::GeometryError(_))
        ));
        assert!(Ellipse::new((0.0, 0.0), (2.0, -1.0), 0.0).is_err());
        assert!(Ellipse::new((f64::NAN, 0.0), (2.0, 1.0), 0.0).is_err());
    }

    #[test]
    fn test_binary_mask_follows_rotation() {
        let mask = sample().binary_mask(256, 256).unwrap();
        let at = |r: i32, c: i32| *mask.at_2d::<u8>(r, c).unwrap();

        assert_eq!(at(64, 192), 1);
        assert_eq!(at(64, 212), 0);
        assert_eq!(at(44, 192), 0);
        // major axis runs up-right / down-left for a counter-clockwise angle
        assert_eq!(at(78, 178), 1);
        assert_eq!(at(50, 206), 1);
    }

    #[test]
    fn test_binary_mask_point_symmetry() {
        let ell = Ellipse::new((100.0, 120.0), (30.0, 12.0), 30.0).unwrap();
        let mask = ell.binary_mask(220, 240).unwrap();
        for dr in -35..=35 {
            for dc in -35..=35 {
                let a = *mask.at_2d::<u8>(100 + dr, 120 + dc).unwrap();
                let b = *mask.at_2d::<u8>(100 - dr, 120 - dc).unwrap();
                assert_eq!(a, b, "asymmetric at offset ({dr}, {dc})");
            }
        }
    }

    #[test]
    fn test_mean_intensity() {
        let img = Mat::new_rows_cols_with_default(256, 256, CV_8UC1, Scalar::all(1.0)).unwrap();
        let ell = Ellipse::new((120.5, 70.8), (22.6, 5.7), 25.5).unwrap();
        assert!((ell.mean_intensity(&img).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_intensity_ignores_background() {
        let ell = Ellipse::new((60.0, 80.0), (20.0, 9.0), 30.0).unwrap();
        let mut img = Mat::new_rows_cols_with_default(128, 160, CV_8UC1, Scalar::all(10.0)).unwrap();
        ell.draw(&mut img, Scalar::all(200.0), imgproc::FILLED).unwrap();

        assert!((ell.mean_intensity(&img).unwrap() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_intensity_clipped_by_image_border() {
        let mut img = Mat::new_rows_cols_with_default(40, 50, CV_8UC1, Scalar::all(0.0)).unwrap();
        for r in 0..40 {
            for c in 0..50 {
                *img.at_2d_mut::<u8>(r, c).unwrap() = u8::try_from((3 * r + c) % 256).unwrap();
            }
        }
        let ell = Ellipse::new((4.0, 45.0), (12.0, 8.0), 0.0).unwrap();
        let mask = ell.binary_mask(40, 50).unwrap();

        let (mut sum, mut count) = (0.0, 0.0);
        for r in 0..40 {
            for c in 0..50 {
                if *mask.at_2d::<u8>(r, c).unwrap() != 0 {
                    sum += f64::from(*img.at_2d::<u8>(r, c).unwrap());
                    count += 1.0;
                }
            }
        }
        assert!(count > 0.0 && count < ell.area());
        let expected = sum / count;
        assert!((ell.mean_intensity(&img).unwrap() - expected).abs() < 1e-9);

        let whole_image = core::mean(&img, &core::no_array()).unwrap()[0];
        assert!((expected - whole_image).abs() > 5.0);
    }

    #[test]
    fn test_deserialize_checks_axes() {
        let ell: Ellipse = serde_yaml::from_str("center: [1.0, 2.0]\naxes: [3.0, 4.0]\nangle: 10.0").unwrap();
        assert_eq!(ell, Ellipse::new((1.0, 2.0), (3.0, 4.0), 10.0).unwrap());
        assert!(serde_yaml::from_str::<Ellipse>("center: [1.0, 2.0]\naxes: [0.0, 4.0]\nangle: 10.0").is_err());

        let text = serde_yaml::to_string(&sample()).unwrap();
        assert_eq!(serde_yaml::from_str::<Ellipse>(&text).unwrap(), sample());
    }

    #[test]
    fn test_mean_intensity_rejects_color() {
        let img = Mat::new_rows_cols_with_default(16, 16, core::CV_8UC3, Scalar::all(1.0)).unwrap();
        assert!(matches!(
            sample().mean_intensity(&img),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_roi_mask_matches_full_frame_mask() {
        let roi = Roi::new(0, 128, 128, 256).unwrap();
        let local = sample().into_roi(Some(&roi));
        assert_eq!(local.center(), (64.3, 64.2));

        let mask = local.binary_mask(128, 128).unwrap();
        let at = |r: i32, c: i32| *mask.at_2d::<u8>(r, c).unwrap();
        assert_eq!(at(64, 64), 1);
        assert_eq!(at(64, 84), 0);
        assert_eq!(at(44, 64), 0);
        assert_eq!(at(78, 50), 1);
        assert_eq!(at(50, 78), 1);
    }

    #[test]
    fn test_from_rotated_rect_swaps_and_halves() {
        let rect = RotatedRect::new(Point2f::new(40.0, 10.0), Size2f::new(20.0, 8.0), 30.0).unwrap();
        let ell = Ellipse::from_rotated_rect(&rect).unwrap();
        assert_eq!(ell.center(), (10.0, 40.0));
        assert_eq!(ell.axes(), (10.0, 4.0));
        assert_eq!(ell.angle(), -30.0);
    }

    #[test]
    fn test_fit_requires_five_points() {
        let points: Vector<Point> = [(0, 0), (4, 0), (4, 4), (0, 4)]
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect();
        assert!(matches!(
            Ellipse::fit_from_contour(&points),
            Err(Error::GeometryError(_))
        ));
    }

    #[test]
    fn test_fit_recovers_circle() {
        let points: Vector<Point> = (0..36)
            .map(|i| {
                let t = f64::from(i) * 10.0_f64.to_radians();
                Point::new(
                    (50.0 + 20.0 * t.cos()).round() as i32,
                    (30.0 + 20.0 * t.sin()).round() as i32,
                )
            })
            .collect();
        let ell = Ellipse::fit_from_contour(&points).unwrap();
        assert!((ell.center().0 - 30.0).abs() < 0.5);
        assert!((ell.center().1 - 50.0).abs() < 0.5);
        assert!((ell.axes().0 - 20.0).abs() < 0.5);
        assert!((ell.axes().1 - 20.0).abs() < 0.5);
    }

    #[test]
    fn test_display_lists_all_fields() {
        let text = sample().to_string();
        assert!(text.contains("center: ( 64.30, 192.20)"));
        assert!(text.contains("angle:    45.00 deg"));
        assert!(text.contains("area:"));
    }

    proptest! {
        #[test]
        fn prop_area_is_pi_a_b(a in 0.01f64..500.0, b in 0.01f64..500.0, angle in -180.0f64..180.0) {
            let ell = Ellipse::new((10.0, 10.0), (a, b), angle).unwrap();
            prop_assert!((ell.area() - PI * a * b).abs() <= 1e-9 * ell.area().max(1.0));
        }

        #[test]
        fn prop_roi_round_trip(
            row in -1000.0f64..1000.0,
            col in -1000.0f64..1000.0,
            top in 0i32..500,
            left in 0i32..500,
            h in 1i32..500,
            w in 1i32..500,
        ) {
            let roi = Roi::new(top, top + h, left, left + w).unwrap();
            let ell = Ellipse::new((row, col), (3.0, 2.0), 12.5).unwrap();
            let back = ell.into_roi(Some(&roi)).outof_roi(Some(&roi));
            prop_assert!((back.center().0 - row).abs() < 1e-9);
            prop_assert!((back.center().1 - col).abs() < 1e-9);
            prop_assert_eq!(back.axes(), ell.axes());
            prop_assert_eq!(back.angle(), ell.angle());
        }
    }
}
