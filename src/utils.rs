//! Image-processing helpers shared by the LED and pupil stages.

use crate::constants::MAX_INTENSITY;
use crate::{Error, Result};
use ndarray::Array2;
use opencv::core::{self, Mat, Point, Size, Vector, CV_8U};
use opencv::imgproc;
use opencv::prelude::*;

/// Square all-ones structuring element of side `size`
///
/// # Errors
///
/// Returns an error if `OpenCV` fails to allocate the kernel
pub fn square_kernel(size: i32) -> Result<Mat> {
    Ok(Mat::ones(size, size, CV_8U)?.to_mat()?)
}

/// Normalized box blur with a `ksize` x `ksize` kernel
///
/// # Errors
///
/// Returns an error if `OpenCV` fails
pub fn box_blur(src: &Mat, ksize: i32) -> Result<Mat> {
    let mut dst = Mat::default();
    imgproc::blur(
        src,
        &mut dst,
        Size::new(ksize, ksize),
        Point::new(-1, -1),
        core::BORDER_DEFAULT,
    )?;
    Ok(dst)
}

/// Binary threshold where pixels `>= threshold` become 255
///
/// `OpenCV` keeps only pixels strictly above the threshold, so an 8-bit
/// image is cut one level lower.
///
/// # Errors
///
/// Returns an error if `OpenCV` fails
pub fn binary_threshold(src: &Mat, threshold: i32) -> Result<Mat> {
    let mut dst = Mat::default();
    imgproc::threshold(
        src,
        &mut dst,
        f64::from(threshold) - 1.0,
        MAX_INTENSITY,
        imgproc::THRESH_BINARY,
    )?;
    Ok(dst)
}

/// Morphological opening followed by closing with a square kernel of side `size`
///
/// # Errors
///
/// Returns an error if `OpenCV` fails
pub fn open_close(src: &Mat, size: i32) -> Result<Mat> {
    let kernel = square_kernel(size)?;
    let border = imgproc::morphology_default_border_value()?;

    let mut opened = Mat::default();
    imgproc::morphology_ex(
        src,
        &mut opened,
        imgproc::MORPH_OPEN,
        &kernel,
        Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        border,
    )?;

    let mut closed = Mat::default();
    imgproc::morphology_ex(
        &opened,
        &mut closed,
        imgproc::MORPH_CLOSE,
        &kernel,
        Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        border,
    )?;
    Ok(closed)
}

/// All contours of a binary image, hierarchy discarded
///
/// # Errors
///
/// Returns an error if `OpenCV` fails
pub fn find_contours(binary: &Mat) -> Result<Vector<Vector<Point>>> {
    let mut contours: Vector<Vector<Point>> = Vector::new();
    imgproc::find_contours(
        binary,
        &mut contours,
        imgproc::RETR_TREE,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )?;
    Ok(contours)
}

/// Gray copy of a binary image with contours drawn on top, for inspection
///
/// # Errors
///
/// Returns an error if `OpenCV` fails
pub fn draw_contours(binary: &Mat, contours: &Vector<Vector<Point>>) -> Result<Mat> {
    let mut canvas = Mat::default();
    imgproc::cvt_color_def(binary, &mut canvas, imgproc::COLOR_GRAY2BGR)?;
    imgproc::draw_contours_def(&mut canvas, contours, -1, core::Scalar::new(255.0, 0.0, 0.0, 0.0))?;
    Ok(canvas)
}

/// Euclidean distance between two `(row, col)` positions
#[must_use]
pub fn dist2d(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Circularity `4 * pi * area / perimeter^2` of a closed contour
///
/// 1.0 for a perfect circle, towards 0 for elongated shapes. A contour with
/// zero perimeter scores 0.
///
/// # Errors
///
/// Returns an error if `OpenCV` fails
pub fn circularity(contour: &Vector<Point>) -> Result<f64> {
    let area = imgproc::contour_area(contour, false)?;
    let perimeter = imgproc::arc_length(contour, true)?;
    if perimeter <= 0.0 {
        return Ok(0.0);
    }
    Ok(4.0 * std::f64::consts::PI * area / (perimeter * perimeter))
}

/// Copy a single-channel 8-bit `Mat` into an `Array2<u8>` indexed `[row, col]`
///
/// # Errors
///
/// Returns `InvalidInput` for any other image type
pub fn mat_to_array2_u8(mat: &Mat) -> Result<Array2<u8>> {
    if mat.typ() != CV_8U {
        return Err(Error::InvalidInput(format!(
            "expected an 8-bit single-channel image, got type {}",
            mat.typ()
        )));
    }
    let rows = usize::try_from(mat.rows()).map_err(|e| Error::InvalidInput(e.to_string()))?;
    let cols = usize::try_from(mat.cols()).map_err(|e| Error::InvalidInput(e.to_string()))?;

    // ROI views are not continuous; a clone is
    let data = if mat.is_continuous() {
        mat.data_bytes()?.to_vec()
    } else {
        mat.try_clone()?.data_bytes()?.to_vec()
    };

    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::InvalidInput(format!("failed to create array from Mat: {e}")))
}
