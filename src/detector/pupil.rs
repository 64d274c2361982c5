//! Pupil stage: two-pass thresholding, LED exclusion and candidate tie-break.

use super::diagnostics::StageImages;
use crate::config::DetectorParams;
use crate::constants::{
    ADAPTIVE_BLOCK_SIZE, ADAPTIVE_C, LED_COLOR, MAX_INTENSITY, MIN_CONTOUR_POINTS,
};
use crate::geometry::Ellipse;
use crate::roi::apply_roi;
use crate::utils::{
    binary_threshold, box_blur, circularity, dist2d, draw_contours, find_contours,
    mat_to_array2_u8, open_close, square_kernel,
};
use crate::Result;
use log::debug;
use ndarray::Array2;
use opencv::core::{self, Mat, Point, Scalar, Vector};
use opencv::imgproc;
use opencv::prelude::*;

struct Candidate {
    ellipse: Ellipse,
    contour: Vector<Point>,
}

/// Find the pupil in a preprocessed grayscale frame
///
/// `led` is this frame's LED (full-frame coordinates); when present, contour
/// points under its dilated footprint are discarded before fitting.
/// `last_pupil` (full-frame coordinates) switches the tie-break from
/// "most circular" to "closest to the previous pupil".
pub(crate) fn find_pupil(
    gray: &Mat,
    params: &DetectorParams,
    led: Option<&Ellipse>,
    last_pupil: Option<&Ellipse>,
    images: Option<&mut StageImages>,
) -> Result<Option<Ellipse>> {
    let roi = params.pupil_roi.as_ref();
    let region = apply_roi(gray, roi)?;

    let equalized = if params.is_equalize {
        let mut dst = Mat::default();
        imgproc::equalize_hist(&region, &mut dst)?;
        Some(dst)
    } else {
        None
    };
    let blurred = box_blur(equalized.as_ref().unwrap_or(&region), params.pupil_blur)?;
    let mut inverted = Mat::default();
    core::bitwise_not(&blurred, &mut inverted, &core::no_array())?;

    let mut adaptive = Mat::default();
    imgproc::adaptive_threshold(
        &inverted,
        &mut adaptive,
        MAX_INTENSITY,
        imgproc::ADAPTIVE_THRESH_GAUSSIAN_C,
        imgproc::THRESH_BINARY,
        ADAPTIVE_BLOCK_SIZE,
        ADAPTIVE_C,
    )?;
    let smoothed = box_blur(&adaptive, params.pupil_blur)?;
    let thresholded = binary_threshold(&smoothed, params.pupil_binary_threshold)?;
    let openclosed = open_close(&thresholded, params.pupil_openclose_iter)?;
    let contours = find_contours(&openclosed)?;

    let local_led = led.map(|led| led.into_roi(roi));
    let contours = match &local_led {
        Some(local_led) => mask_led(
            &contours,
            local_led,
            region.rows(),
            region.cols(),
            params.led_mask_dilation,
        )?,
        None => contours,
    };

    let candidates = fit_candidates(&contours, params.pupil_min_size);
    debug!(
        "pupil stage: {} contours after LED masking, {} candidates",
        contours.len(),
        candidates.len()
    );

    if let Some(images) = images {
        let mut contoured = draw_contours(&openclosed, &contours)?;
        if let Some(local_led) = &local_led {
            let (b, g, r) = LED_COLOR;
            local_led.draw(&mut contoured, Scalar::new(b, g, r, 0.0), 1)?;
        }
        images.contoured = Some(contoured);
        images.region = Some(region);
        images.blurred = Some(inverted);
        images.thresholded = Some(thresholded);
        images.openclosed = Some(openclosed);
    }

    let last_local = last_pupil.map(|p| p.into_roi(roi));
    let chosen = select_candidate(&candidates, last_local.as_ref())?;

    Ok(chosen.map(|i| candidates[i].ellipse.outof_roi(roi)))
}

/// Drop contour points under the dilated LED footprint
///
/// `local_led` is in region coordinates; the mask is rasterised at the region
/// size. Contours left without points are removed.
fn mask_led(
    contours: &Vector<Vector<Point>>,
    local_led: &Ellipse,
    rows: i32,
    cols: i32,
    dilation: i32,
) -> Result<Vector<Vector<Point>>> {
    let footprint = local_led.binary_mask(rows, cols)?;
    let kernel = square_kernel(dilation)?;
    let mut dilated = Mat::default();
    imgproc::dilate(
        &footprint,
        &mut dilated,
        &kernel,
        Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;
    let mask = mat_to_array2_u8(&dilated)?;

    Ok(contours
        .iter()
        .map(|contour| {
            contour
                .iter()
                .filter(|p| !is_masked(&mask, *p))
                .collect::<Vector<Point>>()
        })
        .filter(|kept| !kept.is_empty())
        .collect())
}

fn is_masked(mask: &Array2<u8>, p: Point) -> bool {
    match (usize::try_from(p.y), usize::try_from(p.x)) {
        (Ok(row), Ok(col)) => mask.get([row, col]).is_some_and(|&v| v != 0),
        _ => false,
    }
}

/// Fit every contour with enough points and keep those of sufficient area
fn fit_candidates(contours: &Vector<Vector<Point>>, min_area: f64) -> Vec<Candidate> {
    contours
        .iter()
        .filter(|c| c.len() >= MIN_CONTOUR_POINTS)
        .filter_map(|contour| match Ellipse::fit_from_contour(&contour) {
            Ok(ellipse) => Some(Candidate { ellipse, contour }),
            Err(e) => {
                debug!("pupil contour skipped: {e}");
                None
            }
        })
        .filter(|c| c.ellipse.area() >= min_area)
        .collect()
}

/// Index of the winning candidate; ties go to the earlier one
fn select_candidate(candidates: &[Candidate], last_local: Option<&Ellipse>) -> Result<Option<usize>> {
    let mut best: Option<(usize, f64)> = None;
    match last_local {
        Some(last) => {
            for (i, c) in candidates.iter().enumerate() {
                let d = dist2d(c.ellipse.center(), last.center());
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((i, d));
                }
            }
        }
        None => {
            for (i, c) in candidates.iter().enumerate() {
                let circ = circularity(&c.contour)?;
                if best.map_or(true, |(_, bc)| circ > bc) {
                    best = Some((i, circ));
                }
            }
        }
    }
    Ok(best.map(|(i, _)| i))
}
