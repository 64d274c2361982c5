//! LED reflection stage.

use super::diagnostics::StageImages;
use crate::config::DetectorParams;
use crate::constants::MIN_CONTOUR_POINTS;
use crate::geometry::Ellipse;
use crate::roi::apply_roi;
use crate::utils::{binary_threshold, box_blur, draw_contours, find_contours, open_close};
use crate::Result;
use log::debug;
use opencv::core::{Mat, Point, Vector};

/// Find the LED reflection in a preprocessed grayscale frame
///
/// The largest fitted ellipse in the LED window is accepted when its area
/// lies within `[led_min_size, led_max_size]`. The result is in full-frame
/// coordinates.
pub(crate) fn find_led(
    gray: &Mat,
    params: &DetectorParams,
    images: Option<&mut StageImages>,
) -> Result<Option<Ellipse>> {
    let roi = params.led_roi.as_ref();
    let region = apply_roi(gray, roi)?;
    let blurred = box_blur(&region, params.led_blur)?;
    let thresholded = binary_threshold(&blurred, params.led_binary_threshold)?;
    let openclosed = open_close(&thresholded, params.led_openclose_iter)?;
    let contours = find_contours(&openclosed)?;

    let largest = largest_ellipse(&contours);
    debug!("LED stage: {} contours, largest fit {:?}", contours.len(), largest.map(|e| e.area()));

    if let Some(images) = images {
        images.contoured = Some(draw_contours(&openclosed, &contours)?);
        images.region = Some(region);
        images.blurred = Some(blurred);
        images.thresholded = Some(thresholded);
        images.openclosed = Some(openclosed);
    }

    let Some(led) = largest else {
        return Ok(None);
    };
    let area = led.area();
    if area < params.led_min_size || area > params.led_max_size {
        debug!(
            "LED rejected: area {area:.2} outside [{}, {}]",
            params.led_min_size, params.led_max_size
        );
        return Ok(None);
    }

    Ok(Some(led.outof_roi(roi)))
}

/// Ellipse of maximum area over the fittable contours, first one wins ties
fn largest_ellipse(contours: &Vector<Vector<Point>>) -> Option<Ellipse> {
    let mut best: Option<Ellipse> = None;
    for contour in contours.iter().filter(|c| c.len() >= MIN_CONTOUR_POINTS) {
        match Ellipse::fit_from_contour(&contour) {
            Ok(ell) => {
                if best.map_or(true, |b| ell.area() > b.area()) {
                    best = Some(ell);
                }
            }
            Err(e) => debug!("LED contour skipped: {e}"),
        }
    }
    best
}
