//! Intermediate images kept for inspecting a single detection.

use opencv::core::Mat;

/// Images produced by one detection stage, all in ROI-local coordinates
#[derive(Debug, Default)]
pub struct StageImages {
    /// Grayscale crop of the search window
    pub region: Option<Mat>,
    /// Blurred crop (inverted for the pupil stage)
    pub blurred: Option<Mat>,
    /// Binary image after thresholding
    pub thresholded: Option<Mat>,
    /// Binary image after opening and closing
    pub openclosed: Option<Mat>,
    /// Color rendering of the contours that were considered
    pub contoured: Option<Mat>,
}

impl StageImages {
    /// Present images, labelled
    #[must_use]
    pub fn images(&self) -> Vec<(&'static str, &Mat)> {
        [
            ("region", self.region.as_ref()),
            ("blurred", self.blurred.as_ref()),
            ("thresholded", self.thresholded.as_ref()),
            ("openclosed", self.openclosed.as_ref()),
            ("contoured", self.contoured.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, img)| img.map(|img| (name, img)))
        .collect()
    }
}

/// Every intermediate image of one frame's detection
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Full-frame grayscale image both stages start from
    pub preprocessed: Option<Mat>,
    /// LED stage images
    pub led: StageImages,
    /// Pupil stage images
    pub pupil: StageImages,
}

impl Diagnostics {
    /// All present images, labelled `<stage>_<step>`
    #[must_use]
    pub fn images(&self) -> Vec<(String, &Mat)> {
        let mut out = Vec::new();
        if let Some(img) = &self.preprocessed {
            out.push(("preprocessed".to_string(), img));
        }
        for (stage, images) in [("led", &self.led), ("pupil", &self.pupil)] {
            out.extend(
                images
                    .images()
                    .into_iter()
                    .map(|(step, img)| (format!("{stage}_{step}"), img)),
            );
        }
        out
    }
}
