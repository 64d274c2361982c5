//! Per-frame tracking results and where they are stored.
//!
//! Positions are `[row, col]`, shapes are `[axis1, axis2, angle]`, one row
//! per frame. Frames without a detection keep `NaN` in every column.

use crate::config::DetectorParams;
use crate::geometry::Ellipse;
use crate::{Error, Result};
use log::info;
use ndarray::{Array2, ArrayViewMut1};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a batch run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every advertised frame was processed
    Complete,
    /// The source ran out of frames early
    Partial,
    /// Cancelled between frames
    Cancelled,
}

/// Description of the run that produced a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    /// Source description (usually the movie path)
    pub source: String,
    /// Frame count reported by the source
    pub frame_count: usize,
    /// `[rows, cols, channels]` of the frames, once one was read
    pub frame_shape: Option<[i32; 3]>,
    /// Outcome of the run
    pub status: RunStatus,
}

/// One frame's detections; `NaN` where nothing was found
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRecord {
    /// Frame index in the source
    pub frame_index: usize,
    /// LED center `[row, col]`
    pub led_center: [f32; 2],
    /// LED `[axis1, axis2, angle]`
    pub led_shape: [f32; 3],
    /// Pupil center `[row, col]`
    pub pupil_center: [f32; 2],
    /// Pupil `[axis1, axis2, angle]`
    pub pupil_shape: [f32; 3],
}

impl FrameRecord {
    /// Whether an LED was found in this frame
    #[must_use]
    pub fn has_led(&self) -> bool {
        !self.led_center[0].is_nan()
    }

    /// Whether a pupil was found in this frame
    #[must_use]
    pub fn has_pupil(&self) -> bool {
        !self.pupil_center[0].is_nan()
    }
}

/// Accumulated results of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResults {
    /// Run metadata
    pub meta: RunMeta,
    /// Parameters the run used
    pub parameters: DetectorParams,
    /// `N x 2` LED centers
    pub led_positions: Array2<f32>,
    /// `N x 3` LED shapes
    pub led_shapes: Array2<f32>,
    /// `N x 2` pupil centers
    pub pupil_positions: Array2<f32>,
    /// `N x 3` pupil shapes
    pub pupil_shapes: Array2<f32>,
}

#[allow(clippy::cast_possible_truncation)]
fn write_ellipse(ellipse: Option<&Ellipse>, mut position: ArrayViewMut1<f32>, mut shape: ArrayViewMut1<f32>) {
    match ellipse {
        Some(e) => {
            let (row, col) = e.center();
            let (a1, a2) = e.axes();
            position.assign(&ndarray::arr1(&[row as f32, col as f32]));
            shape.assign(&ndarray::arr1(&[a1 as f32, a2 as f32, e.angle() as f32]));
        }
        None => {
            position.fill(f32::NAN);
            shape.fill(f32::NAN);
        }
    }
}

impl TrackingResults {
    /// Empty result set for `frame_count` frames, every slot `NaN`
    #[must_use]
    pub fn new(source: impl Into<String>, frame_count: usize, parameters: DetectorParams) -> Self {
        Self {
            meta: RunMeta {
                source: source.into(),
                frame_count,
                frame_shape: None,
                status: RunStatus::Complete,
            },
            parameters,
            led_positions: Array2::from_elem((frame_count, 2), f32::NAN),
            led_shapes: Array2::from_elem((frame_count, 3), f32::NAN),
            pupil_positions: Array2::from_elem((frame_count, 2), f32::NAN),
            pupil_shapes: Array2::from_elem((frame_count, 3), f32::NAN),
        }
    }

    /// Number of frame slots
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.led_positions.nrows()
    }

    /// Store the detections of frame `index`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `index` is out of range
    pub fn set_frame(&mut self, index: usize, led: Option<&Ellipse>, pupil: Option<&Ellipse>) -> Result<()> {
        if index >= self.frame_count() {
            return Err(Error::InvalidInput(format!(
                "frame index {index} out of range for {} frames",
                self.frame_count()
            )));
        }
        write_ellipse(led, self.led_positions.row_mut(index), self.led_shapes.row_mut(index));
        write_ellipse(pupil, self.pupil_positions.row_mut(index), self.pupil_shapes.row_mut(index));
        Ok(())
    }

    /// Record of frame `index`, `None` if out of range
    #[must_use]
    pub fn record(&self, index: usize) -> Option<FrameRecord> {
        if index >= self.frame_count() {
            return None;
        }
        let pair = |a: &Array2<f32>| [a[[index, 0]], a[[index, 1]]];
        let triple = |a: &Array2<f32>| [a[[index, 0]], a[[index, 1]], a[[index, 2]]];
        Some(FrameRecord {
            frame_index: index,
            led_center: pair(&self.led_positions),
            led_shape: triple(&self.led_shapes),
            pupil_center: pair(&self.pupil_positions),
            pupil_shape: triple(&self.pupil_shapes),
        })
    }

    /// All records in frame order
    pub fn records(&self) -> impl Iterator<Item = FrameRecord> + '_ {
        (0..self.frame_count()).filter_map(|i| self.record(i))
    }
}

/// Destination for a run's results
pub trait ResultsSink {
    /// Whether the destination already holds results
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be inspected
    fn has_data(&self) -> Result<bool>;

    /// Store a complete result set, replacing anything already there
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails
    fn store(&mut self, results: &TrackingResults) -> Result<()>;

    /// Short description used in logs and errors
    fn describe(&self) -> String;
}

/// Results stored as a YAML document on disk
#[derive(Debug, Clone)]
pub struct YamlResultsFile {
    path: PathBuf,
}

impl YamlResultsFile {
    /// Results file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read previously stored results
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be read or parsed
    pub fn load(&self) -> Result<TrackingResults> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| Error::IoError(e.to_string()))?;
        serde_yaml::from_str(&content)
            .map_err(|e| Error::IoError(format!("failed to parse {}: {e}", self.path.display())))
    }
}

impl ResultsSink for YamlResultsFile {
    fn has_data(&self) -> Result<bool> {
        Ok(self.path.exists())
    }

    fn store(&mut self, results: &TrackingResults) -> Result<()> {
        let content = serde_yaml::to_string(results)
            .map_err(|e| Error::IoError(format!("failed to serialize results: {e}")))?;
        std::fs::write(&self.path, content).map_err(|e| Error::IoError(e.to_string()))?;
        info!("Saved tracking results to {}", self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the last stored results in memory
#[derive(Debug, Default)]
pub struct InMemoryResults {
    stored: Option<TrackingResults>,
}

impl InMemoryResults {
    /// Empty destination
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination that already holds `results`
    #[must_use]
    pub fn with_existing(results: TrackingResults) -> Self {
        Self { stored: Some(results) }
    }

    /// Stored results, if any
    #[must_use]
    pub fn results(&self) -> Option<&TrackingResults> {
        self.stored.as_ref()
    }
}

impl ResultsSink for InMemoryResults {
    fn has_data(&self) -> Result<bool> {
        Ok(self.stored.is_some())
    }

    fn store(&mut self, results: &TrackingResults) -> Result<()> {
        self.stored = Some(results.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}
