//! Batch driver feeding a whole frame source through the detector.

use crate::constants::PROGRESS_STEPS;
use crate::detector::PupilLedDetector;
use crate::geometry::Ellipse;
use crate::results::{ResultsSink, RunStatus, TrackingResults};
use crate::video::{FrameSink, FrameSource};
use crate::{Error, Result};
use log::{info, warn};
use opencv::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which pupil the next frame's tie-break sees after a frame without one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContinuityPolicy {
    /// Only the immediately preceding frame counts; a miss leaves no prior
    #[default]
    ResetOnMiss,
    /// The most recent pupil found is kept across misses
    CarryForward,
}

impl FromStr for ContinuityPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reset" | "reset-on-miss" => Ok(Self::ResetOnMiss),
            "carry" | "carry-forward" => Ok(Self::CarryForward),
            other => Err(Error::ConfigError(format!(
                "unknown continuity policy '{other}', expected 'reset' or 'carry-forward'"
            ))),
        }
    }
}

/// Batch run options
#[derive(Debug, Clone, Default)]
pub struct TrackerOptions {
    /// Replace results already present at the destination
    pub overwrite: bool,
    /// Continuity policy for the pupil tie-break
    pub continuity: ContinuityPolicy,
    /// Checked between frames; set it to stop the run
    pub cancel: Arc<AtomicBool>,
}

/// Counts and timing of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames the source advertised
    pub frames_total: usize,
    /// Frames actually detected
    pub frames_processed: usize,
    /// Frames with an LED
    pub led_detected: usize,
    /// Frames with a pupil
    pub pupil_detected: usize,
    /// How the run ended
    pub status: RunStatus,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {}/{} frames, LED in {}, pupil in {}, {:.1}s",
            self.status,
            self.frames_processed,
            self.frames_total,
            self.led_detected,
            self.pupil_detected,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Output locations derived from an input movie path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Annotated video
    pub video: PathBuf,
    /// Parameter snapshot, also read back as the default config
    pub parameters: PathBuf,
    /// Tracking results
    pub results: PathBuf,
}

impl OutputPaths {
    /// `<stem>_output.avi`, `<stem>_output.yml` and `<stem>_output_data.yml`
    /// next to `input`
    pub fn for_input<P: AsRef<Path>>(input: P) -> Self {
        let input = input.as_ref();
        let stem = input
            .file_stem()
            .map_or_else(|| "movie".into(), |s| s.to_string_lossy());
        let sibling = |suffix: &str| input.with_file_name(format!("{stem}{suffix}"));
        Self {
            video: sibling("_output.avi"),
            parameters: sibling("_output.yml"),
            results: sibling("_output_data.yml"),
        }
    }
}

/// Runs a [`PupilLedDetector`] over every frame of a source
pub struct Tracker {
    detector: PupilLedDetector,
    options: TrackerOptions,
}

impl Tracker {
    /// Tracker driving `detector`
    #[must_use]
    pub fn new(detector: PupilLedDetector, options: TrackerOptions) -> Self {
        Self { detector, options }
    }

    /// The wrapped detector
    #[must_use]
    pub fn detector(&self) -> &PupilLedDetector {
        &self.detector
    }

    /// Mutable access, e.g. to load new parameters between runs
    pub fn detector_mut(&mut self) -> &mut PupilLedDetector {
        &mut self.detector
    }

    /// Run options
    #[must_use]
    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    /// Handle that cancels a running batch when set
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.options.cancel)
    }

    /// Process every frame of `source`
    ///
    /// Annotated frames go to `video`; the parameter snapshot and per-frame
    /// arrays go to `results` once the run ends, including partial and
    /// cancelled runs. The detector is cleared afterwards, also when the run
    /// fails; a failed run finishes `video` with the frames written so far
    /// and stores nothing.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyProcessed` if `results` holds data and overwrite is
    /// off, `InvalidInput` if a frame's shape differs from the first frame,
    /// or any detector or sink error
    pub fn run<S, V, R>(&mut self, source: &mut S, video: &mut V, results: &mut R) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        V: FrameSink + ?Sized,
        R: ResultsSink + ?Sized,
    {
        let start = Instant::now();

        if results.has_data()? {
            if !self.options.overwrite {
                return Err(Error::AlreadyProcessed(results.describe()));
            }
            warn!("Overwriting existing results in {}", results.describe());
        }

        let frames_total = source.frame_count();
        let source_name = source.describe();
        let mut summary = RunSummary {
            frames_total,
            frames_processed: 0,
            led_detected: 0,
            pupil_detected: 0,
            status: RunStatus::Complete,
            elapsed: Duration::ZERO,
        };

        if frames_total == 0 {
            info!("{source_name} has no frames, nothing to track");
            summary.elapsed = start.elapsed();
            return Ok(summary);
        }

        info!(
            "Tracking {source_name}: {frames_total} frames, continuity {:?}",
            self.options.continuity
        );
        let mut tracked = TrackingResults::new(source_name, frames_total, self.detector.params().clone());

        if let Err(e) = self.track_frames(source, video, &mut tracked, &mut summary) {
            warn!("Run aborted after {} frames: {e}", summary.frames_processed);
            if let Err(finish_err) = video.finish() {
                warn!("Could not finish video output: {finish_err}");
            }
            self.detector.clear_all();
            return Err(e);
        }

        tracked.meta.status = summary.status;
        let stored = video.finish().and_then(|()| results.store(&tracked));
        self.detector.clear_all();
        stored?;

        summary.elapsed = start.elapsed();
        info!("Tracking finished. {summary}");
        Ok(summary)
    }

    /// Detect every frame into `tracked`, stopping early on cancel or a short source
    fn track_frames<S, V>(
        &mut self,
        source: &mut S,
        video: &mut V,
        tracked: &mut TrackingResults,
        summary: &mut RunSummary,
    ) -> Result<()>
    where
        S: FrameSource + ?Sized,
        V: FrameSink + ?Sized,
    {
        let frames_total = summary.frames_total;
        let progress_step = (frames_total / PROGRESS_STEPS).max(1);
        let mut carried: Option<Ellipse> = None;

        for index in 0..frames_total {
            if self.options.cancel.load(Ordering::Relaxed) {
                warn!("Run cancelled after {index} of {frames_total} frames");
                summary.status = RunStatus::Cancelled;
                break;
            }

            let frame = match source.read_frame(index) {
                Ok(frame) => frame,
                Err(Error::SourceExhausted { index, expected }) => {
                    warn!("Source exhausted at frame {index} of {expected}, keeping partial results");
                    summary.status = RunStatus::Partial;
                    break;
                }
                Err(e) => return Err(e),
            };

            let shape = [frame.rows(), frame.cols(), frame.channels()];
            match tracked.meta.frame_shape {
                None => tracked.meta.frame_shape = Some(shape),
                Some(expected) if expected != shape => {
                    return Err(Error::InvalidInput(format!(
                        "frame {index} has shape {shape:?}, expected {expected:?}"
                    )));
                }
                Some(_) => {}
            }

            if index == 0 {
                self.detector.load_first_frame(frame)?;
            } else {
                self.detector.load_next_frame(frame)?;
            }
            let last_pupil = match self.options.continuity {
                ContinuityPolicy::ResetOnMiss => self.detector.last_pupil(),
                ContinuityPolicy::CarryForward => carried,
            };

            let detection = self.detector.detect(last_pupil.as_ref())?;
            tracked.set_frame(index, detection.led.as_ref(), detection.pupil.as_ref())?;
            video.write_frame(&detection.annotated)?;

            if detection.led.is_some() {
                summary.led_detected += 1;
            }
            if detection.pupil.is_some() {
                summary.pupil_detected += 1;
                carried = detection.pupil;
            }
            summary.frames_processed += 1;

            if (index + 1) % progress_step == 0 {
                info!(
                    "{}/{frames_total} frames ({}%)",
                    index + 1,
                    (index + 1) * 100 / frames_total
                );
            }
        }
        Ok(())
    }
}
