//! Frame sources and annotated-frame sinks.
//!
//! The tracker reads frames through [`FrameSource`] and hands annotated
//! frames to a [`FrameSink`]. Video-file adapters use `OpenCV`'s `videoio`;
//! the in-memory adapters back tests and callers that already hold frames.

use crate::constants::{OUTPUT_FOURCC, OUTPUT_FPS};
use crate::{Error, Result};
use log::{debug, info};
use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoWriter};
use std::path::{Path, PathBuf};

/// Indexable sequence of 8-bit BGR frames of known length
pub trait FrameSource {
    /// Number of frames the source reports
    fn frame_count(&self) -> usize;

    /// Read frame `index`
    ///
    /// # Errors
    ///
    /// Returns `SourceExhausted` if the frame cannot be delivered
    fn read_frame(&mut self, index: usize) -> Result<Mat>;

    /// Short description used in logs and result metadata
    fn describe(&self) -> String;
}

/// Consumer of annotated frames
pub trait FrameSink {
    /// Append one frame
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written
    fn write_frame(&mut self, frame: &Mat) -> Result<()>;

    /// Flush and close the sink
    ///
    /// # Errors
    ///
    /// Returns an error if closing fails
    fn finish(&mut self) -> Result<()>;
}

/// Frames decoded from a video file
pub struct VideoFileSource {
    path: PathBuf,
    capture: VideoCapture,
    frame_count: usize,
    next_index: usize,
}

impl VideoFileSource {
    /// Open a video file
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be opened for decoding
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .to_str()
            .ok_or_else(|| Error::IoError(format!("non UTF-8 video path: {}", path.display())))?;

        let capture = VideoCapture::from_file(name, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::IoError(format!("failed to open video: {}", path.display())));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let frame_count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;
        info!("Opened {} ({frame_count} frames)", path.display());

        Ok(Self {
            path,
            capture,
            frame_count,
            next_index: 0,
        })
    }
}

impl FrameSource for VideoFileSource {
    fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[allow(clippy::cast_precision_loss)]
    fn read_frame(&mut self, index: usize) -> Result<Mat> {
        let exhausted = Error::SourceExhausted {
            index,
            expected: self.frame_count,
        };
        if index >= self.frame_count {
            return Err(exhausted);
        }
        if index != self.next_index {
            debug!("seeking {} to frame {index}", self.path.display());
            let seeked = self.capture.set(videoio::CAP_PROP_POS_FRAMES, index as f64)?;
            check_seek(seeked, &self.path, index)?;
        }

        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Err(exhausted);
        }
        self.next_index = index + 1;
        Ok(frame)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fail when the backend refused to seek
fn check_seek(seeked: bool, path: &Path, index: usize) -> Result<()> {
    if seeked {
        Ok(())
    } else {
        Err(Error::IoError(format!(
            "cannot seek {} to frame {index}",
            path.display()
        )))
    }
}

/// XVID-encoded video file, opened on the first frame
pub struct VideoFileSink {
    path: PathBuf,
    fps: f64,
    writer: Option<VideoWriter>,
}

impl VideoFileSink {
    /// Sink writing to `path` at the default frame rate
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            fps: OUTPUT_FPS,
            writer: None,
        }
    }

    /// Override the output frame rate
    #[must_use]
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    fn open_writer(&self, size: Size) -> Result<VideoWriter> {
        let name = self
            .path
            .to_str()
            .ok_or_else(|| Error::IoError(format!("non UTF-8 output path: {}", self.path.display())))?;
        let [a, b, c, d] = OUTPUT_FOURCC;
        let fourcc = VideoWriter::fourcc(a, b, c, d)?;
        let writer = VideoWriter::new(name, fourcc, self.fps, size, true)?;
        if !writer.is_opened()? {
            return Err(Error::IoError(format!(
                "failed to open video writer: {}",
                self.path.display()
            )));
        }
        info!("Writing annotated video to {}", self.path.display());
        Ok(writer)
    }
}

impl FrameSink for VideoFileSink {
    fn write_frame(&mut self, frame: &Mat) -> Result<()> {
        if self.writer.is_none() {
            self.writer = Some(self.open_writer(frame.size()?)?);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write(frame)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.release()?;
        }
        Ok(())
    }
}

/// Frames held in memory
///
/// May advertise more frames than it holds, which makes reads past the end
/// fail with `SourceExhausted`.
pub struct InMemorySource {
    frames: Vec<Mat>,
    advertised: usize,
}

impl InMemorySource {
    /// Source over `frames`
    #[must_use]
    pub fn new(frames: Vec<Mat>) -> Self {
        let advertised = frames.len();
        Self { frames, advertised }
    }

    /// Report `count` frames regardless of how many are held
    #[must_use]
    pub fn with_advertised_count(mut self, count: usize) -> Self {
        self.advertised = count;
        self
    }
}

impl FrameSource for InMemorySource {
    fn frame_count(&self) -> usize {
        self.advertised
    }

    fn read_frame(&mut self, index: usize) -> Result<Mat> {
        match self.frames.get(index) {
            Some(frame) if index < self.advertised => Ok(frame.try_clone()?),
            _ => Err(Error::SourceExhausted {
                index,
                expected: self.advertised,
            }),
        }
    }

    fn describe(&self) -> String {
        format!("<memory: {} frames>", self.frames.len())
    }
}

/// Collects annotated frames in memory
#[derive(Default)]
pub struct InMemorySink {
    frames: Vec<Mat>,
    finished: bool,
}

impl InMemorySink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written so far
    #[must_use]
    pub fn frames(&self) -> &[Mat] {
        &self.frames
    }

    /// Whether [`FrameSink::finish`] was called
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for InMemorySink {
    fn write_frame(&mut self, frame: &Mat) -> Result<()> {
        self.frames.push(frame.try_clone()?);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Discards annotated frames
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn write_frame(&mut self, _frame: &Mat) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn frame(value: f64) -> Mat {
        Mat::new_rows_cols_with_default(8, 10, CV_8UC3, Scalar::all(value)).unwrap()
    }

    #[test]
    fn test_in_memory_source_reads_by_index() {
        let mut source = InMemorySource::new(vec![frame(1.0), frame(2.0)]);
        assert_eq!(source.frame_count(), 2);
        let second = source.read_frame(1).unwrap();
        assert_eq!(second.at_2d::<opencv::core::Vec3b>(0, 0).unwrap()[0], 2);
        assert!(matches!(
            source.read_frame(2),
            Err(Error::SourceExhausted { index: 2, expected: 2 })
        ));
    }

    #[test]
    fn test_in_memory_source_overstated_count() {
        let mut source = InMemorySource::new(vec![frame(0.0)]).with_advertised_count(3);
        assert_eq!(source.frame_count(), 3);
        assert!(source.read_frame(0).is_ok());
        assert!(matches!(
            source.read_frame(1),
            Err(Error::SourceExhausted { index: 1, expected: 3 })
        ));
    }

    #[test]
    fn test_refused_seek_is_an_error() {
        let path = Path::new("eye.avi");
        assert!(check_seek(true, path, 4).is_ok());
        match check_seek(false, path, 4) {
            Err(Error::IoError(msg)) => assert!(msg.contains("eye.avi") && msg.contains("frame 4")),
            other => panic!("expected IoError, got {other:?}"),
        }
    }

    #[test]
    fn test_in_memory_sink() {
        let mut sink = InMemorySink::new();
        sink.write_frame(&frame(5.0)).unwrap();
        sink.write_frame(&frame(6.0)).unwrap();
        assert!(!sink.is_finished());
        sink.finish().unwrap();
        assert!(sink.is_finished());
        assert_eq!(sink.frames().len(), 2);
    }

    #[test]
    fn test_missing_video_file() {
        assert!(VideoFileSource::open("/nonexistent/movie.avi").is_err());
    }
}
