//! Error types for the pupil/LED tracking library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided (wrong image type, missing frame, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Detector parameters are out of range or do not fit the frame
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Degenerate geometry (non-positive axes, too few contour points)
    #[error("Geometry error: {0}")]
    GeometryError(String),

    /// The frame source delivered fewer frames than it advertised
    #[error("Frame source exhausted at frame {index} of {expected}")]
    SourceExhausted {
        /// Index of the frame that could not be read
        index: usize,
        /// Frame count reported by the source
        expected: usize,
    },

    /// Results already exist at the destination and overwrite was not requested
    #[error("Results already exist: {0}")]
    AlreadyProcessed(String),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
