//! Constants used throughout the library

/// Default detector parameters
pub const DEFAULT_IS_EQUALIZE: bool = true;
pub const DEFAULT_LED_ROI: [i32; 4] = [200, 300, 280, 400];
pub const DEFAULT_PUPIL_ROI: [i32; 4] = [100, 350, 200, 500];
pub const DEFAULT_LED_BINARY_THRESHOLD: i32 = 200;
pub const DEFAULT_PUPIL_BINARY_THRESHOLD: i32 = 240;
pub const DEFAULT_LED_BLUR: i32 = 2;
pub const DEFAULT_PUPIL_BLUR: i32 = 2;
pub const DEFAULT_LED_OPENCLOSE_ITER: i32 = 1;
pub const DEFAULT_PUPIL_OPENCLOSE_ITER: i32 = 10;
pub const DEFAULT_LED_MIN_SIZE: f64 = 1.0;
pub const DEFAULT_LED_MAX_SIZE: f64 = 1000.0;
pub const DEFAULT_PUPIL_MIN_SIZE: f64 = 500.0;
pub const DEFAULT_LED_MASK_DILATION: i32 = 5;

/// Fewest contour points `fitEllipse` accepts
pub const MIN_CONTOUR_POINTS: usize = 5;

/// Neighbourhood size of the pupil adaptive threshold (must be odd)
pub const ADAPTIVE_BLOCK_SIZE: i32 = 91;

/// Constant subtracted from the adaptive threshold mean
pub const ADAPTIVE_C: f64 = 0.0;

/// Largest 8-bit intensity
pub const MAX_INTENSITY: f64 = 255.0;

/// Annotation colors (BGR)
pub const LED_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0);
pub const PUPIL_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);

/// Line thickness of annotated ellipses
pub const ANNOTATION_THICKNESS: i32 = 2;

/// Annotated output video settings
pub const OUTPUT_FPS: f64 = 30.0;
pub const OUTPUT_FOURCC: [char; 4] = ['X', 'V', 'I', 'D'];

/// Number of progress messages logged over a batch run
pub const PROGRESS_STEPS: usize = 100;
