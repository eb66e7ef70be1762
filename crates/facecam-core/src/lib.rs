//! facecam-core — face detection, recognition and the on-disk face dataset.
//!
//! Wraps OpenCV's Haar cascade detector and LBPH recognizer behind small
//! traits that take grayscale `image` buffers.

pub mod confidence;
mod cv;
pub mod dataset;
pub mod detector;
pub mod recognizer;
pub mod trainer;
pub mod types;

pub use confidence::{is_known, to_confidence, CONFIDENCE_THRESHOLD, LBPH_MAX_DIST};
pub use dataset::{DatasetError, DatasetStore, SampleWriter};
pub use detector::{CascadeDetector, DetectParams, DetectorError, FaceDetector};
pub use recognizer::{FaceRecognizer, LbphParams, LbphRecognizer, RecognizerError};
pub use trainer::{train, TrainError, TrainedModel};
pub use types::{Label, LabelMap, Prediction, Rect};

/// Face samples collected per enrollment.
pub const CAPTURE_COUNT: u32 = 150;
