//! Haar cascade face detection via OpenCV's `CascadeClassifier`.

use crate::cv;
use crate::types::Rect;
use image::GrayImage;
use opencv::core::{Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use std::path::Path;
use thiserror::Error;

// --- Detection defaults ---
const DEFAULT_SCALE_FACTOR: f64 = 1.3;
const DEFAULT_MIN_NEIGHBORS: u32 = 5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("cascade file not found: {0} (install OpenCV's haarcascades or set FACECAM_CASCADE_PATH)")]
    ModelNotFound(String),
    #[error("cascade {0} could not be loaded")]
    InvalidCascade(String),
    #[error("invalid detection parameters: {0}")]
    InvalidParams(String),
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Multi-scale detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Pyramid step between consecutive scales. Must be > 1.
    pub scale_factor: f64,
    /// Neighbouring hits a candidate needs to be kept.
    pub min_neighbors: u32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
        }
    }
}

impl DetectParams {
    fn validate(&self) -> Result<(), DetectorError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(DetectorError::InvalidParams(format!(
                "scale_factor must be > 1, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

/// Strategy for locating faces in a grayscale frame.
pub trait FaceDetector {
    fn detect(&mut self, gray: &GrayImage, params: &DetectParams) -> Result<Vec<Rect>, DetectorError>;
}

/// Frontal-face detector backed by an OpenCV XML cascade.
pub struct CascadeDetector {
    classifier: CascadeClassifier,
}

impl CascadeDetector {
    /// Load a cascade from an OpenCV XML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DetectorError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DetectorError::ModelNotFound(path.display().to_string()));
        }

        let name = path.to_string_lossy();
        // OpenCV reports unparseable files either as an error or as an empty classifier.
        let classifier = CascadeClassifier::new(&name)
            .map_err(|e| DetectorError::InvalidCascade(format!("{name}: {e}")))?;
        if classifier.empty()? {
            return Err(DetectorError::InvalidCascade(name.into_owned()));
        }

        tracing::info!(path = %path.display(), "loaded Haar cascade");
        Ok(Self { classifier })
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&mut self, gray: &GrayImage, params: &DetectParams) -> Result<Vec<Rect>, DetectorError> {
        params.validate()?;

        let mat = cv::gray_to_mat(gray)?;
        let mut found = Vector::<opencv::core::Rect>::new();
        self.classifier.detect_multi_scale(
            &mat,
            &mut found,
            params.scale_factor,
            params.min_neighbors as i32,
            0,
            Size::new(0, 0),
            Size::new(0, 0),
        )?;

        let faces: Vec<Rect> = found.iter().map(cv::rect_from_cv).collect();
        tracing::trace!(faces = faces.len(), "cascade detection done");
        Ok(faces)
    }
}
