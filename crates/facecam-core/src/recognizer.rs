//! LBPH (Local Binary Pattern Histograms) face recognition via OpenCV's
//! `face` module.

use crate::cv;
use crate::types::{Label, Prediction};
use image::GrayImage;
use opencv::core::{Mat, Ptr, Vector};
use opencv::face::LBPHFaceRecognizer;
use opencv::prelude::*;
use thiserror::Error;

// --- LBPH defaults ---
const LBPH_RADIUS: u32 = 1;
const LBPH_NEIGHBORS: u32 = 8;
const LBPH_GRID_X: u32 = 8;
const LBPH_GRID_Y: u32 = 8;
const LBPH_MAX_NEIGHBORS: u32 = 16;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("got {images} images but {labels} labels")]
    LabelMismatch { images: usize, labels: usize },
    #[error("image {width}x{height} is too small for a {grid_x}x{grid_y} LBPH grid")]
    ImageTooSmall {
        width: u32,
        height: u32,
        grid_x: u32,
        grid_y: u32,
    },
    #[error("predict called before train")]
    NotTrained,
    #[error("invalid LBPH parameters: {0}")]
    InvalidParams(String),
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Strategy for classifying face crops against a trained gallery.
pub trait FaceRecognizer {
    /// Whether `image` can be used as a training or query sample.
    fn check_sample(&self, _image: &GrayImage) -> Result<(), RecognizerError> {
        Ok(())
    }

    /// Fit the model over the full set in one batch, replacing any previous state.
    fn train(&mut self, images: &[GrayImage], labels: &[Label]) -> Result<(), RecognizerError>;

    /// Classify a single grayscale crop.
    fn predict(&self, image: &GrayImage) -> Result<Prediction, RecognizerError>;
}

/// LBPH tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct LbphParams {
    pub radius: u32,
    pub neighbors: u32,
    pub grid_x: u32,
    pub grid_y: u32,
    /// Predictions at or beyond this distance report label -1.
    pub threshold: f64,
}

impl Default for LbphParams {
    fn default() -> Self {
        Self {
            radius: LBPH_RADIUS,
            neighbors: LBPH_NEIGHBORS,
            grid_x: LBPH_GRID_X,
            grid_y: LBPH_GRID_Y,
            threshold: f64::MAX,
        }
    }
}

/// LBPH recognizer. The OpenCV model is created on the first `train`.
pub struct LbphRecognizer {
    params: LbphParams,
    model: Option<Ptr<LBPHFaceRecognizer>>,
    samples: usize,
}

impl Default for LbphRecognizer {
    fn default() -> Self {
        Self {
            params: LbphParams::default(),
            model: None,
            samples: 0,
        }
    }
}

impl LbphRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: LbphParams) -> Result<Self, RecognizerError> {
        if params.radius == 0 {
            return Err(RecognizerError::InvalidParams("radius must be at least 1".into()));
        }
        if params.neighbors == 0 || params.neighbors > LBPH_MAX_NEIGHBORS {
            return Err(RecognizerError::InvalidParams(format!(
                "neighbors must be in 1..={LBPH_MAX_NEIGHBORS}, got {}",
                params.neighbors
            )));
        }
        if params.grid_x == 0 || params.grid_y == 0 {
            return Err(RecognizerError::InvalidParams("grid must be non-empty".into()));
        }
        Ok(Self {
            params,
            ..Self::default()
        })
    }

    /// Number of samples in the trained gallery.
    pub fn sample_count(&self) -> usize {
        self.samples
    }
}

impl FaceRecognizer for LbphRecognizer {
    /// The LBP image loses a `radius` border and must still hold one pixel
    /// per grid cell.
    fn check_sample(&self, image: &GrayImage) -> Result<(), RecognizerError> {
        let border = 2 * self.params.radius;
        let fits = |side: u32, cells: u32| side > border && side - border >= cells;
        if fits(image.width(), self.params.grid_x) && fits(image.height(), self.params.grid_y) {
            Ok(())
        } else {
            Err(RecognizerError::ImageTooSmall {
                width: image.width(),
                height: image.height(),
                grid_x: self.params.grid_x,
                grid_y: self.params.grid_y,
            })
        }
    }

    fn train(&mut self, images: &[GrayImage], labels: &[Label]) -> Result<(), RecognizerError> {
        if images.len() != labels.len() {
            return Err(RecognizerError::LabelMismatch {
                images: images.len(),
                labels: labels.len(),
            });
        }
        if images.is_empty() {
            return Err(RecognizerError::EmptyTrainingSet);
        }

        let mut mats = Vector::<Mat>::with_capacity(images.len());
        for image in images {
            self.check_sample(image)?;
            mats.push(cv::gray_to_mat(image)?);
        }
        let ids = Vector::<i32>::from_slice(labels);

        let p = self.params;
        let mut model = LBPHFaceRecognizer::create(
            p.radius as i32,
            p.neighbors as i32,
            p.grid_x as i32,
            p.grid_y as i32,
            p.threshold,
        )?;
        model.train(&mats, &ids)?;

        self.model = Some(model);
        self.samples = images.len();
        tracing::debug!(samples = self.samples, "LBPH model trained");
        Ok(())
    }

    fn predict(&self, image: &GrayImage) -> Result<Prediction, RecognizerError> {
        let model = self.model.as_ref().ok_or(RecognizerError::NotTrained)?;
        self.check_sample(image)?;

        let query = cv::gray_to_mat(image)?;
        let mut label = -1;
        let mut distance = f64::MAX;
        model.predict(&query, &mut label, &mut distance)?;

        Ok(Prediction { label, distance })
    }
}
