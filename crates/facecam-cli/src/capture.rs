//! Live enrollment: save every detected face crop for one identity.

use crate::devices::{Devices, FrameSource, Preview, Stop, WINDOW_TITLE};
use crate::overlay::{Overlay, TextSize, GREEN};
use facecam_core::{DatasetError, DatasetStore, DetectParams, DetectorError, FaceDetector, Rect, CAPTURE_COUNT};
use facecam_hw::{CameraError, DisplayError, KeyInput};
use image::GrayImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("identity {0:?} is already enrolled")]
    AlreadyEnrolled(String),
    #[error(transparent)]
    Dataset(DatasetError),
    #[error("camera unavailable: {0}")]
    Camera(#[from] CameraError),
    #[error("display error: {0}")]
    Display(#[from] DisplayError),
    #[error("face detection failed: {0}")]
    Detector(#[from] DetectorError),
}

impl From<DatasetError> for CaptureError {
    fn from(e: DatasetError) -> Self {
        match e {
            DatasetError::AlreadyEnrolled(name) => CaptureError::AlreadyEnrolled(name),
            other => CaptureError::Dataset(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureReport {
    pub saved: u32,
    pub frames: u64,
    pub stop: Stop,
}

/// Crop a detection out of the grayscale frame, clipped to its bounds.
pub(crate) fn crop_face(gray: &GrayImage, rect: Rect) -> Option<(Rect, GrayImage)> {
    let r = rect.clamp_to(gray.width(), gray.height())?;
    let face = image::imageops::crop_imm(gray, r.x, r.y, r.width, r.height).to_image();
    Some((r, face))
}

pub struct CaptureController<'a, D> {
    store: &'a DatasetStore,
    detector: &'a mut D,
    overlay: &'a Overlay,
    params: DetectParams,
    target: u32,
}

impl<'a, D: FaceDetector> CaptureController<'a, D> {
    pub fn new(store: &'a DatasetStore, detector: &'a mut D, overlay: &'a Overlay) -> Self {
        Self {
            store,
            detector,
            overlay,
            params: DetectParams::default(),
            target: CAPTURE_COUNT,
        }
    }

    /// Enroll `name` and collect samples until the target, Escape, or a
    /// failed camera read.
    ///
    /// Rejects an existing identity before the camera is touched. Every face
    /// in a frame is saved under `name`, so the final count can overshoot the
    /// target when a frame holds several faces.
    pub fn capture<V: Devices>(&mut self, devices: &V, name: &str) -> Result<CaptureReport, CaptureError> {
        let mut writer = self.store.enroll(name)?;
        let mut camera = devices.open_camera()?;
        let mut preview = devices.open_preview(WINDOW_TITLE);

        println!("Capturing {} images...", self.target);
        tracing::info!(identity = name, dir = %writer.dir().display(), "capture started");

        let mut frames = 0u64;
        let stop = loop {
            let frame = match camera.read() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(error = %e, "camera read failed, ending capture");
                    break Stop::ReadFailed;
                }
            };
            frames += 1;

            let gray = frame.to_gray();
            let mut image = frame.image;
            for rect in self.detector.detect(&gray, &self.params)? {
                let Some((rect, face)) = crop_face(&gray, rect) else {
                    continue;
                };
                let path = writer.save(&face)?;
                tracing::trace!(path = %path.display(), "sample saved");
                self.overlay.draw_box(&mut image, rect, GREEN);
            }

            let status = format!("Capturing {}/{}", writer.written(), self.target);
            self.overlay.draw_text(&mut image, &status, 10, 30, TextSize::Label, GREEN);
            preview.show(&image)?;

            if preview.poll_key() == KeyInput::Cancel {
                break Stop::Cancelled;
            }
            if writer.written() >= self.target {
                break Stop::Completed;
            }
        };

        drop(preview);
        drop(camera);

        tracing::info!(identity = name, saved = writer.written(), frames, stop = ?stop, "capture finished");
        println!("Capture finished.");

        Ok(CaptureReport {
            saved: writer.written(),
            frames,
            stop,
        })
    }
}
