//! Seams between the live loops and the camera/window hardware.

use facecam_hw::{Camera, CameraError, DisplayError, Frame, KeyInput, PreviewWindow};
use image::RgbImage;

/// Title shared by every preview window.
pub const WINDOW_TITLE: &str = "Camera";

/// Source of live frames. Releasing happens on drop.
pub trait FrameSource {
    fn read(&mut self) -> Result<Frame, CameraError>;
}

/// Annotated frame sink that also reports operator keys. Closes on drop.
pub trait Preview {
    fn show(&mut self, image: &RgbImage) -> Result<(), DisplayError>;
    fn poll_key(&mut self) -> KeyInput;
}

/// Opens a fresh camera and window for each phase.
pub trait Devices {
    type Camera: FrameSource;
    type Preview: Preview;

    fn open_camera(&self) -> Result<Self::Camera, CameraError>;
    fn open_preview(&self, title: &str) -> Self::Preview;
}

/// Why a live loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The loop reached its goal (capture target).
    Completed,
    /// Escape or window closed.
    Cancelled,
    /// The camera stopped delivering frames.
    ReadFailed,
}

/// V4L2 camera and minifb window.
pub struct HardwareDevices {
    camera_device: String,
}

impl HardwareDevices {
    pub fn new(camera_device: impl Into<String>) -> Self {
        Self {
            camera_device: camera_device.into(),
        }
    }
}

impl Devices for HardwareDevices {
    type Camera = Camera;
    type Preview = PreviewWindow;

    fn open_camera(&self) -> Result<Camera, CameraError> {
        Camera::open(&self.camera_device)
    }

    fn open_preview(&self, title: &str) -> PreviewWindow {
        PreviewWindow::new(title)
    }
}

impl FrameSource for Camera {
    fn read(&mut self) -> Result<Frame, CameraError> {
        self.capture_frame()
    }
}

impl Preview for PreviewWindow {
    fn show(&mut self, image: &RgbImage) -> Result<(), DisplayError> {
        PreviewWindow::show(self, image)
    }

    fn poll_key(&mut self) -> KeyInput {
        PreviewWindow::poll_key(self)
    }
}
