//! facecam-hw — Hardware abstraction for camera capture and live preview.
//!
//! Provides V4L2-based camera access with RGB frame conversion and a
//! minifb preview window that reports operator key presses.

pub mod camera;
pub mod frame;
pub mod window;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use frame::Frame;
pub use window::{DisplayError, KeyInput, PreviewWindow};
