//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame, FrameError};
use image::RgbImage;
use std::io;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{FourCC, Format};

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;
/// Highest `/dev/videoN` index scanned by [`Camera::list_devices`].
const MAX_DEVICE_INDEX: u32 = 16;
const EBUSY: i32 = 16;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("{0} is not a video capture device")]
    NotCaptureDevice(String),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Pixel formats this crate can turn into RGB, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    Yuyv,
    Grey,
    Mjpg,
}

impl PixelFormat {
    fn fourcc(self) -> FourCC {
        match self {
            PixelFormat::Yuyv => FourCC::new(b"YUYV"),
            PixelFormat::Grey => FourCC::new(b"GREY"),
            PixelFormat::Mjpg => FourCC::new(b"MJPG"),
        }
    }

    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        [PixelFormat::Yuyv, PixelFormat::Grey, PixelFormat::Mjpg]
            .into_iter()
            .find(|f| f.fourcc() == fourcc)
    }

    fn decode(self, buf: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
        match self {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, width, height),
            PixelFormat::Grey => frame::grey_to_rgb(buf, width, height),
            PixelFormat::Mjpg => frame::mjpeg_to_rgb(buf),
        }
    }
}

/// An open webcam streaming 640x480 frames (or whatever size the driver
/// settles on).
///
/// Buffers are mapped on the first read and stay mapped until drop, so
/// the device is held for the whole capture or recognition loop.
pub struct Camera {
    stream: Option<MmapStream<'static>>,
    device: Device,
    path: String,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Camera {
    /// Open `path` (e.g. "/dev/video0") and negotiate a capture format.
    pub fn open(path: &str) -> Result<Self, CameraError> {
        let device = Device::with_path(path).map_err(|e| open_error(path, e))?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("{path}: capability query: {e}")))?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(CameraError::NotCaptureDevice(path.to_string()));
        }

        let (width, height, format) = negotiate(&device)?;
        tracing::info!(device = path, card = %caps.card, width, height, ?format, "camera ready");

        Ok(Self {
            stream: None,
            device,
            path: path.to_string(),
            width,
            height,
            format,
        })
    }

    /// Block until the next frame arrives and convert it to RGB.
    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        let stream = match &mut self.stream {
            Some(stream) => stream,
            slot => slot.insert(
                MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
                    .map_err(|e| CameraError::CaptureFailed(format!("stream start: {e}")))?,
            ),
        };

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("dequeue: {e}")))?;
        let image = self
            .format
            .decode(buf, self.width, self.height)
            .map_err(|e| CameraError::CaptureFailed(format!("{:?} frame: {e}", self.format)))?;
        Ok(Frame::new(image, meta.sequence))
    }

    /// Capture-capable devices among `/dev/video0` .. `/dev/video15`.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..MAX_DEVICE_INDEX)
            .filter_map(|i| {
                let path = format!("/dev/video{i}");
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities.contains(Flags::VIDEO_CAPTURE).then(|| DeviceInfo {
                    path,
                    name: caps.card,
                    driver: caps.driver,
                    bus: caps.bus,
                })
            })
            .collect()
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        // Unmap buffers before the device handle closes.
        self.stream.take();
        tracing::debug!(device = %self.path, "camera released");
    }
}

fn open_error(path: &str, e: io::Error) -> CameraError {
    match e.kind() {
        io::ErrorKind::NotFound => CameraError::DeviceNotFound(path.to_string()),
        _ if e.raw_os_error() == Some(EBUSY) => CameraError::DeviceBusy,
        _ => CameraError::DeviceNotFound(format!("{path}: {e}")),
    }
}

/// Ask for YUYV at 640x480 and accept whichever supported format the driver
/// answers with.
fn negotiate(device: &Device) -> Result<(u32, u32, PixelFormat), CameraError> {
    let wanted = Format::new(CAPTURE_WIDTH, CAPTURE_HEIGHT, PixelFormat::Yuyv.fourcc());
    let got = device
        .set_format(&wanted)
        .map_err(|e| CameraError::FormatNegotiationFailed(e.to_string()))?;
    let format = PixelFormat::from_fourcc(got.fourcc).ok_or_else(|| {
        CameraError::FormatNegotiationFailed(format!("driver chose {}, need YUYV, GREY or MJPG", got.fourcc))
    })?;
    Ok((got.width, got.height, format))
}
