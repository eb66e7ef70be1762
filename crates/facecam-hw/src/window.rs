//! Live preview window via `minifb`.

use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("failed to create window: {0}")]
    Create(String),
    #[error("failed to update window: {0}")]
    Update(String),
}

/// Operator input polled once per displayed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    None,
    /// `C` pressed.
    Enroll,
    /// Escape pressed or the window was closed.
    Cancel,
}

/// Preview window, created lazily at the size of the first frame shown.
pub struct PreviewWindow {
    title: String,
    window: Option<Window>,
    size: (usize, usize),
    buffer: Vec<u32>,
}

impl PreviewWindow {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            window: None,
            size: (0, 0),
            buffer: Vec::new(),
        }
    }

    /// Display an RGB frame, (re)creating the window when the size changes.
    pub fn show(&mut self, image: &RgbImage) -> Result<(), DisplayError> {
        let size = (image.width() as usize, image.height() as usize);
        if self.size != size {
            self.window = None;
        }
        if self.window.is_none() {
            let window = Window::new(&self.title, size.0, size.1, WindowOptions::default())
                .map_err(|e| DisplayError::Create(e.to_string()))?;
            tracing::debug!(title = %self.title, width = size.0, height = size.1, "preview window opened");
            self.window = Some(window);
            self.size = size;
        }

        self.buffer.clear();
        self.buffer.extend(
            image
                .pixels()
                .map(|p| (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32),
        );

        let Some(window) = self.window.as_mut() else {
            return Ok(());
        };
        window
            .update_with_buffer(&self.buffer, size.0, size.1)
            .map_err(|e| DisplayError::Update(e.to_string()))
    }

    /// Keys pressed since the last update.
    pub fn poll_key(&mut self) -> KeyInput {
        let Some(window) = self.window.as_ref() else {
            return KeyInput::None;
        };
        if !window.is_open() {
            return KeyInput::Cancel;
        }
        for key in window.get_keys_pressed(KeyRepeat::No) {
            match key {
                Key::Escape => return KeyInput::Cancel,
                Key::C => return KeyInput::Enroll,
                _ => {}
            }
        }
        KeyInput::None
    }

    pub fn close(&mut self) {
        if self.window.take().is_some() {
            tracing::debug!(title = %self.title, "preview window closed");
        }
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        self.close();
    }
}
