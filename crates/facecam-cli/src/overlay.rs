//! Boxes and labels drawn onto preview frames.

use ab_glyph::{FontVec, PxScale};
use facecam_core::Rect;
use image::{Rgb, RgbImage};
use imageproc::drawing;
use std::path::Path;

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

const TEXT_SCALE: f32 = 24.0;
const PROMPT_SCALE: f32 = 18.0;
const BOX_THICKNESS: u32 = 2;

/// Text size for overlay labels.
#[derive(Debug, Clone, Copy)]
pub enum TextSize {
    Label,
    Prompt,
}

/// Draws detection boxes and text. Without a font only boxes are drawn and
/// the text goes to the log.
pub struct Overlay {
    font: Option<FontVec>,
}

impl Overlay {
    /// Load the overlay font, falling back to box-only drawing.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::warn!("no overlay font found, labels will only be logged");
            return Self::without_font();
        };
        let font = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontVec::try_from_vec(bytes).map_err(|e| e.to_string()));
        match font {
            Ok(font) => {
                tracing::debug!(path = %path.display(), "overlay font loaded");
                Self { font: Some(font) }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load overlay font");
                Self::without_font()
            }
        }
    }

    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Outline `rect` with a 2 px border.
    pub fn draw_box(&self, image: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
        for i in 0..BOX_THICKNESS {
            if rect.width <= 2 * i || rect.height <= 2 * i {
                break;
            }
            let r = imageproc::rect::Rect::at((rect.x + i) as i32, (rect.y + i) as i32)
                .of_size(rect.width - 2 * i, rect.height - 2 * i);
            drawing::draw_hollow_rect_mut(image, r, color);
        }
    }

    /// Draw `text` with its baseline at `(x, y)`.
    pub fn draw_text(&self, image: &mut RgbImage, text: &str, x: i32, y: i32, size: TextSize, color: Rgb<u8>) {
        let scale = match size {
            TextSize::Label => TEXT_SCALE,
            TextSize::Prompt => PROMPT_SCALE,
        };
        match &self.font {
            Some(font) => {
                let top = y - scale as i32;
                drawing::draw_text_mut(image, color, x, top, PxScale::from(scale), font, text);
            }
            None => tracing::trace!(text, x, y, "overlay label"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_is_two_pixels_thick() {
        let overlay = Overlay::without_font();
        let mut img = RgbImage::new(20, 20);
        overlay.draw_box(&mut img, Rect::new(2, 2, 10, 10), GREEN);
        assert_eq!(*img.get_pixel(2, 5), GREEN);
        assert_eq!(*img.get_pixel(3, 5), GREEN);
        assert_eq!(*img.get_pixel(4, 5), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(11, 11), GREEN);
    }

    #[test]
    fn test_tiny_box_does_not_panic() {
        let overlay = Overlay::without_font();
        let mut img = RgbImage::new(4, 4);
        overlay.draw_box(&mut img, Rect::new(0, 0, 1, 1), RED);
        overlay.draw_box(&mut img, Rect::new(0, 0, 0, 3), RED);
        assert_eq!(*img.get_pixel(0, 0), RED);
    }

    #[test]
    fn test_text_without_font_leaves_image_untouched() {
        let overlay = Overlay::without_font();
        let mut img = RgbImage::new(30, 30);
        overlay.draw_text(&mut img, "Unknown", 2, 20, TextSize::Label, RED);
        assert!(img.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_missing_font_falls_back() {
        let overlay = Overlay::load(Some(Path::new("/nonexistent/font.ttf")));
        assert!(!overlay.has_font());
        assert!(!Overlay::load(None).has_font());
    }
}
