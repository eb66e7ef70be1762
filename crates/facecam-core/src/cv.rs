//! Conversions between `image` buffers and OpenCV types.

use crate::types::Rect;
use image::GrayImage;
use opencv::core::{self, Mat, Scalar, CV_8UC1};
use opencv::prelude::*;

/// Copy a grayscale image into a single-channel 8-bit `Mat`.
pub(crate) fn gray_to_mat(gray: &GrayImage) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        gray.height() as i32,
        gray.width() as i32,
        CV_8UC1,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());
    Ok(mat)
}

/// Detector boxes are never negative; anything that is gets clipped to 0.
pub(crate) fn rect_from_cv(r: core::Rect) -> Rect {
    let x = r.x.max(0);
    let y = r.y.max(0);
    let width = (r.x + r.width - x).max(0);
    let height = (r.y + r.height - y).max(0);
    Rect::new(x as u32, y as u32, width as u32, height as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_gray_to_mat_keeps_layout() {
        let img = GrayImage::from_fn(5, 3, |x, y| Luma([(x + 10 * y) as u8]));
        let mat = gray_to_mat(&img).unwrap();
        assert_eq!((mat.cols(), mat.rows()), (5, 3));
        assert_eq!(mat.channels(), 1);
        assert_eq!(*mat.at_2d::<u8>(2, 4).unwrap(), 24);
        assert_eq!(mat.data_bytes().unwrap(), img.as_raw().as_slice());
    }

    #[test]
    fn test_rect_from_cv() {
        assert_eq!(rect_from_cv(core::Rect::new(4, 6, 30, 40)), Rect::new(4, 6, 30, 40));
        assert_eq!(rect_from_cv(core::Rect::new(-2, 3, 10, 10)), Rect::new(0, 3, 8, 10));
    }
}
