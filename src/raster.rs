// Pixel helpers shared by the detectors and the capture still.
// Crops are taken in source space and resampled into small fixed-size
// working rasters so every detector sees the same resolution whatever the
// camera delivers.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::types::Rect;

/// Luma of an RGB pixel (BT.601 weights), 0..255.
#[inline]
pub fn luma(px: &Rgb<u8>) -> f32 {
    0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32
}

/// Integer pixel bounds of a source-space rectangle, clamped to the frame.
/// Returns (x, y, width, height); width/height may be zero.
pub fn pixel_bounds(rect: &Rect, frame_w: u32, frame_h: u32) -> (u32, u32, u32, u32) {
    let x0 = rect.x.round().clamp(0.0, frame_w as f64) as u32;
    let y0 = rect.y.round().clamp(0.0, frame_h as f64) as u32;
    let x1 = rect.right().round().clamp(0.0, frame_w as f64) as u32;
    let y1 = rect.bottom().round().clamp(0.0, frame_h as f64) as u32;
    (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
}

/// Crop `rect` out of `frame` and resample it to exactly `width`×`height`.
pub fn crop_to_working(frame: &RgbImage, rect: &Rect, width: u32, height: u32) -> Result<RgbImage> {
    let (x, y, w, h) = pixel_bounds(rect, frame.width(), frame.height());
    if w == 0 || h == 0 || width == 0 || height == 0 {
        return Err(Error::InvalidInput(format!(
            "crop_to_working: empty crop {w}x{h} -> {width}x{height} from {rect:?}"
        )));
    }
    let crop = imageops::crop_imm(frame, x, y, w, h).to_image();
    if w == width && h == height {
        return Ok(crop);
    }
    Ok(imageops::resize(&crop, width, height, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights() {
        assert!((luma(&Rgb([255, 255, 255])) - 255.0).abs() < 0.01);
        assert_eq!(luma(&Rgb([0, 0, 0])), 0.0);
        assert!((luma(&Rgb([255, 0, 0])) - 0.299 * 255.0).abs() < 0.01);
    }

    #[test]
    fn bounds_are_clamped_to_frame() {
        assert_eq!(pixel_bounds(&Rect::new(-5.0, 2.4, 20.0, 100.0), 10, 50), (0, 2, 10, 48));
        assert_eq!(pixel_bounds(&Rect::new(12.0, 0.0, 5.0, 5.0), 10, 10).2, 0);
    }

    #[test]
    fn crop_resamples_to_requested_size() {
        let mut frame = RgbImage::new(64, 48);
        frame.put_pixel(10, 10, Rgb([255, 0, 0]));
        let out = crop_to_working(&frame, &Rect::new(8.0, 8.0, 32.0, 20.0), 16, 10).unwrap();
        assert_eq!(out.dimensions(), (16, 10));

        let same = crop_to_working(&frame, &Rect::new(10.0, 10.0, 4.0, 4.0), 4, 4).unwrap();
        assert_eq!(same.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn empty_crop_is_an_error() {
        let frame = RgbImage::new(8, 8);
        assert!(crop_to_working(&frame, &Rect::new(2.0, 2.0, 0.0, 4.0), 4, 4).is_err());
    }
}
