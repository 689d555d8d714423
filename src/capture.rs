// Still capture: the raw camera frame, cover-fit into a fixed portrait
// raster and JPEG encoded. Overlay, guide mode and mirroring play no part.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

use crate::error::Result;
use crate::geometry::{compute_mapping, dest_rect_to_source_rect};
use crate::raster::crop_to_working;

pub const OUTPUT_WIDTH: u32 = 1440;
pub const OUTPUT_HEIGHT: u32 = 2560;
pub const JPEG_QUALITY: u8 = 92;

/// One captured still, handed to the capture callback and then dropped.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub image: RgbImage,
    pub jpeg: Vec<u8>,
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
}

/// Cover-fit `frame` into the output raster, never mirrored.
pub fn render_still(frame: &RgbImage) -> Result<RgbImage> {
    let mapping = compute_mapping(OUTPUT_WIDTH, OUTPUT_HEIGHT, frame.width(), frame.height(), false)?;
    let visible = dest_rect_to_source_rect(&mapping.dest_rect(), &mapping);
    crop_to_working(frame, &visible, OUTPUT_WIDTH, OUTPUT_HEIGHT)
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut jpeg = Vec::new();
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY))?;
    Ok(jpeg)
}

pub fn data_uri(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

/// Full pipeline for one trigger.
pub fn capture_still(frame: &RgbImage) -> Result<CaptureRequest> {
    let image = render_still(frame)?;
    let jpeg = encode_jpeg(&image)?;
    let data_uri = data_uri(&jpeg);
    log::info!("captured {}x{} still ({} bytes)", image.width(), image.height(), jpeg.len());
    Ok(CaptureRequest { image, jpeg, data_uri })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Landscape frame: red left half, blue right half.
    fn split_frame() -> RgbImage {
        RgbImage::from_fn(1280, 720, |x, _| if x < 640 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) })
    }

    #[test]
    fn still_is_fixed_size_and_unmirrored() {
        let still = render_still(&split_frame()).unwrap();
        assert_eq!(still.dimensions(), (OUTPUT_WIDTH, OUTPUT_HEIGHT));
        let left = still.get_pixel(20, OUTPUT_HEIGHT / 2);
        let right = still.get_pixel(OUTPUT_WIDTH - 20, OUTPUT_HEIGHT / 2);
        assert!(left[0] > 200 && left[2] < 50, "{left:?}");
        assert!(right[2] > 200 && right[0] < 50, "{right:?}");
    }

    #[test]
    fn small_portrait_frames_are_upscaled() {
        let still = render_still(&RgbImage::from_pixel(90, 160, Rgb([7, 8, 9]))).unwrap();
        assert_eq!(still.dimensions(), (OUTPUT_WIDTH, OUTPUT_HEIGHT));
    }

    #[test]
    fn capture_produces_jpeg_data_uri() {
        let req = capture_still(&split_frame()).unwrap();
        assert_eq!(&req.jpeg[..2], &[0xFF, 0xD8]);
        assert!(req.data_uri.starts_with("data:image/jpeg;base64,/9j/"));
        let decoded = image::load_from_memory(&req.jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (OUTPUT_WIDTH, OUTPUT_HEIGHT));
    }

    #[test]
    fn empty_frame_is_an_error() {
        assert!(render_still(&RgbImage::new(0, 0)).is_err());
    }
}
