// Primary card detector: edges → external contours → rotated rectangles.
//
// The ROI is cropped into a card-shaped working raster, equalized, blurred
// and run through Canny with thresholds derived from the mean intensity.
// The ROI counts as "card present" as soon as one contour's minimum-area
// rectangle has a card-like size, aspect ratio and fill. Every intermediate
// raster is an owned value, so all of them are released on success,
// rejection and error alike.

use image::RgbImage;

use crate::engine::{SharedEngine, contour_area};
use crate::error::Result;
use crate::guides::CARD_ASPECT;
use crate::raster::crop_to_working;
use crate::types::Rect;

pub const WORK_WIDTH: u32 = 540;

const BLUR_KSIZE: u32 = 5;
const DILATE_KSIZE: u32 = 3;

const CANNY_LOW_FACTOR: f64 = 0.66;
const CANNY_HIGH_FACTOR: f64 = 1.33;
const CANNY_LOW_FLOOR: f64 = 10.0;
const CANNY_HIGH_CEIL: f64 = 255.0;

const MIN_CONTOUR_AREA: f64 = 0.05; // of ROI area
const MIN_RECT_AREA: f64 = 0.12;
const MAX_RECT_AREA: f64 = 0.98;
const MIN_ASPECT: f64 = 1.35;
const MAX_ASPECT: f64 = 1.9;
const MIN_RECTANGULARITY: f64 = 0.6;

pub fn work_height() -> u32 {
    (WORK_WIDTH as f64 / CARD_ASPECT).round() as u32
}

/// Canny threshold pair from the blurred raster's mean intensity.
pub fn auto_canny_thresholds(mean: f64) -> (f32, f32) {
    let low = (mean * CANNY_LOW_FACTOR).max(CANNY_LOW_FLOOR);
    let high = (mean * CANNY_HIGH_FACTOR).min(CANNY_HIGH_CEIL);
    // A very dark raster can push `high` under the floor; swap the pair as OpenCV does.
    (low.min(high) as f32, low.max(high) as f32)
}

/// Why a contour was accepted, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardCandidate {
    pub contour_area: f64,
    pub rect_area: f64,
    pub aspect_ratio: f64,
    pub rectangularity: f64,
}

pub struct ContourCardDetector {
    engine: SharedEngine,
    width: u32,
    height: u32,
}

impl ContourCardDetector {
    pub fn new(engine: SharedEngine) -> Self {
        Self { engine, width: WORK_WIDTH, height: work_height() }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// "Card present" verdict for the source-space ROI of `frame`.
    pub fn detect(&self, frame: &RgbImage, roi: &Rect) -> Result<bool> {
        let work = crop_to_working(frame, roi, self.width, self.height)?;
        Ok(self.find_card(&work)?.is_some())
    }

    /// Run the pipeline over an already cropped working raster; the whole
    /// raster is the ROI.
    pub fn find_card(&self, work: &RgbImage) -> Result<Option<CardCandidate>> {
        let engine = &self.engine;
        let roi_area = work.width() as f64 * work.height() as f64;
        if roi_area <= 0.0 {
            return Ok(None);
        }

        let gray = engine.equalize(&engine.to_gray(work));
        let blurred = engine.gaussian_blur(&gray, BLUR_KSIZE)?;
        let mean = blurred.pixels().map(|p| p[0] as f64).sum::<f64>() / roi_area;
        let (low, high) = auto_canny_thresholds(mean);
        let edges = engine.dilate(&engine.canny(&blurred, low, high)?, DILATE_KSIZE)?;

        for contour in engine.external_contours(&edges) {
            let area = contour_area(&contour);
            if area < roi_area * MIN_CONTOUR_AREA {
                continue;
            }
            let rect = engine.min_area_rect(&contour)?;
            let rect_area = rect.area();
            if rect_area <= 0.0 {
                continue;
            }
            let candidate = CardCandidate {
                contour_area: area,
                rect_area,
                aspect_ratio: rect.aspect_ratio(),
                rectangularity: area / rect_area,
            };
            if accepts(&candidate, roi_area) {
                log::trace!("card contour accepted: {candidate:?}");
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

fn accepts(c: &CardCandidate, roi_area: f64) -> bool {
    c.rect_area >= roi_area * MIN_RECT_AREA
        && c.rect_area <= roi_area * MAX_RECT_AREA
        && c.aspect_ratio > MIN_ASPECT
        && c.aspect_ratio < MAX_ASPECT
        && c.rectangularity > MIN_RECTANGULARITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ImageprocEngine;
    use image::Rgb;
    use std::sync::Arc;

    fn detector() -> ContourCardDetector {
        ContourCardDetector::new(Arc::new(ImageprocEngine::load().unwrap()))
    }

    /// Working-size raster with one centered white rectangle on black.
    fn scene(rect_w: u32, rect_h: u32) -> RgbImage {
        let (w, h) = (WORK_WIDTH, work_height());
        let (x0, y0) = ((w - rect_w) / 2, (h - rect_h) / 2);
        RgbImage::from_fn(w, h, |x, y| {
            if x >= x0 && x < x0 + rect_w && y >= y0 && y < y0 + rect_h {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    fn roi_area() -> f64 {
        WORK_WIDTH as f64 * work_height() as f64
    }

    #[test]
    fn thresholds_follow_mean() {
        assert_eq!(auto_canny_thresholds(100.0), (66.0, 133.0));
        let (low, high) = auto_canny_thresholds(5.0);
        assert!((low - 6.65).abs() < 1e-4);
        assert_eq!(high, 10.0);
        assert_eq!(auto_canny_thresholds(240.0).1, 255.0);
    }

    #[test]
    fn card_shaped_rectangle_at_half_area_is_accepted() {
        // Same aspect as the ROI, half its area: sides scale by sqrt(0.5).
        let s = 0.5f64.sqrt();
        let w = (WORK_WIDTH as f64 * s).round() as u32;
        let h = (w as f64 / CARD_ASPECT).round() as u32;
        let found = detector().find_card(&scene(w, h)).unwrap();
        let c = found.expect("card should be found");
        assert!(c.aspect_ratio > 1.35 && c.aspect_ratio < 1.9, "{c:?}");
        assert!(c.rect_area > roi_area() * 0.4 && c.rect_area < roi_area() * 0.65, "{c:?}");
    }

    #[test]
    fn square_is_rejected() {
        let side = (roi_area() * 0.5).sqrt().round() as u32;
        let side = side.min(work_height() - 20);
        assert!(detector().find_card(&scene(side, side)).unwrap().is_none());
    }

    #[test]
    fn tiny_card_is_below_the_area_floor() {
        let w = (roi_area() * 0.02 * CARD_ASPECT).sqrt().round() as u32;
        let h = (w as f64 / CARD_ASPECT).round() as u32;
        assert!(detector().find_card(&scene(w, h)).unwrap().is_none());
    }

    #[test]
    fn blank_roi_has_no_card() {
        let blank = RgbImage::from_pixel(WORK_WIDTH, work_height(), Rgb([90, 90, 90]));
        assert!(detector().find_card(&blank).unwrap().is_none());
    }

    #[test]
    fn detect_crops_from_source_space() {
        // Card scene embedded in a larger frame at (100, 50).
        let card = scene(382, 241);
        let mut frame = RgbImage::from_pixel(800, 500, Rgb([0, 0, 0]));
        image::imageops::replace(&mut frame, &card, 100, 50);
        let roi = Rect::new(100.0, 50.0, WORK_WIDTH as f64, work_height() as f64);
        assert!(detector().detect(&frame, &roi).unwrap());
    }
}
