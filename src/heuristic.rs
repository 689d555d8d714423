// Cheap card check: does the ROI have a high-contrast border near its edges?
// Always available; used whenever the contour detector is not.
// Every call is independent, there is no smoothing across frames.

use image::RgbImage;

use crate::error::Result;
use crate::guides::CARD_ASPECT;
use crate::raster::{crop_to_working, luma};
use crate::types::Rect;

pub const WORK_WIDTH: u32 = 320;
pub const SAMPLES_PER_SIDE: u32 = 200;
pub const ACCEPT_SCORE: f32 = 0.18;

// Each sample compares a pixel just inside the raster edge with one a few
// pixels further in, so a card border sitting on the guide lights it up.
const EDGE_OUTER: u32 = 2;
const EDGE_INNER: u32 = 10;

pub fn work_height() -> u32 {
    (WORK_WIDTH as f64 / CARD_ASPECT).round() as u32
}

/// Mean normalized luma difference over the edge sample pairs, in [0, 1].
pub fn edge_score(work: &RgbImage) -> f32 {
    let (w, h) = work.dimensions();
    if w <= EDGE_INNER * 2 || h <= EDGE_INNER * 2 {
        return 0.0;
    }
    let diff = |a: (u32, u32), b: (u32, u32)| -> f32 {
        (luma(work.get_pixel(a.0, a.1)) - luma(work.get_pixel(b.0, b.1))).abs() / 255.0
    };

    let mut total = 0.0f32;
    let mut count = 0u32;
    for i in 0..SAMPLES_PER_SIDE {
        let t = (i as f32 + 0.5) / SAMPLES_PER_SIDE as f32;
        let x = ((t * w as f32) as u32).min(w - 1);
        let y = ((t * h as f32) as u32).min(h - 1);

        // columns near the top and bottom edges
        total += diff((x, EDGE_OUTER), (x, EDGE_INNER));
        total += diff((x, h - 1 - EDGE_OUTER), (x, h - 1 - EDGE_INNER));
        // rows near the left and right edges
        total += diff((EDGE_OUTER, y), (EDGE_INNER, y));
        total += diff((w - 1 - EDGE_OUTER, y), (w - 1 - EDGE_INNER, y));
        count += 4;
    }
    total / count as f32
}

/// Edge-contrast card check over a fixed-size working crop of the ROI.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicCardDetector {
    width: u32,
    height: u32,
}

impl Default for HeuristicCardDetector {
    fn default() -> Self {
        Self { width: WORK_WIDTH, height: work_height() }
    }
}

impl HeuristicCardDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score the source-space ROI of `frame`.
    pub fn score(&self, frame: &RgbImage, roi: &Rect) -> Result<f32> {
        let work = crop_to_working(frame, roi, self.width, self.height)?;
        Ok(edge_score(&work))
    }

    /// "Card present" verdict for the source-space ROI.
    pub fn detect(&self, frame: &RgbImage, roi: &Rect) -> Result<bool> {
        let score = self.score(frame, roi)?;
        log::trace!("heuristic card score {score:.3}");
        Ok(score > ACCEPT_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn bordered(w: u32, h: u32, band: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if x < band || y < band || x >= w - band || y >= h - band {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn working_raster_is_card_shaped() {
        assert_eq!(work_height(), 202);
    }

    #[test]
    fn solid_crop_scores_zero() {
        let frame = RgbImage::from_pixel(640, 480, Rgb([120, 130, 140]));
        let det = HeuristicCardDetector::new();
        let roi = Rect::new(40.0, 60.0, 500.0, 315.0);
        assert!(det.score(&frame, &roi).unwrap() < 1e-6);
        assert!(!det.detect(&frame, &roi).unwrap());
    }

    #[test]
    fn sharp_border_is_accepted() {
        let frame = bordered(WORK_WIDTH, work_height(), 6);
        let det = HeuristicCardDetector::new();
        let roi = Rect::new(0.0, 0.0, WORK_WIDTH as f64, work_height() as f64);
        let score = det.score(&frame, &roi).unwrap();
        assert!(score > ACCEPT_SCORE, "score {score}");
        assert!(det.detect(&frame, &roi).unwrap());
    }

    #[test]
    fn border_survives_resampling() {
        // Same picture at twice the working size, so the crop is downscaled.
        let frame = bordered(WORK_WIDTH * 2, work_height() * 2, 12);
        let det = HeuristicCardDetector::new();
        let roi = Rect::new(0.0, 0.0, frame.width() as f64, frame.height() as f64);
        assert!(det.detect(&frame, &roi).unwrap());
    }

    #[test]
    fn tiny_raster_scores_zero() {
        assert_eq!(edge_score(&RgbImage::new(10, 10)), 0.0);
    }
}
