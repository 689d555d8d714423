// Classical-vision engine behind the contour card detector.
//
// The detector only talks to the `VisionEngine` trait; the default
// implementation runs on `imageproc`. The engine is created lazily, once per
// process, through `shared_engine`.

use std::sync::{Arc, OnceLock};

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::point::Point as IPoint;

use crate::error::{Error, Result};
use crate::loader::LazyResource;
use crate::raster::luma;
use crate::types::Point;

/// Minimum-area rectangle around a contour (any rotation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    pub width: f64,
    pub height: f64,
}

impl RotatedRect {
    pub fn from_corners(c: &[Point; 4]) -> Self {
        let dist = |a: Point, b: Point| ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        let center = Point::new(
            (c[0].x + c[1].x + c[2].x + c[3].x) / 4.0,
            (c[0].y + c[1].y + c[2].y + c[3].y) / 4.0,
        );
        Self {
            center,
            width: dist(c[0], c[1]),
            height: dist(c[1], c[2]),
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Long side over short side, never dividing by less than one pixel.
    pub fn aspect_ratio(&self) -> f64 {
        self.width.max(self.height) / self.width.min(self.height).max(1.0)
    }
}

/// Operations the contour detector needs from an image-processing engine.
pub trait VisionEngine: Send + Sync {
    fn name(&self) -> &'static str;
    fn to_gray(&self, rgb: &RgbImage) -> GrayImage;
    fn equalize(&self, gray: &GrayImage) -> GrayImage;
    /// Gaussian blur with a `ksize`×`ksize` kernel (odd).
    fn gaussian_blur(&self, gray: &GrayImage, ksize: u32) -> Result<GrayImage>;
    fn canny(&self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage>;
    /// Dilation with a `ksize`×`ksize` square element (odd).
    fn dilate(&self, edges: &GrayImage, ksize: u32) -> Result<GrayImage>;
    /// Outermost contours only (no holes, no nested borders).
    fn external_contours(&self, edges: &GrayImage) -> Vec<Vec<Point>>;
    fn min_area_rect(&self, contour: &[Point]) -> Result<RotatedRect>;
}

/// Sigma OpenCV derives for a kernel size when none is given.
pub fn sigma_for_kernel(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn check_odd(op: &str, ksize: u32) -> Result<()> {
    if ksize == 0 || ksize % 2 == 0 {
        return Err(Error::Vision(format!("{op}: kernel size must be odd, got {ksize}")));
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageprocEngine;

impl ImageprocEngine {
    /// Build the engine and run it once over a tiny synthetic card so a
    /// broken build reports itself as unavailable instead of misdetecting.
    pub fn load() -> Result<Self> {
        let engine = ImageprocEngine;
        let mut probe = GrayImage::new(32, 24);
        for y in 6..18 {
            for x in 6..26 {
                probe.put_pixel(x, y, Luma([255]));
            }
        }
        let edges = engine.canny(&probe, 50.0, 150.0)?;
        let contours = engine.external_contours(&engine.dilate(&edges, 3)?);
        if contours.is_empty() {
            return Err(Error::Vision("imageproc self-test found no contour".into()));
        }
        Ok(engine)
    }
}

impl VisionEngine for ImageprocEngine {
    fn name(&self) -> &'static str {
        "imageproc"
    }

    fn to_gray(&self, rgb: &RgbImage) -> GrayImage {
        GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            Luma([luma(rgb.get_pixel(x, y)).round().clamp(0.0, 255.0) as u8])
        })
    }

    fn equalize(&self, gray: &GrayImage) -> GrayImage {
        equalize_full_range(gray)
    }

    fn gaussian_blur(&self, gray: &GrayImage, ksize: u32) -> Result<GrayImage> {
        check_odd("gaussian_blur", ksize)?;
        if ksize == 1 {
            return Ok(gray.clone());
        }
        Ok(imageproc::filter::gaussian_blur_f32(gray, sigma_for_kernel(ksize)))
    }

    fn canny(&self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage> {
        if !(low.is_finite() && high.is_finite()) || low > high {
            return Err(Error::Vision(format!("canny: bad thresholds {low}..{high}")));
        }
        Ok(imageproc::edges::canny(gray, low, high))
    }

    fn dilate(&self, edges: &GrayImage, ksize: u32) -> Result<GrayImage> {
        check_odd("dilate", ksize)?;
        let radius = u8::try_from(ksize / 2).map_err(|_| Error::Vision(format!("dilate: kernel {ksize} too large")))?;
        Ok(imageproc::morphology::dilate(edges, Norm::LInf, radius))
    }

    fn external_contours(&self, edges: &GrayImage) -> Vec<Vec<Point>> {
        find_contours::<i32>(edges)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| c.points.into_iter().map(|p| Point::new(p.x as f64, p.y as f64)).collect())
            .collect()
    }

    fn min_area_rect(&self, contour: &[Point]) -> Result<RotatedRect> {
        if contour.len() < 3 {
            return Err(Error::Vision(format!("min_area_rect: {} points", contour.len())));
        }
        let points: Vec<IPoint<i32>> = contour
            .iter()
            .map(|p| IPoint::new(p.x.round() as i32, p.y.round() as i32))
            .collect();
        let corners = imageproc::geometry::min_area_rect(&points);
        let corners = corners.map(|p| Point::new(p.x as f64, p.y as f64));
        Ok(RotatedRect::from_corners(&corners))
    }
}

/// Histogram equalization stretched so the darkest level present maps to 0
/// and the brightest to 255 (OpenCV's `equalizeHist` convention).
pub fn equalize_full_range(gray: &GrayImage) -> GrayImage {
    let hist = imageproc::stats::histogram(gray).channels[0];
    let mut cdf = [0u64; 256];
    let mut running = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        running += u64::from(count);
        cdf[i] = running;
    }
    let total = running;
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total == cdf_min {
        // single gray level
        return gray.clone();
    }
    let span = (total - cdf_min) as f64;
    let lut: Vec<u8> = cdf
        .iter()
        .map(|&c| ((c.saturating_sub(cdf_min)) as f64 * 255.0 / span).round().clamp(0.0, 255.0) as u8)
        .collect();
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| Luma([lut[gray.get_pixel(x, y)[0] as usize]]))
}

/// Shoelace area of a closed contour.
pub fn contour_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() / 2.0
}

pub type SharedEngine = Arc<dyn VisionEngine>;

/// Process-wide engine slot; loaded on first use, never reloaded.
pub fn shared_engine() -> &'static LazyResource<SharedEngine> {
    static ENGINE: OnceLock<LazyResource<SharedEngine>> = OnceLock::new();
    ENGINE.get_or_init(|| {
        LazyResource::new("vision engine (imageproc)", || {
            ImageprocEngine::load().map(|e| Arc::new(e) as SharedEngine)
        })
    })
}
