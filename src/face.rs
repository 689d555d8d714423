// Face-in-guide check.
//
// A `FaceDetector` proposes one box in source space; the adapter maps its
// center into destination space (always mirrored, like the face guide) and
// tests it against the very path that is drawn on screen.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use image::{GrayImage, RgbImage, imageops};

use crate::error::{Error, Result};
use crate::geometry::{Mapping, face_box_center};
use crate::guides::Path;
use crate::loader::LazyResource;
use crate::raster::luma;
use crate::types::Rect;

/// Bounding box of the best face, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub rect: Rect,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectOptions {
    /// Longest side of the raster the model sees.
    pub input_size: u32,
    pub score_threshold: f64,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self { input_size: 224, score_threshold: 0.5 }
    }
}

/// Pluggable face proposal backend.
pub trait FaceDetector: Send + Sync {
    /// Best face in `frame` at or above the score threshold, if any.
    fn detect(&self, frame: &RgbImage, opts: &DetectOptions) -> Result<Option<FaceBox>>;
}

/// SeetaFace frontal detector from the `rustface` crate.
pub struct RustfaceDetector {
    model: rustface::Model,
    min_face_size: u32,
}

impl RustfaceDetector {
    pub fn from_file(path: &FsPath, min_face_size: u32) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::FaceModel(format!("open {}: {e}", path.display())))?;
        let model = rustface::read_model(std::io::BufReader::new(file))
            .map_err(|e| Error::FaceModel(format!("read {}: {e}", path.display())))?;
        Ok(Self { model, min_face_size })
    }
}

fn to_gray_scaled(frame: &RgbImage, input_size: u32) -> (GrayImage, f64) {
    let longest = frame.width().max(frame.height()).max(1);
    let scale = (input_size as f64 / longest as f64).min(1.0);
    let w = ((frame.width() as f64 * scale).round() as u32).max(1);
    let h = ((frame.height() as f64 * scale).round() as u32).max(1);
    let small = if scale < 1.0 {
        imageops::resize(frame, w, h, imageops::FilterType::Triangle)
    } else {
        frame.clone()
    };
    let gray = GrayImage::from_fn(small.width(), small.height(), |x, y| {
        image::Luma([luma(small.get_pixel(x, y)).round().clamp(0.0, 255.0) as u8])
    });
    (gray, scale)
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, frame: &RgbImage, opts: &DetectOptions) -> Result<Option<FaceBox>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(None);
        }
        let (gray, scale) = to_gray_scaled(frame, opts.input_size);

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(opts.score_threshold);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), gray.width(), gray.height()));
        let best = faces
            .iter()
            .filter(|f| f.score() >= opts.score_threshold)
            .max_by(|a, b| a.score().total_cmp(&b.score()));

        Ok(best.map(|face| {
            let b = face.bbox();
            FaceBox {
                rect: Rect::new(
                    b.x() as f64 / scale,
                    b.y() as f64 / scale,
                    b.width() as f64 / scale,
                    b.height() as f64 / scale,
                ),
                score: face.score(),
            }
        }))
    }
}

/// Where the face model lives on disk.
#[derive(Debug, Clone)]
pub struct FaceModelSource {
    pub path: PathBuf,
    pub min_face_size: u32,
}

/// Face detector loaded on first use; a failed load means "never framed".
/// Clones share one detector, so the model loads once however many
/// sessions come and go.
#[derive(Clone)]
pub struct FaceAdapter {
    detector: Arc<LazyResource<Box<dyn FaceDetector>>>,
    opts: DetectOptions,
}

impl FaceAdapter {
    pub fn from_model(source: FaceModelSource, opts: DetectOptions) -> Self {
        let detector = LazyResource::new("face model", move || {
            RustfaceDetector::from_file(&source.path, source.min_face_size)
                .map(|d| Box::new(d) as Box<dyn FaceDetector>)
        });
        Self { detector: Arc::new(detector), opts }
    }

    /// Wrap an already constructed backend.
    pub fn with_detector(detector: Box<dyn FaceDetector>, opts: DetectOptions) -> Self {
        let slot = std::sync::Mutex::new(Some(detector));
        let detector = LazyResource::new("face detector", move || {
            slot.lock()
                .ok()
                .and_then(|mut d| d.take())
                .ok_or_else(|| Error::FaceModel("detector already taken".into()))
        });
        Self { detector: Arc::new(detector), opts }
    }

    /// Best face this tick; load or detector failures read as "no face".
    pub fn locate(&self, frame: &RgbImage) -> Option<FaceBox> {
        let detector = self.detector.ensure_ready()?;
        match detector.detect(frame, &self.opts) {
            Ok(face) => face,
            Err(e) => {
                log::debug!("face detection failed this tick: {e}");
                None
            }
        }
    }

    /// Full check: detect, map to the destination, hit-test the guide.
    pub fn framed(&self, frame: &RgbImage, mapping: &Mapping, guide: &Path) -> bool {
        face_in_guide(self.locate(frame).as_ref(), mapping, guide)
    }
}

/// Hit-test of a (possibly missing) face against the face guide.
pub fn face_in_guide(face: Option<&FaceBox>, mapping: &Mapping, guide: &Path) -> bool {
    face.is_some_and(|f| guide.contains(face_box_center(&f.rect, mapping)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{compute_mapping, dest_rect_to_source_rect};
    use crate::guides::face_guide_path;

    struct Fixed(Option<FaceBox>);

    impl FaceDetector for Fixed {
        fn detect(&self, _: &RgbImage, _: &DetectOptions) -> Result<Option<FaceBox>> {
            Ok(self.0)
        }
    }

    struct Failing;

    impl FaceDetector for Failing {
        fn detect(&self, _: &RgbImage, _: &DetectOptions) -> Result<Option<FaceBox>> {
            Err(Error::FaceModel("backend exploded".into()))
        }
    }

    /// Source-space box whose mirrored center lands on `target`.
    fn box_centered_on(target: crate::types::Point, m: &Mapping) -> FaceBox {
        let size = 40.0 * m.scale;
        let dest = Rect::new(target.x - size / 2.0, target.y - size / 2.0, size, size);
        FaceBox { rect: dest_rect_to_source_rect(&dest, &m.with_mirrored(true)), score: 0.9 }
    }

    #[test]
    fn face_on_guide_centroid_is_framed() {
        let m = compute_mapping(720, 1280, 1280, 720, true).unwrap();
        let guide = face_guide_path(720, 1280);
        let face = box_centered_on(guide.centroid(), &m);
        assert!(face_in_guide(Some(&face), &m, &guide));

        let adapter = FaceAdapter::with_detector(Box::new(Fixed(Some(face))), DetectOptions::default());
        assert!(adapter.framed(&RgbImage::new(1280, 720), &m, &guide));
    }

    #[test]
    fn face_outside_raster_is_not_framed() {
        let m = compute_mapping(720, 1280, 1280, 720, true).unwrap();
        let guide = face_guide_path(720, 1280);
        // Cover-fit crops the sides of a landscape frame; x = 0..100 is off screen.
        let face = FaceBox { rect: Rect::new(0.0, 10.0, 100.0, 100.0), score: 0.9 };
        assert!(!face_in_guide(Some(&face), &m, &guide));
        assert!(!face_in_guide(None, &m, &guide));
    }

    #[test]
    fn detector_errors_read_as_no_face() {
        let m = compute_mapping(720, 1280, 1280, 720, true).unwrap();
        let guide = face_guide_path(720, 1280);
        let adapter = FaceAdapter::with_detector(Box::new(Failing), DetectOptions::default());
        assert!(adapter.locate(&RgbImage::new(1280, 720)).is_none());
        assert!(!adapter.framed(&RgbImage::new(1280, 720), &m, &guide));
    }

    #[test]
    fn missing_model_is_not_fatal() {
        let adapter = FaceAdapter::from_model(
            FaceModelSource { path: PathBuf::from("/nonexistent/seeta.bin"), min_face_size: 20 },
            DetectOptions::default(),
        );
        assert!(adapter.locate(&RgbImage::new(64, 64)).is_none());
    }

    #[test]
    fn downscale_keeps_aspect() {
        let (gray, scale) = to_gray_scaled(&RgbImage::new(1280, 720), 224);
        assert_eq!(gray.dimensions(), (224, 126));
        assert!((scale - 0.175).abs() < 1e-9);
        let (small, s) = to_gray_scaled(&RgbImage::new(100, 50), 224);
        assert_eq!((small.dimensions(), s), ((100, 50), 1.0));
    }
}
