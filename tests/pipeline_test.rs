//! End-to-end checks of the detection and capture pipeline on synthetic frames

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use guided_capture::camera::FrameSource;
use guided_capture::capture::{CaptureRequest, OUTPUT_HEIGHT, OUTPUT_WIDTH};
use guided_capture::face::{DetectOptions, FaceAdapter, FaceBox, FaceDetector};
use guided_capture::fusion::{CardStrategy, Detectors, FrameEvaluator};
use guided_capture::geometry::{compute_mapping, dest_rect_to_source_rect, source_rect_to_dest_rect};
use guided_capture::guides::{card_guide_rect, face_guide_path};
use guided_capture::session::{CaptureCallback, EvaluatorFactory};
use guided_capture::types::Rect;
use guided_capture::{CaptureSession, FrameContext, GuideMode, SessionOptions};
use image::{Rgb, RgbImage};

const DEST: (u32, u32) = (405, 720);
const SRC: (u32, u32) = (1280, 720);

fn context(mode: GuideMode) -> FrameContext {
    FrameContext { mapping: compute_mapping(DEST.0, DEST.1, SRC.0, SRC.1, mode.mirrored()).unwrap(), mode }
}

struct FixedFace(Option<Rect>);

impl FaceDetector for FixedFace {
    fn detect(&self, _: &RgbImage, _: &DetectOptions) -> guided_capture::Result<Option<FaceBox>> {
        Ok(self.0.map(|rect| FaceBox { rect, score: 0.9 }))
    }
}

fn detectors(face: Option<Rect>, strategy: CardStrategy) -> Detectors {
    Detectors::new(FaceAdapter::with_detector(Box::new(FixedFace(face)), DetectOptions::default()), strategy)
}

#[test]
fn test_card_inside_guide_is_detected_by_contours() {
    let ctx = context(GuideMode::Card);
    let roi = dest_rect_to_source_rect(&card_guide_rect(DEST.0, DEST.1), &ctx.mapping);

    // White card at 80% of the ROI's sides, centered, on a black desk.
    let (w, h) = (roi.width * 0.8, roi.height * 0.8);
    let card = Rect::new(roi.x + (roi.width - w) / 2.0, roi.y + (roi.height - h) / 2.0, w, h);
    let frame = RgbImage::from_fn(SRC.0, SRC.1, |x, y| {
        let (x, y) = (x as f64 + 0.5, y as f64 + 0.5);
        if x >= card.x && x < card.right() && y >= card.y && y < card.bottom() {
            Rgb([250, 250, 250])
        } else {
            Rgb([5, 5, 5])
        }
    });

    let fused = detectors(None, CardStrategy::ContourWithFallback);
    assert!(fused.evaluate(&frame, &ctx));

    let empty = RgbImage::from_pixel(SRC.0, SRC.1, Rgb([5, 5, 5]));
    assert!(!fused.evaluate(&empty, &ctx));
}

#[test]
fn test_face_on_guide_is_framed() {
    let ctx = context(GuideMode::Face);
    let guide = face_guide_path(DEST.0, DEST.1);
    let target = guide.centroid();

    // Build the source box whose mirrored projection is centered on the guide.
    let side = 120.0;
    let dest_box = Rect::new(target.x - side / 2.0, target.y - side / 2.0, side, side);
    let face = dest_rect_to_source_rect(&dest_box, &ctx.mapping);
    let back = source_rect_to_dest_rect(&face, &ctx.mapping).center();
    assert!((back.x - target.x).abs() < 1e-6 && (back.y - target.y).abs() < 1e-6);

    let frame = RgbImage::new(SRC.0, SRC.1);
    assert!(detectors(Some(face), CardStrategy::HeuristicOnly).evaluate(&frame, &ctx));

    // Same box size in the cropped-away left margin of the camera frame.
    let off_screen = Rect::new(10.0, 300.0, side, side);
    assert!(!detectors(Some(off_screen), CardStrategy::HeuristicOnly).evaluate(&frame, &ctx));
    assert!(!detectors(None, CardStrategy::HeuristicOnly).evaluate(&frame, &ctx));
}

struct SplitCamera;

impl FrameSource for SplitCamera {
    fn next_frame(&mut self) -> guided_capture::Result<RgbImage> {
        Ok(RgbImage::from_fn(SRC.0, SRC.1, |x, _| if x < SRC.0 / 2 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }))
    }

    fn resolution(&self) -> (u32, u32) {
        SRC
    }

    fn stop(&mut self) {}
}

type Captures = Rc<RefCell<Vec<Option<CaptureRequest>>>>;

fn session(opts: SessionOptions, framed: bool) -> (CaptureSession, Captures) {
    let captures: Captures = Rc::default();
    let sink = Rc::clone(&captures);
    let callback: CaptureCallback = Box::new(move |req| sink.borrow_mut().push(req));
    let evaluators: EvaluatorFactory =
        Box::new(move || Box::new(move |_: &RgbImage, _: &FrameContext| framed) as Box<dyn FrameEvaluator>);
    (CaptureSession::new(opts, evaluators, callback), captures)
}

#[test]
fn test_capture_in_face_mode_is_not_mirrored() {
    let (mut s, captures) = session(SessionOptions::default(), false);
    s.open(|| Ok(Box::new(SplitCamera) as Box<dyn FrameSource>));
    assert_eq!(s.mode(), GuideMode::Face);
    assert!(s.pull_frame());
    assert!(s.update_mapping(DEST.0, DEST.1).is_some_and(|c| c.mapping.mirrored));
    assert!(s.capture().unwrap());
    drop(s);

    let captures = captures.borrow();
    assert_eq!(captures.len(), 1, "capture only, no close notification");
    let req = captures[0].as_ref().unwrap();
    assert_eq!(req.image.dimensions(), (OUTPUT_WIDTH, OUTPUT_HEIGHT));
    assert!(req.data_uri.starts_with("data:image/jpeg;base64,"));
    assert!(req.image.get_pixel(10, OUTPUT_HEIGHT / 2)[0] > 200, "left side should stay red");
    assert!(req.image.get_pixel(OUTPUT_WIDTH - 10, OUTPUT_HEIGHT / 2)[2] > 200, "right side should stay blue");
}

#[test]
fn test_auto_capture_end_to_end() {
    let opts = SessionOptions {
        auto_capture: true,
        auto_capture_delay: Duration::from_millis(30),
        detection_interval: Duration::from_millis(5),
        ..SessionOptions::default()
    };
    let (mut s, captures) = session(opts, true);
    s.open(|| Ok(Box::new(SplitCamera) as Box<dyn FrameSource>));

    let deadline = Instant::now() + Duration::from_secs(5);
    while s.is_open() {
        assert!(Instant::now() < deadline, "auto-capture never fired");
        if s.pull_frame() {
            s.update_mapping(DEST.0, DEST.1);
        }
        s.tick(Instant::now());
        std::thread::sleep(Duration::from_millis(2));
    }

    let captures = captures.borrow();
    assert_eq!(captures.len(), 1);
    assert!(captures[0].is_some());
}

#[test]
fn test_close_without_capture_reports_none() {
    let (mut s, captures) = session(SessionOptions::default(), true);
    s.open(|| Ok(Box::new(SplitCamera) as Box<dyn FrameSource>));
    s.pull_frame();
    s.close();
    s.close();
    drop(s);
    let captures = captures.borrow();
    assert_eq!(captures.len(), 1);
    assert!(captures[0].is_none());
}
