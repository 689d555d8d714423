// Camera acquisition behind a small trait, so the session can be driven by
// nokhwa on a real device or by a synthetic source in tests.

use crate::config::CameraConfig;
use crate::error::Error;

use image::RgbImage;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
};

/// A live frame source with an explicit stop.
pub trait FrameSource {
    /// Next decoded frame. Blocks until the device has one.
    fn next_frame(&mut self) -> Result<RgbImage, Error>;

    /// Resolution the device actually delivers.
    fn resolution(&self) -> (u32, u32);

    /// Release the device. Safe to call more than once.
    fn stop(&mut self);
}

pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
    streaming: bool,
}

impl CameraCapture {
    /// Open the configured device asking for the closest format to the
    /// ideal portrait size; the driver may pick something else.
    pub fn open(cfg: &CameraConfig) -> Result<Self, Error> {
        if cfg.facing != "user" {
            log::debug!("camera facing {:?} is advisory; using index {}", cfg.facing, cfg.index);
        }
        let idx = CameraIndex::Index(cfg.index);

        let fmt = CameraFormat::new(
            Resolution::new(cfg.ideal_width, cfg.ideal_height),
            FrameFormat::YUYV,
            cfg.fps,
        );
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(idx, req).map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;
        cam.open_stream().map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        let actual = cam.resolution();
        log::info!(
            "camera {} streaming at {}x{} (asked {}x{})",
            cfg.index,
            actual.width(),
            actual.height(),
            cfg.ideal_width,
            cfg.ideal_height
        );

        Ok(Self { cam, width: actual.width(), height: actual.height(), streaming: true })
    }
}

impl FrameSource for CameraCapture {
    fn next_frame(&mut self) -> Result<RgbImage, Error> {
        if !self.streaming {
            return Err(Error::CameraFrame("stream stopped".into()));
        }
        let frame = self.cam.frame().map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;
        // Rebuild from raw bytes so our buffer type never depends on the
        // `image` version nokhwa links against.
        let (w, h) = decoded.dimensions();
        RgbImage::from_raw(w, h, decoded.into_raw())
            .ok_or_else(|| Error::CameraFrame(format!("Decode RGB: short buffer for {w}x{h}")))
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn stop(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        if let Err(e) = self.cam.stop_stream() {
            log::warn!("camera stop failed: {e}");
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
