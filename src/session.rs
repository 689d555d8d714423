// Capture session lifecycle.
//
// A `CaptureSession` owns everything that only makes sense while the
// camera streams: the latest frame, the per-frame `FrameContext`, the
// per-mode `DetectionState`, the auto-capture machine and the detection
// worker. Closing tears all of it down and, when nothing was captured,
// reports `None` to the capture callback exactly once.

use std::time::{Duration, Instant};

use image::RgbImage;

use crate::autocapture::{AutoCapture, AutoEvent};
use crate::camera::FrameSource;
use crate::capture::{CaptureRequest, capture_still};
use crate::config::Config;
use crate::error::Result;
use crate::fusion::{DetectionJob, DetectionScheduler, FrameEvaluator};
use crate::geometry::compute_mapping;
use crate::types::{DetectionState, FrameContext, GuideMode};

/// Receives each captured still, or `None` when a session closes without one.
pub type CaptureCallback = Box<dyn FnMut(Option<CaptureRequest>)>;

/// Builds the detection evaluator for a newly opened session.
pub type EvaluatorFactory = Box<dyn FnMut() -> Box<dyn FrameEvaluator>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Closed,
    Streaming,
    /// Open, but the camera could not be acquired.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub initial_mode: GuideMode,
    pub auto_capture: bool,
    pub auto_capture_delay: Duration,
    pub detection_interval: Duration,
    pub close_on_capture: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            initial_mode: GuideMode::Face,
            auto_capture: false,
            auto_capture_delay: Duration::from_millis(5000),
            detection_interval: Duration::from_millis(333),
            close_on_capture: true,
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            initial_mode: cfg.session.initial_mode,
            auto_capture: cfg.session.auto_capture,
            auto_capture_delay: cfg.session.auto_capture_delay(),
            detection_interval: cfg.session.detection_interval(),
            close_on_capture: cfg.capture.close_on_capture,
        }
    }
}

pub struct CaptureSession {
    opts: SessionOptions,
    mode: GuideMode,
    status: SessionStatus,
    source: Option<Box<dyn FrameSource>>,
    latest: Option<RgbImage>,
    ctx: Option<FrameContext>,
    state: DetectionState,
    auto: AutoCapture,
    scheduler: Option<DetectionScheduler>,
    evaluators: EvaluatorFactory,
    callback: CaptureCallback,
    delivered: bool,
}

impl CaptureSession {
    pub fn new(opts: SessionOptions, evaluators: EvaluatorFactory, callback: CaptureCallback) -> Self {
        Self {
            mode: opts.initial_mode,
            auto: AutoCapture::new(opts.auto_capture, opts.auto_capture_delay),
            opts,
            status: SessionStatus::Closed,
            source: None,
            latest: None,
            ctx: None,
            state: DetectionState::default(),
            scheduler: None,
            evaluators,
            callback,
            delivered: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status != SessionStatus::Closed
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn mode(&self) -> GuideMode {
        self.mode
    }

    pub fn detection_state(&self) -> DetectionState {
        self.state
    }

    /// Fused boolean for the active mode.
    pub fn framed(&self) -> bool {
        self.state.framed(self.mode)
    }

    pub fn frame_context(&self) -> Option<&FrameContext> {
        self.ctx.as_ref()
    }

    pub fn latest_frame(&self) -> Option<&RgbImage> {
        self.latest.as_ref()
    }

    pub fn auto_capture(&self) -> &AutoCapture {
        &self.auto
    }

    /// Open the session and acquire the camera. Acquisition failure keeps
    /// the session open but not streaming, with the message in the status.
    pub fn open<F>(&mut self, acquire: F)
    where
        F: FnOnce() -> Result<Box<dyn FrameSource>>,
    {
        if self.is_open() {
            log::debug!("session already open");
            return;
        }
        self.delivered = false;
        self.state = DetectionState::default();

        match acquire() {
            Ok(source) => {
                let (w, h) = source.resolution();
                log::info!("session open: streaming {w}x{h}, mode {}", self.mode.label());
                self.source = Some(source);
                self.status = SessionStatus::Streaming;
                match DetectionScheduler::spawn((self.evaluators)(), self.opts.detection_interval) {
                    Ok(s) => {
                        log::debug!("detection every {} ms", s.interval().as_millis());
                        self.scheduler = Some(s);
                    }
                    Err(e) => log::warn!("detection unavailable for this session: {e}"),
                }
            }
            Err(e) => {
                log::warn!("camera acquisition failed: {e}");
                self.status = SessionStatus::Failed(e.to_string());
            }
        }
    }

    /// Tear everything down. Safe to call at any time, any number of times.
    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
        self.auto.cancel();
        self.ctx = None;
        self.latest = None;
        self.state = DetectionState::default();
        self.status = SessionStatus::Closed;
        log::info!("session closed");

        if !self.delivered {
            (self.callback)(None);
        }
    }

    pub fn set_mode(&mut self, mode: GuideMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        // A deadline armed for the other guide must not capture this one.
        self.auto.cancel();
        if let Some(ctx) = &mut self.ctx {
            ctx.mapping = ctx.mapping.with_mirrored(mode.mirrored());
            ctx.mode = mode;
        }
        log::info!("guide mode {}", mode.label());
    }

    pub fn toggle_mode(&mut self) {
        self.set_mode(self.mode.toggled());
    }

    pub fn set_auto_capture(&mut self, enabled: bool) {
        self.auto.set_enabled(enabled);
        log::info!("auto-capture {}", if enabled { "on" } else { "off" });
    }

    /// Pull the next camera frame. Returns whether a frame is available for
    /// this render step; frame errors are logged and retried next step.
    pub fn pull_frame(&mut self) -> bool {
        let Some(source) = self.source.as_mut() else {
            return false;
        };
        match source.next_frame() {
            Ok(frame) if frame.width() > 0 && frame.height() > 0 => {
                self.latest = Some(frame);
                true
            }
            Ok(_) => self.latest.is_some(),
            Err(e) => {
                log::debug!("no frame this step: {e}");
                self.latest.is_some()
            }
        }
    }

    /// Recompute the cover-fit snapshot for a `dest_w`×`dest_h` raster.
    /// The render step is the only caller.
    pub fn update_mapping(&mut self, dest_w: u32, dest_h: u32) -> Option<FrameContext> {
        let (src_w, src_h) = self.latest.as_ref()?.dimensions();
        let stale = self.ctx.is_none_or(|c| {
            c.mapping.dest_w != dest_w || c.mapping.dest_h != dest_h || c.mapping.src_w != src_w || c.mapping.src_h != src_h
        });
        if stale {
            match compute_mapping(dest_w, dest_h, src_w, src_h, self.mode.mirrored()) {
                Ok(mapping) => self.ctx = Some(FrameContext { mapping, mode: self.mode }),
                Err(e) => {
                    log::debug!("mapping skipped: {e}");
                    return None;
                }
            }
        }
        self.ctx
    }

    /// One detection step: take a finished outcome, dispatch the next job
    /// when due, then check the auto-capture deadline.
    pub fn tick(&mut self, now: Instant) {
        if self.status != SessionStatus::Streaming {
            return;
        }
        let Some(scheduler) = self.scheduler.as_mut() else {
            return;
        };

        if let Some(outcome) = scheduler.try_drain() {
            self.state.set(outcome.mode, outcome.framed);
            if outcome.mode == self.mode && self.auto.observe(outcome.framed, now) {
                log::info!("auto-capture armed for {} ms", self.auto.delay().as_millis());
            }
        }

        let (ctx, latest) = (self.ctx, self.latest.as_ref());
        scheduler.maybe_dispatch(now, || {
            Some(DetectionJob { frame: latest?.clone(), ctx: ctx? })
        });

        match self.auto.poll(now, self.state.framed(self.mode)) {
            Some(AutoEvent::Fire) => {
                if let Err(e) = self.capture() {
                    log::warn!("auto-capture failed: {e}");
                }
                self.auto.finish_capture();
            }
            Some(AutoEvent::Discarded) => log::info!("auto-capture discarded"),
            None => {}
        }
    }

    /// Capture the latest raw frame. Returns false when there is nothing to
    /// capture yet.
    pub fn capture(&mut self) -> Result<bool> {
        if self.status != SessionStatus::Streaming {
            return Ok(false);
        }
        let Some(frame) = self.latest.as_ref() else {
            return Ok(false);
        };
        let request = capture_still(frame)?;
        self.delivered = true;
        (self.callback)(Some(request));
        if self.opts.close_on_capture {
            self.close();
        }
        Ok(true)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}
