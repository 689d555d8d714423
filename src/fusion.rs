// Detection fusion: one "framed correctly" boolean per tick.
//
// `Detectors` picks the detector for the snapshot's guide mode (face
// adapter, or contour with heuristic fallback for cards). The
// `DetectionScheduler` runs it on a worker thread on a fixed cadence, with
// at most one job in flight, so a slow detector never stalls the window loop.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::RgbImage;

use crate::contour::ContourCardDetector;
use crate::engine::{SharedEngine, shared_engine};
use crate::face::FaceAdapter;
use crate::geometry::{Mapping, dest_rect_to_source_rect};
use crate::guides::{card_guide_rect, face_guide_path};
use crate::heuristic::HeuristicCardDetector;
use crate::loader::LazyResource;
use crate::types::{FrameContext, GuideMode};

/// Which card detector to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStrategy {
    /// Contour detector when the vision engine loads, heuristic otherwise.
    ContourWithFallback,
    HeuristicOnly,
}

/// Anything that can turn a frame and its snapshot into the fused boolean.
pub trait FrameEvaluator: Send + 'static {
    fn evaluate(&self, frame: &RgbImage, ctx: &FrameContext) -> bool;
}

impl<F> FrameEvaluator for F
where
    F: Fn(&RgbImage, &FrameContext) -> bool + Send + 'static,
{
    fn evaluate(&self, frame: &RgbImage, ctx: &FrameContext) -> bool {
        self(frame, ctx)
    }
}

#[derive(Clone)]
pub struct Detectors {
    face: FaceAdapter,
    heuristic: HeuristicCardDetector,
    strategy: CardStrategy,
    engine: &'static LazyResource<SharedEngine>,
}

impl Detectors {
    pub fn new(face: FaceAdapter, strategy: CardStrategy) -> Self {
        Self { face, heuristic: HeuristicCardDetector::new(), strategy, engine: shared_engine() }
    }

    /// Use `engine` for the contour detector instead of the process-wide one.
    pub fn with_engine(mut self, engine: &'static LazyResource<SharedEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Face center inside the face guide, in mirrored destination space.
    pub fn face_framed(&self, frame: &RgbImage, mapping: &Mapping) -> bool {
        let guide = face_guide_path(mapping.dest_w, mapping.dest_h);
        self.face.framed(frame, mapping, &guide)
    }

    /// Card inside the card guide. Card mode is never mirrored.
    pub fn card_present(&self, frame: &RgbImage, mapping: &Mapping) -> bool {
        let mapping = mapping.with_mirrored(false);
        let roi = dest_rect_to_source_rect(&card_guide_rect(mapping.dest_w, mapping.dest_h), &mapping);

        if self.strategy == CardStrategy::ContourWithFallback {
            if let Some(engine) = self.engine.ensure_ready() {
                let contour = ContourCardDetector::new(Arc::clone(engine));
                match contour.detect(frame, &roi) {
                    Ok(found) => return found,
                    Err(e) => log::warn!("{} contour detector failed, using heuristic: {e}", contour.engine_name()),
                }
            }
        }

        match self.heuristic.detect(frame, &roi) {
            Ok(found) => found,
            Err(e) => {
                log::debug!("heuristic card check skipped: {e}");
                false
            }
        }
    }
}

impl FrameEvaluator for Detectors {
    fn evaluate(&self, frame: &RgbImage, ctx: &FrameContext) -> bool {
        match ctx.mode {
            GuideMode::Face => self.face_framed(frame, &ctx.mapping),
            GuideMode::Card => self.card_present(frame, &ctx.mapping),
        }
    }
}

/// One frame queued for detection together with the snapshot it was taken in.
pub struct DetectionJob {
    pub frame: RgbImage,
    pub ctx: FrameContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionOutcome {
    pub mode: GuideMode,
    pub framed: bool,
}

/// Fixed-cadence dispatcher for the detection worker.
pub struct DetectionScheduler {
    interval: Duration,
    last_dispatch: Option<Instant>,
    in_flight: bool,
    jobs: Option<Sender<DetectionJob>>,
    outcomes: Receiver<DetectionOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl DetectionScheduler {
    pub fn spawn(evaluator: Box<dyn FrameEvaluator>, interval: Duration) -> crate::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<DetectionJob>();
        let (out_tx, out_rx) = mpsc::channel::<DetectionOutcome>();

        let worker = std::thread::Builder::new().name("detection".into()).spawn(move || {
            log::debug!("detection worker started");
            while let Ok(job) = job_rx.recv() {
                let framed = evaluator.evaluate(&job.frame, &job.ctx);
                if out_tx.send(DetectionOutcome { mode: job.ctx.mode, framed }).is_err() {
                    break;
                }
            }
            log::debug!("detection worker stopped");
        })?;

        Ok(Self {
            interval,
            last_dispatch: None,
            in_flight: false,
            jobs: Some(job_tx),
            outcomes: out_rx,
            worker: Some(worker),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_running(&self) -> bool {
        self.jobs.is_some()
    }

    /// The interval elapsed and the previous job finished.
    pub fn due(&self, now: Instant) -> bool {
        self.is_running()
            && !self.in_flight
            && self.last_dispatch.is_none_or(|t| now.saturating_duration_since(t) >= self.interval)
    }

    /// Send a job when due. `make_job` runs only then, so the caller copies
    /// a frame only when it is actually needed.
    pub fn maybe_dispatch(&mut self, now: Instant, make_job: impl FnOnce() -> Option<DetectionJob>) -> bool {
        if !self.due(now) {
            return false;
        }
        let Some(job) = make_job() else {
            return false;
        };
        let Some(jobs) = &self.jobs else {
            return false;
        };
        if jobs.send(job).is_err() {
            log::warn!("detection worker is gone; detection disabled");
            self.jobs = None;
            return false;
        }
        self.last_dispatch = Some(now);
        self.in_flight = true;
        true
    }

    /// Finished outcome, if the worker has one.
    pub fn try_drain(&mut self) -> Option<DetectionOutcome> {
        match self.outcomes.try_recv() {
            Ok(outcome) => {
                self.in_flight = false;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                if self.jobs.take().is_some() {
                    log::warn!("detection worker exited unexpectedly");
                }
                self.in_flight = false;
                None
            }
        }
    }

    /// Stop the worker. Joins only a thread that already finished; a stalled
    /// detector call is left to finish on its own and its result is dropped.
    pub fn shutdown(&mut self) {
        self.jobs = None;
        self.in_flight = false;
        self.last_dispatch = None;
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                if worker.join().is_err() {
                    log::warn!("detection worker panicked");
                }
            } else {
                log::debug!("detection worker still busy; detaching");
            }
        }
    }
}

impl Drop for DetectionScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
