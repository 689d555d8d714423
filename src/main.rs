// What you SEE:
// • Mirrored live camera with a face silhouette (M switches to the card outline).
// • Everything outside the guide is dimmed; the outline turns green when framed.
// • SPACE captures, A toggles auto-capture, O opens / X closes the session. ESC quits.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use clap::Parser;
use log::info;

use guided_capture::autocapture::{AutoCapture, AutoState};
use guided_capture::camera::{CameraCapture, FrameSource};
use guided_capture::capture::CaptureRequest;
use guided_capture::config::{CameraConfig, Config, VisionEngineKind};
use guided_capture::draw::{Drawer, draw_text_5x7};
use guided_capture::engine::shared_engine;
use guided_capture::face::{DetectOptions, FaceAdapter, FaceModelSource};
use guided_capture::fusion::{CardStrategy, Detectors, FrameEvaluator};
use guided_capture::gamma::GammaLut;
use guided_capture::loader::ResourceState;
use guided_capture::render::{DIM_STRENGTH, Overlay, raster_size, render_placeholder};
use guided_capture::session::{CaptureCallback, EvaluatorFactory};
use guided_capture::types::FrameBuffer;
use guided_capture::{CaptureSession, GuideMode, SessionOptions, SessionStatus};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Camera index to use
    #[arg(long)]
    camera: Option<u32>,

    /// Initial guide mode (face, card)
    #[arg(short, long)]
    mode: Option<GuideMode>,

    /// Open the session at startup
    #[arg(long)]
    open: bool,

    /// Capture automatically once framing holds
    #[arg(long)]
    auto_capture: bool,

    /// How long framing must hold before an automatic capture
    #[arg(long)]
    auto_capture_delay_ms: Option<u64>,

    /// Directory for captured stills
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

fn load_config(args: &Args) -> Config {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).unwrap_or_else(|e| {
                log::warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            })
        }
        None => Config::default(),
    };

    if let Some(index) = args.camera {
        config.camera.index = index;
    }
    if let Some(mode) = args.mode {
        config.session.initial_mode = mode;
    }
    if args.open {
        config.session.open = true;
    }
    if args.auto_capture {
        config.session.auto_capture = true;
    }
    if let Some(ms) = args.auto_capture_delay_ms {
        config.session.auto_capture_delay_ms = ms;
    }
    if let Some(dir) = &args.output {
        config.capture.output_dir = dir.clone();
    }
    config
}

fn acquire_camera(cfg: &CameraConfig) -> guided_capture::Result<Box<dyn FrameSource>> {
    CameraCapture::open(cfg).map(|c| Box::new(c) as Box<dyn FrameSource>)
}

/// Write one still as `capture-<unix ms>.jpg` under `dir`.
fn save_capture(dir: &Path, req: &CaptureRequest) -> guided_capture::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    let path = dir.join(format!("capture-{stamp}.jpg"));
    std::fs::write(&path, &req.jpeg)?;
    Ok(path)
}

fn status_line(session: &CaptureSession) -> String {
    match session.status() {
        SessionStatus::Closed => "CLOSED - PRESS O TO OPEN".to_string(),
        SessionStatus::Failed(msg) => format!("CAMERA ERROR: {msg}"),
        SessionStatus::Streaming => "WAITING FOR CAMERA".to_string(),
    }
}

fn auto_label(auto: &AutoCapture, now: Instant) -> String {
    match auto.state() {
        _ if !auto.enabled() => "AUTO OFF".to_string(),
        AutoState::Armed { deadline } => format!("AUTO {:.1}S", deadline.saturating_duration_since(now).as_secs_f32()),
        _ => "AUTO ON".to_string(),
    }
}

/// Contour engine state, shown while the card guide is up.
fn engine_label() -> &'static str {
    match shared_engine().state() {
        ResourceState::Uninitialized => "CV IDLE",
        ResourceState::Loading => "CV LOADING",
        ResourceState::Ready => "CV READY",
        ResourceState::Failed => "CV FALLBACK",
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    let config = load_config(&args);
    config.validate()?;
    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }
    info!("Guided Capture");

    /* --- Detectors ---
       Shared across sessions: the face model and vision engine load once. */
    let face = FaceAdapter::from_model(
        FaceModelSource { path: config.models.face_model_path(), min_face_size: config.face_detection.min_face_size },
        DetectOptions {
            input_size: config.face_detection.input_size,
            score_threshold: config.face_detection.score_threshold,
        },
    );
    let strategy = match config.vision.engine {
        VisionEngineKind::Imageproc => CardStrategy::ContourWithFallback,
        VisionEngineKind::None => CardStrategy::HeuristicOnly,
    };
    let detectors = Detectors::new(face, strategy);
    let evaluators: EvaluatorFactory = Box::new(move || Box::new(detectors.clone()) as Box<dyn FrameEvaluator>);

    /* --- Capture callback ---
       Stills land on disk; a close without capture is just logged. */
    let output_dir = config.capture.output_dir.clone();
    let callback: CaptureCallback = Box::new(move |req: Option<CaptureRequest>| match req {
        Some(req) => match save_capture(&output_dir, &req) {
            Ok(path) => info!("capture written to {}", path.display()),
            Err(e) => log::error!("could not write capture: {e}"),
        },
        None => info!("session closed without a capture"),
    });

    let mut session = CaptureSession::new(SessionOptions::from(&config), evaluators, callback);
    if config.session.open {
        session.open(|| acquire_camera(&config.camera));
    }

    /* --- Window + screen buffer ---
       The buffer follows the window size times the pixel ratio. */
    let display = &config.display;
    let mut drawer = Drawer::new("Guided Capture", display.window_width, display.window_height, display.target_fps)?;
    let (w, h) = raster_size(display.window_width, display.window_height, display.pixel_ratio);
    let mut screen = FrameBuffer::new(w, h);
    let overlay = Overlay::new(&GammaLut::new(), DIM_STRENGTH);

    /* --- HUD / FPS --- */
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut hud_fps_text = String::from("FPS: 0.0");

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        let now = Instant::now();

        /* 1) Inputs */
        if drawer.open_pressed_once() {
            session.open(|| acquire_camera(&config.camera));
        }
        if drawer.close_pressed_once() {
            session.close();
        }
        if drawer.mode_pressed_once() {
            session.toggle_mode();
        }
        if drawer.auto_pressed_once() {
            let enabled = !session.auto_capture().enabled();
            session.set_auto_capture(enabled);
        }
        if drawer.capture_pressed_once() {
            match session.capture() {
                Ok(true) => {}
                Ok(false) => log::warn!("nothing to capture yet"),
                Err(e) => log::error!("capture failed: {e}"),
            }
        }

        /* 2) Raster size for this frame (window may have been resized) */
        let (ww, wh) = drawer.size();
        let (dw, dh) = raster_size(ww, wh, display.pixel_ratio);
        screen.resize(dw, dh);

        /* 3) Fresh camera frame + mapping snapshot */
        if session.pull_frame() {
            session.update_mapping(dw as u32, dh as u32);
        }

        /* 4) Preview: video, dim, guide. Placeholder until a frame decodes. */
        match (session.latest_frame(), session.frame_context()) {
            (Some(frame), Some(ctx)) => overlay.render(&mut screen, frame, ctx, session.framed()),
            _ => render_placeholder(&mut screen, &status_line(&session)),
        }

        /* 5) Detection step + auto-capture deadline */
        session.tick(now);

        /* 6) HUD */
        let mut hud = format!(
            "{} | {} | {} | {}",
            session.mode().label(),
            if session.framed() { "FRAMED" } else { "ALIGN" },
            auto_label(session.auto_capture(), now),
            hud_fps_text
        );
        if session.mode() == GuideMode::Card && config.vision.engine == VisionEngineKind::Imageproc {
            hud.push_str(" | ");
            hud.push_str(engine_label());
        }
        draw_text_5x7(&mut screen, 8, 8, &hud, 0x00_FF_FF_FF);

        /* 7) Present */
        drawer.present(&screen)?;

        /* 8) FPS counter (log + HUD once per second) */
        frames_this_second += 1;
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            let fps = frames_this_second as f32 / secs;
            log::debug!("FPS: {fps:.1}");
            hud_fps_text = format!("FPS: {fps:.1}");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    session.close();
    Ok(())
}
