//! Guided portrait capture from a live camera.
//!
//! A silhouette (face) or rounded card outline is drawn over a mirrored,
//! cover-fit preview. Detectors decide on a fixed cadence whether the subject
//! sits inside that outline, and the result colors the guide and can trigger
//! an automatic capture of a fixed-size, unmirrored JPEG still.
//!
//! The pipeline consists of:
//! 1. Cover-fit mapping between camera pixels and the preview raster
//! 2. Guide outlines shared by drawing and hit-testing
//! 3. Face-in-guide test (rustface) or card-in-guide test (contour detector on
//!    imageproc, with an edge-contrast heuristic as fallback)
//! 4. A session that schedules detection, drives auto-capture and encodes
//!    the still
//!
//! # Examples
//!
//! ```
//! use guided_capture::geometry::{compute_mapping, dest_rect_to_source_rect};
//! use guided_capture::guides::card_guide_rect;
//!
//! # fn main() -> guided_capture::Result<()> {
//! // 405x720 portrait preview of a 1280x720 camera
//! let mapping = compute_mapping(405, 720, 1280, 720, false)?;
//! let roi = dest_rect_to_source_rect(&card_guide_rect(405, 720), &mapping);
//!
//! // The card region is a crop of real camera pixels.
//! assert!(roi.x >= 0.0 && roi.right() <= 1280.0);
//! assert!(roi.y >= 0.0 && roi.bottom() <= 720.0);
//! # Ok(())
//! # }
//! ```

/// Auto-capture arm-and-reconfirm state machine
pub mod autocapture;

/// Camera acquisition (nokhwa) behind the `FrameSource` trait
pub mod camera;

/// Still rendering and JPEG/data-URI encoding
pub mod capture;

/// YAML configuration
pub mod config;

/// Primary card detector: edges, contours, rotated rectangles
pub mod contour;

/// Window, lines and bitmap font
pub mod draw;

/// Vision engine trait and its imageproc implementation
pub mod engine;

/// Error types
pub mod error;

/// Face detector adapter and face-in-guide test
pub mod face;

/// Detector selection and the detection worker
pub mod fusion;

/// sRGB/linear tables for overlay dimming
pub mod gamma;

/// Cover-fit mapping between source and destination space
pub mod geometry;

/// Face silhouette and card outlines
pub mod guides;

/// Edge-contrast card heuristic
pub mod heuristic;

/// Load-once resources
pub mod loader;

/// Crop and luma helpers
pub mod raster;

/// Preview rendering
pub mod render;

/// Session lifecycle
pub mod session;

/// Frame buffer, geometry primitives, guide mode and per-tick snapshot
pub mod types;

pub use error::{Error, Result};
pub use session::{CaptureSession, SessionOptions, SessionStatus};
pub use types::{DetectionState, FrameContext, GuideMode};
