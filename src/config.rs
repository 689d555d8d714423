// Configuration for the guided capture application

use crate::types::GuideMode;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model file locations
    pub models: ModelConfig,

    /// Face detection parameters
    pub face_detection: FaceDetectionConfig,

    /// Card detection engine
    pub vision: VisionConfig,

    /// Session behavior
    pub session: SessionConfig,

    /// Camera request
    pub camera: CameraConfig,

    /// Window and overlay
    pub display: DisplayConfig,

    /// Where captures go
    pub capture: CaptureConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding the face model
    pub face_model_dir: PathBuf,

    /// SeetaFace model file name inside `face_model_dir`
    pub face_model_file: String,
}

/// Face detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectionConfig {
    /// Longest side of the raster handed to the detector
    pub input_size: u32,

    /// Minimum confidence for a face (0.0-1.0)
    pub score_threshold: f64,

    /// Smallest face the detector looks for, in detector pixels
    pub min_face_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionEngineKind {
    /// Contour detector on imageproc, heuristic fallback
    Imageproc,
    /// Heuristic detector only
    None,
}

/// Card detection engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub engine: VisionEngineKind,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Open the session at startup
    pub open: bool,

    /// Guide shown when the session opens
    pub initial_mode: GuideMode,

    /// Capture automatically once framing holds for the delay
    pub auto_capture: bool,

    /// How long framing must hold before an automatic capture
    pub auto_capture_delay_ms: u64,

    /// Detection cadence
    pub detection_interval_ms: u64,
}

/// Camera request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index
    pub index: u32,

    /// Ideal frame width
    pub ideal_width: u32,

    /// Ideal frame height
    pub ideal_height: u32,

    /// Requested frame rate
    pub fps: u32,

    /// Preferred facing ("user" or "environment"); advisory on desktop
    pub facing: String,
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Window width
    pub window_width: usize,

    /// Window height
    pub window_height: usize,

    /// Raster pixels per window pixel, clamped to 1..=3 at use
    pub pixel_ratio: f64,

    /// Target framerate
    pub target_fps: usize,
}

/// Capture output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory the JPEG stills are written to
    pub output_dir: PathBuf,

    /// Close the session after a successful capture
    pub close_on_capture: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_model_dir: PathBuf::from("models"),
            face_model_file: "seeta_fd_frontal_v1.0.bin".to_string(),
        }
    }
}

impl Default for FaceDetectionConfig {
    fn default() -> Self {
        Self {
            input_size: 224,
            score_threshold: 0.5,
            min_face_size: 20,
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self { engine: VisionEngineKind::Imageproc }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open: false,
            initial_mode: GuideMode::Face,
            auto_capture: false,
            auto_capture_delay_ms: 5000,
            detection_interval_ms: 333,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            ideal_width: 1440,
            ideal_height: 2560,
            fps: 30,
            facing: "user".to_string(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_width: 405,
            window_height: 720,
            pixel_ratio: 1.0,
            target_fps: 60,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("captures"),
            close_on_capture: true,
        }
    }
}

impl ModelConfig {
    pub fn face_model_path(&self) -> PathBuf {
        self.face_model_dir.join(&self.face_model_file)
    }
}

impl SessionConfig {
    pub fn auto_capture_delay(&self) -> Duration {
        Duration::from_millis(self.auto_capture_delay_ms)
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.face_detection.score_threshold) {
            return Err(Error::Config("Score threshold must be between 0.0 and 1.0".to_string()));
        }
        if self.face_detection.input_size == 0 {
            return Err(Error::Config("Face detection input size must be greater than 0".to_string()));
        }

        if self.session.detection_interval_ms == 0 {
            return Err(Error::Config("Detection interval must be greater than 0".to_string()));
        }

        if self.display.window_width == 0 || self.display.window_height == 0 {
            return Err(Error::Config("Window dimensions must be greater than 0".to_string()));
        }
        if !self.display.pixel_ratio.is_finite() {
            return Err(Error::Config("Pixel ratio must be a finite number".to_string()));
        }
        if self.display.target_fps == 0 {
            return Err(Error::Config("Target FPS must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Guided Capture Configuration

# Model paths
models:
  face_model_dir: "models"
  face_model_file: "seeta_fd_frontal_v1.0.bin"

# Face detection parameters
face_detection:
  input_size: 224
  score_threshold: 0.5
  min_face_size: 20

# Card detection: "imageproc" (contour detector) or "none" (heuristic only)
vision:
  engine: imageproc

# Session
session:
  open: false
  initial_mode: face
  auto_capture: false
  auto_capture_delay_ms: 5000
  detection_interval_ms: 333

# Camera request
camera:
  index: 0
  ideal_width: 1440
  ideal_height: 2560
  fps: 30
  facing: "user"

# Display settings
display:
  window_width: 405
  window_height: 720
  pixel_ratio: 1.0
  target_fps: 60

# Capture output
capture:
  output_dir: "captures"
  close_on_capture: true
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.models.face_model_path(), PathBuf::from("models/seeta_fd_frontal_v1.0.bin"));
        assert_eq!(cfg.vision.engine, VisionEngineKind::Imageproc);
        assert!(!cfg.session.open);
        assert_eq!(cfg.session.initial_mode, GuideMode::Face);
        assert!(!cfg.session.auto_capture);
        assert_eq!(cfg.session.auto_capture_delay(), Duration::from_millis(5000));
        assert_eq!(cfg.session.detection_interval(), Duration::from_millis(333));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn example_config_parses_to_defaults() {
        let parsed: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(parsed.to_yaml().unwrap(), Config::default().to_yaml().unwrap());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let parsed: Config = serde_yaml::from_str("session:\n  initial_mode: card\nvision:\n  engine: none\n").unwrap();
        assert_eq!(parsed.session.initial_mode, GuideMode::Card);
        assert_eq!(parsed.session.auto_capture_delay_ms, 5000);
        assert_eq!(parsed.vision.engine, VisionEngineKind::None);
        assert_eq!(parsed.camera.ideal_height, 2560);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.face_detection.score_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.session.detection_interval_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.display.pixel_ratio = f64::INFINITY;
        assert!(cfg.validate().is_err());
    }
}
