// Core types shared by the geometry, detection and render steps.

use serde::{Deserialize, Serialize};

use crate::geometry::Mapping;

/// Screen raster pushed to the window.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,      // destination raster width (pixels)
    pub height: usize,     // destination raster height (pixels)
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    /// Reallocate when the raster size changed (window resize / rotation).
    pub fn resize(&mut self, width: usize, height: usize) {
        if self.width != width || self.height != height {
            *self = Self::new(width, height);
        }
    }

    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box. Which space it lives in (source, destination or
/// working crop) is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// True when `other` lies fully inside `self` (within `eps`).
    pub fn contains_rect(&self, other: &Rect, eps: f64) -> bool {
        other.x >= self.x - eps
            && other.y >= self.y - eps
            && other.right() <= self.right() + eps
            && other.bottom() <= self.bottom() + eps
    }
}

/// Which guide is shown and which detector runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuideMode {
    #[default]
    Face,
    Card,
}

impl GuideMode {
    pub fn toggled(self) -> Self {
        match self {
            GuideMode::Face => GuideMode::Card,
            GuideMode::Card => GuideMode::Face,
        }
    }

    /// Face mode is drawn and detected mirrored; card mode never is.
    pub fn mirrored(self) -> bool {
        matches!(self, GuideMode::Face)
    }

    pub fn label(self) -> &'static str {
        match self {
            GuideMode::Face => "FACE",
            GuideMode::Card => "CARD",
        }
    }
}

impl std::str::FromStr for GuideMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "face" => Ok(GuideMode::Face),
            "card" => Ok(GuideMode::Card),
            other => Err(format!("unknown guide mode '{other}' (expected face or card)")),
        }
    }
}

/// Latest "framed correctly" flag per mode. Each field has exactly one
/// writer (its detector step) and is overwritten every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionState {
    pub face_inside: bool,
    pub card_ok: bool,
}

impl DetectionState {
    pub fn framed(&self, mode: GuideMode) -> bool {
        match mode {
            GuideMode::Face => self.face_inside,
            GuideMode::Card => self.card_ok,
        }
    }

    pub fn set(&mut self, mode: GuideMode, framed: bool) {
        match mode {
            GuideMode::Face => self.face_inside = framed,
            GuideMode::Card => self.card_ok = framed,
        }
    }
}

/// Immutable per-tick snapshot handed to detection and render steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub mapping: Mapping,
    pub mode: GuideMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_state_tracks_modes_independently() {
        let mut state = DetectionState::default();
        state.set(GuideMode::Card, true);
        assert!(state.framed(GuideMode::Card));
        assert!(!state.framed(GuideMode::Face));
        state.set(GuideMode::Card, false);
        assert_eq!(state, DetectionState::default());
    }

    #[test]
    fn only_face_mode_is_mirrored() {
        assert!(GuideMode::Face.mirrored());
        assert!(!GuideMode::Card.mirrored());
        assert_eq!(GuideMode::Face.toggled(), GuideMode::Card);
        assert_eq!("Card".parse::<GuideMode>(), Ok(GuideMode::Card));
        assert!("id".parse::<GuideMode>().is_err());
    }

    #[test]
    fn frame_buffer_resize_only_reallocates_on_change() {
        let mut fb = FrameBuffer::new(4, 2);
        fb.fill(7);
        fb.resize(4, 2);
        assert!(fb.pixels.iter().all(|&p| p == 7));
        fb.resize(2, 2);
        assert_eq!(fb.pixels.len(), 4);
        assert!(fb.pixels.iter().all(|&p| p == 0));
    }
}
