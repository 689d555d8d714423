// Cover-fit mapping between the camera frame (source space) and the
// rendered raster (destination space).
//
// The source is scaled uniformly until it covers the destination, centered,
// and optionally mirrored around its vertical axis. Everything that turns a
// guide drawn on screen into a crop of camera pixels goes through
// `dest_rect_to_source_rect`; the opposite direction is
// `source_rect_to_dest_rect`.

use crate::error::{Error, Result};
use crate::types::{Point, Rect};

/// One frame's cover-fit transform. Written only by the render step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mapping {
    pub dest_w: u32,
    pub dest_h: u32,
    pub src_w: u32,
    pub src_h: u32,
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub mirrored: bool,
}

impl Mapping {
    /// Same fit, different mirroring.
    pub fn with_mirrored(&self, mirrored: bool) -> Self {
        Self { mirrored, ..*self }
    }

    pub fn dest_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.dest_w as f64, self.dest_h as f64)
    }

    pub fn source_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.src_w as f64, self.src_h as f64)
    }
}

/// Scale-to-cover fit of a `src_w`×`src_h` raster into `dest_w`×`dest_h`.
pub fn compute_mapping(dest_w: u32, dest_h: u32, src_w: u32, src_h: u32, mirrored: bool) -> Result<Mapping> {
    if dest_w == 0 || dest_h == 0 || src_w == 0 || src_h == 0 {
        return Err(Error::InvalidInput(format!(
            "compute_mapping: empty raster (dest {dest_w}x{dest_h}, src {src_w}x{src_h})"
        )));
    }
    let (dw, dh, sw, sh) = (dest_w as f64, dest_h as f64, src_w as f64, src_h as f64);
    let scale = (dw / sw).max(dh / sh);
    Ok(Mapping {
        dest_w,
        dest_h,
        src_w,
        src_h,
        scale,
        offset_x: (dw - sw * scale) / 2.0,
        offset_y: (dh - sh * scale) / 2.0,
        mirrored,
    })
}

/// Forward transform of a source-space rectangle into destination space.
pub fn source_rect_to_dest_rect(rect: &Rect, m: &Mapping) -> Rect {
    let src_x = if m.mirrored { m.src_w as f64 - (rect.x + rect.width) } else { rect.x };
    Rect::new(
        m.offset_x + src_x * m.scale,
        m.offset_y + rect.y * m.scale,
        rect.width * m.scale,
        rect.height * m.scale,
    )
}

/// Inverse transform of a destination-space rectangle into source pixels,
/// clamped so the result never leaves the source raster.
pub fn dest_rect_to_source_rect(rect: &Rect, m: &Mapping) -> Rect {
    let (src_w, src_h) = (m.src_w as f64, m.src_h as f64);
    let width = rect.width / m.scale;
    let height = rect.height / m.scale;
    let x = if m.mirrored {
        src_w - (rect.x - m.offset_x) / m.scale - width
    } else {
        (rect.x - m.offset_x) / m.scale
    };
    let y = (rect.y - m.offset_y) / m.scale;

    let x = x.clamp(0.0, src_w);
    let y = y.clamp(0.0, src_h);
    let out = Rect::new(
        x,
        y,
        width.min(src_w - x).max(0.0),
        height.min(src_h - y).max(0.0),
    );
    debug_assert!(m.source_rect().contains_rect(&out, 1e-6));
    out
}

/// Center of a source-space face box in destination space. The face guide
/// is always shown mirrored, so this applies mirroring whatever `m` says.
pub fn face_box_center(face: &Rect, m: &Mapping) -> Point {
    source_rect_to_dest_rect(face, &m.with_mirrored(true)).center()
}
