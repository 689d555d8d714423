// Software renderer for the guided preview.
// Per frame: cover-fit blit of the camera frame (mirrored in face mode),
// dim everything outside the guide, stroke the guide in the framed/idle
// color. All of it is driven by the same Mapping and Path the detectors use.

use image::RgbImage;

use crate::draw::{draw_line, draw_text_5x7, text_width_5x7};
use crate::gamma::{GammaLut, map_packed};
use crate::geometry::Mapping;
use crate::guides::{Path, guide_path};
use crate::types::{FrameBuffer, FrameContext};

pub const FRAMED_COLOR: u32 = 0x0022_C55E;
pub const IDLE_COLOR: u32 = 0x00FF_FFFF;
pub const PLACEHOLDER_COLOR: u32 = 0x0010_1014;
pub const DIM_STRENGTH: f32 = 0.55;
const STROKE_RADIUS: i32 = 1; // 3 px outline

pub const MIN_PIXEL_RATIO: f64 = 1.0;
pub const MAX_PIXEL_RATIO: f64 = 3.0;

pub fn clamp_pixel_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() { ratio.clamp(MIN_PIXEL_RATIO, MAX_PIXEL_RATIO) } else { MIN_PIXEL_RATIO }
}

/// Destination raster for a window of `window_w`×`window_h` logical pixels.
pub fn raster_size(window_w: usize, window_h: usize, pixel_ratio: f64) -> (usize, usize) {
    let ratio = clamp_pixel_ratio(pixel_ratio);
    let w = (window_w as f64 * ratio).round() as usize;
    let h = (window_h as f64 * ratio).round() as usize;
    (w.max(1), h.max(1))
}

pub fn guide_color(framed: bool) -> u32 {
    if framed { FRAMED_COLOR } else { IDLE_COLOR }
}

#[inline]
fn pack(px: &image::Rgb<u8>) -> u32 {
    ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32
}

/// Nearest-neighbour cover blit of `frame` into `fb` following `m`.
/// `m` must have been computed for `fb`'s size and `frame`'s size.
pub fn blit_cover(fb: &mut FrameBuffer, frame: &RgbImage, m: &Mapping) {
    let (sw, sh) = frame.dimensions();
    if sw == 0 || sh == 0 || m.scale <= 0.0 {
        return;
    }
    // Source column per destination column, mirrored once here.
    let cols: Vec<u32> = (0..fb.width)
        .map(|x| {
            let sx = ((x as f64 + 0.5 - m.offset_x) / m.scale).floor().clamp(0.0, (sw - 1) as f64) as u32;
            if m.mirrored { sw - 1 - sx } else { sx }
        })
        .collect();

    for y in 0..fb.height {
        let sy = ((y as f64 + 0.5 - m.offset_y) / m.scale).floor().clamp(0.0, (sh - 1) as f64) as u32;
        let row = &mut fb.pixels[y * fb.width..(y + 1) * fb.width];
        for (dst, &sx) in row.iter_mut().zip(&cols) {
            *dst = pack(frame.get_pixel(sx, sy));
        }
    }
}

/// Darken every pixel whose center lies outside `path` (even-odd rule).
pub fn dim_outside(fb: &mut FrameBuffer, path: &Path, table: &[u8; 256]) {
    for y in 0..fb.height {
        let xs = path.crossings(y as f64 + 0.5);
        let row = &mut fb.pixels[y * fb.width..(y + 1) * fb.width];
        let mut spans = xs.chunks_exact(2).peekable();
        for (x, px) in row.iter_mut().enumerate() {
            let cx = x as f64 + 0.5;
            while spans.peek().is_some_and(|s| cx >= s[1]) {
                spans.next();
            }
            let inside = spans.peek().is_some_and(|s| cx >= s[0]);
            if !inside {
                *px = map_packed(*px, table);
            }
        }
    }
}

/// Thick closed-polyline stroke.
pub fn stroke_path(fb: &mut FrameBuffer, path: &Path, color: u32) {
    for (a, b) in path.edges() {
        let (x0, y0, x1, y1) = (a.x.round() as i32, a.y.round() as i32, b.x.round() as i32, b.y.round() as i32);
        for oy in -STROKE_RADIUS..=STROKE_RADIUS {
            for ox in -STROKE_RADIUS..=STROKE_RADIUS {
                draw_line(fb, x0 + ox, y0 + oy, x1 + ox, y1 + oy, color);
            }
        }
    }
}

/// Precomputed pieces of the overlay.
pub struct Overlay {
    dim: [u8; 256],
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new(&GammaLut::new(), DIM_STRENGTH)
    }
}

impl Overlay {
    pub fn new(lut: &GammaLut, strength: f32) -> Self {
        Self { dim: lut.dim_table(strength) }
    }

    /// One full preview frame: video, dim with cutout, guide stroke.
    pub fn render(&self, fb: &mut FrameBuffer, frame: &RgbImage, ctx: &FrameContext, framed: bool) {
        blit_cover(fb, frame, &ctx.mapping);
        let path = guide_path(ctx.mode, fb.width as u32, fb.height as u32);
        dim_outside(fb, &path, &self.dim);
        stroke_path(fb, &path, guide_color(framed));
    }
}

/// Dark raster with a centered message, shown until a frame decodes.
pub fn render_placeholder(fb: &mut FrameBuffer, message: &str) {
    fb.fill(PLACEHOLDER_COLOR);
    let x = (fb.width as i32 - text_width_5x7(message)) / 2;
    let y = fb.height as i32 / 2 - 4;
    draw_text_5x7(fb, x.max(4), y, message, IDLE_COLOR);
}
