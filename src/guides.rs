// Guide outlines drawn over the preview and reused for hit-testing.
//
// Curves are flattened into closed polygons once per frame, so the outline
// that gets stroked is exactly the outline `Path::contains` tests against.

use crate::types::{GuideMode, Point, Rect};

/// ID-1 card aspect ratio (85.60 × 53.98 mm).
pub const CARD_ASPECT: f64 = 1.586;

const CARD_WIDTH_FRACTION: f64 = 0.90;
const CARD_CENTER_Y_FRACTION: f64 = 0.55;
const CARD_CORNER_FRACTION: f64 = 0.045;

const FACE_WIDTH_FRACTION: f64 = 0.72; // of the smaller raster side
const FACE_HEIGHT_RATIO: f64 = 1.30;   // silhouette height / width
const FACE_CENTER_Y_FRACTION: f64 = 0.45;

const CURVE_STEPS: usize = 16;
const HEAD_STEPS: usize = 64;

/// Closed polygon. The last point connects back to the first.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    points: Vec<Point>,
}

impl Path {
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Edges as (start, end) pairs, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Even-odd point-in-polygon test.
    pub fn contains(&self, p: Point) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// x coordinates where the horizontal line at `y` crosses the outline,
    /// sorted. Consecutive pairs bound the inside spans.
    pub fn crossings(&self, y: f64) -> Vec<f64> {
        let mut xs: Vec<f64> = self
            .edges()
            .filter(|(a, b)| (a.y > y) != (b.y > y))
            .map(|(a, b)| a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y))
            .collect();
        xs.sort_by(|a, b| a.total_cmp(b));
        xs
    }

    /// Area centroid (shoelace). Falls back to the vertex mean for
    /// degenerate outlines.
    pub fn centroid(&self) -> Point {
        let (mut area2, mut cx, mut cy) = (0.0, 0.0, 0.0);
        for (a, b) in self.edges() {
            let cross = a.x * b.y - b.x * a.y;
            area2 += cross;
            cx += (a.x + b.x) * cross;
            cy += (a.y + b.y) * cross;
        }
        if area2.abs() < f64::EPSILON {
            let n = self.points.len().max(1) as f64;
            let (sx, sy) = self.points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
            return Point::new(sx / n, sy / n);
        }
        Point::new(cx / (3.0 * area2), cy / (3.0 * area2))
    }

    pub fn bounds(&self) -> Rect {
        let mut min = Point::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        if self.points.is_empty() {
            return Rect::default();
        }
        Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }
}

fn push_quad(points: &mut Vec<Point>, p0: Point, c: Point, p1: Point) {
    for i in 1..=CURVE_STEPS {
        let t = i as f64 / CURVE_STEPS as f64;
        let u = 1.0 - t;
        points.push(Point::new(
            u * u * p0.x + 2.0 * u * t * c.x + t * t * p1.x,
            u * u * p0.y + 2.0 * u * t * c.y + t * t * p1.y,
        ));
    }
}

/// Head-and-shoulders outline inside the `width`×`height` box centered on
/// (`center_x`, `center_y`).
pub fn face_silhouette(center_x: f64, center_y: f64, width: f64, height: f64) -> Path {
    let (cx, cy, w, h) = (center_x, center_y, width, height);

    // Head ellipse sits in the upper part of the box.
    let head_cy = cy - 0.14 * h;
    let rx = 0.30 * w;
    let ry = 0.34 * h;
    let neck_half = 0.14 * w;
    let neck_base_y = cy + 0.28 * h;
    let bottom = cy + 0.5 * h;

    // Parameter where the ellipse meets the neck lines (below the center).
    let t0 = (neck_half / rx).acos();

    let mut points = Vec::with_capacity(HEAD_STEPS + 4 * CURVE_STEPS + 4);

    // Left shoulder: bottom-left corner up to the neck base.
    let bottom_left = Point::new(cx - 0.5 * w, bottom);
    points.push(bottom_left);
    push_quad(
        &mut points,
        bottom_left,
        Point::new(cx - 0.5 * w, neck_base_y),
        Point::new(cx - neck_half, neck_base_y),
    );

    // Head: from the left neck joint over the top to the right neck joint.
    // y grows downwards, so sin > 0 is below the ellipse center.
    let start = std::f64::consts::PI - t0;
    let end = 2.0 * std::f64::consts::PI + t0;
    for i in 0..=HEAD_STEPS {
        let t = start + (end - start) * i as f64 / HEAD_STEPS as f64;
        points.push(Point::new(cx + rx * t.cos(), head_cy + ry * t.sin()));
    }

    // Right shoulder back down to the bottom-right corner.
    let neck_right = Point::new(cx + neck_half, neck_base_y);
    points.push(neck_right);
    push_quad(
        &mut points,
        neck_right,
        Point::new(cx + 0.5 * w, neck_base_y),
        Point::new(cx + 0.5 * w, bottom),
    );

    Path::from_points(points)
}

/// Center and size of the face silhouette for a raster, scaled from its
/// smaller side.
pub fn face_guide_frame(dest_w: u32, dest_h: u32) -> Rect {
    let s = dest_w.min(dest_h) as f64;
    let width = s * FACE_WIDTH_FRACTION;
    let height = width * FACE_HEIGHT_RATIO;
    let cx = dest_w as f64 / 2.0;
    let cy = dest_h as f64 * FACE_CENTER_Y_FRACTION;
    Rect::new(cx - width / 2.0, cy - height / 2.0, width, height)
}

pub fn face_guide_path(dest_w: u32, dest_h: u32) -> Path {
    let frame = face_guide_frame(dest_w, dest_h);
    let c = frame.center();
    face_silhouette(c.x, c.y, frame.width, frame.height)
}

/// Card outline: 90% of the raster width, ID-1 aspect, centered at 55% height.
pub fn card_guide_rect(dest_w: u32, dest_h: u32) -> Rect {
    let width = dest_w as f64 * CARD_WIDTH_FRACTION;
    let height = width / CARD_ASPECT;
    let x = (dest_w as f64 - width) / 2.0;
    let y = dest_h as f64 * CARD_CENTER_Y_FRACTION - height / 2.0;
    Rect::new(x, y, width, height)
}

pub fn rounded_rect(rect: &Rect, corner_radius: f64) -> Path {
    let r = corner_radius.min(rect.width.min(rect.height) / 2.0).max(0.0);
    let (l, t, rt, b) = (rect.x, rect.y, rect.right(), rect.bottom());
    if r <= 0.0 {
        return Path::from_points(vec![
            Point::new(l, t),
            Point::new(rt, t),
            Point::new(rt, b),
            Point::new(l, b),
        ]);
    }

    let mut points = Vec::with_capacity(4 * (CURVE_STEPS + 1));
    // (arc center, start angle) per corner, clockwise from top-right.
    let corners = [
        (Point::new(rt - r, t + r), -std::f64::consts::FRAC_PI_2),
        (Point::new(rt - r, b - r), 0.0),
        (Point::new(l + r, b - r), std::f64::consts::FRAC_PI_2),
        (Point::new(l + r, t + r), std::f64::consts::PI),
    ];
    for (center, a0) in corners {
        for i in 0..=CURVE_STEPS {
            let a = a0 + std::f64::consts::FRAC_PI_2 * i as f64 / CURVE_STEPS as f64;
            points.push(Point::new(center.x + r * a.cos(), center.y + r * a.sin()));
        }
    }
    Path::from_points(points)
}

pub fn card_guide_path(dest_w: u32, dest_h: u32) -> Path {
    let rect = card_guide_rect(dest_w, dest_h);
    rounded_rect(&rect, rect.width * CARD_CORNER_FRACTION)
}

/// Outline for the active mode, rebuilt from the current raster size.
pub fn guide_path(mode: GuideMode, dest_w: u32, dest_h: u32) -> Path {
    match mode {
        GuideMode::Face => face_guide_path(dest_w, dest_h),
        GuideMode::Card => card_guide_path(dest_w, dest_h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_rect_follows_raster() {
        let r = card_guide_rect(1000, 2000);
        assert!((r.width - 900.0).abs() < 1e-9);
        assert!((r.height - 900.0 / 1.586).abs() < 1e-9);
        assert!((r.center().y - 1100.0).abs() < 1e-9);
        assert!((r.center().x - 500.0).abs() < 1e-9);
    }

    #[test]
    fn silhouette_is_deterministic_and_bounded() {
        let a = face_silhouette(500.0, 800.0, 400.0, 520.0);
        let b = face_silhouette(500.0, 800.0, 400.0, 520.0);
        assert_eq!(a, b);
        let bounds = a.bounds();
        assert!(bounds.x >= 300.0 - 1e-9 && bounds.right() <= 700.0 + 1e-9);
        assert!(bounds.y >= 540.0 - 1e-9 && bounds.bottom() <= 1060.0 + 1e-9);
    }

    #[test]
    fn silhouette_contains_head_and_centroid_not_corners() {
        let path = face_guide_path(1080, 1920);
        let frame = face_guide_frame(1080, 1920);
        assert!(path.contains(path.centroid()));
        // Head center.
        assert!(path.contains(Point::new(frame.center().x, frame.center().y - 0.14 * frame.height)));
        // Top corners of the box are outside the rounded head.
        assert!(!path.contains(Point::new(frame.x + 2.0, frame.y + 2.0)));
        assert!(!path.contains(Point::new(frame.right() - 2.0, frame.y + 2.0)));
        assert!(!path.contains(Point::new(-10.0, -10.0)));
    }

    #[test]
    fn rounded_rect_cuts_corners() {
        let rect = Rect::new(0.0, 0.0, 100.0, 60.0);
        let path = rounded_rect(&rect, 10.0);
        assert!(path.contains(Point::new(50.0, 30.0)));
        assert!(!path.contains(Point::new(0.5, 0.5)));
        assert!(path.contains(Point::new(12.0, 0.5)));
        let b = path.bounds();
        assert!((b.width - 100.0).abs() < 1e-9 && (b.height - 60.0).abs() < 1e-9);
    }

    #[test]
    fn crossings_bound_the_inside() {
        let path = rounded_rect(&Rect::new(10.0, 10.0, 80.0, 40.0), 0.0);
        assert_eq!(path.crossings(30.0), vec![10.0, 90.0]);
        assert!(path.crossings(5.0).is_empty());
    }

    #[test]
    fn guide_tracks_raster_size() {
        let before = guide_path(GuideMode::Card, 1080, 1920);
        let after = guide_path(GuideMode::Card, 1920, 1080);
        assert_ne!(before, after);
    }
}
