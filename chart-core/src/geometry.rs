use serde::{Deserialize, Serialize};

/// A point in screen pixel space (origin top-left, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Distance from `at` to the segment `a`-`b`. The projection parameter is
/// clamped to [0, 1] so endpoints bound the answer; a degenerate segment
/// (a == b) measures plain point distance.
pub fn segment_distance(a: ScreenPoint, b: ScreenPoint, at: ScreenPoint) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if dx == 0.0 && dy == 0.0 {
        return at.distance_to(a);
    }
    let t = ((at.x - a.x) * dx + (at.y - a.y) * dy) / (dx * dx + dy * dy);
    let t = t.clamp(0.0, 1.0);
    let closest = ScreenPoint::new(a.x + t * dx, a.y + t * dy);
    at.distance_to(closest)
}

/// True when `at` lies inside the axis-aligned box spanned by `a` and `b`,
/// grown by `tolerance` on every side.
pub fn expanded_box_contains(
    a: ScreenPoint,
    b: ScreenPoint,
    at: ScreenPoint,
    tolerance: f64,
) -> bool {
    let min_x = a.x.min(b.x) - tolerance;
    let max_x = a.x.max(b.x) + tolerance;
    let min_y = a.y.min(b.y) - tolerance;
    let max_y = a.y.max(b.y) + tolerance;
    at.x >= min_x && at.x <= max_x && at.y >= min_y && at.y <= max_y
}

/// Segment hit: tolerance-expanded bounding-box reject first, then the
/// clamped perpendicular distance.
pub fn segment_hit(a: ScreenPoint, b: ScreenPoint, at: ScreenPoint, tolerance: f64) -> bool {
    if !expanded_box_contains(a, b, at, tolerance) {
        return false;
    }
    segment_distance(a, b, at) <= tolerance
}

/// Rectangle hit: the interior counts, not just the border.
pub fn rect_hit(a: ScreenPoint, b: ScreenPoint, at: ScreenPoint, tolerance: f64) -> bool {
    expanded_box_contains(a, b, at, tolerance)
}

/// Estimated pixel box of a rendered label. No text metrics are available
/// here, so width is the usual monospace-ish guess of 0.6 em per character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    pub font_size: f64,
    pub width: f64,
    pub height: f64,
}

pub fn estimate_text_box(text: &str, line_width: f64) -> TextBox {
    let font_size = 8.0 + line_width * 2.0;
    TextBox {
        font_size,
        width: text.chars().count() as f64 * font_size * 0.6,
        height: font_size,
    }
}

/// Text hit: estimated box anchored top-left at `anchor`, expanded by
/// `tolerance`.
pub fn text_hit(
    anchor: ScreenPoint,
    text: &str,
    line_width: f64,
    at: ScreenPoint,
    tolerance: f64,
) -> bool {
    let bx = estimate_text_box(text, line_width);
    at.x >= anchor.x - tolerance
        && at.x <= anchor.x + bx.width + tolerance
        && at.y >= anchor.y - tolerance
        && at.y <= anchor.y + bx.height + tolerance
}
