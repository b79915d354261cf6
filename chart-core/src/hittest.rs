use crate::drawing::{Drawing, DrawingShape};
use crate::geometry::{rect_hit, segment_hit, text_hit, ScreenPoint};
use crate::transform::ChartTransform;

/// Pixel radius within which a pointer counts as touching a drawing.
pub const HIT_TOLERANCE: f64 = 8.0;

/// Whether `at` touches `drawing` once projected through `transform`.
///
/// Fibonacci drawings are not reachable from the pointer path; they can
/// still be selected programmatically.
pub fn hit_test(
    drawing: &Drawing,
    transform: &ChartTransform,
    at: ScreenPoint,
    tolerance: f64,
) -> bool {
    match &drawing.shape {
        DrawingShape::Trendline { a, b } => {
            segment_hit(transform.project(*a), transform.project(*b), at, tolerance)
        }
        DrawingShape::Rectangle { a, b } => {
            rect_hit(transform.project(*a), transform.project(*b), at, tolerance)
        }
        DrawingShape::Fibonacci { .. } => false,
        DrawingShape::Text { anchor, text } => text_hit(
            transform.project(*anchor),
            text,
            drawing.style.line_width,
            at,
            tolerance,
        ),
    }
}

/// Scan in reverse creation order (topmost first) and return the first hit.
pub fn hit_scan<'a>(
    drawings: &'a [Drawing],
    transform: &ChartTransform,
    at: ScreenPoint,
    tolerance: f64,
) -> Option<&'a Drawing> {
    drawings
        .iter()
        .rev()
        .find(|d| hit_test(d, transform, at, tolerance))
}
