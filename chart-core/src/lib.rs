//! Coordinate mapping, hit-testing and viewport state for the chart.
//!
//! Everything here is pure computation over caller-validated inputs: out of
//! range requests clamp, flat price ranges degrade to the plot midpoint,
//! and bad colors fall back to opaque black. Rendering and event plumbing
//! live with the host.

mod color;
mod drawing;
mod geometry;
mod hittest;
mod transform;
mod viewport;

pub use color::{hex_to_rgba, parse_hex_color, stroke_dash_array};
pub use drawing::{
    fib_level_lines, ChartPoint, Drawing, DrawingShape, DrawingStyle, FibLevelLine, LineStyle,
    StylePatch, FIB_LEVELS,
};
pub use geometry::{
    estimate_text_box, expanded_box_contains, rect_hit, segment_distance, segment_hit, text_hit,
    ScreenPoint, TextBox,
};
pub use hittest::{hit_scan, hit_test, HIT_TOLERANCE};
pub use transform::{ChartTransform, PlotBar, PriceBounds};
pub use viewport::{
    PlotLayout, Viewport, MAX_VERTICAL_ZOOM, MIN_VERTICAL_ZOOM, MIN_VIEWABLE_POINTS, ZOOM_STEP,
};
