use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::ScreenPoint;

/// A point in data space: fractional bar index + price. Drawings are stored
/// this way (captured once through the creation-time transform), so they
/// stay anchored to price/time as the viewport pans and zooms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub index: f64,
    pub price: f64,
}

impl ChartPoint {
    pub fn new(index: f64, price: f64) -> Self {
        Self { index, price }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
}

/// Stroke settings carried by every drawing; also the "pending" settings a
/// session applies to the next drawing created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingStyle {
    pub color: String,
    pub line_style: LineStyle,
    pub line_width: f64,
}

impl Default for DrawingStyle {
    fn default() -> Self {
        Self {
            color: "#2196F3".to_string(),
            line_style: LineStyle::Solid,
            line_width: 2.0,
        }
    }
}

/// Whole-field style replacement; geometry is never patched this way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StylePatch {
    pub color: Option<String>,
    pub line_style: Option<LineStyle>,
    pub line_width: Option<f64>,
}

impl DrawingStyle {
    pub fn apply(&mut self, patch: &StylePatch) {
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(line_style) = patch.line_style {
            self.line_style = line_style;
        }
        if let Some(line_width) = patch.line_width {
            self.line_width = line_width;
        }
    }
}

/// One variant per tool. Point arity is fixed by the variant, so a
/// wrong-arity drawing cannot be represented at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DrawingShape {
    Trendline { a: ChartPoint, b: ChartPoint },
    Rectangle { a: ChartPoint, b: ChartPoint },
    Fibonacci { a: ChartPoint, b: ChartPoint },
    Text { anchor: ChartPoint, text: String },
}

impl DrawingShape {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DrawingShape::Trendline { .. } => "trendline",
            DrawingShape::Rectangle { .. } => "rectangle",
            DrawingShape::Fibonacci { .. } => "fibonacci",
            DrawingShape::Text { .. } => "text",
        }
    }
}

/// A committed annotation. Created on mouse-up (shape tools) or text commit;
/// removed on explicit delete or clear-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: String,
    pub shape: DrawingShape,
    pub style: DrawingStyle,
}

impl Drawing {
    pub fn new(shape: DrawingShape, style: DrawingStyle) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            shape,
            style,
        }
    }

    pub fn trendline(a: ChartPoint, b: ChartPoint, style: DrawingStyle) -> Self {
        Self::new(DrawingShape::Trendline { a, b }, style)
    }

    pub fn rectangle(a: ChartPoint, b: ChartPoint, style: DrawingStyle) -> Self {
        Self::new(DrawingShape::Rectangle { a, b }, style)
    }

    pub fn fibonacci(a: ChartPoint, b: ChartPoint, style: DrawingStyle) -> Self {
        Self::new(DrawingShape::Fibonacci { a, b }, style)
    }

    pub fn text(anchor: ChartPoint, text: impl Into<String>, style: DrawingStyle) -> Self {
        Self::new(
            DrawingShape::Text {
                anchor,
                text: text.into(),
            },
            style,
        )
    }
}

/// Retracement ratios drawn by the fibonacci tool, top to bottom.
pub const FIB_LEVELS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// One horizontal retracement line in screen space, ready to stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibLevelLine {
    pub level: f64,
    pub y: f64,
    pub x1: f64,
    pub x2: f64,
    /// The 0% and 100% lines render solid/full-strength; the inner levels
    /// render dashed and faded.
    pub is_edge: bool,
}

/// Expand two projected anchor points into the seven retracement lines.
pub fn fib_level_lines(a: ScreenPoint, b: ScreenPoint) -> Vec<FibLevelLine> {
    let height = b.y - a.y;
    let x1 = a.x.min(b.x);
    let x2 = a.x.max(b.x);
    FIB_LEVELS
        .iter()
        .enumerate()
        .map(|(i, &level)| FibLevelLine {
            level,
            y: a.y + height * level,
            x1,
            x2,
            is_edge: i == 0 || i == FIB_LEVELS.len() - 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn style_patch_replaces_whole_fields() {
        let mut style = DrawingStyle::default();
        style.apply(&StylePatch {
            color: Some("#FF5252".to_string()),
            line_style: None,
            line_width: Some(3.0),
        });
        assert_eq!(style.color, "#FF5252");
        assert_eq!(style.line_style, LineStyle::Solid);
        assert_relative_eq!(style.line_width, 3.0);
    }

    #[test]
    fn drawings_get_unique_ids() {
        let style = DrawingStyle::default();
        let a = Drawing::trendline(
            ChartPoint::new(0.0, 1.0),
            ChartPoint::new(1.0, 2.0),
            style.clone(),
        );
        let b = Drawing::trendline(
            ChartPoint::new(0.0, 1.0),
            ChartPoint::new(1.0, 2.0),
            style,
        );
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn shape_serializes_with_lowercase_tag() {
        let drawing = Drawing::text(
            ChartPoint::new(3.0, 101.5),
            "support",
            DrawingStyle::default(),
        );
        let json = serde_json::to_value(&drawing).unwrap();
        assert_eq!(json["shape"]["type"], "text");
        assert_eq!(json["shape"]["text"], "support");
        let back: Drawing = serde_json::from_value(json).unwrap();
        assert_eq!(back, drawing);
    }

    #[test]
    fn fib_lines_span_min_to_max_x() {
        let lines = fib_level_lines(ScreenPoint::new(200.0, 40.0), ScreenPoint::new(80.0, 140.0));
        assert_eq!(lines.len(), 7);
        for line in &lines {
            assert_relative_eq!(line.x1, 80.0);
            assert_relative_eq!(line.x2, 200.0);
        }
        assert_relative_eq!(lines[0].y, 40.0);
        assert_relative_eq!(lines[6].y, 140.0);
        assert_relative_eq!(lines[3].y, 90.0);
        assert!(lines[0].is_edge && lines[6].is_edge);
        assert!(!lines[3].is_edge);
    }
}
