use serde::{Deserialize, Serialize};
use series_core::Bar;

use crate::drawing::ChartPoint;
use crate::geometry::ScreenPoint;
use crate::viewport::{PlotLayout, Viewport};

/// Price extremes of the loaded series, the vertical scale's input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl PriceBounds {
    /// Lowest low / highest high over the series. An empty series falls back
    /// to a placeholder scale of 0..100.
    pub fn of_bars(bars: &[Bar]) -> Self {
        if bars.is_empty() {
            return Self {
                min: 0.0,
                max: 100.0,
            };
        }
        let mut min = bars[0].low;
        let mut max = bars[0].high;
        for bar in bars {
            min = min.min(bar.low);
            max = max.max(bar.high);
        }
        Self { min, max }
    }
}

/// One bar projected into screen space, ready for the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotBar {
    pub index: usize,
    pub x: f64,
    pub half_width: f64,
    pub y_open: f64,
    pub y_high: f64,
    pub y_low: f64,
    pub y_close: f64,
    pub open: f64,
    pub close: f64,
}

/// Snapshot of every parameter the index↔x and price↔y maps depend on.
///
/// Both directions are computed from the same captured padded range and slot
/// width, so a forward map and its inverse taken from one transform value
/// cannot drift apart mid-interaction. Build a fresh transform whenever the
/// viewport, layout or series changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartTransform {
    layout: PlotLayout,
    total_points: usize,
    pan_offset: usize,
    visible_points: usize,
    slot_width: f64,
    padded_min: f64,
    padded_range: f64,
    center_price: f64,
}

impl ChartTransform {
    pub fn new(
        layout: PlotLayout,
        viewport: &Viewport,
        bounds: PriceBounds,
        total_points: usize,
    ) -> Self {
        let pan_offset = viewport.clamped_offset(total_points);
        let visible_points = viewport.visible_points(total_points);
        let plot_width = layout.plot_width();
        let slot_width = if visible_points > 0 && plot_width > 0.0 {
            plot_width / visible_points as f64
        } else {
            0.0
        };

        // 10% padding on top of the vertically zoomed range.
        let center_price = (bounds.max + bounds.min) / 2.0;
        let half = (bounds.max - bounds.min) / (2.0 * viewport.vertical_zoom) * 1.1;
        let padded_min = center_price - half;
        let padded_range = half * 2.0;

        Self {
            layout,
            total_points,
            pan_offset,
            visible_points,
            slot_width,
            padded_min,
            padded_range,
            center_price,
        }
    }

    pub fn layout(&self) -> &PlotLayout {
        &self.layout
    }

    pub fn pan_offset(&self) -> usize {
        self.pan_offset
    }

    pub fn visible_points(&self) -> usize {
        self.visible_points
    }

    pub fn slot_width(&self) -> f64 {
        self.slot_width
    }

    pub fn padded_min(&self) -> f64 {
        self.padded_min
    }

    pub fn padded_max(&self) -> f64 {
        self.padded_min + self.padded_range
    }

    pub fn is_index_visible(&self, index: usize) -> bool {
        index >= self.pan_offset && index < self.pan_offset + self.visible_points
    }

    /// Center x of the slot holding (possibly fractional) `index`.
    pub fn index_to_x(&self, index: f64) -> f64 {
        if self.slot_width == 0.0 {
            return self.layout.margin_left;
        }
        self.layout.margin_left
            + (index - self.pan_offset as f64) * self.slot_width
            + self.slot_width / 2.0
    }

    /// Continuous inverse of `index_to_x` (no rounding); used to capture
    /// drawing geometry at creation time.
    pub fn x_to_index_fractional(&self, x: f64) -> f64 {
        if self.slot_width == 0.0 {
            return 0.0;
        }
        self.pan_offset as f64 + (x - self.layout.margin_left) / self.slot_width - 0.5
    }

    /// Bar index under `x`, clamped into the data range. Exact left inverse
    /// of `index_to_x` at slot centers.
    pub fn x_to_index(&self, x: f64) -> usize {
        if self.total_points == 0 {
            return 0;
        }
        let raw = self.x_to_index_fractional(x).round();
        if raw <= 0.0 {
            0
        } else {
            (raw as usize).min(self.total_points - 1)
        }
    }

    /// Screen y of a price. A flat (zero-range) series pins every price to
    /// the vertical center of the plot instead of dividing by zero.
    pub fn price_to_y(&self, price: f64) -> f64 {
        let plot_height = self.layout.plot_height();
        if self.padded_range == 0.0 || plot_height == 0.0 {
            return self.layout.margin_top + plot_height / 2.0;
        }
        self.layout.margin_top + plot_height
            - (price - self.padded_min) / self.padded_range * plot_height
    }

    /// Inverse of `price_to_y`, using the same snapshot parameters.
    pub fn y_to_price(&self, y: f64) -> f64 {
        let plot_height = self.layout.plot_height();
        if self.padded_range == 0.0 || plot_height == 0.0 {
            return self.center_price;
        }
        self.padded_min + (self.layout.margin_top + plot_height - y) / plot_height * self.padded_range
    }

    /// Data-space point under a pointer position.
    pub fn capture(&self, at: ScreenPoint) -> ChartPoint {
        ChartPoint::new(self.x_to_index_fractional(at.x), self.y_to_price(at.y))
    }

    /// Screen position of a data-space point under this viewport.
    pub fn project(&self, point: ChartPoint) -> ScreenPoint {
        ScreenPoint::new(self.index_to_x(point.index), self.price_to_y(point.price))
    }

    /// Visible bar whose slot center is nearest to `x`, or None when `x`
    /// falls outside the plot rectangle. Feeds the crosshair readout.
    pub fn nearest_visible_index(&self, x: f64) -> Option<usize> {
        if self.visible_points == 0 || self.slot_width == 0.0 {
            return None;
        }
        let right_edge = self.layout.width - self.layout.margin_right;
        if x < self.layout.margin_left || x > right_edge {
            return None;
        }
        let index = self.x_to_index(x);
        let last_visible = self.pan_offset + self.visible_points - 1;
        Some(index.clamp(self.pan_offset, last_visible.min(self.total_points - 1)))
    }

    /// Project the visible window of `bars` for the renderer. Candle bodies
    /// take 80% of the slot.
    pub fn project_bars(&self, bars: &[Bar]) -> Vec<PlotBar> {
        let end = (self.pan_offset + self.visible_points).min(bars.len());
        let start = self.pan_offset.min(end);
        bars[start..end]
            .iter()
            .enumerate()
            .map(|(offset, bar)| {
                let index = start + offset;
                PlotBar {
                    index,
                    x: self.index_to_x(index as f64),
                    half_width: self.slot_width * 0.4,
                    y_open: self.price_to_y(bar.open),
                    y_high: self.price_to_y(bar.high),
                    y_low: self.price_to_y(bar.low),
                    y_close: self.price_to_y(bar.close),
                    open: bar.open,
                    close: bar.close,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn layout_800x400() -> PlotLayout {
        PlotLayout::new(800.0, 400.0)
    }

    fn bounds(min: f64, max: f64) -> PriceBounds {
        PriceBounds { min, max }
    }

    #[test]
    fn index_round_trips_over_the_visible_window() {
        let mut vp = Viewport::new();
        vp.set_horizontal_zoom(4.0, 100); // 25 visible, pan 38
        let t = ChartTransform::new(layout_800x400(), &vp, bounds(95.0, 105.0), 100);
        for i in vp.visible_range(100) {
            assert_eq!(t.x_to_index(t.index_to_x(i as f64)), i);
        }
    }

    #[test]
    fn index_to_x_is_strictly_increasing() {
        let vp = Viewport::new();
        let t = ChartTransform::new(layout_800x400(), &vp, bounds(95.0, 105.0), 100);
        let mut prev = f64::NEG_INFINITY;
        for i in 0..100 {
            let x = t.index_to_x(i as f64);
            assert!(x > prev);
            prev = x;
        }
    }

    #[test]
    fn x_to_index_clamps_outside_the_series() {
        let vp = Viewport::new();
        let t = ChartTransform::new(layout_800x400(), &vp, bounds(95.0, 105.0), 100);
        assert_eq!(t.x_to_index(-1000.0), 0);
        assert_eq!(t.x_to_index(10_000.0), 99);
    }

    #[test]
    fn padded_price_range_applies_ten_percent() {
        let vp = Viewport::new();
        let layout = layout_800x400();
        let t = ChartTransform::new(layout, &vp, bounds(95.0, 105.0), 100);
        assert_relative_eq!(t.padded_min(), 94.5);
        assert_relative_eq!(t.padded_max(), 105.5);

        // 100 is the padded center: lands at the vertical midpoint.
        let mid = layout.margin_top + layout.plot_height() / 2.0;
        assert!((t.price_to_y(100.0) - mid).abs() <= 1.0);
    }

    #[test]
    fn vertical_zoom_narrows_the_padded_range() {
        let mut vp = Viewport::new();
        vp.set_vertical_zoom(2.0);
        let t = ChartTransform::new(layout_800x400(), &vp, bounds(95.0, 105.0), 100);
        assert_relative_eq!(t.padded_min(), 97.25);
        assert_relative_eq!(t.padded_max(), 102.75);
    }

    #[test]
    fn flat_series_pins_prices_to_plot_center() {
        let vp = Viewport::new();
        let layout = layout_800x400();
        let t = ChartTransform::new(layout, &vp, bounds(100.0, 100.0), 100);
        let mid = layout.margin_top + layout.plot_height() / 2.0;
        assert_relative_eq!(t.price_to_y(42.0), mid);
        assert_relative_eq!(t.price_to_y(100.0), mid);
        assert!(t.price_to_y(0.0).is_finite());
        assert_relative_eq!(t.y_to_price(mid), 100.0);
    }

    #[test]
    fn price_round_trips_through_y() {
        let mut vp = Viewport::new();
        vp.set_vertical_zoom(1.5);
        let t = ChartTransform::new(layout_800x400(), &vp, bounds(95.0, 105.0), 100);
        for price in [95.0, 99.25, 100.0, 104.9] {
            assert_relative_eq!(t.y_to_price(t.price_to_y(price)), price, epsilon = 1e-9);
        }
    }

    #[test]
    fn capture_then_project_returns_to_the_pointer() {
        let mut vp = Viewport::new();
        vp.set_horizontal_zoom(2.0, 100);
        vp.set_vertical_zoom(1.2);
        let t = ChartTransform::new(layout_800x400(), &vp, bounds(95.0, 105.0), 100);
        for at in [
            ScreenPoint::new(120.0, 100.0),
            ScreenPoint::new(400.0, 200.0),
            ScreenPoint::new(701.3, 57.9),
        ] {
            let projected = t.project(t.capture(at));
            assert_relative_eq!(projected.x, at.x, epsilon = 1e-9);
            assert_relative_eq!(projected.y, at.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn data_space_points_stay_anchored_across_viewports() {
        let layout = layout_800x400();
        let mut vp = Viewport::new();
        let before = ChartTransform::new(layout, &vp, bounds(95.0, 105.0), 100);
        let captured = before.capture(ScreenPoint::new(300.0, 150.0));

        // Pan and rezoom: the projected position moves, the data-space
        // coordinates do not.
        vp.set_horizontal_zoom(2.0, 100);
        vp.pan(5, 100);
        let after = ChartTransform::new(layout, &vp, bounds(95.0, 105.0), 100);
        let reprojected = after.project(captured);
        let recaptured = after.capture(reprojected);
        assert_relative_eq!(recaptured.index, captured.index, epsilon = 1e-9);
        assert_relative_eq!(recaptured.price, captured.price, epsilon = 1e-9);
    }

    #[test]
    fn nearest_visible_index_requires_plot_area() {
        let mut vp = Viewport::new();
        vp.set_horizontal_zoom(2.0, 100); // window 25..75
        let t = ChartTransform::new(layout_800x400(), &vp, bounds(95.0, 105.0), 100);
        assert_eq!(t.nearest_visible_index(10.0), None); // inside left margin
        assert_eq!(t.nearest_visible_index(790.0), None); // inside right margin
        let x = t.index_to_x(40.0);
        assert_eq!(t.nearest_visible_index(x), Some(40));
    }

    #[test]
    fn project_bars_covers_exactly_the_window() {
        fn mk_bar(i: usize) -> Bar {
            Bar {
                time: i as i64 * 60,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: 1.0,
            }
        }
        let bars: Vec<Bar> = (0..100).map(mk_bar).collect();
        let mut vp = Viewport::new();
        vp.set_horizontal_zoom(4.0, 100);
        let t = ChartTransform::new(layout_800x400(), &vp, PriceBounds::of_bars(&bars), 100);
        let plotted = t.project_bars(&bars);
        assert_eq!(plotted.len(), t.visible_points());
        assert_eq!(plotted[0].index, t.pan_offset());
        for pair in plotted.windows(2) {
            assert!(pair[0].x < pair[1].x);
        }
        for pb in &plotted {
            assert!(pb.y_high <= pb.y_low); // higher price sits higher up
        }
    }

    #[test]
    fn empty_series_uses_placeholder_bounds() {
        let b = PriceBounds::of_bars(&[]);
        assert_relative_eq!(b.min, 0.0);
        assert_relative_eq!(b.max, 100.0);
    }
}
