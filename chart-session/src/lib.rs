//! The session object behind one chart surface.
//!
//! All shared mutable state (the drawing list, selection, viewport, pending
//! style, crosshair and chat transcript) lives in a single owned
//! [`ChartSession`] with explicit methods per mutation. Hosts construct one
//! per chart instance and feed it raw pointer/keyboard/wheel events; network
//! work (market data, chat completion) happens outside and re-enters through
//! synchronous setters.

use std::collections::BTreeSet;

use ai_analyst::{build_analysis_prompt, ChatMessage};
use chart_core::{
    hit_scan, ChartTransform, Drawing, DrawingStyle, PlotLayout, PriceBounds, ScreenPoint,
    StylePatch, Viewport, HIT_TOLERANCE,
};
use indicator_engine::{IndicatorConfig, IndicatorKind};
use serde::{Deserialize, Serialize};
use series_core::{format_bar_time, latest_sma, Bar, MarketSummary, TimeFrame};

/// Bars shifted per pan wheel tick.
pub const PAN_SPEED: i64 = 2;
/// SMA period shown in the market summary strip.
pub const SMA_PERIOD_FOR_SUMMARY: usize = 50;
/// Wheel deltas below this are treated as no movement on that axis.
const WHEEL_DELTA_THRESHOLD: f64 = 0.5;

/// Toolbar selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Cursor,
    Crosshair,
    Trendline,
    Rectangle,
    Fibonacci,
    Text,
}

/// The subset of tools that draw two-point shapes with a drag gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeTool {
    Trendline,
    Rectangle,
    Fibonacci,
}

impl Tool {
    fn shape_tool(self) -> Option<ShapeTool> {
        match self {
            Tool::Trendline => Some(ShapeTool::Trendline),
            Tool::Rectangle => Some(ShapeTool::Rectangle),
            Tool::Fibonacci => Some(ShapeTool::Fibonacci),
            _ => None,
        }
    }
}

/// Raw wheel event as delivered by the host, modifiers included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelGesture {
    pub delta_x: f64,
    pub delta_y: f64,
    pub ctrl: bool,
    pub shift: bool,
}

/// The single action a wheel event routes to. Never more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelAction {
    HorizontalZoomIn,
    HorizontalZoomOut,
    Pan(i64),
    VerticalZoomIn,
    VerticalZoomOut,
}

/// Modifier-plus-scroll policy: Ctrl+Shift zooms horizontally, Ctrl with a
/// dominant horizontal delta pans, otherwise Ctrl+vertical scroll zooms
/// vertically. Without Ctrl the event belongs to the page, not the chart.
pub fn route_wheel(gesture: &WheelGesture) -> Option<WheelAction> {
    if !gesture.ctrl {
        return None;
    }
    if gesture.shift {
        return Some(if gesture.delta_y < 0.0 {
            WheelAction::HorizontalZoomIn
        } else {
            WheelAction::HorizontalZoomOut
        });
    }

    let has_dx = gesture.delta_x.abs() > WHEEL_DELTA_THRESHOLD;
    let has_dy = gesture.delta_y.abs() > WHEEL_DELTA_THRESHOLD;
    let dx_dominates = has_dx && gesture.delta_x.abs() > gesture.delta_y.abs();

    if has_dx && !has_dy || dx_dominates {
        let direction = if gesture.delta_x > 0.0 { 1 } else { -1 };
        Some(WheelAction::Pan(direction * PAN_SPEED))
    } else if has_dy {
        Some(if gesture.delta_y < 0.0 {
            WheelAction::VerticalZoomIn
        } else {
            WheelAction::VerticalZoomOut
        })
    } else {
        None
    }
}

/// Keys the session-level policy cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Enter,
    Escape,
}

/// In-flight two-point drag, in screen space until commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingShape {
    pub tool: ShapeTool,
    pub start: ScreenPoint,
    pub current: ScreenPoint,
}

/// In-flight text annotation; the host's input box mirrors `buffer`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingText {
    pub anchor: ScreenPoint,
    pub buffer: String,
}

/// Price/time readout under the crosshair.
#[derive(Debug, Clone, PartialEq)]
pub struct CrosshairReadout {
    pub price: f64,
    pub time_label: String,
}

/// One chart's complete interactive state.
pub struct ChartSession {
    symbol: String,
    timeframe: TimeFrame,
    bars: Vec<Bar>,
    layout: PlotLayout,
    viewport: Viewport,

    drawings: Vec<Drawing>,
    selected_drawing_id: Option<String>,
    settings: DrawingStyle,
    active_tool: Tool,
    pending_shape: Option<PendingShape>,
    pending_text: Option<PendingText>,
    crosshair: Option<ScreenPoint>,

    enabled_indicators: BTreeSet<IndicatorKind>,

    chat_messages: Vec<ChatMessage>,
    is_analyzing: bool,

    market_summary: MarketSummary,
    latest_summary_sma: Option<f64>,
}

impl Default for ChartSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartSession {
    pub fn new() -> Self {
        let mut enabled_indicators = BTreeSet::new();
        enabled_indicators.insert(IndicatorKind::Sma);
        Self {
            symbol: "BTC/USD".to_string(),
            timeframe: TimeFrame::Minutes1,
            bars: Vec::new(),
            layout: PlotLayout::new(800.0, 600.0),
            viewport: Viewport::new(),
            drawings: Vec::new(),
            selected_drawing_id: None,
            settings: DrawingStyle::default(),
            active_tool: Tool::Cursor,
            pending_shape: None,
            pending_text: None,
            crosshair: None,
            enabled_indicators,
            chat_messages: vec![ChatMessage::assistant(
                "Welcome to ChartLens! I can help analyze chart patterns and provide \
                 trading insights. What would you like to analyze today?",
                chrono::Utc::now().timestamp(),
            )],
            is_analyzing: false,
            market_summary: MarketSummary::default(),
            latest_summary_sma: None,
        }
    }

    // ---------- series & viewport -------------------------------------------

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn set_symbol(&mut self, symbol: impl Into<String>) {
        self.symbol = symbol.into();
    }

    pub fn timeframe(&self) -> TimeFrame {
        self.timeframe
    }

    pub fn set_timeframe(&mut self, timeframe: TimeFrame) {
        self.timeframe = timeframe;
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Replace the series wholesale (symbol/timeframe change or poll
    /// refresh) and refresh the derived summary figures.
    pub fn set_bars(&mut self, bars: Vec<Bar>) {
        self.bars = bars;
        self.viewport.pan_offset = self.viewport.clamped_offset(self.bars.len());
        self.market_summary = MarketSummary::from_bars(&self.bars);
        self.latest_summary_sma = latest_sma(&self.bars, SMA_PERIOD_FOR_SUMMARY);
    }

    pub fn set_layout(&mut self, width: f64, height: f64) {
        self.layout.width = width;
        self.layout.height = height;
    }

    pub fn layout(&self) -> &PlotLayout {
        &self.layout
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Snapshot transform for the current viewport, layout and series.
    pub fn transform(&self) -> ChartTransform {
        ChartTransform::new(
            self.layout,
            &self.viewport,
            PriceBounds::of_bars(&self.bars),
            self.bars.len(),
        )
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    pub fn reset_zoom(&mut self) {
        self.viewport.reset_vertical_zoom();
    }

    pub fn set_horizontal_zoom(&mut self, level: f64) -> bool {
        self.viewport.set_horizontal_zoom(level, self.bars.len())
    }

    pub fn pan(&mut self, delta: i64) -> bool {
        self.viewport.pan(delta, self.bars.len())
    }

    /// Route a wheel event through the gesture policy and apply it.
    /// Returns the action taken, if any.
    pub fn wheel(&mut self, gesture: WheelGesture) -> Option<WheelAction> {
        let action = route_wheel(&gesture)?;
        match action {
            WheelAction::HorizontalZoomIn => {
                self.set_horizontal_zoom(self.viewport.horizontal_zoom * chart_core::ZOOM_STEP);
            }
            WheelAction::HorizontalZoomOut => {
                self.set_horizontal_zoom(self.viewport.horizontal_zoom / chart_core::ZOOM_STEP);
            }
            WheelAction::Pan(delta) => {
                self.pan(delta);
            }
            WheelAction::VerticalZoomIn => self.zoom_in(),
            WheelAction::VerticalZoomOut => self.zoom_out(),
        }
        Some(action)
    }

    // ---------- tools & gestures --------------------------------------------

    pub fn active_tool(&self) -> Tool {
        self.active_tool
    }

    pub fn set_active_tool(&mut self, tool: Tool) {
        self.active_tool = tool;
        if tool != Tool::Crosshair {
            self.crosshair = None;
        }
    }

    pub fn pending_shape(&self) -> Option<&PendingShape> {
        self.pending_shape.as_ref()
    }

    pub fn pending_text(&self) -> Option<&PendingText> {
        self.pending_text.as_ref()
    }

    pub fn crosshair(&self) -> Option<ScreenPoint> {
        self.crosshair
    }

    /// Pointer pressed. Cursor selects (topmost hit wins, empty space
    /// clears); Text opens a pending annotation; shape tools begin a drag
    /// gesture unless one is already in flight.
    pub fn pointer_down(&mut self, at: ScreenPoint) {
        match self.active_tool {
            Tool::Cursor => {
                let transform = self.transform();
                let hit = hit_scan(&self.drawings, &transform, at, HIT_TOLERANCE)
                    .map(|d| d.id.clone());
                self.selected_drawing_id = hit;
            }
            Tool::Text => {
                self.pending_text = Some(PendingText {
                    anchor: at,
                    buffer: String::new(),
                });
            }
            Tool::Trendline | Tool::Rectangle | Tool::Fibonacci => {
                if self.pending_shape.is_none() {
                    let tool = self.active_tool.shape_tool().unwrap_or(ShapeTool::Trendline);
                    self.pending_shape = Some(PendingShape {
                        tool,
                        start: at,
                        current: at,
                    });
                }
            }
            Tool::Crosshair => {}
        }
    }

    pub fn pointer_move(&mut self, at: ScreenPoint) {
        if let Some(pending) = &mut self.pending_shape {
            pending.current = at;
        }
        if self.active_tool == Tool::Crosshair {
            self.crosshair = Some(at);
        }
    }

    /// Pointer released: commit the in-flight shape, if any. The screen
    /// endpoints are captured into data space through the current transform
    /// exactly once, here.
    pub fn pointer_up(&mut self) -> Option<&Drawing> {
        let pending = self.pending_shape.take()?;
        let transform = self.transform();
        let a = transform.capture(pending.start);
        let b = transform.capture(pending.current);
        let style = self.settings.clone();
        let drawing = match pending.tool {
            ShapeTool::Trendline => Drawing::trendline(a, b, style),
            ShapeTool::Rectangle => Drawing::rectangle(a, b, style),
            ShapeTool::Fibonacci => Drawing::fibonacci(a, b, style),
        };
        self.drawings.push(drawing);
        self.drawings.last()
    }

    /// The pointer left the surface. Clears the crosshair only; an
    /// in-flight shape gesture survives and resumes on re-entry.
    pub fn pointer_leave(&mut self) {
        self.crosshair = None;
    }

    /// Abandon the in-flight shape gesture without committing anything.
    /// Nothing calls this internally; hosts that want leave-to-cancel wire
    /// it up themselves.
    pub fn cancel_gesture(&mut self) {
        self.pending_shape = None;
    }

    // ---------- text annotation ---------------------------------------------

    pub fn set_pending_text(&mut self, value: &str) {
        if let Some(pending) = &mut self.pending_text {
            pending.buffer = value.to_string();
        }
    }

    /// Commit the pending annotation (Enter or blur). Whitespace-only text
    /// is discarded like a cancel.
    pub fn commit_text(&mut self) -> Option<&Drawing> {
        let pending = self.pending_text.take()?;
        if pending.buffer.trim().is_empty() {
            return None;
        }
        let anchor = self.transform().capture(pending.anchor);
        self.drawings
            .push(Drawing::text(anchor, pending.buffer, self.settings.clone()));
        self.drawings.last()
    }

    /// Escape: drop the pending annotation with no side effects.
    pub fn cancel_text(&mut self) {
        self.pending_text = None;
    }

    /// Session-level keyboard policy. Enter/Escape drive a pending text
    /// annotation; Delete/Backspace remove the selected drawing (but never
    /// while the text box owns the keystrokes).
    pub fn key_down(&mut self, key: Key) -> bool {
        match key {
            Key::Enter => {
                if self.pending_text.is_some() {
                    self.commit_text();
                    return true;
                }
                false
            }
            Key::Escape => {
                if self.pending_text.is_some() {
                    self.cancel_text();
                    return true;
                }
                false
            }
            Key::Delete | Key::Backspace => {
                if self.pending_text.is_some() {
                    return false;
                }
                match self.selected_drawing_id.clone() {
                    Some(id) => self.delete_drawing(&id),
                    None => false,
                }
            }
        }
    }

    // ---------- drawings & selection ----------------------------------------

    pub fn drawings(&self) -> &[Drawing] {
        &self.drawings
    }

    pub fn selected_drawing_id(&self) -> Option<&str> {
        self.selected_drawing_id.as_deref()
    }

    pub fn add_drawing(&mut self, drawing: Drawing) {
        self.drawings.push(drawing);
    }

    /// Select by id (must exist), or clear with `None`.
    pub fn select(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.selected_drawing_id = None;
                true
            }
            Some(id) => {
                if self.drawings.iter().any(|d| d.id == id) {
                    self.selected_drawing_id = Some(id.to_string());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Remove one drawing. Clears the selection in the same operation when
    /// it referenced the removed drawing.
    pub fn delete_drawing(&mut self, id: &str) -> bool {
        let before = self.drawings.len();
        self.drawings.retain(|d| d.id != id);
        if self.drawings.len() == before {
            return false;
        }
        if self.selected_drawing_id.as_deref() == Some(id) {
            self.selected_drawing_id = None;
        }
        true
    }

    pub fn clear_drawings(&mut self) {
        self.drawings.clear();
        self.selected_drawing_id = None;
    }

    /// Whole-field style replacement on an existing drawing.
    pub fn update_drawing_style(&mut self, id: &str, patch: &StylePatch) -> bool {
        match self.drawings.iter_mut().find(|d| d.id == id) {
            Some(drawing) => {
                drawing.style.apply(patch);
                true
            }
            None => false,
        }
    }

    pub fn settings(&self) -> &DrawingStyle {
        &self.settings
    }

    /// Adjust the pending style applied to the next drawing created.
    pub fn update_settings(&mut self, patch: &StylePatch) {
        self.settings.apply(patch);
    }

    // ---------- crosshair ----------------------------------------------------

    /// Price/time under the crosshair, clamped to the padded price range
    /// when the pointer is above or below the plot.
    pub fn crosshair_readout(&self) -> Option<CrosshairReadout> {
        let at = self.crosshair?;
        let transform = self.transform();
        let top = self.layout.margin_top;
        let bottom = top + self.layout.plot_height();
        let price = if at.y < top {
            transform.padded_max()
        } else if at.y > bottom {
            transform.padded_min()
        } else {
            transform.y_to_price(at.y)
        };
        let time_label = transform
            .nearest_visible_index(at.x)
            .and_then(|i| self.bars.get(i))
            .map(|bar| format_bar_time(bar.time, self.timeframe))
            .unwrap_or_default();
        Some(CrosshairReadout { price, time_label })
    }

    // ---------- indicators ---------------------------------------------------

    pub fn enabled_indicators(&self) -> impl Iterator<Item = IndicatorKind> + '_ {
        self.enabled_indicators.iter().copied()
    }

    pub fn is_indicator_enabled(&self, kind: IndicatorKind) -> bool {
        self.enabled_indicators.contains(&kind)
    }

    /// Toggle an indicator on/off; returns whether it is enabled afterwards.
    pub fn toggle_indicator(&mut self, kind: IndicatorKind) -> bool {
        if !self.enabled_indicators.remove(&kind) {
            self.enabled_indicators.insert(kind);
            return true;
        }
        false
    }

    /// Default-styled configs for every enabled indicator, for the renderer.
    pub fn indicator_configs(&self) -> Vec<IndicatorConfig> {
        self.enabled_indicators
            .iter()
            .map(|&kind| IndicatorConfig::with_defaults(kind))
            .collect()
    }

    // ---------- chat ----------------------------------------------------------

    pub fn chat_messages(&self) -> &[ChatMessage] {
        &self.chat_messages
    }

    pub fn is_analyzing(&self) -> bool {
        self.is_analyzing
    }

    /// Append the user's question and flag the assistant as busy. The host
    /// then calls the analyst client and feeds the reply back through
    /// [`ChartSession::push_assistant_reply`].
    pub fn push_user_message(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.chat_messages
            .push(ChatMessage::user(text, chrono::Utc::now().timestamp()));
        self.is_analyzing = true;
        self.chat_messages.last().expect("just pushed")
    }

    pub fn push_assistant_reply(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.chat_messages
            .push(ChatMessage::assistant(text, chrono::Utc::now().timestamp()));
        self.is_analyzing = false;
        self.chat_messages.last().expect("just pushed")
    }

    /// Prompt for the analyst client, assembled from this session's
    /// transcript and series.
    pub fn analysis_prompt(&self) -> String {
        build_analysis_prompt(&self.chat_messages, &self.bars)
    }

    // ---------- summary -------------------------------------------------------

    pub fn market_summary(&self) -> &MarketSummary {
        &self.market_summary
    }

    pub fn latest_summary_sma(&self) -> Option<f64> {
        self.latest_summary_sma
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chart_core::DrawingShape;

    fn bars(count: usize) -> Vec<Bar> {
        (0..count)
            .map(|i| Bar {
                time: i as i64 * 60,
                open: 100.0 + i as f64 * 0.1,
                high: 105.0 + i as f64 * 0.1,
                low: 95.0 + i as f64 * 0.1,
                close: 100.0 + i as f64 * 0.1,
                volume: 1000.0,
            })
            .collect()
    }

    fn session_with_bars(count: usize) -> ChartSession {
        let mut session = ChartSession::new();
        session.set_bars(bars(count));
        session
    }

    fn draw_trendline(session: &mut ChartSession, from: (f64, f64), to: (f64, f64)) -> String {
        session.set_active_tool(Tool::Trendline);
        session.pointer_down(ScreenPoint::new(from.0, from.1));
        session.pointer_move(ScreenPoint::new(to.0, to.1));
        let id = session.pointer_up().expect("gesture commits").id.clone();
        session.set_active_tool(Tool::Cursor);
        id
    }

    #[test]
    fn drag_gesture_commits_one_drawing_with_pending_style() {
        let mut session = session_with_bars(100);
        session.update_settings(&StylePatch {
            color: Some("#FF5252".to_string()),
            line_style: None,
            line_width: Some(3.0),
        });

        session.set_active_tool(Tool::Trendline);
        session.pointer_down(ScreenPoint::new(100.0, 100.0));
        session.pointer_move(ScreenPoint::new(200.0, 150.0));
        assert!(session.pending_shape().is_some());
        // a second press mid-gesture does not restart the gesture
        let start = session.pending_shape().unwrap().start;
        session.pointer_down(ScreenPoint::new(500.0, 300.0));
        assert_eq!(session.pending_shape().unwrap().start, start);

        session.pointer_move(ScreenPoint::new(300.0, 200.0));
        let drawing = session.pointer_up().unwrap();
        assert!(matches!(drawing.shape, DrawingShape::Trendline { .. }));
        assert_eq!(drawing.style.color, "#FF5252");
        assert_relative_eq!(drawing.style.line_width, 3.0);
        assert_eq!(session.drawings().len(), 1);
        assert!(session.pending_shape().is_none());

        // no dangling gesture: another pointer_up is a no-op
        assert!(session.pointer_up().is_none());
    }

    #[test]
    fn committed_drawing_projects_back_to_gesture_pixels() {
        let mut session = session_with_bars(100);
        session.set_active_tool(Tool::Rectangle);
        session.pointer_down(ScreenPoint::new(150.0, 120.0));
        session.pointer_move(ScreenPoint::new(350.0, 260.0));
        session.pointer_up().unwrap();

        let transform = session.transform();
        match &session.drawings()[0].shape {
            DrawingShape::Rectangle { a, b } => {
                let pa = transform.project(*a);
                let pb = transform.project(*b);
                assert_relative_eq!(pa.x, 150.0, epsilon = 1e-9);
                assert_relative_eq!(pa.y, 120.0, epsilon = 1e-9);
                assert_relative_eq!(pb.x, 350.0, epsilon = 1e-9);
                assert_relative_eq!(pb.y, 260.0, epsilon = 1e-9);
            }
            other => panic!("expected rectangle, got {other:?}"),
        }
    }

    #[test]
    fn cursor_click_selects_topmost_and_empty_space_clears() {
        let mut session = session_with_bars(100);
        let older = draw_trendline(&mut session, (100.0, 100.0), (300.0, 100.0));
        let newer = draw_trendline(&mut session, (100.0, 100.0), (300.0, 100.0));
        assert_ne!(older, newer);

        session.pointer_down(ScreenPoint::new(200.0, 100.0));
        assert_eq!(session.selected_drawing_id(), Some(newer.as_str()));

        session.pointer_down(ScreenPoint::new(700.0, 400.0));
        assert_eq!(session.selected_drawing_id(), None);
    }

    #[test]
    fn deleting_selected_drawing_clears_selection_in_same_operation() {
        let mut session = session_with_bars(100);
        let id = draw_trendline(&mut session, (100.0, 100.0), (300.0, 100.0));
        assert!(session.select(Some(&id)));
        assert!(session.key_down(Key::Delete));
        assert!(session.drawings().is_empty());
        assert_eq!(session.selected_drawing_id(), None);
    }

    #[test]
    fn delete_without_selection_is_a_noop() {
        let mut session = session_with_bars(100);
        draw_trendline(&mut session, (100.0, 100.0), (300.0, 100.0));
        assert!(!session.key_down(Key::Backspace));
        assert_eq!(session.drawings().len(), 1);
    }

    #[test]
    fn select_rejects_unknown_ids() {
        let mut session = session_with_bars(100);
        assert!(!session.select(Some("not-a-drawing")));
        assert_eq!(session.selected_drawing_id(), None);
    }

    #[test]
    fn clear_drawings_also_clears_selection() {
        let mut session = session_with_bars(100);
        let id = draw_trendline(&mut session, (100.0, 100.0), (300.0, 100.0));
        session.select(Some(&id));
        session.clear_drawings();
        assert!(session.drawings().is_empty());
        assert_eq!(session.selected_drawing_id(), None);
    }

    #[test]
    fn text_annotation_commits_trimmed_content_only() {
        let mut session = session_with_bars(100);
        session.set_active_tool(Tool::Text);
        session.pointer_down(ScreenPoint::new(220.0, 140.0));
        session.set_pending_text("  resistance  ");
        assert!(session.key_down(Key::Enter));
        assert_eq!(session.drawings().len(), 1);
        assert!(matches!(
            &session.drawings()[0].shape,
            DrawingShape::Text { text, .. } if text == "  resistance  "
        ));

        // whitespace-only commits are dropped
        session.pointer_down(ScreenPoint::new(220.0, 180.0));
        session.set_pending_text("   ");
        assert!(session.key_down(Key::Enter));
        assert_eq!(session.drawings().len(), 1);
    }

    #[test]
    fn escape_discards_pending_text_without_side_effects() {
        let mut session = session_with_bars(100);
        session.set_active_tool(Tool::Text);
        session.pointer_down(ScreenPoint::new(220.0, 140.0));
        session.set_pending_text("never mind");
        assert!(session.key_down(Key::Escape));
        assert!(session.pending_text().is_none());
        assert!(session.drawings().is_empty());
    }

    #[test]
    fn backspace_while_typing_does_not_delete_the_selection() {
        let mut session = session_with_bars(100);
        let id = draw_trendline(&mut session, (100.0, 100.0), (300.0, 100.0));
        session.select(Some(&id));
        session.set_active_tool(Tool::Text);
        session.pointer_down(ScreenPoint::new(220.0, 140.0));
        assert!(!session.key_down(Key::Backspace));
        assert_eq!(session.drawings().len(), 1);
    }

    #[test]
    fn style_updates_replace_whole_fields() {
        let mut session = session_with_bars(100);
        let id = draw_trendline(&mut session, (100.0, 100.0), (300.0, 100.0));
        assert!(session.update_drawing_style(
            &id,
            &StylePatch {
                color: Some("#4CAF50".to_string()),
                line_style: None,
                line_width: None,
            }
        ));
        assert_eq!(session.drawings()[0].style.color, "#4CAF50");
        assert!(!session.update_drawing_style("missing", &StylePatch::default()));
    }

    #[test]
    fn wheel_routing_picks_exactly_one_action() {
        // no ctrl: the page scrolls, not the chart
        assert_eq!(
            route_wheel(&WheelGesture {
                delta_x: 0.0,
                delta_y: 5.0,
                ctrl: false,
                shift: false
            }),
            None
        );
        // ctrl+shift: horizontal zoom on the vertical axis sign
        assert_eq!(
            route_wheel(&WheelGesture {
                delta_x: 0.0,
                delta_y: -3.0,
                ctrl: true,
                shift: true
            }),
            Some(WheelAction::HorizontalZoomIn)
        );
        // dominant horizontal delta pans
        assert_eq!(
            route_wheel(&WheelGesture {
                delta_x: 6.0,
                delta_y: 1.0,
                ctrl: true,
                shift: false
            }),
            Some(WheelAction::Pan(PAN_SPEED))
        );
        assert_eq!(
            route_wheel(&WheelGesture {
                delta_x: -6.0,
                delta_y: 0.0,
                ctrl: true,
                shift: false
            }),
            Some(WheelAction::Pan(-PAN_SPEED))
        );
        // otherwise vertical deltas zoom vertically
        assert_eq!(
            route_wheel(&WheelGesture {
                delta_x: 0.3,
                delta_y: 4.0,
                ctrl: true,
                shift: false
            }),
            Some(WheelAction::VerticalZoomOut)
        );
        // sub-threshold deltas do nothing
        assert_eq!(
            route_wheel(&WheelGesture {
                delta_x: 0.2,
                delta_y: 0.4,
                ctrl: true,
                shift: false
            }),
            None
        );
    }

    #[test]
    fn wheel_zoom_applies_to_the_viewport() {
        let mut session = session_with_bars(100);
        let action = session.wheel(WheelGesture {
            delta_x: 0.0,
            delta_y: -3.0,
            ctrl: true,
            shift: false,
        });
        assert_eq!(action, Some(WheelAction::VerticalZoomIn));
        assert_relative_eq!(session.viewport().vertical_zoom, 1.2);

        session.wheel(WheelGesture {
            delta_x: 0.0,
            delta_y: -3.0,
            ctrl: true,
            shift: true,
        });
        assert_relative_eq!(session.viewport().horizontal_zoom, 1.2);
    }

    #[test]
    fn crosshair_tracks_only_its_tool_and_clears_on_leave() {
        let mut session = session_with_bars(100);
        session.pointer_move(ScreenPoint::new(200.0, 200.0));
        assert!(session.crosshair().is_none());

        session.set_active_tool(Tool::Crosshair);
        session.pointer_move(ScreenPoint::new(200.0, 200.0));
        assert!(session.crosshair().is_some());

        session.pointer_leave();
        assert!(session.crosshair().is_none());

        session.pointer_move(ScreenPoint::new(200.0, 200.0));
        session.set_active_tool(Tool::Cursor);
        assert!(session.crosshair().is_none());
    }

    #[test]
    fn crosshair_readout_clamps_above_and_below_the_plot() {
        let mut session = session_with_bars(100);
        session.set_active_tool(Tool::Crosshair);

        session.pointer_move(ScreenPoint::new(400.0, 5.0));
        let readout = session.crosshair_readout().unwrap();
        assert_relative_eq!(readout.price, session.transform().padded_max());

        session.pointer_move(ScreenPoint::new(400.0, 595.0));
        let readout = session.crosshair_readout().unwrap();
        assert_relative_eq!(readout.price, session.transform().padded_min());

        session.pointer_move(ScreenPoint::new(400.0, 300.0));
        let readout = session.crosshair_readout().unwrap();
        assert!(!readout.time_label.is_empty());
        assert!(readout.price > session.transform().padded_min());
        assert!(readout.price < session.transform().padded_max());
    }

    #[test]
    fn indicator_toggle_flips_membership() {
        let mut session = session_with_bars(100);
        assert!(session.is_indicator_enabled(IndicatorKind::Sma));
        assert!(!session.toggle_indicator(IndicatorKind::Sma));
        assert!(!session.is_indicator_enabled(IndicatorKind::Sma));
        assert!(session.toggle_indicator(IndicatorKind::Rsi));
        let configs = session.indicator_configs();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].kind, IndicatorKind::Rsi);
    }

    #[test]
    fn chat_round_trip_toggles_the_analyzing_flag() {
        let mut session = session_with_bars(100);
        assert_eq!(session.chat_messages().len(), 1); // welcome message
        assert!(!session.is_analyzing());

        session.push_user_message("What is the trend?");
        assert!(session.is_analyzing());
        assert!(session.analysis_prompt().contains("user: What is the trend?"));

        session.push_assistant_reply("Sideways with support near 95.");
        assert!(!session.is_analyzing());
        assert_eq!(session.chat_messages().len(), 3);
    }

    #[test]
    fn replacing_bars_refreshes_summary_and_clamps_pan() {
        let mut session = session_with_bars(100);
        session.set_horizontal_zoom(2.0);
        session.pan(i64::MAX / 2);
        assert_eq!(session.viewport().pan_offset, 50);

        session.set_bars(bars(60));
        assert!(session.viewport().pan_offset + session.viewport().visible_points(60) <= 60);
        assert_relative_eq!(session.market_summary().open, 100.0);
        assert!(session.latest_summary_sma().is_some());

        session.set_bars(Vec::new());
        assert_eq!(session.market_summary(), &MarketSummary::default());
        assert_eq!(session.latest_summary_sma(), None);
    }

    #[test]
    fn pan_and_zoom_saturate_without_errors() {
        let mut session = session_with_bars(100);
        assert!(session.set_horizontal_zoom(20.0));
        assert_relative_eq!(session.viewport().horizontal_zoom, 10.0);
        assert!(!session.set_horizontal_zoom(20.0)); // idempotent clamp

        assert!(session.pan(i64::MIN / 2));
        assert_eq!(session.viewport().pan_offset, 0);
        assert!(session.pan(i64::MAX / 2));
        assert_eq!(session.viewport().pan_offset, 90);

        session.reset_zoom();
        assert_relative_eq!(session.viewport().vertical_zoom, 1.0);
        // horizontal zoom untouched by reset
        assert_relative_eq!(session.viewport().horizontal_zoom, 10.0);
    }
}
