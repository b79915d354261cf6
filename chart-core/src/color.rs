use crate::drawing::LineStyle;

/// SVG dash pattern for a stroke style.
pub fn stroke_dash_array(style: LineStyle) -> &'static str {
    match style {
        LineStyle::Dashed => "5,5",
        LineStyle::Dotted => "1,5",
        LineStyle::Solid => "none",
    }
}

/// Parse a strict `#RRGGBB` color. Anything else is rejected.
pub fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let value = hex.strip_prefix('#')?;
    if value.len() != 6 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let packed = u32::from_str_radix(value, 16).ok()?;
    Some((
        ((packed >> 16) & 0xff) as u8,
        ((packed >> 8) & 0xff) as u8,
        (packed & 0xff) as u8,
    ))
}

/// Alpha-blend helper for fills: `#RRGGBB` → `rgba(r, g, b, a)`. An invalid
/// color falls back to opaque black at the requested alpha rather than
/// failing.
pub fn hex_to_rgba(hex: &str, alpha: f64) -> String {
    match parse_hex_color(hex) {
        Some((r, g, b)) => format!("rgba({r}, {g}, {b}, {alpha})"),
        None => format!("rgba(0, 0, 0, {alpha})"),
    }
}
