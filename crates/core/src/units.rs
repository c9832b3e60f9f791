//! Point-size helpers.
//!
//! OOXML stores run sizes in hundredths of a point (`sz="1450"` is 14.5pt).
//! Gradient schemes are keyed by the point size rendered without trailing
//! zeros, so both directions live here.

/// Convert a size in points to hundredths of a point, rounding to the
/// nearest integer.
pub fn points_to_hundredths(points: f64) -> u32 {
    (points * 100.0).round().max(0.0) as u32
}

/// Render a size given in hundredths of a point as a point string without
/// trailing zeros (`1400` → `"14"`, `1450` → `"14.5"`, `1425` → `"14.25"`).
pub fn format_hundredths(hundredths: u32) -> String {
    let whole = hundredths / 100;
    let frac = hundredths % 100;
    if frac == 0 {
        whole.to_string()
    } else if frac % 10 == 0 {
        format!("{}.{}", whole, frac / 10)
    } else {
        format!("{}.{:02}", whole, frac)
    }
}

/// Parse a decimal point size such as `"12"`, `"14.5"` or `" 9 "`.
pub fn parse_points(text: &str) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Canonical form of a scheme-table key.
///
/// Numeric keys are reformatted the same way run sizes are, so `"14.0"`
/// and `"14"` name the same scheme. Anything else is returned unchanged.
pub fn canonical_size_key(key: &str) -> String {
    match parse_points(key) {
        Some(points) => format_hundredths(points_to_hundredths(points)),
        None => key.to_string(),
    }
}
