/// Format a number the way `%g` does: six significant digits, trailing zeros dropped.
/// `0.9500000000000001` becomes `0.95`, `1.0` becomes `1`.
pub fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let formatted = format!("{value:.5e}");
    let Some((mantissa, exponent)) = formatted.split_once('e') else {
        return value.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or_default();
    if (-4..6).contains(&exponent) {
        return formatted.parse::<f64>().unwrap_or(value).to_string();
    }
    let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{mantissa}e{}{:02}", if exponent < 0 { '-' } else { '+' }, exponent.abs())
}

/// Format a score so whole numbers keep one decimal place (`12.0`, `7.5`).
pub fn format_points(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e16 { format!("{value:.1}") } else { value.to_string() }
}
