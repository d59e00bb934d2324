//! Amount parsing and display formatting.

use crate::{CONVERT_PRECISION, round_to};

/// Parses user-typed amounts such as `"1 234,56"`, `"1,234.5"` or `"12."`.
///
/// Everything except digits, `.` and `,` is ignored. The last separator is
/// taken as the decimal point and earlier ones as grouping. Blank or
/// unparsable input yields `0.0`.
pub fn parse_amount(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let normalized = match cleaned.rfind(['.', ',']) {
        Some(idx) => {
            let integer: String = cleaned[..idx]
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            format!("{}.{}", integer, &cleaned[idx + 1..])
        }
        None => cleaned,
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Formats an amount for display: empty for zero, otherwise at most four
/// fractional digits (trailing zeros trimmed) with `,` thousands grouping.
pub fn format_amount(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return String::new();
    }

    let rounded = round_to(value, CONVERT_PRECISION);
    let text = format!("{:.*}", CONVERT_PRECISION as usize, rounded.abs());
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut out = String::with_capacity(text.len() + integer.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    out
}
