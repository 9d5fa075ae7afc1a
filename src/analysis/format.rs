//! Display formatting for section values.

const CRORE: f64 = 1e7;
const BILLION: f64 = 1e9;
const TRILLION: f64 = 1e12;

pub const NOT_AVAILABLE: &str = "N/A";

/// `1234567.891` with 2 decimals -> `1,234,567.89`
pub fn thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + integer.len() / 3 + 1);
    if value.is_sign_negative() && value != 0.0 {
        grouped.push('-');
    }
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

/// Amount with optional prefix; values of a crore or more are shown in crore
pub fn amount(value: Option<f64>, prefix: &str) -> String {
    match value {
        None => NOT_AVAILABLE.to_string(),
        Some(v) if v.abs() >= CRORE => format!("{}{} Cr", prefix, thousands(v / CRORE, 2)),
        Some(v) => format!("{}{}", prefix, thousands(v, 2)),
    }
}

/// Plain number (ratios, multiples) with crore scaling
pub fn number(value: Option<f64>) -> String {
    amount(value, "")
}

/// Price in the market's currency, never scaled
pub fn price(currency: &str, value: f64) -> String {
    format!("{}{}", currency, thousands(value, 2))
}

/// Fraction rendered as a percentage: `0.1234` -> `12.34%`
pub fn percent(fraction: Option<f64>) -> String {
    match fraction {
        Some(f) => format!("{:.2}%", f * 100.0),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Share or volume count without decimals
pub fn count(value: f64) -> String {
    thousands(value, 0)
}

/// Market capitalization in T/B/Cr units
pub fn market_cap(currency: &str, value: Option<f64>) -> String {
    match value {
        None => NOT_AVAILABLE.to_string(),
        Some(v) if v.abs() >= TRILLION => format!("{}{}T", currency, thousands(v / TRILLION, 2)),
        Some(v) if v.abs() >= BILLION => format!("{}{}B", currency, thousands(v / BILLION, 2)),
        Some(v) if v.abs() >= CRORE => format!("{}{} Cr", currency, thousands(v / CRORE, 2)),
        Some(v) => format!("{}{}", currency, thousands(v, 0)),
    }
}

/// Leading `+` for non-negative values
pub fn signed(value: f64, decimals: usize) -> String {
    if value >= 0.0 {
        format!("+{}", thousands(value, decimals))
    } else {
        thousands(value, decimals)
    }
}
