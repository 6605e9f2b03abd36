//! Human-readable formatting and parsing for coin amounts and durations.
//!
//! Coins are shown with a K/M/B suffix and entered the same way, so the two
//! functions here must stay exact inverses for suffixed strings.

use thiserror::Error;

/// Errors produced when user input cannot be turned into a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid coin amount `{0}` (expected a number, optionally suffixed with K, M or B)")]
    InvalidCoins(String),
    #[error("invalid duration `{0}` (expected hh:mm:ss)")]
    InvalidDuration(String),
    #[error("invalid {field} `{value}` (expected a whole number)")]
    InvalidInteger { field: &'static str, value: String },
}

const SUFFIXES: [(char, f64); 3] = [('B', 1e9), ('M', 1e6), ('K', 1e3)];

/// Format a coin amount, e.g. `17090000.0` becomes `"17.09M"`
pub fn format_coins(value: f64) -> String {
    for (suffix, scale) in SUFFIXES {
        if value >= scale {
            return format!("{:.2}{suffix}", value / scale);
        }
    }
    format!("{value:.2}")
}

/// Parse a coin amount with an optional K/M/B suffix
pub fn parse_coins(input: &str) -> Result<f64, ParseError> {
    let trimmed = input.trim();
    let invalid = || ParseError::InvalidCoins(input.to_string());

    let (number, scale) = match trimmed.chars().last() {
        None => return Err(invalid()),
        Some(last) => match SUFFIXES.iter().find(|(s, _)| *s == last) {
            Some((_, scale)) => (&trimmed[..trimmed.len() - 1], *scale),
            None => (trimmed, 1.0),
        },
    };

    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(value * scale)
}

/// Parse `hh:mm:ss` into seconds.
///
/// Components are weighted hours, minutes, seconds from the left, so `"2"`
/// is two hours and `"1:30"` is ninety minutes.
pub fn parse_duration(input: &str) -> Result<i64, ParseError> {
    let trimmed = input.trim();
    let invalid = || ParseError::InvalidDuration(input.to_string());

    let parts: Vec<&str> = trimmed.split(':').collect();
    if trimmed.is_empty() || parts.len() > 3 {
        return Err(invalid());
    }

    let mut total: i64 = 0;
    for (part, weight) in parts.iter().zip([3600i64, 60, 1]) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let n: i64 = part.parse().map_err(|_| invalid())?;
        total = n
            .checked_mul(weight)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
    }
    Ok(total)
}

/// Format seconds as `hh:mm:ss`; hours are not wrapped at 24
pub fn format_duration(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let s = seconds.unsigned_abs();
    format!("{sign}{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}

/// Parse a whole number typed into a form field
pub fn parse_integer(field: &'static str, input: &str) -> Result<i64, ParseError> {
    input
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidInteger {
            field,
            value: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_coins_suffixes() {
        assert_eq!(format_coins(999.0), "999.00");
        assert_eq!(format_coins(1000.0), "1.00K");
        assert_eq!(format_coins(1500.0), "1.50K");
        assert_eq!(format_coins(17_090_000.0), "17.09M");
        assert_eq!(format_coins(2_300_000_000.0), "2.30B");
        assert_eq!(format_coins(-5000.0), "-5000.00");
    }

    #[test]
    fn test_parse_coins() {
        assert_eq!(parse_coins("1.5K").unwrap(), 1500.0);
        assert_eq!(parse_coins("  42 ").unwrap(), 42.0);
        assert_eq!(parse_coins("2B").unwrap(), 2e9);
        assert!(matches!(parse_coins(""), Err(ParseError::InvalidCoins(_))));
        assert!(matches!(parse_coins("K"), Err(ParseError::InvalidCoins(_))));
        assert!(matches!(parse_coins("abc"), Err(ParseError::InvalidCoins(_))));
        // Lowercase suffixes are not multipliers
        assert!(parse_coins("3k").is_err());
    }

    #[test]
    fn test_coins_round_trip() {
        for x in [999.0, 1500.0, 17_090_000.0, 2_300_000_000.0] {
            let parsed = parse_coins(&format_coins(x)).unwrap();
            let scale = if x >= 1e9 {
                1e9
            } else if x >= 1e6 {
                1e6
            } else if x >= 1e3 {
                1e3
            } else {
                1.0
            };
            assert!(
                (parsed - x).abs() <= 0.005 * scale + 1e-6,
                "{x} round-tripped to {parsed}"
            );
        }
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("01:02:03").unwrap(), 3723);
        assert_eq!(parse_duration("2").unwrap(), 7200);
        assert_eq!(parse_duration("1:30").unwrap(), 5400);
        assert_eq!(parse_duration("0:0:0").unwrap(), 0);
        assert!(parse_duration("").is_err());
        assert!(parse_duration("1:2:3:4").is_err());
        assert!(parse_duration("1::3").is_err());
        assert!(parse_duration("-1:00:00").is_err());
        assert!(parse_duration("aa:bb:cc").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(3723), "01:02:03");
        assert_eq!(format_duration(100 * 3600), "100:00:00");
        assert_eq!(parse_duration(&format_duration(45_296)).unwrap(), 45_296);
    }

    #[test]
    fn test_parse_integer_reports_field() {
        assert_eq!(parse_integer("wave", " 12 ").unwrap(), 12);
        let err = parse_integer("wave", "x").unwrap_err();
        assert_eq!(err.to_string(), "invalid wave `x` (expected a whole number)");
    }
}
