//! Time value parsing.
//!
//! Time-valued options accept either a raw millisecond count or a compound
//! string of unit-suffixed parts such as "1h30m", "2s" or "250ms". Parts may
//! be separated by whitespace, as in "1h 30m".

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static TIME_VAL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(\d+)d\s*)?(?:(\d+)h\s*)?(?:(\d+)m\s*)?(?:(\d+)s\s*)?(?:(\d+)(?:ms)?)?$").unwrap()
});

const UNIT_MILLIS: [u64; 5] = [86_400_000, 3_600_000, 60_000, 1_000, 1];

/// Parse a time value string to milliseconds.
///
/// # Examples
/// ```
/// use rigcfg::option::time_val::parse_time_val_millis;
///
/// assert_eq!(parse_time_val_millis("1500"), Ok(1500));
/// assert_eq!(parse_time_val_millis("1m30s"), Ok(90_000));
/// assert_eq!(parse_time_val_millis("2h"), Ok(7_200_000));
/// assert!(parse_time_val_millis("soon").is_err());
/// ```
pub fn parse_time_val_millis(text: &str) -> Result<u64, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("Invalid time value: empty string".to_string());
    }

    let captures = TIME_VAL_PATTERN
        .captures(text)
        .ok_or_else(|| format!("Invalid time value: {}", text))?;

    let mut total: u64 = 0;
    for (group, millis) in UNIT_MILLIS.iter().enumerate() {
        if let Some(part) = captures.get(group + 1) {
            let amount: u64 = part
                .as_str()
                .parse()
                .map_err(|_| format!("Invalid time value: {}", text))?;
            total = amount
                .checked_mul(*millis)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(|| format!("Time value out of range: {}", text))?;
        }
    }
    Ok(total)
}

/// Parse a time value string to a [`Duration`].
pub fn parse_time_val(text: &str) -> Result<Duration, String> {
    parse_time_val_millis(text).map(Duration::from_millis)
}

/// Render milliseconds in the compact unit form accepted by [`parse_time_val_millis`].
pub fn format_time_val_millis(millis: u64) -> String {
    if millis == 0 {
        return "0".to_string();
    }
    let suffixes = ["d", "h", "m", "s", "ms"];
    let mut remaining = millis;
    let mut out = String::new();
    for (unit, suffix) in UNIT_MILLIS.iter().zip(suffixes) {
        let amount = remaining / unit;
        if amount > 0 {
            out.push_str(&format!("{}{}", amount, suffix));
            remaining %= unit;
        }
    }
    out
}
