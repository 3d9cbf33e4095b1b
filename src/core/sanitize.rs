// src/core/sanitize.rs
//! Cell-level parsing of the stringly-typed values the source ships.

use crate::data::StatValue;

pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space { out.push(' '); prev_space = true; }
        } else { out.push(ch); prev_space = false; }
    }
    out.trim().to_string()
}

/// Placeholders the source uses for "no value".
fn is_blank(s: &str) -> bool {
    matches!(s, "" | "-" | "--" | "---" | "N/A" | "n/a")
}

/// Parse one box-score cell.
///
/// `"4-12"` is made-attempted, integers are counts, decimals are numbers,
/// dashes and blanks are unknown. Anything else is kept as text.
pub fn parse_stat_value(raw: &str) -> StatValue {
    let t = normalize_ws(raw);
    if is_blank(&t) {
        return StatValue::Unknown;
    }
    if let Some((m, a)) = split_made_attempted(&t) {
        return StatValue::MadeAttempted { made: m, attempted: a };
    }
    if let Ok(v) = t.parse::<i64>() {
        return StatValue::Count { value: v };
    }
    if let Ok(v) = t.parse::<f64>() {
        if v.is_finite() {
            return StatValue::Number { value: v };
        }
    }
    StatValue::Text { value: t }
}

fn split_made_attempted(t: &str) -> Option<(i64, i64)> {
    // a leading '-' is a negative number, not a pair
    let dash = t.get(1..)?.find('-')? + 1;
    let made = t[..dash].trim().parse::<i64>().ok()?;
    let attempted = t[dash + 1..].trim().parse::<i64>().ok()?;
    (made >= 0 && attempted >= 0).then_some((made, attempted))
}

/// `"12:34"` or `"0:05.3"` to whole seconds remaining. Bare seconds (`"45.0"`)
/// are accepted for late-game clocks.
pub fn clock_seconds(raw: &str) -> Option<u32> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    let (min, sec) = match t.split_once(':') {
        Some((m, s)) => (m.trim().parse::<u32>().ok()?, s.trim()),
        None => (0, t),
    };
    let sec = sec.parse::<f64>().ok().filter(|s| s.is_finite() && *s >= 0.0)?;
    min.checked_mul(60)?.checked_add(sec.floor() as u32)
}
