//! Time utilities for parsing silence window bounds.
//!
//! Operators usually write silence windows relative to the current time, so
//! besides absolute times this accepts expressions like "now+2h".

use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

/// Resolve a time expression to an absolute time.
///
/// Supports:
/// - "" (unset)
/// - "now", "now-15m", "now+1h", "now+30s", "now+2d"
/// - ISO-8601 (RFC3339)
/// - UNIX seconds (string of digits)
///
/// # Parameters
///
/// - `input` - Time expression string to resolve
/// - `now` - Reference time for relative expressions
///
/// # Returns
///
/// Returns `Ok(None)` for an empty input, the resolved time, or an error message.
pub fn resolve_time(input: &str, now: OffsetDateTime) -> Result<Option<OffsetDateTime>, String> {
    let s = input.trim();
    if s.is_empty() {
        return Ok(None);
    }

    // UNIX seconds
    if s.chars().all(|c| c.is_ascii_digit()) {
        let secs = s.parse::<i64>().map_err(|e| format!("invalid time {s:?}: {e}"))?;
        return OffsetDateTime::from_unix_timestamp(secs)
            .map(Some)
            .map_err(|e| format!("invalid time {s:?}: {e}"));
    }

    // ISO-8601
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(Some(t));
    }

    // now / now(+|-)<N><unit>
    if s == "now" {
        return Ok(Some(now));
    }
    let offset = s
        .strip_prefix("now+")
        .map(|rest| (1i64, rest))
        .or_else(|| s.strip_prefix("now-").map(|rest| (-1i64, rest)));
    if let Some((sign, rest)) = offset {
        if let Some((num, unit)) = split_num_unit(rest) {
            if let Ok(n) = num.parse::<i64>() {
                let unit_secs: i64 = match unit {
                    "s" => 1,
                    "m" => 60,
                    "h" => 3_600,
                    "d" => 86_400,
                    _ => return Err(format!("unknown time unit in {s:?}")),
                };
                return n
                    .checked_mul(unit_secs)
                    .and_then(|secs| secs.checked_mul(sign))
                    .and_then(|secs| now.checked_add(Duration::seconds(secs)))
                    .map(Some)
                    .ok_or_else(|| format!("time out of range {s:?}"));
            }
        }
    }

    Err(format!("unrecognized time {s:?}"))
}

fn split_num_unit(s: &str) -> Option<(&str, &str)> {
    let i = s.find(|c: char| !c.is_ascii_digit())?;
    Some((&s[..i], &s[i..]))
}
