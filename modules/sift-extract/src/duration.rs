//! Relative-time text ("3 hours ago", "1d 4h") to a second count.

use std::sync::LazyLock;

use regex::Regex;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
/// 365 days. No leap-year adjustment.
const YEAR: u64 = 365 * DAY;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*([a-z]+)").expect("valid regex"));

fn unit_seconds(unit: &str) -> Option<u64> {
    let secs = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "wk" | "wks" | "week" | "weeks" => WEEK,
        "y" | "yr" | "yrs" | "year" | "years" => YEAR,
        _ => return None,
    };
    Some(secs)
}

/// Sum every `<integer><unit>` token found in `text`.
///
/// Unknown units and stray words are skipped, so the result is `0` for empty
/// or unrecognizable input rather than an error.
pub fn parse_duration(text: &str) -> u64 {
    let lowered = text.to_lowercase();
    let mut normalized = lowered.trim();
    if let Some(stripped) = normalized.strip_suffix("ago") {
        normalized = stripped.trim_end();
    }

    TOKEN_RE
        .captures_iter(normalized)
        .filter_map(|cap| {
            let value: u64 = cap[1].parse().ok()?;
            let unit = unit_seconds(&cap[2])?;
            Some(value.saturating_mul(unit))
        })
        .fold(0u64, u64::saturating_add)
}
