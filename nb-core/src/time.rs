use std::time::Duration;

use anyhow::anyhow;

/// Parses durations the way the command line accepts them: a bare integer is seconds, anything
/// else goes through humantime (`90s`, `10m`, `1h30m`, `500ms`).
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let trimmed = s.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(trimmed).map_err(|e| anyhow!("invalid duration {s:?}: {e}"))
}

/// Wire format for duration fields in request bodies.
pub fn to_wire_duration(d: Duration) -> String {
    format!("{}s", d.as_secs())
}

pub fn format_seconds(secs: i64) -> String {
    let secs = secs.max(0) as u64;
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}
