use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Wall-clock `HH:MM:SS` in UTC, used for human-facing event feeds.
pub fn utc_clock_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

pub fn utc_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
