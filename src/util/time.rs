//! Time utilities for uptime tracking and chat timestamps

use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Local, TimeZone};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Current local wall-clock time as shown next to chat lines
pub fn chat_timestamp() -> String {
    format_clock(&Local::now())
}

/// Format a time as `h:mm:ss AM/PM`, e.g. `3:04:05 PM`
pub fn format_clock<Tz>(time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    time.format("%-I:%M:%S %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn formats_afternoon_without_leading_zero() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 15, 4, 5).unwrap();
        assert_eq!(format_clock(&t), "3:04:05 PM");
    }

    #[test]
    fn midnight_is_twelve_am() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 9).unwrap();
        assert_eq!(format_clock(&t), "12:00:09 AM");
    }

    #[test]
    fn uptime_starts_after_init() {
        init_server_time();
        assert!(uptime_secs() < 60);
        assert!(!chat_timestamp().is_empty());
    }
}
