//! Timestamp formatting for log entries, conversation turns, and backup folders.
//!
//! The formatting functions take an explicit instant so they stay
//! deterministic; the `*_now` helpers read the clock.

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};

/// RFC 3339 UTC timestamp with millisecond precision (`2026-01-18T12:00:00.123Z`).
pub fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// ISO timestamp with `:` and `.` replaced by `-`, safe for folder names on every platform.
pub fn filesystem_safe(at: DateTime<Utc>) -> String {
    iso(at).replace([':', '.'], "-")
}

/// Human-readable local time used for conversation turns.
pub fn localized<Tz: TimeZone>(at: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn iso_now() -> String {
    iso(Utc::now())
}

pub fn filesystem_safe_now() -> String {
    filesystem_safe(Utc::now())
}

pub fn localized_now() -> String {
    localized(Local::now())
}
