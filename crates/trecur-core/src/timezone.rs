use crate::error::CoreError;
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Parse an IANA timezone name
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone.trim())
        .map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// Detect system timezone
pub fn detect_system_timezone() -> String {
    // Try multiple detection methods
    if let Ok(tz) = std::env::var("TZ") {
        let tz = tz.trim_start_matches(':');
        if !tz.is_empty() && parse_timezone(tz).is_ok() {
            return tz.to_string();
        }
    }

    if let Ok(tz) = iana_time_zone::get_timezone() {
        if parse_timezone(&tz).is_ok() {
            return tz;
        }
    }

    // Fallback to UTC
    "UTC".to_string()
}

/// Map a wall-clock time in `tz` to an instant.
///
/// Ambiguous times (DST fall back) take the earliest mapping. Times that do not
/// exist (DST spring forward) move forward one hour.
pub fn resolve_local(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&local.checked_add_signed(Duration::hours(1))?)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}
