//! Time utilities: timezone-aware deadline parsing and time-left computation.

use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse a deadline like "2026-02-20 23:59" in an IANA tz like "Europe/Moscow",
/// returning UTC.
pub fn parse_local_deadline_to_utc(local: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz: Tz = tz
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))?;

    let ndt = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M")
        .map_err(|e| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

/// Accept either RFC3339 or "YYYY-MM-DD HH:MM" interpreted in `tz`.
pub fn parse_deadline(raw: &str, tz: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_local_deadline_to_utc(raw.trim(), tz)
}

/// Whole hours and minutes left until a deadline, never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLeft {
    pub hours: i64,
    pub minutes: i64,
}

impl TimeLeft {
    pub fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = (deadline - now).max(Duration::zero());
        let secs = remaining.num_seconds();
        Self {
            hours: secs / 3600,
            minutes: (secs % 3600) / 60,
        }
    }
}

impl fmt::Display for TimeLeft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hours {} minutes", self.hours, self.minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_moscow_deadline() {
        // MSK is UTC+3 all year
        let utc = parse_local_deadline_to_utc("2026-02-20 23:59", "Europe/Moscow").unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-02-20T20:59:00+00:00");
    }

    #[test]
    fn parse_deadline_prefers_rfc3339() {
        let utc = parse_deadline("2026-02-20T10:00:00+02:00", "America/Chicago").unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-02-20T08:00:00+00:00");
        assert!(parse_deadline("tomorrow", "UTC").is_err());
    }

    #[test]
    fn ninety_minutes_left() {
        let now = noon();
        let left = TimeLeft::until(now + Duration::minutes(90), now);
        assert_eq!(left.to_string(), "1 hours 30 minutes");
    }

    #[test]
    fn overdue_clamps_to_zero() {
        let now = noon();
        let left = TimeLeft::until(now - Duration::minutes(5), now);
        assert_eq!(left, TimeLeft { hours: 0, minutes: 0 });
        assert_eq!(left.to_string(), "0 hours 0 minutes");
    }

    #[test]
    fn seconds_are_floored() {
        let now = noon();
        let left = TimeLeft::until(now + Duration::seconds(3600 + 119), now);
        assert_eq!(left.to_string(), "1 hours 1 minutes");
    }
}
