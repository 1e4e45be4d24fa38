//! Daily time-window gate
//!
//! A window is an optional "HH:MM" start/end pair in a fixed UTC+8
//! reference offset; it may wrap past midnight. A malformed string
//! degrades to "no restriction" so a config typo cannot freeze a task
//! forever.

use chrono::{DateTime, FixedOffset, TimeZone, Timelike, Utc};
use tracing::warn;

/// Fixed reference offset for window comparisons (UTC+8)
pub fn reference_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("valid fixed offset")
}

fn reference_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&reference_offset())
}

/// Parse "HH:MM" to minutes since midnight. Hour 0-23, minute 0-59.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Window check against an explicit minutes-since-midnight clock
pub fn in_window_at(start: Option<&str>, end: Option<&str>, now_minutes: u32) -> bool {
    if start.is_none() && end.is_none() {
        return true;
    }

    let start_minutes = match start {
        Some(s) => match parse_hhmm(s) {
            Some(v) => Some(v),
            None => {
                warn!("Invalid start time '{}', treating window as unrestricted", s);
                return true;
            }
        },
        None => None,
    };
    let end_minutes = match end {
        Some(s) => match parse_hhmm(s) {
            Some(v) => Some(v),
            None => {
                warn!("Invalid end time '{}', treating window as unrestricted", s);
                return true;
            }
        },
        None => None,
    };

    match (start_minutes, end_minutes) {
        (Some(start), Some(end)) => {
            if start <= end {
                start <= now_minutes && now_minutes <= end
            } else {
                // wraps past midnight
                now_minutes >= start || now_minutes <= end
            }
        }
        (Some(start), None) => now_minutes >= start,
        (None, Some(end)) => now_minutes <= end,
        (None, None) => true,
    }
}

/// Window check against the reference wall clock
pub fn in_window(start: Option<&str>, end: Option<&str>) -> bool {
    let now = reference_now();
    in_window_at(start, end, now.hour() * 60 + now.minute())
}

/// Epoch second of the next instant the window opens: today's start
/// time if still ahead, the same clock time tomorrow otherwise. With
/// no parseable start time the window reopens at the next midnight.
pub fn next_window_open(start: Option<&str>, now_epoch: u64) -> u64 {
    let tz = reference_offset();
    let now = tz
        .timestamp_opt(now_epoch as i64, 0)
        .single()
        .unwrap_or_else(|| Utc::now().with_timezone(&tz));

    let open_minutes = start.and_then(parse_hhmm).unwrap_or(0);
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight");
    let today_open = tz
        .from_local_datetime(&midnight)
        .single()
        .map(|d| d.timestamp() as u64 + u64::from(open_minutes) * 60)
        .unwrap_or(now_epoch);

    if today_open > now_epoch {
        today_open
    } else {
        today_open + 86_400
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(h: u32, m: u32) -> u32 {
        h * 60 + m
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("09:00"), Some(540));
        assert_eq!(parse_hhmm("23:59"), Some(1439));
        assert_eq!(parse_hhmm("00:00"), Some(0));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("12:60"), None);
        assert_eq!(parse_hhmm("bad"), None);
        assert_eq!(parse_hhmm(""), None);
    }

    #[test]
    fn test_same_day_window() {
        assert!(in_window_at(Some("09:00"), Some("23:00"), minutes(10, 0)));
        assert!(!in_window_at(Some("09:00"), Some("23:00"), minutes(8, 0)));
        // boundaries are inclusive
        assert!(in_window_at(Some("09:00"), Some("23:00"), minutes(9, 0)));
        assert!(in_window_at(Some("09:00"), Some("23:00"), minutes(23, 0)));
    }

    #[test]
    fn test_midnight_wrapping_window() {
        assert!(in_window_at(Some("23:00"), Some("06:00"), minutes(1, 0)));
        assert!(in_window_at(Some("23:00"), Some("06:00"), minutes(23, 30)));
        assert!(!in_window_at(Some("23:00"), Some("06:00"), minutes(12, 0)));
    }

    #[test]
    fn test_one_sided_windows() {
        assert!(in_window_at(Some("09:00"), None, minutes(9, 0)));
        assert!(in_window_at(Some("09:00"), None, minutes(23, 0)));
        assert!(!in_window_at(Some("09:00"), None, minutes(8, 59)));

        assert!(in_window_at(None, Some("06:00"), minutes(5, 0)));
        assert!(!in_window_at(None, Some("06:00"), minutes(7, 0)));
    }

    #[test]
    fn test_no_window_always_open() {
        assert!(in_window_at(None, None, 0));
        assert!(in_window_at(None, None, 1439));
    }

    #[test]
    fn test_malformed_degrades_to_unrestricted() {
        assert!(in_window_at(Some("bad"), Some("06:00"), minutes(12, 0)));
        assert!(in_window_at(Some("23:00"), Some("9am"), minutes(12, 0)));
    }

    #[test]
    fn test_next_window_open() {
        let tz = reference_offset();
        // 2024-06-01 08:00 +08:00
        let now = tz
            .with_ymd_and_hms(2024, 6, 1, 8, 0, 0)
            .single()
            .unwrap()
            .timestamp() as u64;

        // start still ahead today
        let open = next_window_open(Some("10:00"), now);
        let expected = tz
            .with_ymd_and_hms(2024, 6, 1, 10, 0, 0)
            .single()
            .unwrap()
            .timestamp() as u64;
        assert_eq!(open, expected);

        // start already behind, same clock time tomorrow
        let open = next_window_open(Some("07:00"), now);
        let expected = tz
            .with_ymd_and_hms(2024, 6, 2, 7, 0, 0)
            .single()
            .unwrap()
            .timestamp() as u64;
        assert_eq!(open, expected);

        // no start: reopens at next midnight
        let open = next_window_open(None, now);
        let expected = tz
            .with_ymd_and_hms(2024, 6, 2, 0, 0, 0)
            .single()
            .unwrap()
            .timestamp() as u64;
        assert_eq!(open, expected);
    }
}
