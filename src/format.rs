//! Display helpers for captions

use chrono::{DateTime, Utc};

/// Compact number formatting: 1234567.0 -> "1.23M"
pub fn short_num(num: Option<f64>) -> String {
    let Some(mut num) = num else {
        return "N/A".to_string();
    };
    if num.abs() < 1.0 {
        return format!("{:.8}", num);
    }
    for unit in ["", "K", "M", "B"] {
        if num.abs() < 1000.0 {
            return format!("{:.2}{}", num, unit);
        }
        num /= 1000.0;
    }
    format!("{:.2}T", num)
}

/// Fraction -> percent string, truncated (not rounded) to two decimals:
/// 0.2567 -> "25.67%"
pub fn format_pct(frac: Option<f64>) -> String {
    match frac {
        Some(f) => {
            let truncated = (f * 100.0 * 100.0).trunc() / 100.0;
            format!("{:.2}%", truncated)
        }
        None => "N/A".to_string(),
    }
}

pub fn format_int(n: Option<u32>) -> String {
    n.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

/// Age formatting: "45m", "3h", "3h25m". Timestamps before 2020 or in
/// the future are bogus provider data and render as "N/A" / "now".
pub fn format_age(dt: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(dt) = dt else {
        return "N/A".to_string();
    };
    if dt > now {
        return "now".to_string();
    }
    let floor = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z")
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(now);
    if dt < floor {
        return "N/A".to_string();
    }
    let total_minutes = (now - dt).num_minutes();
    if !(0..=1_000_000).contains(&total_minutes) {
        return "N/A".to_string();
    }
    if total_minutes < 60 {
        return format!("{}m", total_minutes);
    }
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if minutes == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h{}m", hours, minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_short_num() {
        assert_eq!(short_num(None), "N/A");
        assert_eq!(short_num(Some(0.00012345)), "0.00012345");
        assert_eq!(short_num(Some(950.0)), "950.00");
        assert_eq!(short_num(Some(1_234_567.0)), "1.23M");
        assert_eq!(short_num(Some(2_500_000_000.0)), "2.50B");
    }

    #[test]
    fn test_format_pct_truncates() {
        assert_eq!(format_pct(Some(0.25)), "25.00%");
        // 0.23999 -> 23.999% -> truncate, never round up to 24.00%
        assert_eq!(format_pct(Some(0.23999)), "23.99%");
        assert_eq!(format_pct(None), "N/A");
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(None, now), "N/A");
        assert_eq!(format_age(Some(now - Duration::minutes(45)), now), "45m");
        assert_eq!(format_age(Some(now - Duration::minutes(180)), now), "3h");
        assert_eq!(format_age(Some(now - Duration::minutes(205)), now), "3h25m");
        assert_eq!(format_age(Some(now + Duration::minutes(5)), now), "now");
    }
}
