//! Cron validation and local-time to UTC translation.
//!
//! The remote scheduler only understands UTC. A cron line whose minute and
//! hour are plain numbers is shifted from the trigger's timezone to UTC
//! using the offset in force on the reference date. Anything else in the
//! hour field (`*`, ranges, steps, lists) is passed through untouched, and
//! day fields are never shifted when the conversion crosses midnight.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::domain::errors::{DomainError, DomainResult};

/// Convert a 5-field cron expression to the 7-field format the `cron` crate expects.
///
/// Standard cron: `min hour day month weekday`
/// Cron crate:    `sec min hour day month weekday year`
pub fn normalize_cron_expression(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => format!("0 {} *", fields.join(" ")),
        6 => format!("0 {}", fields.join(" ")),
        _ => expr.to_string(),
    }
}

/// Rewrite a standard day-of-week field (0-7, Sunday is 0 or 7) into the
/// `cron` crate's numbering (1-7, Sunday is 1). Numeric parts are expanded
/// into an explicit list so wrap-around ranges like `5-7` stay valid; named
/// days pass through. Returns `None` when a numeric part is malformed.
fn translate_weekday_field(field: &str) -> Option<String> {
    if field == "*" || field == "?" {
        return Some(field.to_string());
    }

    let mut named = Vec::new();
    let mut days = BTreeSet::new();
    for part in field.split(',') {
        if part.bytes().any(|b| b.is_ascii_alphabetic()) {
            named.push(part.to_string());
            continue;
        }
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, Some(step.parse::<u32>().ok().filter(|s| *s > 0)?)),
            None => (part, None),
        };
        let (start, end) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((start, end)) => (fixed_number(start, 7)?, fixed_number(end, 7)?),
            None => {
                let start = fixed_number(range, 7)?;
                (start, if step.is_some() { start.max(6) } else { start })
            }
        };
        if start > end {
            return None;
        }
        days.extend((start..=end).step_by(step.unwrap_or(1) as usize).map(|day| day % 7 + 1));
    }

    let mut parts: Vec<String> = days.into_iter().map(|day| day.to_string()).collect();
    parts.extend(named);
    Some(parts.join(","))
}

/// Accept exactly five whitespace-separated fields that form a valid schedule.
///
/// Only the parsed copy is translated; the expression registered remotely
/// keeps standard numbering.
pub fn validate_cron(expr: &str) -> DomainResult<()> {
    let mut fields: Vec<String> = expr.split_whitespace().map(str::to_string).collect();
    if fields.len() != 5 {
        return Err(DomainError::Configuration(format!(
            "cron_expression must have 5 fields, got {}: '{expr}'",
            fields.len()
        )));
    }
    fields[4] = translate_weekday_field(&fields[4])
        .ok_or_else(|| DomainError::Configuration(format!("invalid day-of-week field in cron expression '{expr}'")))?;
    normalize_cron_expression(&fields.join(" "))
        .parse::<Schedule>()
        .map(|_| ())
        .map_err(|e| DomainError::Configuration(format!("invalid cron expression '{expr}': {e}")))
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> DomainResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| DomainError::Configuration(format!("unknown timezone '{name}'")))
}

fn fixed_number(field: &str, max: u32) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse::<u32>().ok().filter(|n| *n <= max)
}

/// Translate `expr` from `tz` local time to UTC as of `reference`.
pub fn convert_cron_to_utc(expr: &str, tz: Tz, reference: DateTime<Utc>) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 || tz == Tz::UTC {
        return expr.to_string();
    }

    let (Some(minute), Some(hour)) = (fixed_number(fields[0], 59), fixed_number(fields[1], 23)) else {
        tracing::warn!(
            cron = expr,
            timezone = %tz,
            "cron hour/minute is not a fixed time; registering without timezone conversion"
        );
        return expr.to_string();
    };

    let local_date = reference.with_timezone(&tz).date_naive();
    let Some(time) = NaiveTime::from_hms_opt(hour, minute, 0) else {
        return expr.to_string();
    };
    let Some(local) = tz.from_local_datetime(&local_date.and_time(time)).earliest() else {
        tracing::warn!(cron = expr, timezone = %tz, "local time does not exist on reference date; not converted");
        return expr.to_string();
    };

    let utc = local.with_timezone(&Utc);
    let rest = fields[2..].join(" ");
    format!("{} {} {}", utc.minute(), utc.hour(), rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_new_york_nine_am_follows_dst() {
        let tz = parse_timezone("America/New_York").unwrap();
        assert_eq!(convert_cron_to_utc("0 9 * * *", tz, at(2025, 1, 15)), "0 14 * * *");
        assert_eq!(convert_cron_to_utc("0 9 * * *", tz, at(2025, 7, 15)), "0 13 * * *");
    }

    #[test]
    fn test_half_hour_offset_shifts_minutes() {
        let tz = parse_timezone("Asia/Kolkata").unwrap();
        assert_eq!(convert_cron_to_utc("30 9 * * 1-5", tz, at(2025, 3, 3)), "0 4 * * 1-5");
    }

    #[test]
    fn test_non_fixed_hours_pass_through() {
        let tz = parse_timezone("Europe/Berlin").unwrap();
        for expr in ["0 * * * *", "0 9-17 * * *", "*/15 */2 * * *", "0 8,12 * * *"] {
            assert_eq!(convert_cron_to_utc(expr, tz, at(2025, 1, 1)), expr);
        }
    }

    #[test]
    fn test_utc_is_identity() {
        assert_eq!(convert_cron_to_utc("5 4 * * *", Tz::UTC, at(2025, 1, 1)), "5 4 * * *");
    }

    #[test]
    fn test_validate_cron_field_count_and_syntax() {
        assert!(validate_cron("0 9 * * *").is_ok());
        assert!(validate_cron("*/5 * * * 1-5").is_ok());
        assert!(validate_cron("0 9 * *").is_err());
        assert!(validate_cron("0 0 9 * * *").is_err());
        assert!(validate_cron("61 9 * * *").is_err());
        assert!(validate_cron("not a cron at all").is_err());
    }

    #[test]
    fn test_validate_cron_accepts_standard_weekdays() {
        for expr in ["0 9 * * 0", "0 9 * * 0,6", "0 9 * * 0-6", "0 9 * * 7", "0 9 * * 5-7", "0 9 * * */2", "0 9 * * Mon-Fri"] {
            assert!(validate_cron(expr).is_ok(), "{expr} should be valid");
        }
        assert!(validate_cron("0 9 * * 8").is_err());
        assert!(validate_cron("0 9 * * 6-1").is_err());
        assert!(validate_cron("0 9 * * 1/0").is_err());
    }

    #[test]
    fn test_weekday_translation_moves_sunday_first() {
        assert_eq!(translate_weekday_field("0").as_deref(), Some("1"));
        assert_eq!(translate_weekday_field("7").as_deref(), Some("1"));
        assert_eq!(translate_weekday_field("0,6").as_deref(), Some("1,7"));
        assert_eq!(translate_weekday_field("1-5").as_deref(), Some("2,3,4,5,6"));
        assert_eq!(translate_weekday_field("*").as_deref(), Some("*"));
    }

    #[test]
    fn test_normalize_5_field() {
        assert_eq!(normalize_cron_expression("*/5 * * * *"), "0 */5 * * * * *");
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        assert!(matches!(parse_timezone("Mars/Olympus"), Err(DomainError::Configuration(_))));
    }
}
