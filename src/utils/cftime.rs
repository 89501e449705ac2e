//! Decoding of CF-convention numeric times ("<unit> since <reference>").

use crate::error::{IngestError, Result};
use chrono::{DateTime, DurationRound, NaiveDate, NaiveTime, TimeDelta, Utc};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Days => 86_400.0,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => Ok(TimeUnit::Seconds),
            "minutes" | "minute" | "mins" | "min" => Ok(TimeUnit::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Ok(TimeUnit::Hours),
            "days" | "day" | "d" => Ok(TimeUnit::Days),
            _ => Err(IngestError::InvalidTimeUnits(s.to_string())),
        }
    }
}

/// Calendars whose dates map directly onto chrono's proleptic Gregorian dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    Gregorian,
    ProlepticGregorian,
}

impl FromStr for Calendar {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gregorian" | "standard" => Ok(Calendar::Gregorian),
            "proleptic_gregorian" => Ok(Calendar::ProlepticGregorian),
            _ => Err(IngestError::UnsupportedCalendar(s.to_string())),
        }
    }
}

/// Parsed time units, e.g. `seconds since 1970-1-1 0:0:0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub reference: DateTime<Utc>,
    pub calendar: Calendar,
}

impl TimeUnits {
    pub fn parse(units: &str, calendar: &str) -> Result<Self> {
        let calendar = calendar.parse::<Calendar>()?;
        let invalid = || IngestError::InvalidTimeUnits(units.to_string());

        let mut parts = units.split_whitespace();
        let unit = parts.next().ok_or_else(invalid)?.parse::<TimeUnit>()?;
        if !parts
            .next()
            .is_some_and(|word| word.eq_ignore_ascii_case("since"))
        {
            return Err(invalid());
        }

        // "1970-1-1 0:0:0.0", "1970-01-01T00:00:00Z" and "1970-01-01 00:00:00 UTC"
        let rest: Vec<&str> = parts.collect();
        let mut fields: Vec<&str> = Vec::new();
        for part in rest {
            match part.split_once('T') {
                Some((date, time)) if date.contains('-') => {
                    fields.push(date);
                    if !time.is_empty() {
                        fields.push(time);
                    }
                }
                _ => fields.push(part),
            }
        }

        let date = fields.first().ok_or_else(invalid)?;
        let date = parse_date(date).ok_or_else(invalid)?;

        let time = match fields.get(1) {
            Some(field) if !is_utc_marker(field) => parse_time(field).ok_or_else(invalid)?,
            _ => NaiveTime::MIN,
        };

        if fields.iter().skip(2).any(|f| !is_utc_marker(f)) {
            return Err(invalid());
        }

        Ok(Self {
            unit,
            reference: date.and_time(time).and_utc(),
            calendar,
        })
    }

    /// Convert a numeric offset to a UTC timestamp.
    pub fn to_datetime(&self, value: f64) -> Result<DateTime<Utc>> {
        let nanos = value * self.unit.seconds() * 1e9;
        if !nanos.is_finite() || nanos.abs() >= i64::MAX as f64 {
            return Err(IngestError::TimeOutOfRange(value));
        }

        self.reference
            .checked_add_signed(TimeDelta::nanoseconds(nanos.round() as i64))
            .ok_or(IngestError::TimeOutOfRange(value))
    }
}

/// Convert a numeric time using `units` and `calendar`.
pub fn num2date(value: f64, units: &str, calendar: &str) -> Result<DateTime<Utc>> {
    TimeUnits::parse(units, calendar)?.to_datetime(value)
}

/// Truncate a timestamp to whole minutes.
pub fn truncate_to_minute(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(TimeDelta::minutes(1))
        .unwrap_or(timestamp)
}

/// Sentinel and fill times decode to the epoch or earlier.
pub fn is_after_epoch(timestamp: DateTime<Utc>) -> bool {
    (timestamp.timestamp(), timestamp.timestamp_subsec_nanos()) > (0, 0)
}

fn is_utc_marker(field: &str) -> bool {
    matches!(field, "Z" | "z" | "UTC" | "utc" | "+00:00" | "+0000")
}

fn parse_date(field: &str) -> Option<NaiveDate> {
    let mut parts = field.splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_time(field: &str) -> Option<NaiveTime> {
    let field = field.trim_end_matches(['Z', 'z']);
    let mut parts = field.splitn(3, ':');
    let hour = parts.next()?.parse::<u32>().ok()?;
    let minute = parts.next().map_or(Some(0), |m| m.parse::<u32>().ok())?;
    let seconds = parts.next().map_or(Some(0.0), |s| s.parse::<f64>().ok())?;
    if !(0.0..60.0).contains(&seconds) {
        return None;
    }
    let whole = seconds.trunc() as u32;
    let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
    NaiveTime::from_hms_nano_opt(hour, minute, whole, nanos.min(999_999_999))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::{TIME_CALENDAR, TIME_UNITS};
    use chrono::TimeZone;

    #[test]
    fn test_parse_loader_units() {
        let units = TimeUnits::parse(TIME_UNITS, TIME_CALENDAR).unwrap();
        assert_eq!(units.unit, TimeUnit::Seconds);
        assert_eq!(units.reference, Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(units.calendar, Calendar::Gregorian);
    }

    #[test]
    fn test_parse_iso_reference() {
        let units = TimeUnits::parse("days since 2000-01-01T12:00:00Z", "standard").unwrap();
        assert_eq!(units.unit, TimeUnit::Days);
        assert_eq!(units.reference, Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap());

        let units = TimeUnits::parse("hours since 1990-06-15 06:30:00 UTC", "gregorian").unwrap();
        assert_eq!(units.reference, Utc.with_ymd_and_hms(1990, 6, 15, 6, 30, 0).unwrap());
    }

    #[test]
    fn test_num2date_seconds() {
        let ts = num2date(1_577_836_800.0, TIME_UNITS, TIME_CALENDAR).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_num2date_days() {
        let ts = num2date(1.5, "days since 2000-1-1", "gregorian").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2000, 1, 2, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_units() {
        assert!(matches!(
            TimeUnits::parse("fortnights since 1970-1-1", "gregorian"),
            Err(IngestError::InvalidTimeUnits(_))
        ));
        assert!(matches!(
            TimeUnits::parse("seconds after 1970-1-1", "gregorian"),
            Err(IngestError::InvalidTimeUnits(_))
        ));
        assert!(matches!(
            TimeUnits::parse("seconds since yesterday", "gregorian"),
            Err(IngestError::InvalidTimeUnits(_))
        ));
    }

    #[test]
    fn test_unsupported_calendar() {
        assert!(matches!(
            TimeUnits::parse(TIME_UNITS, "360_day"),
            Err(IngestError::UnsupportedCalendar(_))
        ));
    }

    #[test]
    fn test_fill_values_out_of_range() {
        let units = TimeUnits::parse(TIME_UNITS, TIME_CALENDAR).unwrap();
        assert!(matches!(
            units.to_datetime(f64::NAN),
            Err(IngestError::TimeOutOfRange(_))
        ));
        assert!(matches!(
            units.to_datetime(9.969_209_968_386_869e36),
            Err(IngestError::TimeOutOfRange(_))
        ));
    }

    #[test]
    fn test_truncate_and_epoch_filter() {
        let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert!(!is_after_epoch(epoch));
        assert!(!is_after_epoch(truncate_to_minute(epoch + TimeDelta::seconds(59))));
        assert!(is_after_epoch(truncate_to_minute(epoch + TimeDelta::seconds(60))));
        assert!(!is_after_epoch(epoch - TimeDelta::days(1)));

        let ts = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 59).unwrap();
        assert_eq!(
            truncate_to_minute(ts),
            Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 0).unwrap()
        );
    }
}
