//! Decoding of CF-convention time coordinates (`<unit> since <reference>`).

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::error::{Error, Result};

const SECONDS_PER_DAY: i64 = 86_400;

/// Cumulative day count at the start of each month in a 365-day year.
const NOLEAP_MONTH_START: [i64; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfCalendar {
    /// `standard`, `gregorian`: Julian before 1582-10-15, which is not decoded.
    Standard,
    /// `proleptic_gregorian`.
    ProlepticGregorian,
    /// `noleap`, `365_day`.
    NoLeap,
}

impl CfCalendar {
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name.map(|n| n.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("standard") | Some("gregorian") => Ok(CfCalendar::Standard),
            Some("proleptic_gregorian") => Ok(CfCalendar::ProlepticGregorian),
            Some("noleap") | Some("365_day") => Ok(CfCalendar::NoLeap),
            Some(other) => Err(Error::TimeAxis(format!("unsupported calendar `{}`", other))),
        }
    }
}

/// A parsed time `units` attribute together with its calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    seconds_per_unit: f64,
    reference: NaiveDateTime,
    calendar: CfCalendar,
}

impl TimeUnits {
    pub fn parse(units: &str, calendar: Option<&str>) -> Result<Self> {
        let calendar = CfCalendar::parse(calendar)?;
        let (unit, reference) = units
            .split_once(" since ")
            .ok_or_else(|| Error::TimeAxis(format!("time units `{}` lack `since`", units)))?;

        let seconds_per_unit = match unit.trim().to_lowercase().as_str() {
            "days" | "day" | "d" => 86_400.0,
            "hours" | "hour" | "hrs" | "h" => 3_600.0,
            "minutes" | "minute" | "min" => 60.0,
            "seconds" | "second" | "sec" | "s" => 1.0,
            other => return Err(Error::TimeAxis(format!("unknown time unit `{}`", other))),
        };

        let reference = parse_reference(reference.trim())?;
        if calendar == CfCalendar::NoLeap && reference.month() == 2 && reference.day() == 29 {
            return Err(Error::TimeAxis(
                "reference date Feb-29 does not exist in a noleap calendar".to_string(),
            ));
        }
        if calendar == CfCalendar::Standard && before_reform(reference.date()) {
            return Err(Error::TimeAxis(format!(
                "reference {} precedes the Gregorian reform of the standard calendar",
                reference
            )));
        }

        Ok(TimeUnits {
            seconds_per_unit,
            reference,
            calendar,
        })
    }

    /// Timestamp `offset` units after the reference, rounded to the second.
    pub fn decode(&self, offset: f64) -> Result<NaiveDateTime> {
        let reference_seconds = self.reference.time().num_seconds_from_midnight() as f64;
        let total = (reference_seconds + offset * self.seconds_per_unit).round();
        if !total.is_finite() || total.abs() > i64::MAX as f64 / 2.0 {
            return Err(Error::TimeAxis(format!("time offset {} out of range", offset)));
        }
        let total = total as i64;
        let days = total.div_euclid(SECONDS_PER_DAY);
        let seconds = total.rem_euclid(SECONDS_PER_DAY) as u32;

        let date = match self.calendar {
            CfCalendar::Standard | CfCalendar::ProlepticGregorian => TimeDelta::try_days(days)
                .and_then(|d| self.reference.date().checked_add_signed(d)),
            CfCalendar::NoLeap => noleap_add_days(self.reference.date(), days),
        }
        .ok_or_else(|| Error::TimeAxis(format!("time offset {} out of range", offset)))?;
        if self.calendar == CfCalendar::Standard && before_reform(date) {
            return Err(Error::TimeAxis(format!(
                "time offset {} decodes to {}, before the Gregorian reform",
                offset, date
            )));
        }

        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
            .ok_or_else(|| Error::TimeAxis(format!("bad time of day in offset {}", offset)))?;

        Ok(date.and_time(time))
    }

    pub fn decode_all(&self, offsets: &[f64]) -> Result<Vec<NaiveDateTime>> {
        offsets.iter().map(|o| self.decode(*o)).collect()
    }
}

/// Accepts `1850-1-1`, `1850-01-01 00:00:00`, `1900-01-01 00:00:00.0` and
/// `1949-12-01T00:00:00Z`.
fn parse_reference(text: &str) -> Result<NaiveDateTime> {
    let cleaned = text.trim_end_matches("UTC").trim().trim_end_matches('Z').replacen('T', " ", 1);

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&cleaned, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| Error::TimeAxis(format!("cannot parse reference time `{}`", text)))
}

/// Dates before 1582-10-15 are Julian in the CF standard calendar.
fn before_reform(date: NaiveDate) -> bool {
    (date.year(), date.month(), date.day()) < (1582, 10, 15)
}

/// Adds whole days on a 365-day calendar.
fn noleap_add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let month_idx = date.month0() as usize;
    let day_of_year = NOLEAP_MONTH_START[month_idx] + date.day0() as i64;
    let index = date.year() as i64 * 365 + day_of_year + days;

    let year = i32::try_from(index.div_euclid(365)).ok()?;
    let day_of_year = index.rem_euclid(365);
    let month0 = NOLEAP_MONTH_START
        .iter()
        .rposition(|start| *start <= day_of_year)?;
    let day0 = day_of_year - NOLEAP_MONTH_START[month0];

    NaiveDate::from_ymd_opt(year, month0 as u32 + 1, day0 as u32 + 1)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn should_decode_gregorian_hours() {
        let units = TimeUnits::parse("hours since 1900-01-01 00:00:00.0", Some("gregorian")).unwrap();

        assert_eq!(units.decode(0.0).unwrap(), ymd_hms(1900, 1, 1, 0));
        assert_eq!(units.decode(36.0).unwrap(), ymd_hms(1900, 1, 2, 12));
    }

    #[test]
    fn should_cross_leap_day_in_gregorian() {
        let units = TimeUnits::parse("days since 2000-02-28", None).unwrap();

        assert_eq!(units.decode(1.5).unwrap(), ymd_hms(2000, 2, 29, 12));
        assert_eq!(units.decode(2.0).unwrap(), ymd_hms(2000, 3, 1, 0));
    }

    #[test]
    fn should_skip_leap_day_in_noleap() {
        let units = TimeUnits::parse("days since 1850-1-1", Some("noleap")).unwrap();

        // 150 years of 365 days lands on 2000-01-01.
        assert_eq!(units.decode(150.0 * 365.0).unwrap(), ymd_hms(2000, 1, 1, 0));
        let feb28 = 150.0 * 365.0 + 58.5;
        assert_eq!(units.decode(feb28).unwrap(), ymd_hms(2000, 2, 28, 12));
        assert_eq!(units.decode(feb28 + 1.0).unwrap(), ymd_hms(2000, 3, 1, 12));
    }

    #[test]
    fn should_go_backwards_from_reference() {
        let units = TimeUnits::parse("days since 1949-12-01T00:00:00Z", Some("365_day")).unwrap();

        assert_eq!(units.decode(-1.0).unwrap(), ymd_hms(1949, 11, 30, 0));
        assert_eq!(units.decode(-334.0).unwrap(), ymd_hms(1949, 1, 1, 0));
        assert_eq!(units.decode(-335.0).unwrap(), ymd_hms(1948, 12, 31, 0));
    }

    #[test]
    fn should_reject_unsupported_calendar_and_units() {
        assert!(TimeUnits::parse("days since 1850-01-01", Some("360_day")).is_err());
        assert!(TimeUnits::parse("months since 1850-01-01", None).is_err());
        assert!(TimeUnits::parse("days after 1850-01-01", None).is_err());
    }

    #[test]
    fn should_parse_reference_layouts() {
        let expected = ymd_hms(1850, 1, 1, 6);

        for units in [
            "hours since 1850-1-1 6:00:00",
            "hours since 1850-01-01 06:00",
            "hours since 1850-01-01 06:00:00.0",
            "hours since 1850-01-01T06:00:00Z",
            "hours since 1850-01-01 06:00:00 UTC",
        ] {
            let parsed = TimeUnits::parse(units, Some("noleap")).unwrap();
            assert_eq!(parsed.decode(0.0).unwrap(), expected, "{}", units);
        }
        assert!(TimeUnits::parse("days since 1850/01/01", None).is_err());
    }

    #[test]
    fn should_reject_julian_dates_in_standard_calendar() {
        assert!(TimeUnits::parse("days since 1582-10-04", Some("standard")).is_err());
        assert!(TimeUnits::parse("days since 1500-01-01", None).is_err());

        let units = TimeUnits::parse("days since 1582-10-15", Some("gregorian")).unwrap();
        assert_eq!(units.decode(0.0).unwrap(), ymd_hms(1582, 10, 15, 0));
        assert!(units.decode(-1.0).is_err());
    }

    #[test]
    fn should_decode_proleptic_gregorian_before_reform() {
        let units = TimeUnits::parse("days since 1582-10-04", Some("proleptic_gregorian")).unwrap();

        assert_eq!(units.decode(1.0).unwrap(), ymd_hms(1582, 10, 5, 0));
    }
}
