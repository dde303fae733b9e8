//! The canonical 365-day calendar and alignment of native series onto it.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::{
    error::{Error, Result},
    series::{NativeSeries, ScalarSeries},
};

/// Gap-free daily dates between `start` and `end`, Feb-29 excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCalendar {
    start: NaiveDate,
    end: NaiveDate,
    dates: Vec<NaiveDate>,
}

impl CanonicalCalendar {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::Config(format!(
                "calendar start {} is after end {}",
                start, end
            )));
        }
        if is_leap_day(start) || is_leap_day(end) {
            return Err(Error::Config(
                "calendar bounds cannot fall on Feb-29".to_string(),
            ));
        }

        let dates = start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| !is_leap_day(*d))
            .collect();

        Ok(CanonicalCalendar { start, end, dates })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }
}

pub fn is_leap_day(date: NaiveDate) -> bool {
    date.month() == 2 && date.day() == 29
}

/// Aligns a daily native series onto the canonical calendar.
///
/// Feb-29 samples are dropped, then every remaining sample is joined on its
/// exact date. Calendar dates without a sample become missing. A sample dated
/// outside the calendar, or two samples on the same date, is a mismatch.
pub fn normalize(native: &NativeSeries, calendar: &Arc<CanonicalCalendar>) -> Result<ScalarSeries> {
    let mut values = vec![None; calendar.len()];
    let mut filled = vec![false; calendar.len()];

    for (time, value) in native.iter() {
        let date = time.date();
        if is_leap_day(date) {
            continue;
        }

        let idx = calendar.index_of(date).ok_or_else(|| {
            Error::CalendarMismatch(format!(
                "`{}` has a sample on {} outside the canonical range {}..={}",
                native.name(),
                date,
                calendar.start(),
                calendar.end()
            ))
        })?;

        if filled[idx] {
            return Err(Error::CalendarMismatch(format!(
                "`{}` has more than one sample on {}; reduce it to daily first",
                native.name(),
                date
            )));
        }
        filled[idx] = true;
        values[idx] = value;
    }

    ScalarSeries::new(native.name(), Arc::clone(calendar), values)
}

// -- Tests -------------------------------------------------------------------
