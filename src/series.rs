//! Scalar time series, before and after calendar normalization.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    calendar::CanonicalCalendar,
    error::{Error, Result},
};

/// A point series on whatever time axis the source provides.
///
/// Timestamps are strictly increasing. `None` marks a missing value; non-finite
/// values coming out of a reader are turned into `None` on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSeries {
    name: String,
    times: Vec<NaiveDateTime>,
    values: Vec<Option<f64>>,
}

impl NativeSeries {
    pub fn new(
        name: impl Into<String>,
        times: Vec<NaiveDateTime>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        let name = name.into();
        if times.len() != values.len() {
            return Err(Error::Extraction(format!(
                "series `{}` has {} timestamps but {} values",
                name,
                times.len(),
                values.len()
            )));
        }
        if let Some(pair) = times.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(Error::CalendarMismatch(format!(
                "series `{}` is not strictly time-ordered at {} -> {}",
                name, pair[0], pair[1]
            )));
        }

        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();

        Ok(NativeSeries {
            name,
            times,
            values,
        })
    }

    /// Builds a series from raw reader output, where NaN marks missing.
    pub fn from_raw(name: impl Into<String>, times: Vec<NaiveDateTime>, raw: Vec<f64>) -> Result<Self> {
        NativeSeries::new(name, times, raw.into_iter().map(Some).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, Option<f64>)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    /// Keeps only the samples whose date lies in `[start, end]`.
    pub fn within(&self, start: NaiveDate, end: NaiveDate) -> NativeSeries {
        let (times, values) = self
            .iter()
            .filter(|(t, _)| (start..=end).contains(&t.date()))
            .unzip();

        NativeSeries {
            name: self.name.clone(),
            times,
            values,
        }
    }
}

impl From<&ScalarSeries> for NativeSeries {
    fn from(series: &ScalarSeries) -> Self {
        let times = series
            .calendar
            .dates()
            .iter()
            .map(|d| d.and_time(chrono::NaiveTime::MIN))
            .collect();

        NativeSeries {
            name: series.name.clone(),
            times,
            values: series.values.clone(),
        }
    }
}

/// A named field with exactly one value per canonical calendar date.
#[derive(Debug, Clone)]
pub struct ScalarSeries {
    name: String,
    calendar: Arc<CanonicalCalendar>,
    values: Vec<Option<f64>>,
}

impl ScalarSeries {
    pub fn new(
        name: impl Into<String>,
        calendar: Arc<CanonicalCalendar>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        let name = name.into();
        if values.len() != calendar.len() {
            return Err(Error::CalendarMismatch(format!(
                "series `{}` has {} values for a {}-day calendar",
                name,
                values.len(),
                calendar.len()
            )));
        }

        Ok(ScalarSeries {
            name,
            calendar,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calendar(&self) -> &Arc<CanonicalCalendar> {
        &self.calendar
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Applies `f` to every present value; missing stays missing.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> ScalarSeries {
        ScalarSeries {
            name: self.name.clone(),
            calendar: Arc::clone(&self.calendar),
            values: self.values.iter().map(|v| v.map(&f)).collect(),
        }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> ScalarSeries {
        self.name = name.into();
        self
    }

    /// True when both series sit on the same canonical axis.
    pub fn shares_calendar(&self, other: &ScalarSeries) -> bool {
        Arc::ptr_eq(&self.calendar, &other.calendar) || self.calendar == other.calendar
    }

    pub fn into_values(self) -> Vec<Option<f64>> {
        self.values
    }
}

// -- Tests -------------------------------------------------------------------
