//! Reduction of sub-daily samples to one value per day.

use chrono::NaiveTime;

use crate::{
    error::{Error, Result},
    series::NativeSeries,
};

/// Keeps the sample at `offset` within each day's block of `samples_per_day`
/// samples, stamped at midnight of that day.
///
/// ERA5 6-hourly fields use `samples_per_day = 4`; `offset = 2` selects 12 UTC.
/// A day with any other number of samples is an error, never patched from a
/// neighbouring sample.
pub fn reduce_to_daily(series: &NativeSeries, samples_per_day: usize, offset: usize) -> Result<NativeSeries> {
    if samples_per_day == 0 || offset >= samples_per_day {
        return Err(Error::Config(format!(
            "offset {} is not valid for {} samples per day",
            offset, samples_per_day
        )));
    }

    let times = series.times();
    let values = series.values();

    let mut day_times = Vec::with_capacity(times.len() / samples_per_day + 1);
    let mut day_values = Vec::with_capacity(times.len() / samples_per_day + 1);

    let mut block_start = 0;
    while block_start < times.len() {
        let date = times[block_start].date();
        let block_len = times[block_start..]
            .iter()
            .take_while(|t| t.date() == date)
            .count();

        if block_len != samples_per_day {
            return Err(Error::IncompleteDay {
                date,
                expected: samples_per_day,
                found: block_len,
            });
        }

        day_times.push(date.and_time(NaiveTime::MIN));
        day_values.push(values[block_start + offset]);
        block_start += block_len;
    }

    NativeSeries::new(series.name(), day_times, day_values)
}

// -- Tests -------------------------------------------------------------------
