//! Freezing-level height from a temperature / geopotential-height pair.

use crate::{
    error::{Error, Result},
    series::ScalarSeries,
    units::KELVIN_OFFSET,
};

/// Label of the derived field in stage context and on the derived series.
pub const H0: &str = "H0";

/// Constant lapse rate in K/m.
pub const LAPSE_RATE: f64 = -6.5e-3;

/// Height at which a linear temperature profile through `(z, t)` reaches 0 °C.
///
/// From `(t0 - t) / (h0 - z) = dT/dz` with `t0 = 273.15 K`.
pub fn freezing_level(t_kelvin: f64, z_m: f64) -> f64 {
    (KELVIN_OFFSET - t_kelvin) / LAPSE_RATE + z_m
}

/// Pointwise H0 over two canonical series. Missing in either input gives
/// missing output.
pub fn freezing_level_height(temperature: &ScalarSeries, height: &ScalarSeries) -> Result<ScalarSeries> {
    if !temperature.shares_calendar(height) {
        return Err(Error::CalendarMismatch(format!(
            "`{}` ({}..={}) and `{}` ({}..={}) are not on the same canonical calendar",
            temperature.name(),
            temperature.calendar().start(),
            temperature.calendar().end(),
            height.name(),
            height.calendar().start(),
            height.calendar().end(),
        )));
    }

    let values = temperature
        .values()
        .iter()
        .zip(height.values())
        .map(|(t, z)| match (t, z) {
            (Some(t), Some(z)) => Some(freezing_level(*t, *z)),
            _ => None,
        })
        .collect();

    ScalarSeries::new(H0, temperature.calendar().clone(), values)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::calendar::CanonicalCalendar;

    fn calendar(days: u64) -> Arc<CanonicalCalendar> {
        let start = NaiveDate::from_ymd_opt(1990, 6, 1).unwrap();
        Arc::new(CanonicalCalendar::new(start, start + chrono::Days::new(days - 1)).unwrap())
    }

    #[test]
    fn should_equal_height_at_freezing_point() {
        for z in [0.0, 1234.5, 3050.0, -10.0] {
            assert_eq!(freezing_level(273.15, z), z);
        }
    }

    #[test]
    fn should_rise_1000m_per_6_5_kelvin() {
        let h0 = freezing_level(273.15 + 6.5, 3000.0);

        assert!((h0 - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn should_propagate_missing() {
        let cal = calendar(3);
        let t = ScalarSeries::new("ta", cal.clone(), vec![Some(270.0), None, Some(280.0)]).unwrap();
        let z = ScalarSeries::new("zg", cal, vec![None, Some(3000.0), Some(3100.0)]).unwrap();

        let h0 = freezing_level_height(&t, &z).unwrap();

        assert_eq!(h0.values()[0], None);
        assert_eq!(h0.values()[1], None);
        assert!(h0.values()[2].unwrap().is_finite());
        assert_eq!(h0.name(), "H0");
    }

    #[test]
    fn should_accept_equal_calendars_built_separately() {
        let t = ScalarSeries::new("ta", calendar(2), vec![Some(273.15); 2]).unwrap();
        let z = ScalarSeries::new("zg", calendar(2), vec![Some(10.0); 2]).unwrap();

        assert_eq!(freezing_level_height(&t, &z).unwrap().values(), &[Some(10.0); 2]);
    }

    #[test]
    fn should_refuse_misaligned_series() {
        let t = ScalarSeries::new("ta", calendar(3), vec![Some(270.0); 3]).unwrap();
        let other = Arc::new(
            CanonicalCalendar::new(
                NaiveDate::from_ymd_opt(1990, 6, 2).unwrap(),
                NaiveDate::from_ymd_opt(1990, 6, 4).unwrap(),
            )
            .unwrap(),
        );
        let z = ScalarSeries::new("zg", other, vec![Some(3000.0); 3]).unwrap();

        assert!(matches!(
            freezing_level_height(&t, &z),
            Err(Error::CalendarMismatch(_))
        ));
    }
}
