//! Conversion of declared source units to the canonical unit of each field.

use crate::{
    catalog::FieldKind,
    error::{Error, Result},
    series::ScalarSeries,
};

pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Standard gravity used to turn geopotential into geopotential height.
pub const GRAVITY: f64 = 9.8;

pub const KELVIN_OFFSET: f64 = 273.15;

/// How a declared unit maps onto the canonical unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    Identity,
    Scale(f64),
    Offset(f64),
}

impl Conversion {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Conversion::Identity => value,
            Conversion::Scale(factor) => value * factor,
            Conversion::Offset(offset) => value + offset,
        }
    }
}

/// Looks up the conversion for a declared unit tag. Whitespace in the tag is
/// ignored, so `kg m-2 s-1` and `kgm-2s-1` are the same unit.
pub fn conversion_for(declared_unit: &str, field: FieldKind) -> Result<Conversion> {
    let tag: String = declared_unit.split_whitespace().collect();

    let conversion = match (field, tag.as_str()) {
        (FieldKind::Precipitation, "kgm-2s-1" | "kg/m2/s" | "kgm**-2s**-1") => {
            Conversion::Scale(SECONDS_PER_DAY)
        }
        (FieldKind::Precipitation, "mm/day" | "mmday-1" | "mmd-1" | "mm") => Conversion::Identity,
        (FieldKind::GeopotentialHeight, "m" | "gpm") => Conversion::Identity,
        (FieldKind::GeopotentialHeight, "m2s-2" | "m**2s**-2" | "m2/s2") => {
            Conversion::Scale(1.0 / GRAVITY)
        }
        (FieldKind::Temperature, "K") => Conversion::Identity,
        (FieldKind::Temperature, "degC" | "C" | "celsius") => Conversion::Offset(KELVIN_OFFSET),
        _ => {
            return Err(Error::UnsupportedUnit {
                unit: declared_unit.to_string(),
                field,
            })
        }
    };

    Ok(conversion)
}

/// Converts a series to the canonical unit of `field`.
pub fn to_canonical(series: &ScalarSeries, declared_unit: &str, field: FieldKind) -> Result<ScalarSeries> {
    let conversion = conversion_for(declared_unit, field)?;
    if conversion == Conversion::Identity {
        return Ok(series.clone());
    }

    Ok(series.map(|v| conversion.apply(v)))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::calendar::CanonicalCalendar;

    fn series(values: Vec<Option<f64>>) -> ScalarSeries {
        let start = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
        let end = start + chrono::Days::new(values.len() as u64 - 1);
        let calendar = Arc::new(CanonicalCalendar::new(start, end).unwrap());
        ScalarSeries::new("x", calendar, values).unwrap()
    }

    #[test]
    fn should_convert_flux_to_daily_depth() {
        let s = to_canonical(
            &series(vec![Some(1.0), None]),
            "kgm-2s-1",
            FieldKind::Precipitation,
        )
        .unwrap();

        assert_eq!(s.values(), &[Some(86400.0), None]);
    }

    #[test]
    fn should_ignore_whitespace_in_unit_tag() {
        let s = to_canonical(&series(vec![Some(2.0)]), "kg m-2 s-1", FieldKind::Precipitation).unwrap();

        assert_eq!(s.values(), &[Some(172800.0)]);
    }

    #[test]
    fn should_not_scale_already_daily_precipitation() {
        // Regression: a daily-depth unit must pass through, not be multiplied by 86400.
        let s = to_canonical(&series(vec![Some(12.5)]), "mm/day", FieldKind::Precipitation).unwrap();

        assert_eq!(s.values(), &[Some(12.5)]);
    }

    #[test]
    fn should_convert_geopotential_and_celsius() {
        let z = to_canonical(&series(vec![Some(29400.0)]), "m2s-2", FieldKind::GeopotentialHeight).unwrap();
        let t = to_canonical(&series(vec![Some(-5.0)]), "degC", FieldKind::Temperature).unwrap();

        assert!((z.values()[0].unwrap() - 3000.0).abs() < 1e-9);
        assert!((t.values()[0].unwrap() - 268.15).abs() < 1e-9);
    }

    #[test]
    fn should_reject_unknown_unit() {
        let result = to_canonical(&series(vec![Some(1.0)]), "in/day", FieldKind::Precipitation);

        assert!(matches!(result, Err(Error::UnsupportedUnit { .. })));
        assert!(conversion_for("m", FieldKind::Temperature).is_err());
    }
}
